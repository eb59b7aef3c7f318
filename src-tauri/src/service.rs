//! POM Service
//!
//! Single entry point for the command layer. Ties the repositories, the
//! hierarchy manager and the validation session together so that every
//! store write is followed by the matching in-memory update.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::{DomainError, DomainResult, Group, GroupUpdate, Pom, PomUpdate};
use crate::hierarchy::{DropTarget, HierarchyManager, MoveRequest, TreeEntry, TreeSnapshot};
use crate::repository::{DbState, GroupRepository, PomElementOperations, PomRepository, Repository};
use crate::upload::{check_screenshot_url, image_data_url, SnapshotFetcher, UploadKind};
use crate::verify::{
    sanitize, BatchOutcome, SanitizedSnapshot, SessionSnapshot, ThreadContextLoader, ValidationSession,
    VerifyOutcome,
};

pub struct PomService {
    config: AppConfig,
    groups: Arc<GroupRepository>,
    poms: Arc<PomRepository>,
    hierarchy: HierarchyManager,
    session: ValidationSession<ThreadContextLoader>,
    fetcher: SnapshotFetcher,
}

impl PomService {
    pub fn new(db: &DbState, config: AppConfig) -> Self {
        let groups = Arc::new(GroupRepository::new(db.shared()));
        let poms = Arc::new(PomRepository::new(db.shared()));
        let hierarchy = HierarchyManager::new(groups.clone(), poms.clone());
        let session = ValidationSession::new(
            ThreadContextLoader::new(config.render_options()),
            config.poll_policy(),
        );
        let fetcher = SnapshotFetcher::new(config.max_html_bytes);

        Self { config, groups, poms, hierarchy, session, fetcher }
    }

    /// Load the hierarchy from the store. Call once the database is open.
    pub async fn load(&self) -> DomainResult<()> {
        self.hierarchy.load().await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn hierarchy(&self) -> &HierarchyManager {
        &self.hierarchy
    }

    // ========================
    // Groups
    // ========================

    pub async fn list_groups(&self) -> DomainResult<Vec<Group>> {
        self.groups.list().await
    }

    pub async fn create_group(&self, name: &str, parent_id: Option<u32>) -> DomainResult<Group> {
        self.hierarchy.create_group(name, parent_id).await
    }

    pub async fn update_group(&self, id: u32, update: &GroupUpdate) -> DomainResult<Group> {
        self.hierarchy.update_group(id, update).await
    }

    pub async fn delete_group(&self, id: u32) -> DomainResult<()> {
        self.hierarchy.delete_group(id).await
    }

    pub async fn reparent_group(&self, id: u32, parent_id: Option<u32>) -> DomainResult<Group> {
        self.hierarchy.reparent(id, parent_id).await
    }

    pub async fn tree(&self) -> TreeSnapshot {
        self.hierarchy.snapshot().await
    }

    pub async fn drop_item(&self, dragged: TreeEntry, target: DropTarget) -> DomainResult<Option<MoveRequest>> {
        self.hierarchy.drop_item(dragged, target).await
    }

    // ========================
    // POMs
    // ========================

    pub async fn list_poms(&self, group_id: Option<Option<u32>>) -> DomainResult<Vec<Pom>> {
        match group_id {
            None => self.poms.list().await,
            Some(group_id) => self.poms.list_by_group(group_id).await,
        }
    }

    pub async fn get_pom(&self, id: u32) -> DomainResult<Pom> {
        self.poms.find_with_elements(id).await
    }

    pub async fn create_pom(&self, name: &str, group_id: Option<u32>) -> DomainResult<Pom> {
        let mut pom = Pom::new(0, name.trim().to_string());
        pom.group_id = group_id;
        let created = self.poms.create(&pom).await?;
        self.hierarchy.pom_saved(&created).await;
        Ok(created)
    }

    /// Save name, attachments and/or the element list
    pub async fn save_pom(&self, id: u32, update: &PomUpdate) -> DomainResult<Pom> {
        if let Some(Some(url)) = &update.screenshot_url {
            check_screenshot_url(url, &self.config)?;
        }
        if let Some(Some(html)) = &update.html_content {
            self.check_html_size(html)?;
        }

        let pom = self.poms.apply_update(id, update).await?;
        self.saved(&pom).await;
        Ok(pom)
    }

    pub async fn delete_pom(&self, id: u32) -> DomainResult<()> {
        self.poms.delete(id).await?;
        self.hierarchy.pom_deleted(id).await;
        if self.session.active_pom_id() == Some(id) {
            self.session.select_pom(None);
        }
        Ok(())
    }

    pub async fn reparent_pom(&self, id: u32, group_id: Option<u32>) -> DomainResult<Pom> {
        self.hierarchy.reparent_leaf(id, group_id).await
    }

    // ========================
    // Attachments
    // ========================

    /// Store HTML content as the POM's snapshot
    pub async fn attach_html(&self, pom_id: u32, html: &str) -> DomainResult<Pom> {
        self.check_html_size(html)?;
        let pom = self.poms.attach_html(pom_id, html).await?;
        log::info!("Attached {} byte snapshot to POM {}", html.len(), pom_id);
        self.saved(&pom).await;
        Ok(pom)
    }

    /// Fetch an uploaded snapshot from the upload service and store it
    pub async fn attach_html_from_url(&self, pom_id: u32, url: &str) -> DomainResult<Pom> {
        self.poms.get(pom_id).await?;
        let html = self.fetcher.fetch(url).await?;
        self.attach_html(pom_id, &html).await
    }

    pub async fn attach_screenshot(&self, pom_id: u32, url: &str) -> DomainResult<Pom> {
        check_screenshot_url(url, &self.config)?;
        let pom = self.poms.attach_screenshot(pom_id, url.trim()).await?;
        self.saved(&pom).await;
        Ok(pom)
    }

    /// Attach a locally picked file: HTML becomes the snapshot, an image
    /// becomes the screenshot
    pub async fn attach_file(&self, pom_id: u32, file_name: &str, bytes: &[u8]) -> DomainResult<Pom> {
        match UploadKind::check(file_name, bytes.len(), &self.config)? {
            UploadKind::Html => self.attach_html(pom_id, &String::from_utf8_lossy(bytes)).await,
            UploadKind::Image => {
                let url = image_data_url(file_name, bytes);
                self.attach_screenshot(pom_id, &url).await
            }
        }
    }

    fn check_html_size(&self, html: &str) -> DomainResult<()> {
        let limit = UploadKind::Html.max_bytes(&self.config);
        if html.len() > limit {
            return Err(DomainError::InvalidInput(format!(
                "Snapshot is {} bytes, limit is {} bytes",
                html.len(),
                limit
            )));
        }
        Ok(())
    }

    async fn saved(&self, pom: &Pom) {
        self.hierarchy.pom_saved(pom).await;
        self.session.pom_updated(pom);
    }

    // ========================
    // Verification
    // ========================

    /// Preview of what the rendering context will load
    pub fn sanitize_snapshot(&self, html: &str) -> SanitizedSnapshot {
        sanitize(html, &self.config.base_url())
    }

    /// Make a POM (or none) the subject of verification
    pub async fn select_pom(&self, id: Option<u32>) -> DomainResult<SessionSnapshot> {
        match id {
            Some(id) => {
                let pom = self.poms.find_with_elements(id).await?;
                self.session.select_pom(Some(&pom));
            }
            None => self.session.select_pom(None),
        }
        Ok(self.session.snapshot())
    }

    pub async fn verify(&self, selector: &str) -> DomainResult<VerifyOutcome> {
        self.session.verify_selector(selector).await
    }

    pub async fn verify_element(&self, element_id: u32) -> DomainResult<VerifyOutcome> {
        self.session.verify_element(element_id).await
    }

    pub async fn run_batch_validation(&self) -> DomainResult<BatchOutcome> {
        self.session.run().await
    }

    pub fn validation_state(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub async fn preview_markup(&self) -> DomainResult<String> {
        self.session.preview_markup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocatorStrategy, PomElement};
    use crate::hierarchy::TreeEntry;
    use crate::repository::init_db;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    async fn setup() -> (DbState, PomService) {
        let db = init_db(&PathBuf::from(":memory:")).await.expect("Failed to init test DB");
        let service = PomService::new(&db, AppConfig::default());
        service.load().await.unwrap();
        (db, service)
    }

    fn elements() -> Vec<PomElement> {
        vec![
            PomElement::new("input", "User", LocatorStrategy::Id, "user"),
            PomElement::new("input", "Missing", LocatorStrategy::Id, "missing"),
            PomElement::new("button", "Submit", LocatorStrategy::Xpath, "//form/button"),
        ]
    }

    const SNAPSHOT: &str = r#"<html><body><form><input id="user"><button>Go</button></form></body></html>"#;

    #[tokio::test]
    async fn test_save_pom_updates_tree() {
        let (_db, service) = setup().await;
        let group = service.create_group("Auth", None).await.unwrap();
        let pom = service.create_pom("Login", Some(group.id)).await.unwrap();

        let update = PomUpdate { elements: Some(elements()), ..Default::default() };
        let saved = service.save_pom(pom.id, &update).await.unwrap();
        assert_eq!(saved.elements.len(), 3);

        let tree = service.tree().await;
        let group_node = tree.groups.iter().find(|n| n.group.id == group.id).unwrap();
        assert_eq!(group_node.poms.len(), 1);
        assert_eq!(group_node.poms[0].id, pom.id);
        assert_eq!(group_node.poms[0].element_count, 3);
        assert!(tree.poms.is_empty());
    }

    #[tokio::test]
    async fn test_attach_validations() {
        let (_db, service) = setup().await;
        let pom = service.create_pom("Login", None).await.unwrap();

        assert_eq!(service.attach_screenshot(pom.id, "https://x/page.html").await.unwrap_err().status_code(), 400);
        let with_shot = service.attach_screenshot(pom.id, "https://x/shot.png").await.unwrap();
        assert_eq!(with_shot.screenshot_url.as_deref(), Some("https://x/shot.png"));

        let too_big = "x".repeat(service.config().max_html_bytes + 1);
        assert_eq!(service.attach_html(pom.id, &too_big).await.unwrap_err().status_code(), 400);
        assert_eq!(service.attach_html(999, "<p></p>").await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn test_attach_local_files() {
        let db = init_db(&PathBuf::from(":memory:")).await.unwrap();
        let config = AppConfig { max_image_bytes: 16, max_html_bytes: 64, ..AppConfig::default() };
        let service = PomService::new(&db, config);
        service.load().await.unwrap();
        let pom = service.create_pom("Login", None).await.unwrap();

        let with_html = service.attach_file(pom.id, "login.html", SNAPSHOT.as_bytes()).await;
        assert_eq!(with_html.unwrap_err().status_code(), 400);
        let with_html = service.attach_file(pom.id, "login.html", b"<p id=\"a\">a</p>").await.unwrap();
        assert_eq!(with_html.html_content.as_deref(), Some("<p id=\"a\">a</p>"));

        let with_shot = service.attach_file(pom.id, "login.png", &[7u8; 16]).await.unwrap();
        assert!(with_shot.screenshot_url.unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(service.attach_file(pom.id, "login.png", &[7u8; 17]).await.unwrap_err().status_code(), 400);
        assert_eq!(service.attach_file(pom.id, "login.zip", &[1]).await.unwrap_err().status_code(), 400);

        // The same image limit applies to data URLs saved directly
        let large = image_data_url("big.png", &[0u8; 17]);
        let update = PomUpdate { screenshot_url: Some(Some(large)), ..Default::default() };
        assert_eq!(service.save_pom(pom.id, &update).await.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn test_select_and_validate_pom() {
        let (_db, service) = setup().await;
        let pom = service.create_pom("Login", None).await.unwrap();
        let update = PomUpdate { elements: Some(elements()), ..Default::default() };
        let pom = service.save_pom(pom.id, &update).await.unwrap();
        service.attach_html(pom.id, SNAPSHOT).await.unwrap();

        let selected = service.select_pom(Some(pom.id)).await.unwrap();
        assert_eq!(selected.pom_id, Some(pom.id));

        let BatchOutcome::Completed(report) = service.run_batch_validation().await.unwrap() else {
            panic!("run was superseded");
        };
        let ids: Vec<u32> = pom.elements.iter().map(|e| e.id).collect();
        assert_eq!(
            report.statuses,
            BTreeMap::from([(ids[0], Some(true)), (ids[1], Some(false)), (ids[2], Some(true))])
        );
        assert_eq!(report.summary.found, 2);
        assert_eq!(report.summary.not_found, 1);

        assert!(service.verify("#user").await.unwrap().found);
        assert!(!service.verify("#nope").await.unwrap().found);
        assert_eq!(service.validation_state().statuses, report.statuses);
    }

    #[tokio::test]
    async fn test_new_snapshot_clears_results() {
        let (_db, service) = setup().await;
        let pom = service.create_pom("Login", None).await.unwrap();
        let update = PomUpdate { elements: Some(elements()), ..Default::default() };
        service.save_pom(pom.id, &update).await.unwrap();
        service.attach_html(pom.id, SNAPSHOT).await.unwrap();
        service.select_pom(Some(pom.id)).await.unwrap();
        service.run_batch_validation().await.unwrap();
        assert!(!service.validation_state().statuses.is_empty());

        service.attach_html(pom.id, "<body><p>replaced</p></body>").await.unwrap();
        assert!(service.validation_state().statuses.is_empty());
    }

    #[tokio::test]
    async fn test_delete_active_pom_clears_session() {
        let (_db, service) = setup().await;
        let pom = service.create_pom("Login", None).await.unwrap();
        service.select_pom(Some(pom.id)).await.unwrap();

        service.delete_pom(pom.id).await.unwrap();
        assert_eq!(service.validation_state().pom_id, None);
        assert!(!service.tree().await.poms.iter().any(|p| p.id == pom.id));
        assert_eq!(service.run_batch_validation().await.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn test_drop_pom_into_group() {
        let (_db, service) = setup().await;
        let group = service.create_group("Checkout", None).await.unwrap();
        let pom = service.create_pom("Cart", None).await.unwrap();

        let moved = service
            .drop_item(TreeEntry::Pom(pom.id), DropTarget::Row { entry: TreeEntry::Group(group.id), fraction: 0.5 })
            .await
            .unwrap();
        assert_eq!(moved, Some(MoveRequest::Pom { id: pom.id, group_id: Some(group.id) }));
        assert_eq!(service.get_pom(pom.id).await.unwrap().group_id, Some(group.id));
        assert_eq!(service.list_poms(Some(Some(group.id))).await.unwrap().len(), 1);
        assert!(service.list_poms(Some(None)).await.unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_preview() {
        let db = DbState::new();
        let service = PomService::new(&db, AppConfig::default());
        let clean = service.sanitize_snapshot("<script>x()</script><p id=\"a\">a</p>");
        assert_eq!(clean.body, "<p id=\"a\">a</p>");
    }
}
