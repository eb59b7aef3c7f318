//! POM Element and Attachment Operations
//!
//! Partial writes on a POM: the element collection, the owning group and the
//! uploaded screenshot / HTML snapshot. Each call is one transaction.

use async_trait::async_trait;
use rusqlite::params;

use crate::domain::{DomainError, DomainResult, Pom, PomElement, PomUpdate};
use crate::repository::group::group_exists;
use super::super::db::now_millis;
use super::super::not_initialized;
use super::pom_repo::{find_pom, pom_exists, query_poms_in_group, save_elements, PomRepository};

/// Trait for POM partial-update operations
#[async_trait]
pub trait PomElementOperations {
    /// A POM together with its elements, in one call
    async fn find_with_elements(&self, id: u32) -> DomainResult<Pom>;

    /// Replace the whole element collection
    async fn replace_elements(&self, pom_id: u32, elements: &[PomElement]) -> DomainResult<Vec<PomElement>>;

    /// File a POM under a group (None = root). POMs cannot be ancestors of
    /// groups, so only existence is checked.
    async fn set_group(&self, pom_id: u32, group_id: Option<u32>) -> DomainResult<Pom>;

    /// Store an HTML snapshot, replacing any previous one
    async fn attach_html(&self, pom_id: u32, html: &str) -> DomainResult<Pom>;

    /// Store the screenshot URL
    async fn attach_screenshot(&self, pom_id: u32, url: &str) -> DomainResult<Pom>;

    /// POMs filed directly under a group (None = root level)
    async fn list_by_group(&self, group_id: Option<u32>) -> DomainResult<Vec<Pom>>;

    /// Apply a typed partial update
    async fn apply_update(&self, pom_id: u32, update: &PomUpdate) -> DomainResult<Pom>;
}

#[async_trait]
impl PomElementOperations for PomRepository {
    async fn find_with_elements(&self, id: u32) -> DomainResult<Pom> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        find_pom(conn, id)?.ok_or_else(|| DomainError::NotFound(format!("POM {} not found", id)))
    }

    async fn replace_elements(&self, pom_id: u32, elements: &[PomElement]) -> DomainResult<Vec<PomElement>> {
        for element in elements {
            element.validate()?;
        }

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction()?;

        if !pom_exists(&tx, pom_id)? {
            return Err(DomainError::NotFound(format!("POM {} not found", pom_id)));
        }

        let saved = save_elements(&tx, pom_id, elements)?;
        tx.execute(
            "UPDATE poms SET updated_at = ? WHERE id = ?",
            params![now_millis(), pom_id],
        )?;
        tx.commit()?;

        Ok(saved)
    }

    async fn set_group(&self, pom_id: u32, group_id: Option<u32>) -> DomainResult<Pom> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction()?;

        if !pom_exists(&tx, pom_id)? {
            return Err(DomainError::NotFound(format!("POM {} not found", pom_id)));
        }
        if let Some(gid) = group_id {
            if !group_exists(&tx, gid)? {
                return Err(DomainError::NotFound(format!("Group {} not found", gid)));
            }
        }

        tx.execute(
            "UPDATE poms SET group_id = ?, updated_at = ? WHERE id = ?",
            params![group_id, now_millis(), pom_id],
        )?;
        let updated = find_pom(&tx, pom_id)?
            .ok_or_else(|| DomainError::NotFound(format!("POM {} not found", pom_id)))?;
        tx.commit()?;

        Ok(updated)
    }

    async fn attach_html(&self, pom_id: u32, html: &str) -> DomainResult<Pom> {
        self.apply_update(
            pom_id,
            &PomUpdate {
                html_content: Some(Some(html.to_string())),
                ..Default::default()
            },
        )
        .await
    }

    async fn attach_screenshot(&self, pom_id: u32, url: &str) -> DomainResult<Pom> {
        self.apply_update(
            pom_id,
            &PomUpdate {
                screenshot_url: Some(Some(url.to_string())),
                ..Default::default()
            },
        )
        .await
    }

    async fn list_by_group(&self, group_id: Option<u32>) -> DomainResult<Vec<Pom>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        Ok(query_poms_in_group(conn, group_id)?)
    }

    async fn apply_update(&self, pom_id: u32, update: &PomUpdate) -> DomainResult<Pom> {
        update.validate()?;

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction()?;

        let mut pom = find_pom(&tx, pom_id)?
            .ok_or_else(|| DomainError::NotFound(format!("POM {} not found", pom_id)))?;
        if update.is_empty() {
            return Ok(pom);
        }
        update.apply(&mut pom);

        let now = now_millis();
        tx.execute(
            "UPDATE poms SET name = ?, screenshot_url = ?, html_content = ?, updated_at = ?
             WHERE id = ?",
            params![pom.name, pom.screenshot_url, pom.html_content, now, pom_id],
        )?;
        if let Some(elements) = &update.elements {
            pom.elements = save_elements(&tx, pom_id, elements)?;
        }
        tx.commit()?;

        pom.updated_at = Some(now);
        Ok(pom)
    }
}
