//! Hierarchy Manager
//!
//! Owns the in-memory group tree and keeps it in step with the store.
//! Every mutation is validated, written to the store, and only then applied
//! locally; a store failure leaves the tree as it was.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::drop::{resolve_drop, DropTarget, MoveRequest};
use super::tree::{GroupTree, PomSummary, TreeEntry, TreeRow, TreeSnapshot};
use crate::domain::{DomainError, DomainResult, Group, GroupUpdate, Pom};
use crate::repository::{
    GroupHierarchyOperations, GroupRepository, PomElementOperations, PomRepository, Repository,
};

pub struct HierarchyManager {
    groups: Arc<GroupRepository>,
    poms: Arc<PomRepository>,
    tree: RwLock<GroupTree>,
}

impl HierarchyManager {
    pub fn new(groups: Arc<GroupRepository>, poms: Arc<PomRepository>) -> Self {
        Self {
            groups,
            poms,
            tree: RwLock::new(GroupTree::default()),
        }
    }

    /// Rebuild the tree from the store
    pub async fn load(&self) -> DomainResult<()> {
        let groups = self.groups.list().await?;
        let poms = self.poms.list().await?;
        let tree = GroupTree::build(&groups, &poms);
        log::info!(
            "Hierarchy loaded: {} groups, {} POMs",
            tree.group_count(),
            tree.pom_count()
        );
        *self.tree.write().await = tree;
        Ok(())
    }

    pub async fn snapshot(&self) -> TreeSnapshot {
        self.tree.read().await.snapshot()
    }

    pub async fn rows(&self, collapsed: &HashSet<u32>) -> Vec<TreeRow> {
        self.tree.read().await.flatten(collapsed)
    }

    pub async fn group(&self, id: u32) -> Option<Group> {
        self.tree.read().await.group(id).cloned()
    }

    /// Move a group under a new parent (None = root)
    pub async fn reparent(&self, id: u32, new_parent: Option<u32>) -> DomainResult<Group> {
        let mut tree = self.tree.write().await;
        tree.check_reparent(id, new_parent)?;

        // The store repeats the cycle check inside its own transaction
        let group = self
            .groups
            .set_parent(id, new_parent)
            .await
            .map_err(|e| store_failure("reparent group", e))?;

        tree.apply_reparent(id, new_parent);
        log::info!("Moved group {} under {:?}", id, new_parent);
        Ok(group)
    }

    /// File a POM under a group (None = root). No cycle check applies.
    pub async fn reparent_leaf(&self, pom_id: u32, group_id: Option<u32>) -> DomainResult<Pom> {
        let mut tree = self.tree.write().await;
        tree.check_reparent_leaf(pom_id, group_id)?;

        let pom = self
            .poms
            .set_group(pom_id, group_id)
            .await
            .map_err(|e| store_failure("move POM", e))?;

        tree.apply_reparent_leaf(pom_id, group_id);
        log::info!("Moved POM {} under {:?}", pom_id, group_id);
        Ok(pom)
    }

    /// Resolve and validate a drop without changing anything
    pub async fn can_drop(&self, dragged: TreeEntry, target: DropTarget) -> DomainResult<Option<MoveRequest>> {
        let tree = self.tree.read().await;
        let request = resolve_drop(&tree, dragged, target)?;
        if let Some(request) = request {
            check_move(&tree, request)?;
        }
        Ok(request)
    }

    /// Resolve a drop and carry it out. `Ok(None)` when nothing moved.
    pub async fn drop_item(&self, dragged: TreeEntry, target: DropTarget) -> DomainResult<Option<MoveRequest>> {
        let request = {
            let tree = self.tree.read().await;
            resolve_drop(&tree, dragged, target)?
        };

        match request {
            Some(MoveRequest::Group { id, parent_id }) => {
                self.reparent(id, parent_id).await?;
            }
            Some(MoveRequest::Pom { id, group_id }) => {
                self.reparent_leaf(id, group_id).await?;
            }
            None => log::debug!("Drop of {:?} changes nothing", dragged),
        }
        Ok(request)
    }

    pub async fn create_group(&self, name: &str, parent_id: Option<u32>) -> DomainResult<Group> {
        let mut tree = self.tree.write().await;
        if let Some(pid) = parent_id {
            if tree.group(pid).is_none() {
                return Err(DomainError::NotFound(format!("Group {} not found", pid)));
            }
        }

        let mut group = Group::new(0, name.to_string());
        group.parent_id = parent_id;
        let created = self.groups.create(&group).await?;

        tree.insert_group(created.clone());
        Ok(created)
    }

    pub async fn update_group(&self, id: u32, update: &GroupUpdate) -> DomainResult<Group> {
        update.validate()?;
        let mut tree = self.tree.write().await;
        let mut group = tree
            .group(id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("Group {} not found", id)))?;
        if update.is_empty() {
            return Ok(group);
        }

        update.apply(&mut group);
        let updated = self.groups.update(&group).await?;
        tree.update_group(&updated);
        Ok(updated)
    }

    /// Delete a group; its children and POMs move to the root
    pub async fn delete_group(&self, id: u32) -> DomainResult<()> {
        let mut tree = self.tree.write().await;
        self.groups.delete(id).await?;
        tree.remove_group(id);
        log::info!("Deleted group {}", id);
        Ok(())
    }

    /// Record a created or saved POM in the tree
    pub async fn pom_saved(&self, pom: &Pom) {
        self.tree.write().await.insert_pom(PomSummary::from(pom));
    }

    pub async fn pom_deleted(&self, id: u32) {
        self.tree.write().await.remove_pom(id);
    }
}

fn check_move(tree: &GroupTree, request: MoveRequest) -> DomainResult<()> {
    match request {
        MoveRequest::Group { id, parent_id } => tree.check_reparent(id, parent_id),
        MoveRequest::Pom { id, group_id } => tree.check_reparent_leaf(id, group_id),
    }
}

/// Validation and lookup errors pass through; anything else is a store failure
fn store_failure(action: &str, err: DomainError) -> DomainError {
    match err {
        DomainError::Internal(msg) => {
            log::error!("Failed to {}: {}", action, msg);
            DomainError::Internal(format!("Failed to {}: {}", action, msg))
        }
        other => other,
    }
}
