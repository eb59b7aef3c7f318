//! Group Hierarchy Operations
//!
//! Operations for managing parent-child relationships between groups.
//! The tree is single-parent: the parent chain of any group must never
//! revisit a group.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

use crate::domain::{DomainError, DomainResult, Group, GroupContents};
use crate::repository::pom::query_poms_in_group;
use super::super::db::now_millis;
use super::super::not_initialized;
use super::group_repo::{find_group, group_exists, row_to_group, GROUP_COLUMNS};

/// Trait for group hierarchy operations
#[async_trait]
pub trait GroupHierarchyOperations {
    /// Get direct children of a parent group (None = root groups)
    async fn get_children(&self, parent_id: Option<u32>) -> DomainResult<Vec<Group>>;

    /// Get root groups (groups without a parent)
    async fn get_root_groups(&self) -> DomainResult<Vec<Group>>;

    /// Get all descendants of a group recursively
    async fn get_descendants(&self, id: u32) -> DomainResult<Vec<Group>>;

    /// IDs of the ancestors of a group, nearest first
    async fn ancestor_ids(&self, id: u32) -> DomainResult<Vec<u32>>;

    /// Move a group under a new parent (None = root)
    ///
    /// Existence and cycle checks run in the same transaction as the write.
    async fn set_parent(&self, id: u32, parent_id: Option<u32>) -> DomainResult<Group>;

    /// A group with its direct children and directly filed POMs
    async fn find_with_contents(&self, id: u32) -> DomainResult<GroupContents>;
}

#[async_trait]
impl GroupHierarchyOperations for super::group_repo::GroupRepository {
    async fn get_children(&self, parent_id: Option<u32>) -> DomainResult<Vec<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        Ok(query_children(conn, parent_id)?)
    }

    async fn get_root_groups(&self) -> DomainResult<Vec<Group>> {
        self.get_children(None).await
    }

    async fn get_descendants(&self, id: u32) -> DomainResult<Vec<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        if !group_exists(conn, id)? {
            return Err(DomainError::NotFound(format!("Group {} not found", id)));
        }

        let mut result = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut to_visit = vec![id];

        while let Some(current_id) = to_visit.pop() {
            for group in query_children(conn, Some(current_id))? {
                if visited.insert(group.id) {
                    to_visit.push(group.id);
                    result.push(group);
                }
            }
        }

        Ok(result)
    }

    async fn ancestor_ids(&self, id: u32) -> DomainResult<Vec<u32>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let group = find_group(conn, id)?
            .ok_or_else(|| DomainError::NotFound(format!("Group {} not found", id)))?;
        Ok(ancestor_chain(conn, group.parent_id)?)
    }

    async fn set_parent(&self, id: u32, parent_id: Option<u32>) -> DomainResult<Group> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;

        let tx = conn.transaction()?;

        if !group_exists(&tx, id)? {
            return Err(DomainError::NotFound(format!("Group {} not found", id)));
        }

        if let Some(pid) = parent_id {
            if !group_exists(&tx, pid)? {
                return Err(DomainError::NotFound(format!("Group {} not found", pid)));
            }
            // Walk up from the candidate parent; meeting the moved group means a cycle
            if pid == id || ancestor_chain(&tx, Some(pid))?.contains(&id) {
                return Err(DomainError::InvalidInput(format!(
                    "Cannot move group {} under {}: it would create a cycle in the hierarchy",
                    id, pid
                )));
            }
        }

        tx.execute(
            "UPDATE groups SET parent_id = ?, updated_at = ? WHERE id = ?",
            params![parent_id, now_millis(), id],
        )?;

        let updated = find_group(&tx, id)?
            .ok_or_else(|| DomainError::NotFound(format!("Group {} not found", id)))?;
        tx.commit()?;

        Ok(updated)
    }

    async fn find_with_contents(&self, id: u32) -> DomainResult<GroupContents> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let group = find_group(conn, id)?
            .ok_or_else(|| DomainError::NotFound(format!("Group {} not found", id)))?;
        let children = query_children(conn, Some(id))?;
        let poms = query_poms_in_group(conn, Some(id))?;

        Ok(GroupContents { group, children, poms })
    }
}

fn query_children(conn: &Connection, parent_id: Option<u32>) -> rusqlite::Result<Vec<Group>> {
    match parent_id {
        Some(pid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM groups WHERE parent_id = ? ORDER BY name, id",
                GROUP_COLUMNS
            ))?;
            let rows = stmt.query_map(params![pid], row_to_group)?;
            rows.collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM groups WHERE parent_id IS NULL ORDER BY name, id",
                GROUP_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_group)?;
            rows.collect()
        }
    }
}

/// Follow parent_id upward starting at `start`; stops on a revisit so a
/// corrupted store cannot loop forever
fn ancestor_chain(conn: &Connection, start: Option<u32>) -> rusqlite::Result<Vec<u32>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = start;

    while let Some(id) = current {
        if !seen.insert(id) {
            log::warn!("Group parent chain revisits {}; stored hierarchy has a cycle", id);
            break;
        }
        chain.push(id);
        current = conn
            .query_row("SELECT parent_id FROM groups WHERE id = ?", params![id], |row| {
                row.get::<_, Option<u32>>(0)
            })
            .optional()?
            .flatten();
    }

    Ok(chain)
}
