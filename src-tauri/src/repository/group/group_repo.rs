//! Group Repository - Core CRUD Operations
//!
//! SQLite-backed implementation for Group CRUD operations.
//! Parent-child operations live in group_hierarchy.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{validate_display_name, DomainError, DomainResult, Group};
use super::super::db::{now_millis, SharedConnection};
use super::super::traits::Repository;
use super::super::not_initialized;

pub(crate) const GROUP_COLUMNS: &str = "id, name, parent_id, created_at, updated_at";

/// SQLite implementation of Group repository
pub struct GroupRepository {
    pub(super) conn: SharedConnection,
}

impl GroupRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Repository<Group> for GroupRepository {
    const KIND: &'static str = "Group";

    async fn create(&self, entity: &Group) -> DomainResult<Group> {
        validate_display_name(&entity.name, "Group")?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        if let Some(parent_id) = entity.parent_id {
            if !group_exists(conn, parent_id)? {
                return Err(DomainError::NotFound(format!("Group {} not found", parent_id)));
            }
        }

        let now = now_millis();
        let name = entity.name.trim().to_string();
        conn.execute(
            "INSERT INTO groups (name, parent_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
            params![name, entity.parent_id, now, now],
        )?;

        let id = conn.last_insert_rowid() as u32;

        let mut group = entity.clone();
        group.id = id;
        group.name = name;
        group.created_at = Some(now);
        group.updated_at = Some(now);
        Ok(group)
    }

    async fn find_by_id(&self, id: u32) -> DomainResult<Option<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        Ok(find_group(conn, id)?)
    }

    async fn list(&self) -> DomainResult<Vec<Group>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM groups ORDER BY name, id",
            GROUP_COLUMNS
        ))?;
        let groups = stmt
            .query_map([], row_to_group)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    /// Writes the display name only; the parent changes through `set_parent`
    async fn update(&self, entity: &Group) -> DomainResult<Group> {
        validate_display_name(&entity.name, "Group")?;

        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let now = now_millis();
        let changed = conn.execute(
            "UPDATE groups SET name = ?, updated_at = ? WHERE id = ?",
            params![entity.name.trim(), now, entity.id],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("Group {} not found", entity.id)));
        }

        find_group(conn, entity.id)?
            .ok_or_else(|| DomainError::NotFound(format!("Group {} not found", entity.id)))
    }

    /// Children and filed POMs move to the root; nothing else is deleted
    async fn delete(&self, id: u32) -> DomainResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;

        let tx = conn.transaction()?;
        if !group_exists(&tx, id)? {
            return Err(DomainError::NotFound(format!("Group {} not found", id)));
        }

        let now = now_millis();
        tx.execute(
            "UPDATE groups SET parent_id = NULL, updated_at = ? WHERE parent_id = ?",
            params![now, id],
        )?;
        tx.execute(
            "UPDATE poms SET group_id = NULL, updated_at = ? WHERE group_id = ?",
            params![now, id],
        )?;
        tx.execute("DELETE FROM groups WHERE id = ?", params![id])?;
        tx.commit()?;

        Ok(())
    }
}

pub(crate) fn group_exists(conn: &Connection, id: u32) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM groups WHERE id = ?", params![id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

pub(crate) fn find_group(conn: &Connection, id: u32) -> rusqlite::Result<Option<Group>> {
    conn.query_row(
        &format!("SELECT {} FROM groups WHERE id = ?", GROUP_COLUMNS),
        params![id],
        row_to_group,
    )
    .optional()
}

/// Convert a database row to Group
pub(crate) fn row_to_group(row: &rusqlite::Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get::<_, Option<u32>>(2)?,
        created_at: row.get::<_, Option<i64>>(3).unwrap_or(None),
        updated_at: row.get::<_, Option<i64>>(4).unwrap_or(None),
    })
}
