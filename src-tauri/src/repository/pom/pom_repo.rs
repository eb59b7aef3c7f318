//! POM Repository - Core CRUD Operations
//!
//! A POM row plus its ordered element rows. Elements have no lifecycle of
//! their own: they are written together with the POM as a whole list, but a
//! listed element keeps its id across saves.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

use crate::domain::{DomainError, DomainResult, Pom, PomElement};
use crate::repository::group::group_exists;
use super::super::db::{now_millis, SharedConnection};
use super::super::traits::Repository;
use super::super::not_initialized;

pub(crate) const POM_COLUMNS: &str =
    "id, name, screenshot_url, html_content, group_id, created_at, updated_at";

const ELEMENT_COLUMNS: &str =
    "id, element_type, name, locator, value, coordinates, action, is_required";

/// SQLite implementation of POM repository
pub struct PomRepository {
    pub(super) conn: SharedConnection,
}

impl PomRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Repository<Pom> for PomRepository {
    const KIND: &'static str = "POM";

    async fn create(&self, entity: &Pom) -> DomainResult<Pom> {
        Pom::validate_name(&entity.name)?;
        for element in &entity.elements {
            element.validate()?;
        }

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction()?;

        if let Some(group_id) = entity.group_id {
            if !group_exists(&tx, group_id)? {
                return Err(DomainError::NotFound(format!("Group {} not found", group_id)));
            }
        }

        let now = now_millis();
        let name = entity.name.trim().to_string();
        tx.execute(
            "INSERT INTO poms (name, screenshot_url, html_content, group_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![name, entity.screenshot_url, entity.html_content, entity.group_id, now, now],
        )?;
        let id = tx.last_insert_rowid() as u32;
        let elements = save_elements(&tx, id, &entity.elements)?;
        tx.commit()?;

        log::info!("Created POM {} '{}' with {} elements", id, name, elements.len());

        Ok(Pom {
            id,
            name,
            elements,
            created_at: Some(now),
            updated_at: Some(now),
            ..entity.clone()
        })
    }

    async fn find_by_id(&self, id: u32) -> DomainResult<Option<Pom>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;
        Ok(find_pom(conn, id)?)
    }

    async fn list(&self) -> DomainResult<Vec<Pom>> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM poms ORDER BY name, id",
            POM_COLUMNS
        ))?;
        let mut poms = stmt
            .query_map([], row_to_pom)?
            .collect::<Result<Vec<_>, _>>()?;
        for pom in &mut poms {
            pom.elements = load_elements(conn, pom.id)?;
        }
        Ok(poms)
    }

    /// Writes name, attachments and the whole element list.
    /// The owning group changes through `set_group`.
    async fn update(&self, entity: &Pom) -> DomainResult<Pom> {
        Pom::validate_name(&entity.name)?;
        for element in &entity.elements {
            element.validate()?;
        }

        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(not_initialized)?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE poms SET name = ?, screenshot_url = ?, html_content = ?, updated_at = ?
             WHERE id = ?",
            params![
                entity.name.trim(),
                entity.screenshot_url,
                entity.html_content,
                now_millis(),
                entity.id
            ],
        )?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("POM {} not found", entity.id)));
        }

        save_elements(&tx, entity.id, &entity.elements)?;

        let updated = find_pom(&tx, entity.id)?
            .ok_or_else(|| DomainError::NotFound(format!("POM {} not found", entity.id)))?;
        tx.commit()?;

        Ok(updated)
    }

    async fn delete(&self, id: u32) -> DomainResult<()> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or_else(not_initialized)?;

        // Elements go with the POM through ON DELETE CASCADE
        let changed = conn.execute("DELETE FROM poms WHERE id = ?", params![id])?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("POM {} not found", id)));
        }
        Ok(())
    }
}

/// A POM with its elements in saved order
pub(crate) fn find_pom(conn: &Connection, id: u32) -> rusqlite::Result<Option<Pom>> {
    let pom = conn
        .query_row(
            &format!("SELECT {} FROM poms WHERE id = ?", POM_COLUMNS),
            params![id],
            row_to_pom,
        )
        .optional()?;

    match pom {
        Some(mut pom) => {
            pom.elements = load_elements(conn, pom.id)?;
            Ok(Some(pom))
        }
        None => Ok(None),
    }
}

/// POMs filed directly under a group (None = root level), with elements
pub(crate) fn query_poms_in_group(
    conn: &Connection,
    group_id: Option<u32>,
) -> rusqlite::Result<Vec<Pom>> {
    let mut poms = match group_id {
        Some(gid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM poms WHERE group_id = ? ORDER BY name, id",
                POM_COLUMNS
            ))?;
            let rows = stmt.query_map(params![gid], row_to_pom)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM poms WHERE group_id IS NULL ORDER BY name, id",
                POM_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_pom)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    for pom in &mut poms {
        pom.elements = load_elements(conn, pom.id)?;
    }
    Ok(poms)
}

pub(crate) fn pom_exists(conn: &Connection, id: u32) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM poms WHERE id = ?", params![id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

pub(crate) fn load_elements(conn: &Connection, pom_id: u32) -> rusqlite::Result<Vec<PomElement>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM pom_elements WHERE pom_id = ? ORDER BY position, id",
        ELEMENT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![pom_id], row_to_element)?;
    rows.collect()
}

/// Write the element list in order. Rows whose id already belongs to this
/// POM are updated in place and keep their id; everything else is inserted.
/// Rows missing from the list are deleted.
pub(crate) fn save_elements(
    conn: &Connection,
    pom_id: u32,
    elements: &[PomElement],
) -> rusqlite::Result<Vec<PomElement>> {
    let existing: HashSet<u32> = {
        let mut stmt = conn.prepare("SELECT id FROM pom_elements WHERE pom_id = ?")?;
        let ids = stmt.query_map(params![pom_id], |row| row.get::<_, u32>(0))?;
        ids.collect::<Result<_, _>>()?
    };

    let mut update = conn.prepare(
        "UPDATE pom_elements
         SET position = ?, element_type = ?, name = ?, locator = ?, value = ?,
             coordinates = ?, action = ?, is_required = ?
         WHERE id = ? AND pom_id = ?",
    )?;
    let mut insert = conn.prepare(
        "INSERT INTO pom_elements
            (pom_id, position, element_type, name, locator, value, coordinates, action, is_required)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    let mut kept = HashSet::new();
    let mut saved = Vec::with_capacity(elements.len());
    for (position, element) in elements.iter().enumerate() {
        let mut element = element.clone();
        element.element_type = element.element_type.trim().to_string();
        element.name = element.name.trim().to_string();
        element.locator = element.locator.trim().to_string();

        // A repeated id only keeps its row once
        if existing.contains(&element.id) && kept.insert(element.id) {
            update.execute(params![
                position as i64,
                element.element_type,
                element.name,
                element.locator,
                element.value,
                element.coordinates,
                element.action,
                element.is_required,
                element.id,
                pom_id,
            ])?;
        } else {
            insert.execute(params![
                pom_id,
                position as i64,
                element.element_type,
                element.name,
                element.locator,
                element.value,
                element.coordinates,
                element.action,
                element.is_required,
            ])?;
            element.id = conn.last_insert_rowid() as u32;
        }
        saved.push(element);
    }

    let mut delete = conn.prepare("DELETE FROM pom_elements WHERE id = ?")?;
    for id in existing.difference(&kept) {
        delete.execute(params![id])?;
    }

    Ok(saved)
}

/// Convert a database row to Pom (elements are loaded separately)
pub(crate) fn row_to_pom(row: &rusqlite::Row) -> rusqlite::Result<Pom> {
    Ok(Pom {
        id: row.get(0)?,
        name: row.get(1)?,
        screenshot_url: row.get(2)?,
        html_content: row.get(3)?,
        group_id: row.get::<_, Option<u32>>(4)?,
        elements: Vec::new(),
        created_at: row.get::<_, Option<i64>>(5).unwrap_or(None),
        updated_at: row.get::<_, Option<i64>>(6).unwrap_or(None),
    })
}

fn row_to_element(row: &rusqlite::Row) -> rusqlite::Result<PomElement> {
    Ok(PomElement {
        id: row.get(0)?,
        element_type: row.get(1)?,
        name: row.get(2)?,
        locator: row.get(3)?,
        value: row.get(4)?,
        coordinates: row.get(5)?,
        action: row.get(6)?,
        is_required: row.get(7)?,
    })
}
