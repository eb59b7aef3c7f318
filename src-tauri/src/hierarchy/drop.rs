//! Drag-and-drop resolution
//!
//! Turns "dragged row X was released over target Y" into a reparent or
//! leaf move. Pointer handling stays in the UI; this only sees the row and
//! the vertical position of the pointer inside it.

use serde::{Deserialize, Serialize};

use super::tree::{GroupTree, TreeEntry};
use crate::domain::{DomainError, DomainResult};

/// Upper band of a row that means "before"
const BEFORE_BAND: f64 = 0.25;
/// Lower band of a row that means "after"
const AFTER_BAND: f64 = 0.75;

/// Where inside a row the pointer was released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropZone {
    Before,
    Inside,
    After,
}

impl DropZone {
    /// Classify by vertical fraction of the row height (0.0 = top).
    /// Rows that cannot take children split at the middle instead.
    pub fn classify(fraction: f64, accepts_inside: bool) -> Self {
        let fraction = if fraction.is_nan() { 0.5 } else { fraction.clamp(0.0, 1.0) };

        if !accepts_inside {
            return if fraction < 0.5 { DropZone::Before } else { DropZone::After };
        }
        if fraction < BEFORE_BAND {
            DropZone::Before
        } else if fraction > AFTER_BAND {
            DropZone::After
        } else {
            DropZone::Inside
        }
    }
}

/// What the dragged row was released over
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DropTarget {
    /// A tree row, with the pointer position inside it
    Row { entry: TreeEntry, fraction: f64 },
    /// Empty space of the tree container
    Container,
}

/// A resolved move, ready for `reparent` / `reparent_leaf`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MoveRequest {
    Group { id: u32, parent_id: Option<u32> },
    Pom { id: u32, group_id: Option<u32> },
}

impl MoveRequest {
    pub fn entry(&self) -> TreeEntry {
        match *self {
            MoveRequest::Group { id, .. } => TreeEntry::Group(id),
            MoveRequest::Pom { id, .. } => TreeEntry::Pom(id),
        }
    }

    pub fn destination(&self) -> Option<u32> {
        match *self {
            MoveRequest::Group { parent_id, .. } => parent_id,
            MoveRequest::Pom { group_id, .. } => group_id,
        }
    }
}

/// Resolve a drop against the current tree.
///
/// `Ok(None)` means nothing to do: the row was dropped on itself or its
/// placement would not change. Cycles are not checked here.
pub fn resolve_drop(
    tree: &GroupTree,
    dragged: TreeEntry,
    target: DropTarget,
) -> DomainResult<Option<MoveRequest>> {
    if !tree.contains(dragged) {
        return Err(not_found(dragged));
    }

    let destination = match target {
        DropTarget::Container => None,
        DropTarget::Row { entry, .. } if entry == dragged => return Ok(None),
        DropTarget::Row { entry, fraction } => {
            if !tree.contains(entry) {
                return Err(not_found(entry));
            }
            let accepts_inside = matches!(entry, TreeEntry::Group(_));
            match (DropZone::classify(fraction, accepts_inside), entry) {
                (DropZone::Inside, TreeEntry::Group(gid)) => Some(gid),
                _ => tree.parent_of(entry),
            }
        }
    };

    if tree.parent_of(dragged) == destination {
        return Ok(None);
    }

    Ok(Some(match dragged {
        TreeEntry::Group(id) => MoveRequest::Group { id, parent_id: destination },
        TreeEntry::Pom(id) => MoveRequest::Pom { id, group_id: destination },
    }))
}

fn not_found(entry: TreeEntry) -> DomainError {
    match entry {
        TreeEntry::Group(id) => DomainError::NotFound(format!("Group {} not found", id)),
        TreeEntry::Pom(id) => DomainError::NotFound(format!("POM {} not found", id)),
    }
}
