//! Group Entity
//!
//! Named container node in a single-parent tree. Groups organize POMs and
//! other groups; a group does not own its parent.

use serde::{Deserialize, Serialize};
use super::entity::Entity;
use super::pom::Pom;

/// A named group of POMs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique identifier
    pub id: u32,
    /// Display name
    pub name: String,
    /// Parent group ID (None = root level)
    pub parent_id: Option<u32>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Group {
    /// Create a new root group
    pub fn new(id: u32, name: String) -> Self {
        Self {
            id,
            name,
            parent_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Create a new group under a parent
    pub fn new_child(id: u32, name: String, parent_id: u32) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::new(id, name)
        }
    }

    /// Check if this is a root group (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Entity for Group {
    type Id = u32;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A group together with its direct children and directly filed POMs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupContents {
    pub group: Group,
    pub children: Vec<Group>,
    pub poms: Vec<Pom>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_creation() {
        let group = Group::new(1, "Checkout".to_string());
        assert_eq!(group.id(), 1);
        assert!(group.is_root());
    }

    #[test]
    fn test_child_group() {
        let group = Group::new_child(2, "Payment".to_string(), 1);
        assert_eq!(group.parent_id, Some(1));
        assert!(!group.is_root());
    }
}
