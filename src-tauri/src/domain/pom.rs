//! POM Entity
//!
//! A Page Object Model: a named set of element locators, optionally backed
//! by a screenshot URL and an HTML snapshot, filed under at most one group.

use serde::{Deserialize, Serialize};
use super::element::PomElement;
use super::entity::{DomainError, DomainResult, Entity};
use super::snapshot_id::SnapshotFingerprint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pom {
    pub id: u32,
    pub name: String,
    pub screenshot_url: Option<String>,
    pub html_content: Option<String>,
    /// Owning group (None = root level)
    pub group_id: Option<u32>,
    #[serde(default)]
    pub elements: Vec<PomElement>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Pom {
    /// Create a new POM with no elements and no attachments
    pub fn new(id: u32, name: String) -> Self {
        Self {
            id,
            name,
            screenshot_url: None,
            html_content: None,
            group_id: None,
            elements: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn validate_name(name: &str) -> DomainResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::InvalidInput("POM name is required".to_string()));
        }
        Ok(())
    }

    pub fn has_snapshot(&self) -> bool {
        self.html_content.as_deref().is_some_and(|html| !html.trim().is_empty())
    }

    /// Fingerprint of the stored HTML snapshot, if any
    pub fn snapshot_fingerprint(&self) -> Option<SnapshotFingerprint> {
        self.html_content.as_deref().map(SnapshotFingerprint::of)
    }

    pub fn element(&self, element_id: u32) -> Option<&PomElement> {
        self.elements.iter().find(|e| e.id == element_id)
    }
}

impl Entity for Pom {
    type Id = u32;

    fn id(&self) -> Self::Id {
        self.id
    }
}
