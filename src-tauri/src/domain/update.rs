//! Typed partial updates
//!
//! Each entity has an explicit set of updatable fields. `None` leaves a field
//! unchanged; for nullable fields `Some(None)` clears it.
//! Re-parenting is not an update field: it goes through the hierarchy
//! operations so the acyclicity check cannot be bypassed.

use serde::{Deserialize, Deserializer, Serialize};
use super::element::PomElement;
use super::entity::DomainResult;
use super::group::Group;
use super::pom::Pom;

/// Updatable fields of a group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

impl GroupUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()) }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            super::validate_display_name(name, "Group")?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }

    pub fn apply(&self, group: &mut Group) {
        if let Some(name) = &self.name {
            group.name = name.trim().to_string();
        }
    }
}

/// Updatable fields of a POM. `elements` replaces the whole collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PomUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub screenshot_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub html_content: Option<Option<String>>,
    #[serde(default)]
    pub elements: Option<Vec<PomElement>>,
}

impl PomUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            Pom::validate_name(name)?;
        }
        if let Some(elements) = &self.elements {
            for element in elements {
                element.validate()?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.screenshot_url.is_none()
            && self.html_content.is_none()
            && self.elements.is_none()
    }

    /// Whether applying this update replaces the HTML snapshot
    pub fn replaces_snapshot(&self) -> bool {
        self.html_content.is_some()
    }

    /// Apply scalar fields; elements are written by the repository in one go
    pub fn apply(&self, pom: &mut Pom) {
        if let Some(name) = &self.name {
            pom.name = name.trim().to_string();
        }
        if let Some(url) = &self.screenshot_url {
            pom.screenshot_url = url.clone();
        }
        if let Some(html) = &self.html_content {
            pom.html_content = html.clone();
        }
        if let Some(elements) = &self.elements {
            pom.elements = elements.clone();
        }
    }
}

/// Distinguishes an explicit `null` from a missing field
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
