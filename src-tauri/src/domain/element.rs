//! POM Element
//!
//! A single locatable UI element inside a POM. Elements are owned by their
//! POM and are always saved as a whole collection.

use serde::{Deserialize, Serialize};
use super::entity::{DomainError, DomainResult, Entity};
use super::locator::LocatorStrategy;

/// A locator entry of a POM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomElement {
    #[serde(default)]
    pub id: u32,
    /// Free-text classification (button, input, ...)
    #[serde(rename = "type")]
    pub element_type: String,
    /// Human label
    pub name: String,
    /// Locator strategy label, see [`LocatorStrategy`]
    pub locator: String,
    #[serde(default)]
    pub value: String,
    /// Bounding box over the screenshot, "x1,y1,x2,y2"
    #[serde(default)]
    pub coordinates: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub is_required: bool,
}

impl PomElement {
    pub fn new(element_type: &str, name: &str, locator: LocatorStrategy, value: &str) -> Self {
        Self {
            id: 0,
            element_type: element_type.to_string(),
            name: name.to_string(),
            locator: locator.as_str().to_string(),
            value: value.to_string(),
            coordinates: None,
            action: None,
            is_required: false,
        }
    }

    /// The parsed strategy, `None` when the stored label is outside the closed set
    pub fn strategy(&self) -> Option<LocatorStrategy> {
        LocatorStrategy::parse(&self.locator)
    }

    /// Parsed overlay box, `None` when no coordinates are set
    pub fn bounding_box(&self) -> DomainResult<Option<BoundingBox>> {
        match self.coordinates.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => BoundingBox::parse(raw).map(Some),
        }
    }

    /// Required fields must be non-empty and coordinates well-formed
    pub fn validate(&self) -> DomainResult<()> {
        if self.element_type.trim().is_empty() {
            return Err(DomainError::InvalidInput("Element type is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidInput("Element name is required".to_string()));
        }
        if self.locator.trim().is_empty() {
            return Err(DomainError::InvalidInput(format!(
                "Locator is required for element '{}'",
                self.name
            )));
        }
        self.bounding_box()?;
        Ok(())
    }
}

impl Entity for PomElement {
    type Id = u32;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Screenshot overlay rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Parse "x1,y1,x2,y2"; a box drawn backwards collapses to zero size
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect::<Option<_>>()
            .ok_or_else(|| DomainError::InvalidInput(format!("Invalid coordinates: {}", raw)))?;

        let [x1, y1, x2, y2] = parts[..] else {
            return Err(DomainError::InvalidInput(format!(
                "Coordinates must have 4 values, got {}: {}",
                parts.len(),
                raw
            )));
        };

        Ok(Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0.0),
            height: (y2 - y1).max(0.0),
        })
    }
}
