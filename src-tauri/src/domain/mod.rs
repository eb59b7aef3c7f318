//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has NO storage or UI dependencies.

mod entity;
mod element;
mod group;
mod locator;
mod pom;
mod snapshot_id;
mod update;

pub use entity::{Entity, DomainError, DomainResult};
pub use element::{BoundingBox, PomElement};
pub use group::{Group, GroupContents};
pub use locator::LocatorStrategy;
pub use pom::Pom;
pub use snapshot_id::SnapshotFingerprint;
pub use update::{GroupUpdate, PomUpdate};

/// Names of groups must be non-empty after trimming
pub(crate) fn validate_display_name(name: &str, kind: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::InvalidInput(format!("{} name is required", kind)));
    }
    Ok(())
}
