//! Repository Layer
//!
//! Data access abstractions and implementations.

mod traits;
mod db;
pub mod group;
pub mod pom;


use crate::domain::DomainError;

pub use traits::Repository;
pub use db::{init_db, DbState, SharedConnection};
pub use group::{GroupHierarchyOperations, GroupRepository};
pub use pom::{PomElementOperations, PomRepository};

/// Error for calls made before `init_db` or after `DbState::close`
pub(crate) fn not_initialized() -> DomainError {
    DomainError::Internal("Database not initialized".to_string())
}
