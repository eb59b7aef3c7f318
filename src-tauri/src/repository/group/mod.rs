//! Group Repository Module
//!
//! This module provides group repository functionality split into specialized sub-modules:
//! - group_repo: Core CRUD operations
//! - group_hierarchy: Group-Group relationship operations (parent-child)

mod group_repo;
mod group_hierarchy;

pub use group_repo::GroupRepository;
pub(crate) use group_repo::group_exists;

// Re-export the operation trait so it can be used by importing GroupRepository
pub use group_hierarchy::GroupHierarchyOperations;
