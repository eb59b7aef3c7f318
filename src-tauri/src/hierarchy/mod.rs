//! Group Hierarchy
//!
//! In-memory tree of groups and POMs, drag-and-drop resolution, and the
//! manager that keeps the tree consistent with the store.

mod drop;
mod manager;
mod tree;

pub use drop::{resolve_drop, DropTarget, DropZone, MoveRequest};
pub use manager::HierarchyManager;
pub use tree::{GroupTree, PomSummary, TreeEntry, TreeNode, TreeRow, TreeSnapshot};
