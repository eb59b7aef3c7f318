//! Tauri Commands for Groups + Hierarchy
//!
//! Group CRUD, re-parenting and drag-and-drop on the group tree.

use std::collections::HashSet;
use tauri::State;
use crate::domain::{Group, GroupUpdate};
use crate::hierarchy::{DropTarget, MoveRequest, TreeEntry, TreeRow, TreeSnapshot};
use crate::AppState;

/// List all groups
#[tauri::command]
pub async fn list_groups(state: State<'_, AppState>) -> Result<Vec<Group>, String> {
    state.service.list_groups().await.map_err(|e| e.to_string())
}

/// Create a group (parent None = root)
#[tauri::command]
pub async fn create_group(
    state: State<'_, AppState>,
    name: String,
    parent_id: Option<u32>,
) -> Result<Group, String> {
    state.service.create_group(&name, parent_id).await.map_err(|e| e.to_string())
}

/// Rename a group
#[tauri::command]
pub async fn update_group(
    state: State<'_, AppState>,
    id: u32,
    update: GroupUpdate,
) -> Result<Group, String> {
    state.service.update_group(id, &update).await.map_err(|e| e.to_string())
}

/// Delete a group; its sub-groups and POMs move to the root
#[tauri::command]
pub async fn delete_group(state: State<'_, AppState>, id: u32) -> Result<(), String> {
    state.service.delete_group(id).await.map_err(|e| e.to_string())
}

/// Move a group under another group (None = root)
#[tauri::command]
pub async fn reparent_group(
    state: State<'_, AppState>,
    id: u32,
    parent_id: Option<u32>,
) -> Result<Group, String> {
    state.service.reparent_group(id, parent_id).await.map_err(|e| e.to_string())
}

/// Whole tree
#[tauri::command]
pub async fn get_tree(state: State<'_, AppState>) -> Result<TreeSnapshot, String> {
    Ok(state.service.tree().await)
}

/// Display rows, hiding the contents of collapsed groups
#[tauri::command]
pub async fn get_tree_rows(
    state: State<'_, AppState>,
    collapsed: Vec<u32>,
) -> Result<Vec<TreeRow>, String> {
    let collapsed: HashSet<u32> = collapsed.into_iter().collect();
    Ok(state.service.hierarchy().rows(&collapsed).await)
}

/// Preview a drop while dragging
#[tauri::command]
pub async fn can_drop(
    state: State<'_, AppState>,
    dragged: TreeEntry,
    target: DropTarget,
) -> Result<Option<MoveRequest>, String> {
    state.service.hierarchy().can_drop(dragged, target).await.map_err(|e| e.to_string())
}

/// Carry out a drop
#[tauri::command]
pub async fn drop_item(
    state: State<'_, AppState>,
    dragged: TreeEntry,
    target: DropTarget,
) -> Result<Option<MoveRequest>, String> {
    state.service.drop_item(dragged, target).await.map_err(|e| e.to_string())
}
