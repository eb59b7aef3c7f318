//! Tauri Commands for POMs + Attachments

use tauri::{AppHandle, Runtime, State};
use tauri_plugin_dialog::DialogExt;
use crate::domain::{Pom, PomUpdate};
use crate::AppState;

/// List POMs; `group_id` filters to one level (omitted = all, null = root)
#[tauri::command]
pub async fn list_poms(
    state: State<'_, AppState>,
    group_id: Option<Option<u32>>,
) -> Result<Vec<Pom>, String> {
    state.service.list_poms(group_id).await.map_err(|e| e.to_string())
}

/// Get a POM with its elements
#[tauri::command]
pub async fn get_pom(state: State<'_, AppState>, id: u32) -> Result<Pom, String> {
    state.service.get_pom(id).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn create_pom(
    state: State<'_, AppState>,
    name: String,
    group_id: Option<u32>,
) -> Result<Pom, String> {
    state.service.create_pom(&name, group_id).await.map_err(|e| e.to_string())
}

/// Save name, attachments and/or the element list
#[tauri::command]
pub async fn save_pom(
    state: State<'_, AppState>,
    id: u32,
    update: PomUpdate,
) -> Result<Pom, String> {
    state.service.save_pom(id, &update).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_pom(state: State<'_, AppState>, id: u32) -> Result<(), String> {
    state.service.delete_pom(id).await.map_err(|e| e.to_string())
}

/// File a POM under a group (None = root)
#[tauri::command]
pub async fn reparent_pom(
    state: State<'_, AppState>,
    id: u32,
    group_id: Option<u32>,
) -> Result<Pom, String> {
    state.service.reparent_pom(id, group_id).await.map_err(|e| e.to_string())
}

/// Fetch an uploaded HTML snapshot from its URL and store it on the POM
#[tauri::command]
pub async fn attach_html_snapshot(
    state: State<'_, AppState>,
    pom_id: u32,
    url: String,
) -> Result<Pom, String> {
    state.service.attach_html_from_url(pom_id, &url).await.map_err(|e| e.to_string())
}

/// Pick a local HTML snapshot or screenshot and attach it to the POM.
/// `Ok(None)` when the dialog was cancelled.
#[tauri::command]
pub async fn pick_pom_file<R: Runtime>(
    app: AppHandle<R>,
    state: State<'_, AppState>,
    pom_id: u32,
) -> Result<Option<Pom>, String> {
    #[cfg(not(any(target_os = "android", target_os = "ios")))]
    {
        let picked = app
            .dialog()
            .file()
            .add_filter("HTML snapshot", &["html", "htm", "txt"])
            .add_filter("Screenshot", &["png", "jpg", "jpeg", "gif", "webp"])
            .blocking_pick_file();
        let Some(path) = picked.and_then(|p| p.into_path().ok()) else {
            return Ok(None);
        };

        let bytes = std::fs::read(&path).map_err(|e| e.to_string())?;
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        state
            .service
            .attach_file(pom_id, file_name, &bytes)
            .await
            .map(Some)
            .map_err(|e| e.to_string())
    }
    #[cfg(any(target_os = "android", target_os = "ios"))]
    {
        // Not supported on mobile
        let _ = (app, state, pom_id);
        Ok(None)
    }
}

/// Store an uploaded screenshot URL on the POM
#[tauri::command]
pub async fn attach_screenshot(
    state: State<'_, AppState>,
    pom_id: u32,
    url: String,
) -> Result<Pom, String> {
    state.service.attach_screenshot(pom_id, &url).await.map_err(|e| e.to_string())
}
