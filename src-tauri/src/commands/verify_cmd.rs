//! Tauri Commands for Locator Verification

use tauri::State;
use crate::verify::{self, BatchOutcome, BatchReport, SanitizedSnapshot, SessionSnapshot, VerifyOutcome};
use crate::AppState;

/// Selector string for a locator strategy and value ("" = nothing to look up)
#[tauri::command]
pub fn generate_selector(locator: String, value: String) -> String {
    verify::generate_selector(&locator, &value)
}

/// What the rendering context would load for this HTML
#[tauri::command]
pub fn sanitize_snapshot(state: State<'_, AppState>, html: String) -> SanitizedSnapshot {
    state.service.sanitize_snapshot(&html)
}

/// Make a POM the subject of verification (None = clear)
#[tauri::command]
pub async fn select_pom(
    state: State<'_, AppState>,
    pom_id: Option<u32>,
) -> Result<SessionSnapshot, String> {
    state.service.select_pom(pom_id).await.map_err(|e| e.to_string())
}

/// Look up a selector in the active POM's snapshot
#[tauri::command]
pub async fn verify_selector(
    state: State<'_, AppState>,
    selector: String,
) -> Result<VerifyOutcome, String> {
    state.service.verify(&selector).await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn verify_element(
    state: State<'_, AppState>,
    element_id: u32,
) -> Result<VerifyOutcome, String> {
    state.service.verify_element(element_id).await.map_err(|e| e.to_string())
}

/// Validate every element of the active POM. `None` when another POM was
/// selected before the run finished.
#[tauri::command]
pub async fn run_batch_validation(state: State<'_, AppState>) -> Result<Option<BatchReport>, String> {
    match state.service.run_batch_validation().await.map_err(|e| e.to_string())? {
        BatchOutcome::Completed(report) => Ok(Some(report)),
        BatchOutcome::Superseded => Ok(None),
    }
}

#[tauri::command]
pub fn validation_state(state: State<'_, AppState>) -> SessionSnapshot {
    state.service.validation_state()
}

/// Rendered snapshot with current highlights
#[tauri::command]
pub async fn preview_snapshot(state: State<'_, AppState>) -> Result<String, String> {
    state.service.preview_markup().await.map_err(|e| e.to_string())
}
