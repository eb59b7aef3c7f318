//! POM Manager Backend
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - repository: SQLite data access
//! - hierarchy: Group tree, re-parenting and drag-and-drop
//! - verify: Snapshot sanitizing, rendering context and locator verification
//! - upload: Upload collaborator client
//! - service: Facade used by the command layer
//! - commands: Tauri command handlers (`desktop` feature)

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod config;
pub mod domain;
pub mod hierarchy;
pub mod repository;
pub mod service;
pub mod upload;
pub mod verify;

#[cfg(feature = "desktop")]
mod commands;

use config::AppConfig;
use domain::{DomainError, DomainResult};
use repository::{init_db, DbState};
use service::PomService;

/// Application state shared across commands
#[derive(Clone)]
pub struct AppState {
    pub db_state: DbState,
    pub db_path: PathBuf,
    pub service: Arc<PomService>,
}

impl AppState {
    /// State for `data_dir`. The database stays closed until [`open_database`].
    pub fn new(data_dir: &Path, config: AppConfig) -> Self {
        let db_state = DbState::new();
        let db_path = data_dir.join(&config.db_file_name);
        let service = Arc::new(PomService::new(&db_state, config));
        Self { db_state, db_path, service }
    }
}

/// Open (and migrate) the database, then load the hierarchy
pub async fn open_database(state: &AppState) -> DomainResult<()> {
    let initialized = init_db(&state.db_path).await.map_err(DomainError::Internal)?;
    {
        let mut conn_guard = state.db_state.conn.lock().await;
        *conn_guard = initialized.conn.lock().await.take();
    }
    state.service.load().await?;
    log::info!("Database ready at {}", state.db_path.display());
    Ok(())
}

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use super::*;
    use tauri::{Emitter, Manager};

    fn app_data_dir(app_handle: &tauri::AppHandle) -> Result<PathBuf, String> {
        let app_dir = app_handle.path().app_data_dir().map_err(|e| e.to_string())?;
        std::fs::create_dir_all(&app_dir).map_err(|e| e.to_string())?;
        Ok(app_dir)
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let result = tauri::Builder::default()
            .plugin(tauri_plugin_dialog::init())
            .setup(|app| {
                // Single instance check - must be first!
                #[cfg(desktop)]
                app.handle().plugin(tauri_plugin_single_instance::init(|_app, _args, _cwd| {
                    if let Some(window) = _app.get_webview_window("main") {
                        let _ = window.set_focus();
                    }
                }))?;

                let app_handle = app.handle().clone();

                let log_dir = app_handle.path().app_log_dir()?;
                rolling_logger::init_logger(log_dir, "PomManager")?;

                let data_dir = app_data_dir(&app_handle)?;
                let config = AppConfig::load(&data_dir).unwrap_or_else(|e| {
                    log::warn!("{}; using default configuration", e);
                    AppConfig::default()
                });

                // Manage state immediately; the database opens in the background
                let state = AppState::new(&data_dir, config);
                app.manage(state.clone());

                tauri::async_runtime::spawn(async move {
                    match open_database(&state).await {
                        Ok(()) => {
                            let _ = rolling_logger::info("Async DB init success");
                            if let Err(e) = app_handle.emit("db-initialized", ()) {
                                log::error!("Failed to emit db-initialized: {}", e);
                            }
                        }
                        Err(e) => {
                            let _ = rolling_logger::error(&format!("Async DB init failed: {}", e));
                        }
                    }
                });

                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                // Groups + hierarchy
                commands::list_groups,
                commands::create_group,
                commands::update_group,
                commands::delete_group,
                commands::reparent_group,
                commands::get_tree,
                commands::get_tree_rows,
                commands::can_drop,
                commands::drop_item,
                // POMs + attachments
                commands::list_poms,
                commands::get_pom,
                commands::create_pom,
                commands::save_pom,
                commands::delete_pom,
                commands::reparent_pom,
                commands::attach_html_snapshot,
                commands::pick_pom_file,
                commands::attach_screenshot,
                // Verification
                commands::generate_selector,
                commands::sanitize_snapshot,
                commands::select_pom,
                commands::verify_selector,
                commands::verify_element,
                commands::run_batch_validation,
                commands::validation_state,
                commands::preview_snapshot,
                // Logs
                commands::recent_logs,
            ])
            .run(tauri::generate_context!());

        if let Err(e) = result {
            log::error!("Error while running tauri application: {}", e);
            eprintln!("Error while running tauri application: {}", e);
            std::process::exit(1);
        }
    }
}
