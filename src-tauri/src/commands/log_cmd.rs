/// Most recent log lines for the in-app log view
#[tauri::command]
pub fn recent_logs(limit: Option<usize>) -> Vec<String> {
    rolling_logger::recent_lines(limit.unwrap_or(200))
}
