//! Database Connection and Setup
//!
//! Manages SQLite database connection and migrations.

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared connection handle used by every repository
pub type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// Database state wrapper
#[derive(Clone, Default)]
pub struct DbState {
    pub conn: SharedConnection,
}

impl DbState {
    pub fn new() -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Handle for repository constructors
    pub fn shared(&self) -> SharedConnection {
        self.conn.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Drop the connection; repositories report "Database not initialized" afterwards
    pub async fn close(&self) {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.take() {
            if let Err((_, e)) = conn.close() {
                log::warn!("Closing database failed: {}", e);
            }
        }
    }
}

/// Initialize database with path (":memory:" for an in-memory database)
pub async fn init_db(db_path: &Path) -> Result<DbState, String> {
    let conn = if db_path.as_os_str() == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(db_path)
    }
    .map_err(|e| format!("Failed to open db: {}", e))?;

    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| format!("Failed to enable foreign keys: {}", e))?;

    // Run migrations
    run_migrations(&conn)?;

    let state = DbState::new();
    *state.conn.lock().await = Some(conn);
    log::info!("Database ready at {}", db_path.display());

    Ok(state)
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let query = format!("PRAGMA table_info({})", table);
    let Ok(mut stmt) = conn.prepare(&query) else {
        return false;
    };
    let Ok(names) = stmt.query_map([], |row| row.get::<_, String>(1)) else {
        return false;
    };
    let exists = names.flatten().any(|name| name == column);
    exists
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES groups(id) ON DELETE SET NULL
        );
        CREATE TABLE IF NOT EXISTS poms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            screenshot_url TEXT,
            html_content TEXT,
            group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL
        );
        CREATE TABLE IF NOT EXISTS pom_elements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pom_id INTEGER NOT NULL REFERENCES poms(id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0,
            element_type TEXT NOT NULL,
            name TEXT NOT NULL,
            locator TEXT NOT NULL,
            value TEXT NOT NULL DEFAULT '',
            coordinates TEXT,
            action TEXT,
            is_required INTEGER NOT NULL DEFAULT 0
        );",
    )
    .map_err(|e| e.to_string())?;

    // Timestamps were added after the first schema
    for table in ["groups", "poms"] {
        for column in ["created_at", "updated_at"] {
            if !column_exists(conn, table, column) {
                conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} INTEGER", table, column))
                    .map_err(|e| format!("Failed to add {}.{}: {}", table, column, e))?;
            }
        }
    }

    // Indexes for parent-child queries
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_groups_parent ON groups(parent_id);
        CREATE INDEX IF NOT EXISTS idx_poms_group ON poms(group_id);
        CREATE INDEX IF NOT EXISTS idx_elements_pom ON pom_elements(pom_id, position);",
    )
    .map_err(|e| e.to_string())?;

    Ok(())
}

/// Milliseconds since epoch, stored in created_at / updated_at
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
