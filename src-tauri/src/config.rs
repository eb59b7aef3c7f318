//! Application configuration
//!
//! Read from `config.json` in the app data directory, next to the database.
//! Every field has a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::domain::{DomainError, DomainResult};
use crate::verify::{BaseUrl, PollPolicy, RenderOptions, VerifyOptions};

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub db_file_name: String,
    pub verify_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub snapshot_load_attempts: u32,
    pub verifier_ready_attempts: u32,
    pub highlight_duration_ms: u64,
    /// Base for relative stylesheet/image references; root-relative when unset
    pub snapshot_base_url: Option<String>,
    pub max_html_bytes: usize,
    pub max_image_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_file_name: "pom_manager.db".to_string(),
            verify_timeout_ms: 5000,
            poll_interval_ms: 250,
            snapshot_load_attempts: 20,
            verifier_ready_attempts: 40,
            highlight_duration_ms: 1500,
            snapshot_base_url: None,
            max_html_bytes: 1024 * 1024,
            max_image_bytes: 4 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load `<dir>/config.json`, or defaults when it does not exist
    pub fn load(dir: &Path) -> DomainResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No {} in {}, using defaults", CONFIG_FILE_NAME, dir.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(DomainError::Internal(format!("Failed to read {}: {}", path.display(), e)));
            }
        };

        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| DomainError::InvalidInput(format!("Malformed {}: {}", path.display(), e)))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            timeout: Duration::from_millis(self.verify_timeout_ms),
            highlight_duration: Duration::from_millis(self.highlight_duration_ms),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            snapshot_attempts: self.snapshot_load_attempts,
            verifier_attempts: self.verifier_ready_attempts,
        }
    }

    /// Base for snapshot references. An unparsable URL falls back to the root.
    pub fn base_url(&self) -> BaseUrl {
        match self.snapshot_base_url.as_deref() {
            None => BaseUrl::root(),
            Some(url) => BaseUrl::parse(url).unwrap_or_else(|| {
                log::warn!("Ignoring invalid snapshot base URL '{}'", url);
                BaseUrl::root()
            }),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            verify: self.verify_options(),
            base: self.base_url(),
            viewport: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.poll_policy(), PollPolicy::default());
        assert_eq!(config.verify_options(), VerifyOptions::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "pollIntervalMs": 100, "snapshotBaseUrl": "https://example.com/app/" }"#,
        )
        .unwrap();

        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.verifier_ready_attempts, 40);
        assert_eq!(config.poll_policy().interval, Duration::from_millis(100));
        assert_eq!(config.base_url().resolve("a.css"), "https://example.com/app/a.css");
    }

    #[test]
    fn test_malformed_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let err = AppConfig::load(dir.path()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_invalid_base_url_falls_back_to_root() {
        let config = AppConfig { snapshot_base_url: Some("nope".to_string()), ..Default::default() };
        assert_eq!(config.base_url(), BaseUrl::root());
    }
}
