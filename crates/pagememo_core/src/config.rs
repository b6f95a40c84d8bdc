//! Process-level configuration for embedding the core.
//!
//! User-facing preferences live in [`crate::model::settings::Settings`] and
//! are persisted in the synced tier; this type only carries host wiring.

use crate::capture::{
    capture_channel, CaptureReceiver, CaptureSender, DEFAULT_CAPTURE_FRESHNESS_MS,
};
use crate::logging::default_log_level;
use crate::service::autosave::DEFAULT_AUTOSAVE_DELAY_MS;
use std::path::{Path, PathBuf};

const BULK_DB_FILE: &str = "bulk.sqlite3";
const SYNCED_DB_FILE: &str = "synced.sqlite3";
const LOG_DIR_NAME: &str = "logs";

/// Host wiring for one core instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Directory holding both tier databases and the log directory.
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Debounce window for text edits, read by `MemoSession::start`.
    pub autosave_delay_ms: i64,
    /// Window in which a capture may still be applied.
    pub capture_freshness_ms: i64,
}

impl CoreConfig {
    /// Creates a config rooted at `data_dir` with default timings.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            log_level: default_log_level().to_string(),
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            capture_freshness_ms: DEFAULT_CAPTURE_FRESHNESS_MS,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Database file backing the bulk (device-local) tier.
    pub fn bulk_db_path(&self) -> PathBuf {
        self.data_dir.join(BULK_DB_FILE)
    }

    /// Database file backing the synced (quota-limited) tier.
    pub fn synced_db_path(&self) -> PathBuf {
        self.data_dir.join(SYNCED_DB_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    /// Creates a capture hand-off using the configured freshness window.
    pub fn capture_channel(&self) -> (CaptureSender, CaptureReceiver) {
        capture_channel(self.capture_freshness_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::CoreConfig;
    use std::path::PathBuf;

    #[test]
    fn paths_are_derived_from_data_dir() {
        let config = CoreConfig::new("/tmp/pagememo");
        assert_eq!(config.bulk_db_path(), PathBuf::from("/tmp/pagememo/bulk.sqlite3"));
        assert_eq!(
            config.synced_db_path(),
            PathBuf::from("/tmp/pagememo/synced.sqlite3")
        );
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/pagememo/logs"));
    }

    #[test]
    fn defaults_match_editor_timings() {
        let config = CoreConfig::new("/tmp/pagememo");
        assert_eq!(config.autosave_delay_ms, 500);
        assert_eq!(config.capture_freshness_ms, 5_000);
        assert!(!config.log_level.is_empty());
    }

    #[test]
    fn capture_channel_uses_configured_freshness() {
        let mut config = CoreConfig::new("/tmp/pagememo");
        config.capture_freshness_ms = 42;
        let (_sender, receiver) = config.capture_channel();
        assert_eq!(receiver.freshness_ms(), 42);
    }
}
