use std::path::PathBuf;

/// Runtime settings, read from `VENUEPULSE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// WAL appends between automatic compactions.
    pub compact_threshold: u64,
    /// Prometheus exporter port. `None` disables the exporter.
    pub metrics_port: Option<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("VENUEPULSE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            compact_threshold: lookup("VENUEPULSE_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: lookup("VENUEPULSE_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("venuepulse.wal")
    }
}
