//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_STORE_DIR: &str = "./.boostflow";
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Where the engine keeps artifacts and whether it reuses cached results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root of the artifact store and task cache
    pub store_dir: PathBuf,
    pub cache_enabled: bool,
    pub download_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_dir: std::env::var("BOOSTFLOW_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORE_DIR)),
            cache_enabled: std::env::var("BOOSTFLOW_CACHE")
                .map(|v| parse_switch(&v))
                .unwrap_or(true),
            download_timeout_secs: std::env::var("BOOSTFLOW_DOWNLOAD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_download_timeout(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }
}

fn parse_switch(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert!(parse_switch("1"));
        assert!(parse_switch("true"));
        assert!(!parse_switch("0"));
        assert!(!parse_switch(" OFF "));
        assert!(!parse_switch("false"));
    }

    #[test]
    fn test_builders_override() {
        let config = EngineConfig::default()
            .with_store_dir("/tmp/flow")
            .with_cache(false)
            .with_download_timeout(5);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/flow"));
        assert!(!config.cache_enabled);
        assert_eq!(config.download_timeout_secs, 5);
    }
}
