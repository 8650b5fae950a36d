//! Leader configuration file
//!
//! Optional JSON file whose fields override the built-in defaults. Command-line
//! flags override both.

use anyhow::Context;
use ledger_consensus::LeaderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Leader settings as stored on disk. Absent fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeaderFileConfig {
    /// Address clients and nodes connect to
    pub bind_addr: Option<String>,
    /// Quorum size
    pub min_nodes: Option<usize>,
    /// Quorum wait in seconds
    pub join_timeout_secs: Option<u64>,
    /// Partial sum deadline in milliseconds
    pub response_timeout_ms: Option<u64>,
    /// Verification vote deadline in milliseconds
    pub verify_timeout_ms: Option<u64>,
    /// Client request deadline in seconds
    pub client_timeout_secs: Option<u64>,
    /// Run the sequential baseline
    pub baseline: Option<bool>,
}

impl LeaderFileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Overwrite every field present in the file
    pub fn apply(&self, config: &mut LeaderConfig) {
        if let Some(addr) = &self.bind_addr {
            config.bind_addr = addr.clone();
        }
        if let Some(min_nodes) = self.min_nodes {
            config.min_nodes = min_nodes;
        }
        if let Some(secs) = self.join_timeout_secs {
            config.join_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.response_timeout_ms {
            config.response_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.verify_timeout_ms {
            config.verify_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = self.client_timeout_secs {
            config.client_timeout = Duration::from_secs(secs);
        }
        if let Some(baseline) = self.baseline {
            config.baseline = baseline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_apply() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "min_nodes": 5, "response_timeout_ms": 2500, "baseline": false }}"#
        )
        .unwrap();

        let loaded = LeaderFileConfig::load(file.path()).unwrap();
        assert_eq!(loaded.min_nodes, Some(5));
        assert_eq!(loaded.bind_addr, None);

        let mut config = LeaderConfig::default();
        loaded.apply(&mut config);
        assert_eq!(config.min_nodes, 5);
        assert_eq!(config.response_timeout, Duration::from_millis(2500));
        assert!(!config.baseline);
        assert_eq!(config.bind_addr, LeaderConfig::default().bind_addr);
        assert_eq!(config.join_timeout, LeaderConfig::default().join_timeout);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "min_node": 5 }}"#).unwrap();

        assert!(LeaderFileConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LeaderFileConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
