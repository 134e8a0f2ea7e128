//! YAML configuration for the `mcc` binary.
//!
//! ```yaml
//! tcp: 127.0.0.1:9000
//! log_level: debug
//! link:
//!   response_timeout_ms: 8000
//!   app_name: field-kit
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use mcc_link::LinkConfig;
use serde::{Deserialize, Serialize};

/// Default device address: the first UART port of a local simulator.
pub const DEFAULT_TCP: &str = "127.0.0.1:9000";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Device address as `host:port`.
    pub tcp: Option<String>,
    /// Tracing filter directive, e.g. `info` or `mcc_link=trace`.
    pub log_level: Option<String>,
    /// Link tunables.
    pub link: LinkConfig,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn tcp(&self) -> &str {
        self.tcp.as_deref().unwrap_or(DEFAULT_TCP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let config = CliConfig::parse("link:\n  response_timeout_ms: 250\n").unwrap();
        assert_eq!(config.link.response_timeout_ms, 250);
        assert_eq!(config.link.app_name, "MCC");
        assert_eq!(config.tcp(), DEFAULT_TCP);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = CliConfig::parse("{}").unwrap();
        assert_eq!(config, CliConfig::default());
    }
}
