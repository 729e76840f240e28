use bbdsl_live_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "bbdsl-live.config.json";
pub const DEFAULT_SERVER: &str = "http://localhost:8000";

/// bbdsl-live configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Origin of the BBDSL platform (validation socket and export API)
    #[serde(default = "default_server")]
    pub server: String,

    /// Bearer token sent with export calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Debounce, reconnect and export settings
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: default_server(),
            token: None,
            sync: SyncConfig::default(),
        }
    }
}
