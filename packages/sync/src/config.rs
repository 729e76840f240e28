//! Pipeline configuration and service endpoints

use crate::ConfigError;
use bbdsl_live_protocol::{ExportFormat, ExportOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const VALIDATE_PATH: &str = "/api/v1/validate";
pub const API_BASE_PATH: &str = "/api/v1/";

/// Timing knobs for one editing view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Quiet period before the current text is streamed for validation
    pub validation_debounce_ms: u64,

    /// Quiet period before an automatic preview render
    pub preview_debounce_ms: u64,

    /// Fixed delay between a dropped connection and the next attempt
    pub reconnect_delay_ms: u64,

    /// Upper bound for one connect attempt, handshake included
    pub connect_timeout_ms: u64,

    /// Upper bound for one derivation call
    pub request_timeout_ms: u64,

    /// Forwarded with every preview and export call
    pub export: ExportOptions,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            validation_debounce_ms: 500,
            preview_debounce_ms: 1500,
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            export: ExportOptions::default(),
        }
    }
}

impl SyncConfig {
    pub fn validation_debounce(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }

    pub fn preview_debounce(&self) -> Duration {
        Duration::from_millis(self.preview_debounce_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Where the validation channel and derivation calls live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub validate: Url,
    pub api_base: Url,
}

impl Endpoints {
    /// Derive both endpoints from the origin serving the platform.
    ///
    /// `http` maps to `ws` and `https` to `wss`, matching same-origin
    /// deployment of the validation service.
    pub fn from_origin(origin: &str) -> Result<Self, ConfigError> {
        let origin = Url::parse(origin)?;
        let socket_scheme = match origin.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ConfigError::Scheme(other.to_string())),
        };
        let http_scheme = if socket_scheme == "wss" { "https" } else { "http" };

        let mut validate = origin.join(VALIDATE_PATH)?;
        validate
            .set_scheme(socket_scheme)
            .map_err(|()| ConfigError::Scheme(socket_scheme.to_string()))?;

        let mut api_base = origin.join(API_BASE_PATH)?;
        api_base
            .set_scheme(http_scheme)
            .map_err(|()| ConfigError::Scheme(http_scheme.to_string()))?;

        Ok(Self { validate, api_base })
    }

    pub fn export_url(&self, format: ExportFormat) -> Result<Url, url::ParseError> {
        self.api_base.join(&format!("export/{}", format.as_str()))
    }
}

/// Per-view credentials handed to the collaborators that need them
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    bearer_token: Option<String>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }
}
