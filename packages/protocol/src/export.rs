//! Export formats and the request body of a derivation call.

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Bml,
    Bboalert,
    Svg,
    Html,
    Pbn,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Bml,
        ExportFormat::Bboalert,
        ExportFormat::Svg,
        ExportFormat::Html,
        ExportFormat::Pbn,
    ];

    /// Path segment and file extension
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Bml => "bml",
            ExportFormat::Bboalert => "bboalert",
            ExportFormat::Svg => "svg",
            ExportFormat::Html => "html",
            ExportFormat::Pbn => "pbn",
        }
    }

    /// Media type the service answers with
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Bml | ExportFormat::Bboalert | ExportFormat::Pbn => {
                "text/plain; charset=utf-8"
            }
        }
    }

    /// Default download name, e.g. `export.bml`
    pub fn file_name(self) -> String {
        format!("export.{}", self.as_str())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == lowered)
            .ok_or_else(|| ProtocolError::UnknownFormat(s.to_string()))
    }
}

/// Exporter knobs forwarded to the service alongside the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub locale: String,
    pub suit_symbols: bool,

    // PBN only
    pub n_deals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            suit_symbols: false,
            n_deals: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub yaml_content: String,
    #[serde(flatten)]
    pub options: ExportOptions,
}

impl ExportRequest {
    pub fn new(yaml_content: impl Into<String>, options: ExportOptions) -> Self {
        Self {
            yaml_content: yaml_content.into(),
            options,
        }
    }
}
