//! Validation report produced by the remote rule engine.
//!
//! A report is immutable once received. A newer report replaces an older
//! one wholesale; findings are never merged across reports.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One rule violation reported against the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,

    /// Where in the convention the rule fired (e.g. an auction path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub error_count: u32,
    pub warning_count: u32,

    /// Findings in the order the rule engine emitted them
    #[serde(rename = "results", default)]
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new(findings: Vec<Finding>) -> Self {
        let error_count = count(&findings, Severity::Error);
        let warning_count = count(&findings, Severity::Warning);
        Self {
            error_count,
            warning_count,
            findings,
        }
    }

    /// True when every rule passed
    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0 && self.findings.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.with_severity(Severity::Warning)
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.severity == severity)
    }
}

fn count(findings: &[Finding], severity: Severity) -> u32 {
    let n = findings.iter().filter(|f| f.severity == severity).count();
    u32::try_from(n).unwrap_or(u32::MAX)
}
