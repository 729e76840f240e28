//! Terminal rendering of view updates

use bbdsl_live_sync::{ConnectionState, ConnectionStatus, PreviewArtifact, Severity, TaggedReport};
use chrono::Local;
use colored::Colorize;
use std::path::Path;

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string().dimmed().to_string()
}

/// Report lines: a summary followed by one `[rule_id] message` per finding
pub fn report_lines(tagged: &TaggedReport) -> Vec<String> {
    let report = &tagged.report;
    if report.findings.is_empty() {
        return vec![format!(
            "{} all rules passed {}",
            "✓".green(),
            format!("(rev {})", tagged.revision).dimmed()
        )];
    }

    let errors = format!("{} errors", report.error_count);
    let warnings = format!("{} warnings", report.warning_count);
    let mut lines = vec![format!(
        "{} {}, {} {}",
        if report.error_count > 0 { "✗".red() } else { "⚠".yellow() },
        if report.error_count > 0 { errors.red().bold() } else { errors.normal() },
        if report.warning_count > 0 { warnings.yellow() } else { warnings.normal() },
        format!("(rev {})", tagged.revision).dimmed()
    )];

    for finding in &report.findings {
        let level = match finding.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        let mut line = format!("  {level} [{}] {}", finding.rule_id, finding.message);
        if let Some(scope) = &finding.scope {
            line.push_str(&format!(" {}", format!("at {scope}").dimmed()));
        }
        lines.push(line);
    }
    lines
}

pub fn connection_line(status: ConnectionStatus) -> String {
    let state = status.state.to_string();
    let state = match status.state {
        ConnectionState::Open => state.green(),
        ConnectionState::Closed | ConnectionState::ReconnectWait => state.yellow(),
        ConnectionState::Disposed => state.dimmed(),
        _ => state.normal(),
    };
    format!("validation channel {state}")
}

pub fn preview_line(artifact: &PreviewArtifact, path: &Path) -> String {
    format!(
        "{} preview → {} {}",
        "✓".green(),
        path.display(),
        format!("(rev {}, {} bytes)", artifact.revision, artifact.body.len()).dimmed()
    )
}

pub fn print(lines: impl IntoIterator<Item = String>) {
    let stamp = timestamp();
    for line in lines {
        println!("{stamp} {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbdsl_live_sync::{Finding, Revision, ValidationReport};

    fn plain() {
        colored::control::set_override(false);
    }

    fn tagged(findings: Vec<Finding>) -> TaggedReport {
        TaggedReport {
            revision: Revision::new(0, 3),
            report: ValidationReport::new(findings),
        }
    }

    #[test]
    fn test_clean_report() {
        plain();
        let lines = report_lines(&tagged(vec![]));
        assert_eq!(lines, vec!["✓ all rules passed (rev 0:3)".to_string()]);
    }

    #[test]
    fn test_findings_are_listed() {
        plain();
        let lines = report_lines(&tagged(vec![
            Finding {
                rule_id: "HCP_RANGE".to_string(),
                severity: Severity::Error,
                message: "1NT range overlaps 1C".to_string(),
                scope: Some("openings.1NT".to_string()),
            },
            Finding {
                rule_id: "UNUSED_BID".to_string(),
                severity: Severity::Warning,
                message: "2D has no responses".to_string(),
                scope: None,
            },
        ]));

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "✗ 1 errors, 1 warnings (rev 0:3)");
        assert_eq!(
            lines[1],
            "  error [HCP_RANGE] 1NT range overlaps 1C at openings.1NT"
        );
        assert_eq!(lines[2], "  warning [UNUSED_BID] 2D has no responses");
    }

    #[test]
    fn test_connection_line() {
        plain();
        let line = connection_line(ConnectionStatus {
            state: ConnectionState::Open,
            epoch: 2,
        });
        assert_eq!(line, "validation channel open");
    }
}
