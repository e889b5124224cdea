//! Markdown report for a finished scan

use crate::scanner::ScanReport;
use crate::session::Session;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Report for the session's code, findings and analysis. A session that was
/// never scanned reports zero findings.
pub fn generate_report(session: &Session) -> String {
    generate_report_at(session, Utc::now())
}

pub fn generate_report_at(session: &Session, generated_at: DateTime<Utc>) -> String {
    let unscanned = ScanReport::default();
    let scan = session.scan.as_ref().unwrap_or(&unscanned);
    let analysis = session.analysis.as_str();
    let code = session.code.as_str();

    let mut out = String::new();
    let _ = writeln!(out, "# Security Analysis Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "File: {}", session.subject());
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);

    let _ = writeln!(out, "## Semgrep Findings ({})", scan.results.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "```");
    let _ = writeln!(out, "{}", scan.render());
    let _ = writeln!(out, "```");
    let _ = writeln!(out);

    let _ = writeln!(out, "## Security Analysis");
    let _ = writeln!(out);
    if analysis.trim().is_empty() {
        let _ = writeln!(out, "_No model analysis available._");
    } else {
        let _ = writeln!(out, "{}", analysis.trim_end());
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Analyzed Code");
    let _ = writeln!(out);
    let _ = writeln!(out, "```");
    let _ = writeln!(out, "{}", code.trim_end());
    let _ = writeln!(out, "```");
    out
}

pub fn write_report(path: &Path, report: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, report)?;
    Ok(())
}
