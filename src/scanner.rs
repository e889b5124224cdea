//! Semgrep invocation and result parsing

use crate::util::{run_tool, truncate, Capture};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

/// Semgrep logs progress on stderr; only the end matters on failure.
const STDERR_TAIL_BYTES: usize = 4_096;

/// How to run Semgrep
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub program: String,
    /// Custom rules file; `--config=auto` when absent
    pub rules: Option<PathBuf>,
    /// Send anonymous usage metrics to Semgrep
    pub metrics: bool,
    pub timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            program: "semgrep".to_string(),
            rules: None,
            metrics: false,
            timeout: Duration::from_secs(600),
        }
    }
}

impl ScanOptions {
    pub fn args(&self, targets: &[PathBuf]) -> Vec<String> {
        let mut args = vec!["--json".to_string()];
        if !self.metrics {
            args.push("--metrics=off".to_string());
        }
        match &self.rules {
            Some(path) => args.push(format!("--config={}", path.display())),
            None => args.push("--config=auto".to_string()),
        }
        args.extend(targets.iter().map(|t| t.display().to_string()));
        args
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(default)]
    pub results: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub check_id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub start: Position,
    #[serde(default)]
    pub end: Position,
    #[serde(default)]
    pub extra: FindingExtra,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub col: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingExtra {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub lines: String,
}

impl ScanReport {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse Semgrep JSON output")
    }

    pub fn is_clean(&self) -> bool {
        self.results.is_empty()
    }

    /// Pretty JSON embedded in the analysis prompt
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{\"results\": []}".to_string())
    }

    /// Numbered, human-readable listing of the findings
    pub fn render(&self) -> String {
        if self.is_clean() {
            return "No issues detected by Semgrep.".to_string();
        }

        let mut out = String::new();
        for (i, finding) in self.results.iter().enumerate() {
            let _ = writeln!(out, "Finding #{}: {}", i + 1, or_unknown(&finding.check_id));
            let _ = writeln!(out, "  Severity: {}", or_unknown(&finding.extra.severity));
            let _ = writeln!(out, "  Path:     {}", or_unknown(&finding.path));
            let _ = writeln!(out, "  Line:     {}", finding.start.line);
            let message = if finding.extra.message.is_empty() {
                "No message"
            } else {
                finding.extra.message.as_str()
            };
            let _ = writeln!(out, "  Message:  {}", truncate(message.trim(), 300));
            if !finding.extra.lines.trim().is_empty() {
                for line in finding.extra.lines.lines() {
                    let _ = writeln!(out, "    | {}", line);
                }
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() {
        "Unknown"
    } else {
        s
    }
}

/// Run Semgrep over `targets` and parse its JSON report.
pub fn run_semgrep(targets: &[PathBuf], options: &ScanOptions) -> anyhow::Result<ScanReport> {
    if targets.is_empty() {
        return Ok(ScanReport::default());
    }

    let args = options.args(targets);
    tracing::info!(program = %options.program, args = ?args, "running semgrep");

    let mut command = Command::new(&options.program);
    command.args(&args);

    // stdout is the JSON report and must be kept whole
    let result = run_tool(
        &mut command,
        options.timeout,
        Capture::All,
        Capture::Tail(STDERR_TAIL_BYTES),
    )?;

    if result.timed_out {
        anyhow::bail!("Semgrep timed out after {}s", options.timeout.as_secs());
    }
    if !result.success() {
        anyhow::bail!(
            "Semgrep scan failed (exit code {}):\n{}",
            result.exit_label(),
            result.stderr.trim_end()
        );
    }

    let report = ScanReport::parse(&result.stdout)?;
    tracing::info!(
        findings = report.results.len(),
        errors = report.errors.len(),
        elapsed_ms = result.duration.as_millis() as u64,
        "semgrep finished"
    );
    Ok(report)
}

/// Like [`run_semgrep`], but a failed scan degrades to an empty report.
pub fn scan_or_empty(targets: &[PathBuf], options: &ScanOptions) -> ScanReport {
    match run_semgrep(targets, options) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!("{:#}", err);
            eprintln!("  Semgrep scan failed; continuing with model analysis only.");
            ScanReport::default()
        }
    }
}
