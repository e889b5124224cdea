use anyhow::Context;
use std::io::{BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Truncate for display, appending `...` when cut (Unicode-safe).
pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }

    if max <= 3 {
        return s.chars().take(max).collect();
    }

    let truncated: String = s.chars().take(max - 3).collect();
    format!("{}...", truncated)
}

/// How much of a pipe to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    All,
    /// Only the last `n` bytes
    Tail(usize),
}

/// Outcome of an external tool run.
#[derive(Debug)]
pub struct ToolRun {
    /// `None` if the child could not be reaped after a kill
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ToolRun {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|s| s.success())
    }

    /// Exit code for messages; "signal" when the child was killed.
    pub fn exit_label(&self) -> String {
        match self.status.and_then(|s| s.code()) {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// Run an external tool such as Semgrep, killing it after `timeout`.
///
/// Both pipes are drained on their own threads while the child runs, so a
/// large report on stdout never deadlocks against a full stderr pipe.
pub fn run_tool(
    command: &mut Command,
    timeout: Duration,
    stdout_capture: Capture,
    stderr_capture: Capture,
) -> anyhow::Result<ToolRun> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start {}", program))?;

    let stdout = drain(child.stdout.take(), stdout_capture);
    let stderr = drain(child.stderr.take(), stderr_capture);

    let start = Instant::now();
    let (status, timed_out) = wait_until(&mut child, start + timeout)
        .with_context(|| format!("Failed to wait for {}", program))?;
    if timed_out {
        tracing::warn!(program = %program, timeout_secs = timeout.as_secs(), "killed after timeout");
    }

    Ok(ToolRun {
        status,
        stdout: String::from_utf8_lossy(&stdout.join().unwrap_or_default()).into_owned(),
        stderr: String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned(),
        timed_out,
        duration: start.elapsed(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>, capture: Capture) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let Some(pipe) = pipe else {
            return Vec::new();
        };
        let mut reader = BufReader::new(pipe);
        let mut kept = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    kept.extend_from_slice(&buf[..n]);
                    if let Capture::Tail(max) = capture {
                        if kept.len() > max {
                            let excess = kept.len() - max;
                            kept.drain(..excess);
                        }
                    }
                }
            }
        }
        kept
    })
}

/// Poll until the child exits or `deadline` passes. Returns the status and
/// whether the child had to be killed.
fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<(Option<ExitStatus>, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((Some(status), false));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            return Ok((child.wait().ok(), true));
        }
        thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_unicode_safe() {
        let input = "ééééé";
        assert_eq!(truncate(input, 4), "é...");
    }

    #[test]
    fn test_truncate_small_max() {
        let input = "こんにちは";
        assert_eq!(truncate(input, 3), "こんに");
        assert_eq!(truncate(input, 0), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_captures_both_pipes() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2"]);
        let run = run_tool(&mut cmd, Duration::from_secs(10), Capture::All, Capture::All).unwrap();
        assert!(run.success());
        assert_eq!(run.stdout.trim(), "out");
        assert_eq!(run.stderr.trim(), "err");
        assert_eq!(run.exit_label(), "0");
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_tail_keeps_last_bytes() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "i=0; while [ $i -lt 2000 ]; do echo noise 1>&2; i=$((i+1)); done; echo fatal 1>&2; exit 2"]);
        let run = run_tool(&mut cmd, Duration::from_secs(10), Capture::All, Capture::Tail(16)).unwrap();
        assert!(!run.success());
        assert_eq!(run.exit_label(), "2");
        assert!(run.stderr.len() <= 16);
        assert!(run.stderr.ends_with("fatal\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_times_out() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exec sleep 5"]);
        let run = run_tool(&mut cmd, Duration::from_millis(100), Capture::All, Capture::All).unwrap();
        assert!(run.timed_out);
        assert!(!run.success());
        assert_eq!(run.exit_label(), "signal");
    }

    #[test]
    fn test_missing_program_names_it() {
        let mut cmd = Command::new("securecode-definitely-not-a-real-binary");
        let err = run_tool(&mut cmd, Duration::from_secs(1), Capture::All, Capture::All).unwrap_err();
        assert!(err.to_string().contains("securecode-definitely-not-a-real-binary"));
    }
}
