//! Subprocess-based data source.
//!
//! Runs an external measurement command under a wall-clock budget and
//! captures its output.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::RawSample;
use crate::error::ScrapeError;

/// A data source that invokes an external command per sample.
///
/// The command runs with a hard timeout; if the budget is exceeded the
/// subprocess is killed rather than left running (the spawned child is
/// configured with kill-on-drop, which covers the timeout path as well
/// as task cancellation).
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    description: String,
}

impl CommandSource {
    /// Create a source for `program` with the full argument list.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        let program = program.into();
        let description = if args.is_empty() {
            program.clone()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        Self {
            program,
            args,
            timeout,
            description,
        }
    }

    /// The command line this source runs, for logs and diagnostics.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The configured execution budget.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the command once and capture its standard output.
    ///
    /// A spawn failure or non-zero exit maps to
    /// [`ScrapeError::Unavailable`] with whatever the process printed
    /// as diagnostic context; exceeding the budget maps to
    /// [`ScrapeError::Timeout`].
    pub async fn sample(&self) -> Result<RawSample, ScrapeError> {
        tracing::debug!(command = %self.description, "running measurement command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(ScrapeError::Unavailable(format!(
                    "failed to run {}: {}",
                    self.description, err
                )))
            }
            // Dropping the unfinished future kills the child.
            Err(_) => return Err(ScrapeError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(ScrapeError::Unavailable(format!(
                "{} exited with {}: {}",
                self.description,
                output.status,
                combined_output(&output.stdout, &output.stderr)
            )));
        }

        Ok(RawSample::new(output.stdout, &self.description))
    }
}

/// Merge stdout and stderr into one trimmed diagnostic string.
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let mut combined = stdout.trim().to_string();
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_includes_args() {
        let source = CommandSource::new(
            "speedtest",
            vec!["-f".into(), "json-pretty".into()],
            Duration::from_secs(90),
        );
        assert_eq!(source.description(), "speedtest -f json-pretty");
    }

    #[tokio::test]
    async fn test_sample_captures_stdout() {
        let source = CommandSource::new(
            "sh",
            vec!["-c".into(), "echo hello".into()],
            Duration::from_secs(5),
        );
        let sample = source.sample().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&sample.bytes).trim(), "hello");
        assert!(sample.source.starts_with("sh"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unavailable_with_output() {
        let source = CommandSource::new(
            "sh",
            vec!["-c".into(), "echo broken >&2; exit 3".into()],
            Duration::from_secs(5),
        );
        let err = source.sample().await.unwrap_err();
        match err {
            ScrapeError::Unavailable(msg) => {
                assert!(msg.contains("broken"), "diagnostic output missing: {msg}");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let source = CommandSource::new(
            "definitely-not-a-real-command",
            vec![],
            Duration::from_secs(5),
        );
        assert!(matches!(
            source.sample().await,
            Err(ScrapeError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_kills_slow_command() {
        let source = CommandSource::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(50),
        );
        assert!(matches!(
            source.sample().await,
            Err(ScrapeError::Timeout(_))
        ));
    }
}
