//! Shared subprocess execution for CLI-backed adapters.
//!
//! Spawn errors keep the OS error text verbatim inside the backend error
//! message; the dispatch layer's missing-executable heuristic matches on
//! that text ("No such file or directory", "permission denied", ...).

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use llmux_core::{LlmuxError, Provider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    pub executable: String,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

async fn spawn_with_text_file_busy_retry(
    command: &mut Command,
    provider: Provider,
    executable: &str,
) -> Result<tokio::process::Child, LlmuxError> {
    const MAX_TEXT_FILE_BUSY_RETRIES: u32 = 5;
    const TEXT_FILE_BUSY_ERRNO: i32 = 26;
    for attempt in 0..=MAX_TEXT_FILE_BUSY_RETRIES {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(error) => {
                if error.raw_os_error() == Some(TEXT_FILE_BUSY_ERRNO)
                    && attempt < MAX_TEXT_FILE_BUSY_RETRIES
                {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    continue;
                }
                return Err(LlmuxError::Backend {
                    provider,
                    message: format!("failed to spawn '{executable}': {error}"),
                });
            }
        }
    }

    Err(LlmuxError::Backend {
        provider,
        message: format!("failed to spawn '{executable}': unknown error"),
    })
}

/// Run the backend CLI to completion and return its stdout.
///
/// The child is killed if the surrounding future is dropped, so caller-side
/// cancellation (overall timeouts, dropped streams) does not leak
/// subprocesses.
pub async fn run_cli(provider: Provider, invocation: &CliInvocation) -> Result<String, LlmuxError> {
    let mut command = Command::new(&invocation.executable);
    command.kill_on_drop(true);
    command.args(&invocation.args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let child =
        spawn_with_text_file_busy_retry(&mut command, provider, &invocation.executable).await?;

    let output = tokio::time::timeout(
        Duration::from_millis(invocation.timeout_ms),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| LlmuxError::Timeout {
        provider,
        timeout_ms: invocation.timeout_ms,
    })?
    .map_err(|error| LlmuxError::Backend {
        provider,
        message: format!("process failed: {error}"),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        let status = output
            .status
            .code()
            .map(|value| value.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(LlmuxError::Backend {
            provider,
            message: format!(
                "exited with status {status}: {}",
                summarize_process_failure(&stderr, &stdout)
            ),
        });
    }

    Ok(stdout)
}

fn summarize_process_failure(stderr: &str, stdout: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return truncate_for_log(stderr);
    }

    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return truncate_for_log(stdout);
    }

    "no error output".to_string()
}

fn truncate_for_log(text: &str) -> String {
    const MAX_CHARS: usize = 240;
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    text.chars().take(MAX_CHARS).collect::<String>() + "..."
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(executable: &str, args: &[&str], timeout_ms: u64) -> CliInvocation {
        CliInvocation {
            executable: executable.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            timeout_ms,
        }
    }

    #[test]
    fn failure_summary_prefers_stderr_then_stdout() {
        assert_eq!(summarize_process_failure("boom\n", "out"), "boom");
        assert_eq!(summarize_process_failure("  ", "out\n"), "out");
        assert_eq!(summarize_process_failure("", ""), "no error output");
    }

    #[test]
    fn long_output_is_truncated_for_logs() {
        let long = "x".repeat(500);
        let summary = truncate_for_log(&long);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), 243);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_error_text_triggers_the_heuristic() {
        let error = run_cli(
            Provider::Claude,
            &invocation("/nonexistent/llmux-test-binary", &[], 1_000),
        )
        .await
        .expect_err("spawn must fail");
        assert!(llmux_core::is_missing_executable_text(
            Provider::Claude,
            &error.to_string()
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_on_success() {
        let stdout = run_cli(Provider::Claude, &invocation("echo", &["hello"], 5_000))
            .await
            .expect("echo should succeed");
        assert_eq!(stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr_summary() {
        let error = run_cli(
            Provider::Gemini,
            &invocation("sh", &["-c", "echo broken >&2; exit 3"], 5_000),
        )
        .await
        .expect_err("exit 3 must fail");
        let rendered = error.to_string();
        assert!(rendered.contains("status 3"), "{rendered}");
        assert!(rendered.contains("broken"), "{rendered}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let error = run_cli(Provider::Codex, &invocation("sleep", &["5"], 50))
            .await
            .expect_err("sleep must exceed timeout");
        assert!(matches!(error, LlmuxError::Timeout { timeout_ms: 50, .. }));
    }
}
