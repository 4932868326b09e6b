//! Adapter for the Claude Code CLI.

use async_trait::async_trait;
use serde_json::Value;

use llmux_core::{AdapterSettings, LlmuxError, Message, Provider, QueryOptions};

use crate::adapter::{MessageStream, ProviderAdapter};
use crate::process::{run_cli, CliInvocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeAdapter {
    settings: AdapterSettings,
}

impl ClaudeAdapter {
    pub fn new(settings: AdapterSettings) -> Result<Self, LlmuxError> {
        if settings.executable_for(Provider::Claude).trim().is_empty() {
            return Err(LlmuxError::Config(
                "claude executable must not be empty".to_string(),
            ));
        }
        if settings.timeout_ms == 0 {
            return Err(LlmuxError::Config(
                "claude timeout must be greater than 0ms".to_string(),
            ));
        }
        Ok(Self { settings })
    }

    fn invocation(&self, prompt: &str, options: &QueryOptions) -> CliInvocation {
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "json".to_string(),
        ];
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(system_prompt) = &options.system_prompt {
            args.push("--system-prompt".to_string());
            args.push(system_prompt.clone());
        }
        args.extend(self.settings.extra_args.iter().cloned());

        CliInvocation {
            executable: self.settings.executable_for(Provider::Claude),
            args,
            timeout_ms: effective_timeout_ms(&self.settings, options),
        }
    }
}

pub(crate) fn effective_timeout_ms(settings: &AdapterSettings, options: &QueryOptions) -> u64 {
    options
        .timeout_secs
        .map(|secs| secs.saturating_mul(1_000))
        .unwrap_or(settings.timeout_ms)
        .max(1)
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<MessageStream, LlmuxError> {
        tracing::debug!(prompt_len = prompt.len(), "claude query");
        let stdout = run_cli(Provider::Claude, &self.invocation(prompt, options)).await?;
        let messages = parse_claude_output(&stdout)?;
        Ok(Box::pin(futures_util::stream::iter(
            messages.into_iter().map(Ok),
        )))
    }
}

/// Parse the `--output-format json` payload. An `is_error` payload becomes
/// a backend error carrying the CLI's own message; non-JSON output falls
/// back to plain assistant text.
fn parse_claude_output(stdout: &str) -> Result<Vec<Message>, LlmuxError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(error_message) = extract_error_message(&value) {
            return Err(LlmuxError::Backend {
                provider: Provider::Claude,
                message: format!("cli reported an error: {error_message}"),
            });
        }
        if let Some(result) = extract_result_text(&value) {
            return Ok(vec![Message::assistant(result)]);
        }
    }

    Ok(vec![Message::assistant(trimmed)])
}

fn extract_error_message(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if map
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                for key in ["result", "error", "message"] {
                    if let Some(text) = map
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|text| !text.is_empty())
                    {
                        return Some(text.to_string());
                    }
                }
                return Some("unspecified cli error".to_string());
            }
            None
        }
        Value::Array(entries) => entries.iter().find_map(extract_error_message),
        _ => None,
    }
}

fn extract_result_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get("result")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|result| !result.is_empty())
            .map(str::to_string),
        Value::Array(entries) => entries.iter().rev().find_map(extract_result_text),
        _ => None,
    }
}
