//! Adapter for the Codex CLI.
//!
//! `codex exec --json` emits one JSON event per line; agent messages are
//! collected in order. Non-JSON output degrades to plain assistant text.

use async_trait::async_trait;
use serde_json::Value;

use llmux_core::{AdapterSettings, LlmuxError, Message, Provider, QueryOptions};

use crate::adapter::{MessageStream, ProviderAdapter};
use crate::claude::effective_timeout_ms;
use crate::process::{run_cli, CliInvocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexAdapter {
    settings: AdapterSettings,
}

impl CodexAdapter {
    pub fn new(settings: AdapterSettings) -> Result<Self, LlmuxError> {
        if settings.executable_for(Provider::Codex).trim().is_empty() {
            return Err(LlmuxError::Config(
                "codex executable must not be empty".to_string(),
            ));
        }
        if settings.timeout_ms == 0 {
            return Err(LlmuxError::Config(
                "codex timeout must be greater than 0ms".to_string(),
            ));
        }
        Ok(Self { settings })
    }

    fn invocation(&self, prompt: &str, options: &QueryOptions) -> CliInvocation {
        let mut args = vec![
            "exec".to_string(),
            "--json".to_string(),
            prompt.to_string(),
        ];
        if let Some(model) = &options.model {
            args.push("-m".to_string());
            args.push(model.clone());
        }
        args.extend(self.settings.extra_args.iter().cloned());

        CliInvocation {
            executable: self.settings.executable_for(Provider::Codex),
            args,
            timeout_ms: effective_timeout_ms(&self.settings, options),
        }
    }
}

#[async_trait]
impl ProviderAdapter for CodexAdapter {
    fn provider(&self) -> Provider {
        Provider::Codex
    }

    async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<MessageStream, LlmuxError> {
        tracing::debug!(prompt_len = prompt.len(), "codex query");
        let stdout = run_cli(Provider::Codex, &self.invocation(prompt, options)).await?;
        let messages = parse_codex_output(&stdout);
        Ok(Box::pin(futures_util::stream::iter(
            messages.into_iter().map(Ok),
        )))
    }
}

fn parse_codex_output(stdout: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if let Some(text) = agent_message_text(&value) {
            messages.push(Message::assistant(text));
        }
    }

    if messages.is_empty() {
        let trimmed = stdout.trim();
        if !trimmed.is_empty() {
            messages.push(Message::assistant(trimmed));
        }
    }
    messages
}

fn agent_message_text(value: &Value) -> Option<String> {
    let event = value.get("msg").unwrap_or(value);
    if event.get("type").and_then(Value::as_str) != Some("agent_message") {
        return None;
    }
    event
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_message_events_are_collected_in_order() {
        let stdout = concat!(
            r#"{"msg":{"type":"task_started"}}"#,
            "\n",
            r#"{"msg":{"type":"agent_message","message":"first"}}"#,
            "\n",
            r#"{"msg":{"type":"agent_message","message":"second"}}"#,
            "\n",
        );
        let messages = parse_codex_output(stdout);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text_content(), "first");
        assert_eq!(messages[1].text_content(), "second");
    }

    #[test]
    fn flat_events_without_msg_wrapper_also_match() {
        let stdout = r#"{"type":"agent_message","message":"flat"}"#;
        let messages = parse_codex_output(stdout);
        assert_eq!(messages[0].text_content(), "flat");
    }

    #[test]
    fn non_json_output_falls_back_to_plain_text() {
        let messages = parse_codex_output("plain response\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text_content(), "plain response");
    }

    #[test]
    fn empty_output_yields_no_messages() {
        assert!(parse_codex_output("").is_empty());
    }

    #[test]
    fn invocation_runs_exec_subcommand() {
        let adapter = CodexAdapter::new(AdapterSettings::default()).expect("adapter");
        let invocation = adapter.invocation("fix it", &QueryOptions::default());
        assert_eq!(invocation.args[..3], ["exec", "--json", "fix it"]);
    }
}
