//! Adapter for the Gemini CLI. Plain-text output, one assistant message.

use async_trait::async_trait;

use llmux_core::{AdapterSettings, LlmuxError, Message, Provider, QueryOptions};

use crate::adapter::{MessageStream, ProviderAdapter};
use crate::claude::effective_timeout_ms;
use crate::process::{run_cli, CliInvocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiAdapter {
    settings: AdapterSettings,
}

impl GeminiAdapter {
    pub fn new(settings: AdapterSettings) -> Result<Self, LlmuxError> {
        if settings.executable_for(Provider::Gemini).trim().is_empty() {
            return Err(LlmuxError::Config(
                "gemini executable must not be empty".to_string(),
            ));
        }
        if settings.timeout_ms == 0 {
            return Err(LlmuxError::Config(
                "gemini timeout must be greater than 0ms".to_string(),
            ));
        }
        Ok(Self { settings })
    }

    fn invocation(&self, prompt: &str, options: &QueryOptions) -> CliInvocation {
        let mut args = vec!["-p".to_string(), prompt.to_string()];
        if let Some(model) = &options.model {
            args.push("-m".to_string());
            args.push(model.clone());
        }
        args.extend(self.settings.extra_args.iter().cloned());

        CliInvocation {
            executable: self.settings.executable_for(Provider::Gemini),
            args,
            timeout_ms: effective_timeout_ms(&self.settings, options),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<MessageStream, LlmuxError> {
        tracing::debug!(prompt_len = prompt.len(), "gemini query");
        let stdout = run_cli(Provider::Gemini, &self.invocation(prompt, options)).await?;
        let messages = parse_gemini_output(&stdout);
        Ok(Box::pin(futures_util::stream::iter(
            messages.into_iter().map(Ok),
        )))
    }
}

fn parse_gemini_output(stdout: &str) -> Vec<Message> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![Message::assistant(trimmed)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_output_becomes_one_assistant_message() {
        let messages = parse_gemini_output("  the answer\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text_content(), "the answer");
    }

    #[test]
    fn empty_output_yields_no_messages() {
        assert!(parse_gemini_output("\n  \n").is_empty());
    }

    #[test]
    fn invocation_uses_short_model_flag() {
        let adapter = GeminiAdapter::new(AdapterSettings::default()).expect("adapter");
        let mut options = QueryOptions::default();
        options.model = Some("gemini-2.5-pro".to_string());
        let invocation = adapter.invocation("hi", &options);
        assert_eq!(invocation.executable, "gemini");
        assert_eq!(invocation.args, vec!["-p", "hi", "-m", "gemini-2.5-pro"]);
    }
}
