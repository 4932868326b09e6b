//! Adapter construction from configuration.
//!
//! Used once at client construction and again whenever the dispatch core
//! replaces a registry entry after a successful install; a fresh instance
//! guarantees no stale adapter state survives remediation.

use std::sync::Arc;

use llmux_core::{Config, LlmuxError, Provider};

use crate::adapter::ProviderAdapter;
use crate::claude::ClaudeAdapter;
use crate::codex::CodexAdapter;
use crate::gemini::GeminiAdapter;

pub fn build_adapter(
    provider: Provider,
    config: &Config,
) -> Result<Arc<dyn ProviderAdapter>, LlmuxError> {
    let settings = config.adapter_settings(provider);
    let adapter: Arc<dyn ProviderAdapter> = match provider {
        Provider::Claude => Arc::new(ClaudeAdapter::new(settings)?),
        Provider::Gemini => Arc::new(GeminiAdapter::new(settings)?),
        Provider::Codex => Arc::new(CodexAdapter::new(settings)?),
    };
    Ok(adapter)
}
