use async_trait::async_trait;
use futures_util::stream::BoxStream;

use llmux_core::{LlmuxError, Message, Provider, QueryOptions};

/// Messages streamed from one provider call, in emission order.
pub type MessageStream = BoxStream<'static, Result<Message, LlmuxError>>;

#[async_trait]
/// Single capability every backend adapter exposes: stream zero or more
/// messages for a prompt. Adapters are stateless between calls; any cached
/// state is discarded when the dispatch layer replaces an adapter instance
/// after remediation.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn query(&self, prompt: &str, options: &QueryOptions)
        -> Result<MessageStream, LlmuxError>;
}
