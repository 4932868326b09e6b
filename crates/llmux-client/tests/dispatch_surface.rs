//! Public-surface tests for the dispatch client: stream ordering and the
//! derived-options isolation contract.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;

use llmux_client::LlmuxClient;
use llmux_core::{LlmuxError, Message, Provider, QueryOptions};
use llmux_provider::{InstallOutcome, Installer, MessageStream, ProviderAdapter};

struct EchoAdapter {
    provider: Provider,
    observed_options: Mutex<Vec<QueryOptions>>,
}

impl EchoAdapter {
    fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            observed_options: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ProviderAdapter for EchoAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<MessageStream, LlmuxError> {
        self.observed_options
            .lock()
            .expect("options lock")
            .push(options.clone());
        let messages = vec![
            Message::assistant(format!("{}: {prompt}", self.provider)),
            Message::result("done"),
        ];
        Ok(Box::pin(futures_util::stream::iter(
            messages.into_iter().map(Ok),
        )))
    }
}

struct NoInstaller;

impl Installer for NoInstaller {
    fn install(&self, _provider: Provider) -> Option<InstallOutcome> {
        None
    }
}

fn client_with(adapters: Vec<Arc<EchoAdapter>>) -> LlmuxClient {
    let registry: BTreeMap<Provider, Arc<dyn ProviderAdapter>> = adapters
        .into_iter()
        .map(|adapter| (adapter.provider(), adapter as Arc<dyn ProviderAdapter>))
        .collect();
    LlmuxClient::with_components(
        registry,
        Arc::new(|provider| {
            Err(LlmuxError::Config(format!(
                "no factory in this test for {provider}"
            )))
        }),
        Arc::new(NoInstaller),
        Provider::Claude,
    )
}

#[tokio::test]
async fn query_stream_preserves_adapter_message_order() {
    let client = client_with(vec![EchoAdapter::new(Provider::Claude)]);

    let stream = client
        .query("ping", &QueryOptions::default())
        .await
        .expect("query should succeed");
    let messages: Vec<Message> = stream
        .map(|item| item.expect("stream item"))
        .collect()
        .await;

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text_content(), "claude: ping");
    assert_eq!(messages[1].text_content(), "done");
}

#[tokio::test]
async fn query_all_passes_isolated_option_copies() {
    let claude = EchoAdapter::new(Provider::Claude);
    let gemini = EchoAdapter::new(Provider::Gemini);
    let codex = EchoAdapter::new(Provider::Codex);
    let client = client_with(vec![
        Arc::clone(&claude),
        Arc::clone(&gemini),
        Arc::clone(&codex),
    ]);

    let mut options = QueryOptions::default();
    options.model = Some("shared-model".to_string());
    let results = client.query_all("fan out", &options).await;

    assert_eq!(results.len(), 3);
    assert_eq!(
        options.provider, None,
        "caller's options must never be mutated by fan-out"
    );

    for (adapter, provider) in [
        (&claude, Provider::Claude),
        (&gemini, Provider::Gemini),
        (&codex, Provider::Codex),
    ] {
        let observed = adapter.observed_options.lock().expect("options lock");
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].provider, Some(provider));
        assert_eq!(observed[0].model.as_deref(), Some("shared-model"));
    }
}

#[tokio::test]
async fn list_providers_matches_registered_set() {
    let client = client_with(vec![
        EchoAdapter::new(Provider::Gemini),
        EchoAdapter::new(Provider::Claude),
    ]);
    assert_eq!(
        client.list_providers(),
        vec![Provider::Claude, Provider::Gemini]
    );
}

#[tokio::test]
async fn rotation_over_healthy_primary_streams_immediately() {
    let claude = EchoAdapter::new(Provider::Claude);
    let gemini = EchoAdapter::new(Provider::Gemini);
    let client = client_with(vec![Arc::clone(&claude), Arc::clone(&gemini)]);

    let stream = client
        .query_with_rotation("ping", &QueryOptions::default())
        .await
        .expect("healthy primary");
    let messages: Vec<Message> = stream
        .map(|item| item.expect("stream item"))
        .collect()
        .await;

    assert_eq!(messages[0].text_content(), "claude: ping");
    assert!(
        gemini
            .observed_options
            .lock()
            .expect("options lock")
            .is_empty(),
        "rotation must not touch later providers after a success"
    );
}
