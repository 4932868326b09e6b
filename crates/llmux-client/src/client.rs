//! The dispatch core: provider registry plus the four query strategies.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::join_all;
use rand::Rng;

use llmux_core::{
    classify_failure, Config, FailureClass, LlmuxError, Message, Provider, QueryOptions,
};
use llmux_provider::{
    build_adapter, run_with_retry, BunInstaller, Installer, MessageStream, ProviderAdapter,
};

/// Builds a fresh adapter for a provider; invoked after a successful
/// install so the replaced registry entry carries no stale state.
pub type AdapterFactory =
    Arc<dyn Fn(Provider) -> Result<Arc<dyn ProviderAdapter>, LlmuxError> + Send + Sync>;

type Registry = BTreeMap<Provider, Arc<dyn ProviderAdapter>>;

/// Unified client over all registered providers.
///
/// The registry is the only shared mutable state: entries are replaced
/// whole behind an `RwLock`, never mutated in place, so concurrent readers
/// always observe either the old or the new adapter for a key.
pub struct LlmuxClient {
    registry: RwLock<Registry>,
    factory: AdapterFactory,
    installer: Arc<dyn Installer>,
    default_provider: Provider,
}

impl LlmuxClient {
    /// Production wiring: one subprocess adapter per provider, remediation
    /// through the bun installer.
    pub fn from_config(config: &Config) -> Result<Self, LlmuxError> {
        let mut registry = Registry::new();
        for provider in Provider::ALL {
            registry.insert(provider, build_adapter(provider, config)?);
        }
        let factory_config = config.clone();
        Ok(Self::with_components(
            registry,
            Arc::new(move |provider| build_adapter(provider, &factory_config)),
            Arc::new(BunInstaller),
            config.default_provider(),
        ))
    }

    /// Explicit wiring; tests construct one instance per case with mock
    /// adapters and installers.
    pub fn with_components(
        registry: Registry,
        factory: AdapterFactory,
        installer: Arc<dyn Installer>,
        default_provider: Provider,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            factory,
            installer,
            default_provider,
        }
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        match self.registry.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        match self.registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn adapter_for(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>, LlmuxError> {
        self.read_registry()
            .get(&provider)
            .cloned()
            .ok_or(LlmuxError::ProviderNotFound { provider })
    }

    /// Registered providers in registry order.
    pub fn list_providers(&self) -> Vec<Provider> {
        self.read_registry().keys().copied().collect()
    }

    /// Single-provider query, collected. Resolves the target provider,
    /// runs it through the retrying invoker, and self-heals one
    /// missing-executable failure per call.
    pub async fn query_messages(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<Vec<Message>, LlmuxError> {
        let provider = options.provider.unwrap_or(self.default_provider);
        let adapter = self.adapter_for(provider)?;
        tracing::debug!(provider = provider.as_str(), "dispatching query");

        match run_with_retry(adapter.as_ref(), prompt, options).await {
            Ok(messages) => Ok(messages),
            Err(error) if classify_failure(&error) == FailureClass::MissingExecutable => {
                self.remediate_and_requery(provider, prompt, options, error)
                    .await
            }
            Err(error) => Err(error),
        }
    }

    /// One install attempt, one registry replacement, one more query.
    /// Remediation is applied at most once per call; a second failure
    /// propagates verbatim.
    async fn remediate_and_requery(
        &self,
        provider: Provider,
        prompt: &str,
        options: &QueryOptions,
        original: LlmuxError,
    ) -> Result<Vec<Message>, LlmuxError> {
        tracing::warn!(
            provider = provider.as_str(),
            error = %original,
            "backend executable missing, attempting install"
        );

        let installer = Arc::clone(&self.installer);
        let outcome = tokio::task::spawn_blocking(move || installer.install(provider))
            .await
            .map_err(|error| LlmuxError::Backend {
                provider,
                message: format!("install task panicked: {error}"),
            })?;

        let Some(outcome) = outcome else {
            return Err(LlmuxError::RemediationUnavailable {
                provider,
                source: Box::new(original),
            });
        };
        if !outcome.installed {
            return Err(LlmuxError::RemediationFailed {
                provider,
                message: outcome.message,
                source: Box::new(original),
            });
        }

        tracing::info!(
            provider = provider.as_str(),
            message = %outcome.message,
            "install succeeded, retrying query"
        );
        let fresh = (self.factory)(provider)?;
        self.write_registry().insert(provider, Arc::clone(&fresh));

        run_with_retry(fresh.as_ref(), prompt, options)
            .await
            .inspect_err(|error| {
                tracing::warn!(
                    provider = provider.as_str(),
                    error = %error,
                    "query failed after install"
                );
            })
    }

    /// Single-provider query exposed as a message stream.
    pub async fn query(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<MessageStream, LlmuxError> {
        let messages = self.query_messages(prompt, options).await?;
        Ok(collected_stream(messages))
    }

    /// Query one provider chosen uniformly at random from the registry.
    /// The selection is written back into `options.provider` so the caller
    /// can observe which backend answered.
    pub async fn query_random(
        &self,
        prompt: &str,
        options: &mut QueryOptions,
    ) -> Result<MessageStream, LlmuxError> {
        let providers = self.list_providers();
        if providers.is_empty() {
            return Err(LlmuxError::Config("no providers registered".to_string()));
        }
        let choice = providers[rand::rng().random_range(0..providers.len())];
        options.provider = Some(choice);
        tracing::debug!(provider = choice.as_str(), "randomly selected provider");
        self.query(prompt, options).await
    }

    /// Fan out one independent query per registered provider and collect
    /// all results. A failing provider degrades to an empty list; it never
    /// aborts its siblings.
    pub async fn query_all(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> BTreeMap<Provider, Vec<Message>> {
        let tasks = self.list_providers().into_iter().map(|provider| {
            let derived = options.with_provider(provider);
            async move {
                match self.query_messages(prompt, &derived).await {
                    Ok(messages) => (provider, messages),
                    Err(error) => {
                        tracing::warn!(
                            provider = provider.as_str(),
                            error = %error,
                            "provider failed during fan-out"
                        );
                        (provider, Vec::new())
                    }
                }
            }
        });

        join_all(tasks).await.into_iter().collect()
    }

    /// Try providers one at a time until one succeeds: the primary
    /// (options' provider or the default) first, then the rest in registry
    /// order. Each provider gets exactly one pass through the
    /// single-provider path, bounded retry and remediation included; total
    /// exhaustion raises an aggregate error naming every provider tried.
    pub async fn query_with_rotation(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<MessageStream, LlmuxError> {
        let primary = options.provider.unwrap_or(self.default_provider);
        let mut order = vec![primary];
        order.extend(
            self.list_providers()
                .into_iter()
                .filter(|provider| *provider != primary),
        );

        let mut tried = Vec::with_capacity(order.len());
        let mut last_error: Option<LlmuxError> = None;
        for provider in order {
            tried.push(provider);
            let derived = options.with_provider(provider);
            match self.query_messages(prompt, &derived).await {
                Ok(messages) => {
                    tracing::debug!(
                        provider = provider.as_str(),
                        attempts = tried.len(),
                        "rotation succeeded"
                    );
                    return Ok(collected_stream(messages));
                }
                Err(error) => {
                    tracing::warn!(
                        provider = provider.as_str(),
                        error = %error,
                        "rotation advancing to next provider"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(LlmuxError::AllProvidersExhausted {
            source: Box::new(
                last_error.unwrap_or(LlmuxError::ProviderNotFound { provider: primary }),
            ),
            tried,
        })
    }
}

fn collected_stream(messages: Vec<Message>) -> MessageStream {
    Box::pin(futures_util::stream::iter(messages.into_iter().map(Ok)))
}
