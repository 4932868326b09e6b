use serde::{Deserialize, Serialize};

use crate::types::Provider;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Per-call query configuration.
///
/// Constructed per call and never mutated by adapters. The random and
/// parallel dispatch paths derive clones with only `provider` overridden so
/// concurrent tasks cannot interfere through a shared options value.
pub struct QueryOptions {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    /// Per-attempt subprocess timeout in seconds.
    pub timeout_secs: Option<u64>,
    pub retry_count: u32,
    /// Initial backoff wait in seconds; also scales the backoff cap.
    pub retry_delay_secs: f64,
    pub no_retry: bool,
    pub output_format: String,
    pub cache: bool,
    pub verbose: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            timeout_secs: None,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            no_retry: false,
            output_format: "text".to_string(),
            cache: false,
            verbose: false,
        }
    }
}

impl QueryOptions {
    /// Derived copy with only the target provider overridden.
    pub fn with_provider(&self, provider: Provider) -> Self {
        let mut derived = self.clone();
        derived.provider = Some(provider);
        derived
    }

    pub fn retry_enabled(&self) -> bool {
        !self.no_retry && self.retry_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_retry_policy() {
        let options = QueryOptions::default();
        assert_eq!(options.retry_count, 3);
        assert_eq!(options.retry_delay_secs, 1.0);
        assert!(!options.no_retry);
        assert!(options.retry_enabled());
        assert_eq!(options.output_format, "text");
    }

    #[test]
    fn retry_disabled_by_flag_or_zero_count() {
        let mut options = QueryOptions::default();
        options.no_retry = true;
        assert!(!options.retry_enabled());

        let mut options = QueryOptions::default();
        options.retry_count = 0;
        assert!(!options.retry_enabled());
    }

    #[test]
    fn with_provider_copies_everything_else() {
        let mut base = QueryOptions::default();
        base.model = Some("opus".to_string());
        base.temperature = Some(0.2);
        base.max_tokens = Some(512);

        let derived = base.with_provider(Provider::Gemini);
        assert_eq!(derived.provider, Some(Provider::Gemini));
        assert_eq!(derived.model, base.model);
        assert_eq!(derived.temperature, base.temperature);
        assert_eq!(derived.max_tokens, base.max_tokens);
        assert_eq!(base.provider, None, "source options stay untouched");
    }
}
