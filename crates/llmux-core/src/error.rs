use thiserror::Error;

use crate::types::Provider;

#[derive(Debug, Error)]
/// Failure taxonomy for dispatch and provider calls.
pub enum LlmuxError {
    #[error("provider '{provider}' is not registered")]
    ProviderNotFound { provider: Provider },

    /// Generic backend failure reported by a provider adapter, including
    /// subprocess spawn and non-zero exit conditions. The original error
    /// text is preserved verbatim for the missing-executable heuristic.
    #[error("{provider}: {message}")]
    Backend { provider: Provider, message: String },

    #[error("{provider}: timed out after {timeout_ms}ms")]
    Timeout { provider: Provider, timeout_ms: u64 },

    #[error("{provider}: connection failed: {message}")]
    Connection { provider: Provider, message: String },

    #[error("no response received from provider '{provider}'")]
    NoResponse { provider: Provider },

    #[error("no installer is available for provider '{provider}': {source}")]
    RemediationUnavailable {
        provider: Provider,
        #[source]
        source: Box<LlmuxError>,
    },

    #[error("installing '{provider}' failed ({message}): {source}")]
    RemediationFailed {
        provider: Provider,
        message: String,
        #[source]
        source: Box<LlmuxError>,
    },

    #[error("all providers exhausted after trying {}", format_provider_list(.tried))]
    AllProvidersExhausted {
        tried: Vec<Provider>,
        #[source]
        source: Box<LlmuxError>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn format_provider_list(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(|provider| provider.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tagged outcome of classifying a provider failure. Classification is by
/// error value and message text, not by downcast, because the underlying
/// failure modes vary per backend CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth another attempt inside the same provider's retry budget.
    Retryable,
    /// The backend executable could not be located or invoked; eligible
    /// for one remediation (install) pass.
    MissingExecutable,
    /// Propagates immediately; never retried, never remediated.
    Fatal,
}

/// Case-insensitive substrings indicating the backend executable could not
/// be located or invoked. Heuristic by design: the source errors vary per
/// backend, so the text is the only common surface. The list is broad
/// (bare "not found", "permission denied") and is kept as-is rather than
/// narrowed; a false positive costs one failed install attempt.
const MISSING_EXECUTABLE_MARKERS: [&str; 8] = [
    "command not found",
    "no such file or directory",
    "not recognized as an internal or external command",
    "cannot find",
    "not found",
    "executable not found",
    "permission denied",
    "file not found",
];

pub fn is_missing_executable_text(provider: Provider, text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    MISSING_EXECUTABLE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || lowered.contains(&format!("{} not found", provider.as_str()))
}

pub fn classify_failure(error: &LlmuxError) -> FailureClass {
    match error {
        LlmuxError::Backend { provider, message } => {
            if is_missing_executable_text(*provider, message) {
                FailureClass::MissingExecutable
            } else {
                FailureClass::Retryable
            }
        }
        LlmuxError::Timeout { .. }
        | LlmuxError::Connection { .. }
        | LlmuxError::NoResponse { .. } => FailureClass::Retryable,
        LlmuxError::ProviderNotFound { .. }
        | LlmuxError::RemediationUnavailable { .. }
        | LlmuxError::RemediationFailed { .. }
        | LlmuxError::AllProvidersExhausted { .. }
        | LlmuxError::Config(_) => FailureClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(message: &str) -> LlmuxError {
        LlmuxError::Backend {
            provider: Provider::Claude,
            message: message.to_string(),
        }
    }

    #[test]
    fn missing_executable_markers_match_known_failures() {
        let positives = [
            "command not found",
            "claude not found",
            "No such file or directory (os error 2)",
            "Permission denied (os error 13)",
            "'gemini' is not recognized as an internal or external command",
            "executable not found in PATH",
            "The system cannot find the file specified",
        ];
        for text in positives {
            assert_eq!(
                classify_failure(&backend(text)),
                FailureClass::MissingExecutable,
                "expected missing-executable for: {text}"
            );
        }
    }

    #[test]
    fn non_missing_backend_errors_stay_retryable() {
        let negatives = ["API error", "Invalid input", "Rate limit exceeded"];
        for text in negatives {
            assert_eq!(
                classify_failure(&backend(text)),
                FailureClass::Retryable,
                "expected retryable for: {text}"
            );
        }
    }

    #[test]
    fn provider_qualified_not_found_matches() {
        assert!(is_missing_executable_text(
            Provider::Gemini,
            "spawn failed: gemini NOT FOUND"
        ));
    }

    #[test]
    fn transient_kinds_are_retryable() {
        assert_eq!(
            classify_failure(&LlmuxError::Timeout {
                provider: Provider::Codex,
                timeout_ms: 1_000,
            }),
            FailureClass::Retryable
        );
        assert_eq!(
            classify_failure(&LlmuxError::Connection {
                provider: Provider::Codex,
                message: "reset by peer".to_string(),
            }),
            FailureClass::Retryable
        );
        assert_eq!(
            classify_failure(&LlmuxError::NoResponse {
                provider: Provider::Codex,
            }),
            FailureClass::Retryable
        );
    }

    #[test]
    fn structural_errors_are_fatal() {
        assert_eq!(
            classify_failure(&LlmuxError::ProviderNotFound {
                provider: Provider::Claude,
            }),
            FailureClass::Fatal
        );
        assert_eq!(
            classify_failure(&LlmuxError::Config("bad".to_string())),
            FailureClass::Fatal
        );
    }

    #[test]
    fn exhausted_error_names_providers_in_order() {
        let error = LlmuxError::AllProvidersExhausted {
            tried: vec![Provider::Claude, Provider::Gemini, Provider::Codex],
            source: Box::new(LlmuxError::NoResponse {
                provider: Provider::Codex,
            }),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("claude, gemini, codex"), "{rendered}");
    }
}
