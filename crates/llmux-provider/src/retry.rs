//! Bounded-attempt retry around a single provider call.
//!
//! Each attempt drives the adapter's stream to completion, so a call is
//! restartable per attempt but never resumed mid-stream. An attempt that
//! completes without emitting anything counts as a retryable failure.

use std::time::Duration;

use futures_util::StreamExt;
use llmux_core::{classify_failure, FailureClass, LlmuxError, Message, QueryOptions};

use crate::adapter::ProviderAdapter;

/// Backoff before the attempt *after* `attempt` (attempts number from 1):
/// exponential in the per-call delay, floored at the delay itself and
/// capped at ten times it. Non-finite and non-positive delays disable the
/// wait entirely; the delay comes straight from a user-supplied flag.
pub fn backoff_delay(attempt: u32, retry_delay_secs: f64) -> Duration {
    if !retry_delay_secs.is_finite() || retry_delay_secs <= 0.0 {
        return Duration::ZERO;
    }
    let exponent = attempt.saturating_sub(1).min(32);
    let raw = retry_delay_secs * f64::powi(2.0, exponent as i32);
    let capped = raw.clamp(retry_delay_secs, retry_delay_secs * 10.0);
    Duration::try_from_secs_f64(capped).unwrap_or(Duration::MAX)
}

async fn run_once(
    adapter: &dyn ProviderAdapter,
    prompt: &str,
    options: &QueryOptions,
) -> Result<Vec<Message>, LlmuxError> {
    let mut stream = adapter.query(prompt, options).await?;
    let mut messages = Vec::new();
    while let Some(item) = stream.next().await {
        messages.push(item?);
    }
    Ok(messages)
}

/// Execute one provider call under the options' retry policy.
///
/// With retries disabled the adapter is invoked exactly once and its
/// outcome, including an empty message list, passes through untouched.
/// Otherwise failures in the retryable class are reattempted up to
/// `retry_count` times with exponential backoff, and exhaustion propagates
/// the last underlying error rather than a wrapper.
pub async fn run_with_retry(
    adapter: &dyn ProviderAdapter,
    prompt: &str,
    options: &QueryOptions,
) -> Result<Vec<Message>, LlmuxError> {
    let provider = adapter.provider();

    if !options.retry_enabled() {
        tracing::debug!(provider = provider.as_str(), "retry disabled, single attempt");
        return run_once(adapter, prompt, options).await;
    }

    let mut last_error: Option<LlmuxError> = None;
    for attempt in 1..=options.retry_count {
        tracing::debug!(
            provider = provider.as_str(),
            attempt,
            retry_count = options.retry_count,
            "provider attempt"
        );

        let outcome = match run_once(adapter, prompt, options).await {
            Ok(messages) if messages.is_empty() => Err(LlmuxError::NoResponse { provider }),
            other => other,
        };

        match outcome {
            Ok(messages) => return Ok(messages),
            Err(error) => {
                if classify_failure(&error) != FailureClass::Retryable {
                    return Err(error);
                }
                tracing::warn!(
                    provider = provider.as_str(),
                    attempt,
                    error = %error,
                    "provider attempt failed"
                );
                let is_last = attempt == options.retry_count;
                last_error = Some(error);
                if !is_last {
                    tokio::time::sleep(backoff_delay(attempt, options.retry_delay_secs)).await;
                }
            }
        }
    }

    // retry_enabled() guarantees at least one attempt ran.
    Err(last_error.unwrap_or(LlmuxError::NoResponse { provider }))
}
