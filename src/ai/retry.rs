//! Retry policy for provider calls.
//!
//! Transient failures (rate limits, timeouts, provider 5xx) are retried up
//! to [`MAX_ATTEMPTS`] times with exponential backoff. When the provider's
//! error message carries its own suggested delay, that wins over the
//! exponential schedule, padded by 50% because providers routinely
//! understate it.

use regex::Regex;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use super::ProviderError;

/// Total attempts, including the first.
pub const MAX_ATTEMPTS: u32 = 5;

/// Base delay for the exponential schedule.
pub const BASE_DELAY: Duration = Duration::from_secs(1);

/// Padding factor applied to provider-suggested delays.
const SUGGESTED_DELAY_FACTOR: f64 = 1.5;

/// Whether an error is worth retrying.
///
/// Variant-based for the errors our clients classify; falls back to text
/// signatures for opaque API errors that smell like rate limits, timeouts
/// or server trouble.
pub fn is_transient(error: &ProviderError) -> bool {
    match error {
        ProviderError::RateLimited(_) | ProviderError::Timeout(_) | ProviderError::Server(_) => {
            true
        }
        ProviderError::Api(message) | ProviderError::Network(message) => {
            let lower = message.to_lowercase();
            lower.contains("429")
                || lower.contains("rate limit")
                || lower.contains("resource exhausted")
                || lower.contains("timeout")
                || lower.contains("timed out")
                || lower.contains("overloaded")
                || lower.contains("500")
                || lower.contains("502")
                || lower.contains("503")
        }
        _ => false,
    }
}

fn retry_delay_field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"retry_delay\s*\{\s*seconds:\s*(\d+)").unwrap())
}

fn retry_after_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)retry-after:\s*(\d+)").unwrap())
}

/// Extract a provider-suggested delay from an error message, if present.
///
/// Two formats are recognized: the structured `retry_delay { seconds: N }`
/// field Gemini embeds in quota errors, and an echoed `retry-after: N`
/// header.
pub fn suggested_delay(error: &ProviderError) -> Option<Duration> {
    let message = error.to_string();
    let seconds = retry_delay_field_re()
        .captures(&message)
        .or_else(|| retry_after_re().captures(&message))
        .and_then(|caps| caps[1].parse::<u64>().ok())?;

    Some(Duration::from_secs_f64(
        seconds as f64 * SUGGESTED_DELAY_FACTOR,
    ))
}

/// Backoff delay before retrying after the given zero-based attempt.
pub fn backoff_delay(attempt: u32, error: &ProviderError) -> Duration {
    suggested_delay(error).unwrap_or_else(|| BASE_DELAY * 2u32.pow(attempt))
}

/// Run `operation` with the retry policy.
///
/// Non-transient errors return immediately; transient ones are retried with
/// backoff until [`MAX_ATTEMPTS`] is exhausted, then the last error is
/// returned.
pub async fn with_retry<T, F, Fut>(label: &str, mut operation: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if is_transient(&error) && attempt + 1 < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt, &error);
                tracing::warn!(
                    "{}: transient error (attempt {}/{}), retrying in {:?}: {}",
                    label,
                    attempt + 1,
                    MAX_ATTEMPTS,
                    delay,
                    error
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                if attempt + 1 >= MAX_ATTEMPTS {
                    tracing::error!("{}: giving up after {} attempts: {}", label, MAX_ATTEMPTS, error);
                }
                return Err(error);
            }
        }
    }
}
