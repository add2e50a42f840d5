//! Transport-level retries for model calls.
//!
//! Only failures a provider can recover from are repeated: rate limits,
//! server errors and dropped connections. A `Retry-After` longer than
//! `max_server_wait` is not honoured; the call fails at once so a chat turn
//! does not stall behind a long provider cooldown.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Response;
use reqwest::header::RETRY_AFTER;
use serde_json::Value;
use tracing::warn;

use crate::error::{AiError, Result};

const MAX_ERROR_MESSAGE_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRetry {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    /// Wait before the first retry, doubled for each later one.
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Longest server-requested wait that is still honoured.
    pub max_server_wait: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            max_server_wait: Duration::from_secs(30),
        }
    }
}

impl TransportRetry {
    /// Single attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (one-based), or `None` to give up.
    pub fn wait_before(&self, retry: u32, error: &AiError) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries || !error.is_retryable() {
            return None;
        }
        match error.retry_after() {
            Some(wait) if wait > self.max_server_wait => None,
            Some(wait) => Some(wait),
            None => {
                let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
            }
        }
    }

    /// Run `call` until it succeeds or fails in a way not worth repeating.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            retry += 1;
            let Some(wait) = self.wait_before(retry, &error) else {
                return Err(error);
            };
            warn!(
                call = label,
                retry,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Retrying model call"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Error for a non-success response. OpenAI-style error objects contribute
/// their `error.message`; other bodies are kept as text.
pub async fn error_from_response(response: Response, provider: &str) -> AiError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_retry_after(value, Utc::now()));
    let body = response.text().await.unwrap_or_default();

    AiError::LlmHttp {
        provider: provider.to_string(),
        status,
        message: error_message(&body),
        retry_after,
    }
}

/// `Retry-After` as delta-seconds or an HTTP date. A date in the past means
/// retry immediately.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (at.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if message.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let head: String = message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        format!("{head}...[truncated]")
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn http(status: u16, retry_after: Option<Duration>) -> AiError {
        AiError::LlmHttp {
            provider: "openai".to_string(),
            status,
            message: String::new(),
            retry_after,
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let retry = TransportRetry {
            max_retries: 10,
            ..TransportRetry::default()
        };
        let overloaded = http(503, None);

        let waits: Vec<_> = (1..=7)
            .map(|n| retry.wait_before(n, &overloaded).unwrap())
            .collect();
        assert_eq!(
            waits,
            [250, 500, 1000, 2000, 4000, 8000, 8000].map(Duration::from_millis)
        );
        assert_eq!(retry.wait_before(11, &overloaded), None);
    }

    #[test]
    fn test_server_wait_is_honoured_within_limit() {
        let retry = TransportRetry::default();

        assert_eq!(
            retry.wait_before(1, &http(429, Some(Duration::from_secs(4)))),
            Some(Duration::from_secs(4))
        );
        assert_eq!(
            retry.wait_before(1, &http(429, Some(Duration::from_secs(600)))),
            None
        );
    }

    #[test]
    fn test_client_errors_are_final() {
        let retry = TransportRetry::default();
        assert_eq!(retry.wait_before(1, &http(400, None)), None);
        assert_eq!(retry.wait_before(1, &http(401, None)), None);
        assert_eq!(
            retry.wait_before(1, &AiError::Llm("rate limit hit".to_string())),
            Some(Duration::from_millis(250))
        );
        assert_eq!(TransportRetry::none().wait_before(1, &http(503, None)), None);
    }

    #[test]
    fn test_parse_retry_after_forms() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2026 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(parse_retry_after(" 7 ", now), Some(Duration::from_secs(7)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2026 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2026 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn test_error_message_prefers_provider_text() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");

        let long = "x".repeat(600);
        let message = error_message(&long);
        assert!(message.ends_with("...[truncated]"));
        assert_eq!(message.chars().count(), MAX_ERROR_MESSAGE_CHARS + 14);
    }

    #[tokio::test]
    async fn test_run_repeats_until_success() {
        let retry = TransportRetry {
            max_retries: 3,
            base_delay: Duration::ZERO,
            ..TransportRetry::default()
        };
        let calls = &AtomicU32::new(0);

        let value = retry
            .run("test", move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(http(502, None)),
                    _ => Ok("done"),
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_final_error() {
        let retry = TransportRetry {
            base_delay: Duration::ZERO,
            ..TransportRetry::default()
        };
        let calls = &AtomicU32::new(0);

        let err = retry
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(http(404, None))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::LlmHttp { status: 404, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
