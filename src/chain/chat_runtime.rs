use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryConfig {
    pub timeout_secs: Option<u64>,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl From<crate::chain::provider::AskOptions> for RetryConfig {
    fn from(options: crate::chain::provider::AskOptions) -> Self {
        Self {
            timeout_secs: options.timeout_secs,
            retries: options.retries,
            retry_delay_ms: options
                .retry_delay_ms
                .unwrap_or(crate::chain::provider::DEFAULT_RETRY_DELAY_MS),
        }
    }
}

#[derive(Debug)]
pub(crate) enum RequestFailure {
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
}

/// Posts `payload` as JSON, retrying transient failures up to `config.retries` times.
pub(crate) async fn send_json_with_retry<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    payload: &T,
    config: RetryConfig,
) -> Result<reqwest::Response, RequestFailure> {
    let max_attempts = config.retries.saturating_add(1);
    let mut attempt = 0;

    loop {
        let mut request = client.post(url).json(payload);
        if let Some(api_key) = api_key {
            request = request.bearer_auth(api_key);
        }
        if let Some(timeout_secs) = config.timeout_secs {
            request = request.timeout(Duration::from_secs(timeout_secs));
        }

        debug!(url, attempt, "sending chat request");
        match request.send().await {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                }

                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let can_retry = is_retryable_status(status) && attempt + 1 < max_attempts;

                if can_retry {
                    warn!(%status, attempt, "retryable API status");
                    sleep(retry_delay(attempt, config.retry_delay_ms)).await;
                    attempt += 1;
                    continue;
                }

                return Err(RequestFailure::Api { status, body });
            }
            Err(source) => {
                let can_retry = is_retryable_request_error(&source) && attempt + 1 < max_attempts;

                if can_retry {
                    warn!(error = %source, attempt, "retryable request error");
                    sleep(retry_delay(attempt, config.retry_delay_ms)).await;
                    attempt += 1;
                    continue;
                }

                return Err(RequestFailure::Request(source));
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_request_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_delay(attempt: u32, base_ms: u64) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(30_000);
    Duration::from_millis(delay_ms)
}

#[cfg(test)]
mod tests {
    use super::{RetryConfig, is_retryable_status, retry_delay};
    use crate::chain::provider::AskOptions;
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn retry_delay_doubles_per_attempt() {
        assert_eq!(retry_delay(0, 250), Duration::from_millis(250));
        assert_eq!(retry_delay(1, 250), Duration::from_millis(500));
        assert_eq!(retry_delay(3, 250), Duration::from_millis(2_000));
    }

    #[test]
    fn retry_delay_is_capped() {
        assert_eq!(retry_delay(12, 500), Duration::from_millis(30_000));
        assert_eq!(retry_delay(64, 1), Duration::from_millis(30_000));
    }

    #[test]
    fn only_throttling_and_server_errors_are_retried() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));

        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn ask_options_default_to_a_single_attempt() {
        let config = RetryConfig::from(AskOptions::default());
        assert_eq!(config.retries, 0);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.timeout_secs, None);
    }
}
