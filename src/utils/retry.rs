//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Provides standard
//! backoff configurations for REST reads and realtime reconnects.

use std::time::Duration;

use backon::ExponentialBuilder;
use reqwest::StatusCode;

use crate::config::RealtimeConfig;

/// Backoff for transient REST read failures.
///
/// - Min delay: 100ms
/// - Max delay: 2s
/// - Jitter enabled
pub fn http_backoff(max_retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(max_retries)
        .with_jitter()
}

/// Backoff for realtime reconnects, bounded by the channel configuration.
pub fn reconnect_backoff(config: &RealtimeConfig) -> ExponentialBuilder {
    let min = Duration::from_millis(config.reconnect_min_delay_ms.max(1));
    let max = Duration::from_millis(config.reconnect_max_delay_ms).max(min);
    ExponentialBuilder::default()
        .with_min_delay(min)
        .with_max_delay(max)
        .with_max_times(config.reconnect_max_attempts)
        .with_jitter()
}

/// Retry 429 (rate limit) and 5xx (server errors).
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Retry timeouts and connection errors.
pub fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
