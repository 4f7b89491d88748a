// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Retry/backoff helpers for driver calls against flaky upstream APIs
//!, plus a single-flight OAuth token refresh keyed by
//! `storage_config_id` so concurrent requests against the same mount never
//! issue duplicate refresh calls to a provider's token endpoint.

use crate::domain::errors::CoreError;
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Exponential backoff with jitter, capped at `max_attempts`. Only retries
/// `CoreError::retryable()` kinds (`Timeout`, `DriverError`).
pub async fn with_retry<T, F, Fut>(max_attempts: u32, base_delay: Duration, mut op: F) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < max_attempts && err.retryable() => {
                let jitter_ms = (rand_jitter() * base_delay.as_millis() as f64) as u64;
                let delay = base_delay * 2u32.pow(attempt) + Duration::from_millis(jitter_ms);
                tracing::warn!(attempt, ?delay, error = %err, "retrying after transient driver error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn rand_jitter() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

/// Per-`storage_config_id` rate limiter registry, so a burst against one
/// mount never starves requests against another.
pub struct DriverRateLimiters {
    limiters: DashMap<String, Arc<DefaultDirectRateLimiter>>,
    default_per_second: NonZeroU32,
}

impl DriverRateLimiters {
    pub fn new(default_per_second: u32) -> Self {
        Self {
            limiters: DashMap::new(),
            default_per_second: NonZeroU32::new(default_per_second.max(1)).unwrap(),
        }
    }

    pub async fn acquire(&self, storage_config_id: &str) {
        let limiter = self
            .limiters
            .entry(storage_config_id.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_second(self.default_per_second))))
            .clone();
        limiter.until_ready().await;
    }
}

/// Single-flight token refresh: concurrent callers for the same key block on
/// the first caller's in-flight refresh instead of each issuing their own
/// provider call.
pub struct SingleFlightTokenRefresh {
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for SingleFlightTokenRefresh {
    fn default() -> Self {
        Self { in_flight: DashMap::new() }
    }
}

impl SingleFlightTokenRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<F, Fut>(&self, key: &str, refresh_fn: F) -> Result<String, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, CoreError>>,
    {
        let gate = self.in_flight.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let _permit = gate.lock().await;
        refresh_fn().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retries_timeout_then_succeeds() {
        let mut attempts = 0;
        let result = with_retry(3, Duration::from_millis(1), || {
            attempts += 1;
            async move {
                if attempts < 2 {
                    Err(CoreError::Timeout("slow".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let mut attempts = 0;
        let result: Result<(), CoreError> = with_retry(5, Duration::from_millis(1), || {
            attempts += 1;
            async move { Err(CoreError::Forbidden("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn single_flight_refresh_returns_value() {
        let sf = SingleFlightTokenRefresh::new();
        let token = sf.refresh("cfg-1", || async { Ok("token-abc".to_string()) }).await.unwrap();
        assert_eq!(token, "token-abc");
    }
}
