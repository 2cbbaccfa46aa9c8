//! Wiring of the decision pipeline
//!
//! Builds the shared [`LimitsCache`], the upstream [`PushoverSender`] and the
//! [`Processor`] from configuration, and hands transports a cloneable
//! [`RelayHandle`] to drive notifications through them.

use crate::config::Config;
use crate::metrics::Metrics;
use crate::upstream::PushoverSender;
use anyhow::{Context, Result};
use pushrelay::{HandlingResult, LimitsCache, Notification, Processor, RelayError, Sender};
use std::sync::Arc;
use std::time::Instant;

/// Handle shared by all requests
///
/// Cloning is cheap; every clone drives the same processor and cache.
#[derive(Clone)]
pub struct RelayHandle {
    processor: Arc<Processor<Arc<dyn Sender>>>,
    metrics: Arc<Metrics>,
}

impl RelayHandle {
    pub fn new(sender: Arc<dyn Sender>, cache: Arc<LimitsCache>, metrics: Arc<Metrics>) -> Self {
        Self {
            processor: Arc::new(Processor::new(sender, cache)),
            metrics,
        }
    }

    /// Relay one notification, recording the outcome in the metrics
    pub async fn handle(&self, notification: &Notification) -> Result<HandlingResult, RelayError> {
        let start = Instant::now();
        let result = self.processor.handle_message(notification).await;
        let latency_us = start.elapsed().as_micros() as u64;

        match &result {
            Ok(handled) => self.metrics.record_result(handled, latency_us),
            Err(_) => self.metrics.record_error(latency_us),
        }

        result
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<LimitsCache> {
        self.processor.cache()
    }
}

/// Create the relay described by the configuration
///
/// # Errors
///
/// Returns an error if the HTTP client for the remote API cannot be built.
pub fn create_relay(config: &Config) -> Result<RelayHandle> {
    let cache = LimitsCache::builder()
        .capacity(config.cache.capacity)
        .policy(config.cache.policy.into())
        .build();

    let sender = PushoverSender::new(&config.upstream.url, config.upstream.timeout)
        .context("Failed to create upstream sender")?;

    Ok(RelayHandle::new(
        Arc::new(sender),
        Arc::new(cache),
        Arc::new(Metrics::new()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, HttpConfig, QuotaPolicy, UpstreamConfig};
    use async_trait::async_trait;
    use pushrelay::{DecrementPolicy, Limits, SendError, SendOutcome};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Unreachable;

    #[async_trait]
    impl Sender for Unreachable {
        async fn post(&self, _: &Notification) -> Result<SendOutcome, SendError> {
            Err(SendError::Timeout)
        }
    }

    #[test]
    fn test_create_relay_from_config() {
        let config = Config {
            http: HttpConfig {
                host: "127.0.0.1".to_string(),
                port: 8499,
            },
            upstream: UpstreamConfig {
                url: "http://127.0.0.1:9/1/messages.json".to_string(),
                timeout: Duration::from_secs(1),
            },
            cache: CacheConfig {
                capacity: 10,
                policy: QuotaPolicy::Strict,
            },
            log_level: "info".to_string(),
        };

        let relay = create_relay(&config).unwrap();

        assert_eq!(relay.cache().policy(), DecrementPolicy::Strict);
        assert!(relay.cache().is_empty().unwrap());
    }

    #[test]
    fn test_handle_records_metrics() {
        let cache = Arc::new(LimitsCache::new(DecrementPolicy::Strict));
        cache
            .set_limits("app-token", Limits::new(100, 1, 0))
            .unwrap();
        let relay = RelayHandle::new(Arc::new(Unreachable), cache, Arc::new(Metrics::new()));
        let notification = Notification::new("app-token", "user-key", "Hello").unwrap();

        let first = tokio_test::block_on(relay.handle(&notification)).unwrap();
        let second = tokio_test::block_on(relay.handle(&notification)).unwrap();

        assert_eq!(first.response_code, 202);
        assert_eq!(second.response_code, 403);
        let metrics = relay.metrics();
        assert_eq!(metrics.total_requests.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.notifications_queued.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.notifications_rejected.load(Ordering::Relaxed), 1);
        assert_eq!(
            metrics.notifications_transport_errors.load(Ordering::Relaxed),
            2
        );
        assert_eq!(metrics.latency_count.load(Ordering::Relaxed), 2);
    }
}
