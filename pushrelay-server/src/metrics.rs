//! Simple metrics collection for observability
//!
//! This module provides lightweight metrics collection using atomic counters.
//! Designed for minimal overhead and zero allocations in the hot path.

use pushrelay::{Disposition, HandlingBody, HandlingResult};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Core metrics collected by the server
pub struct Metrics {
    /// Server start time
    start_time: Instant,

    /// Total requests received
    pub total_requests: AtomicU64,

    /// Relay outcomes
    pub notifications_delivered: AtomicU64,
    pub notifications_queued: AtomicU64,
    pub notifications_rejected: AtomicU64,
    pub notifications_failed: AtomicU64,
    /// Remote API unreachable, also counted as queued or rejected
    pub notifications_transport_errors: AtomicU64,
    pub requests_invalid: AtomicU64,
    pub requests_errors: AtomicU64,

    /// Request latency buckets (in microseconds)
    pub latency_under_10ms: AtomicU64,
    pub latency_under_100ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_under_10s: AtomicU64,
    pub latency_over_10s: AtomicU64,

    /// Histogram support
    pub latency_sum_micros: AtomicU64,
    pub latency_count: AtomicU64,

    /// Accounts with cached limits
    pub known_accounts: AtomicUsize,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            notifications_delivered: AtomicU64::new(0),
            notifications_queued: AtomicU64::new(0),
            notifications_rejected: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            notifications_transport_errors: AtomicU64::new(0),
            requests_invalid: AtomicU64::new(0),
            requests_errors: AtomicU64::new(0),
            latency_under_10ms: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_under_10s: AtomicU64::new(0),
            latency_over_10s: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            known_accounts: AtomicUsize::new(0),
        }
    }

    /// Record a handled notification and its latency
    pub fn record_result(&self, result: &HandlingResult, latency_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let counter = match (result.disposition, &result.body) {
            (Disposition::Success, _) => &self.notifications_delivered,
            (Disposition::Permanent, _) => &self.notifications_failed,
            (Disposition::Retryable, HandlingBody::Rejected(_)) => &self.notifications_rejected,
            (Disposition::Retryable, _) => &self.notifications_queued,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if result.transport_error {
            self.notifications_transport_errors
                .fetch_add(1, Ordering::Relaxed);
        }

        self.record_latency(latency_us);
    }

    /// Record a request refused before reaching the processor
    pub fn record_invalid(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.requests_invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an internal error
    pub fn record_error(&self, latency_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.requests_errors.fetch_add(1, Ordering::Relaxed);

        // Record latency bucket even for errors
        self.record_latency(latency_us);
    }

    /// Update the number of accounts with cached limits
    pub fn update_known_accounts(&self, count: usize) {
        self.known_accounts.store(count, Ordering::Relaxed);
    }

    fn record_latency(&self, latency_us: u64) {
        // Dominated by the remote call, hence the coarse buckets
        match latency_us {
            0..=9_999 => self.latency_under_10ms.fetch_add(1, Ordering::Relaxed),
            10_000..=99_999 => self.latency_under_100ms.fetch_add(1, Ordering::Relaxed),
            100_000..=999_999 => self.latency_under_1s.fetch_add(1, Ordering::Relaxed),
            1_000_000..=9_999_999 => self.latency_under_10s.fetch_add(1, Ordering::Relaxed),
            _ => self.latency_over_10s.fetch_add(1, Ordering::Relaxed),
        };

        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        output.push_str("# HELP pushrelay_uptime_seconds Time since server start in seconds\n");
        output.push_str("# TYPE pushrelay_uptime_seconds gauge\n");
        output.push_str(&format!(
            "pushrelay_uptime_seconds {}\n\n",
            self.uptime_seconds()
        ));

        output.push_str("# HELP pushrelay_requests_total Total number of requests received\n");
        output.push_str("# TYPE pushrelay_requests_total counter\n");
        output.push_str(&format!(
            "pushrelay_requests_total {}\n\n",
            self.total_requests.load(Ordering::Relaxed)
        ));

        // Outcomes
        output.push_str("# HELP pushrelay_notifications Notifications by relay outcome\n");
        output.push_str("# TYPE pushrelay_notifications counter\n");
        for (outcome, counter) in [
            ("delivered", &self.notifications_delivered),
            ("queued", &self.notifications_queued),
            ("rejected", &self.notifications_rejected),
            ("failed", &self.notifications_failed),
        ] {
            output.push_str(&format!(
                "pushrelay_notifications{{outcome=\"{outcome}\"}} {}\n",
                counter.load(Ordering::Relaxed)
            ));
        }
        output.push('\n');

        output.push_str(
            "# HELP pushrelay_notifications_transport_errors Notifications for which the remote API was unreachable\n",
        );
        output.push_str("# TYPE pushrelay_notifications_transport_errors counter\n");
        output.push_str(&format!(
            "pushrelay_notifications_transport_errors {}\n\n",
            self.notifications_transport_errors.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP pushrelay_requests_invalid Requests refused before relaying\n");
        output.push_str("# TYPE pushrelay_requests_invalid counter\n");
        output.push_str(&format!(
            "pushrelay_requests_invalid {}\n\n",
            self.requests_invalid.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP pushrelay_requests_errors Total internal errors\n");
        output.push_str("# TYPE pushrelay_requests_errors counter\n");
        output.push_str(&format!(
            "pushrelay_requests_errors {}\n\n",
            self.requests_errors.load(Ordering::Relaxed)
        ));

        // Latency distribution
        output.push_str(
            "# HELP pushrelay_request_duration_seconds Request latency distribution\n",
        );
        output.push_str("# TYPE pushrelay_request_duration_seconds histogram\n");
        let mut cumulative = 0;
        for (le, bucket) in [
            ("0.01", &self.latency_under_10ms),
            ("0.1", &self.latency_under_100ms),
            ("1", &self.latency_under_1s),
            ("10", &self.latency_under_10s),
            ("+Inf", &self.latency_over_10s),
        ] {
            cumulative += bucket.load(Ordering::Relaxed);
            output.push_str(&format!(
                "pushrelay_request_duration_seconds_bucket{{le=\"{le}\"}} {cumulative}\n"
            ));
        }

        let latency_sum_seconds =
            self.latency_sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        output.push_str(&format!(
            "pushrelay_request_duration_seconds_sum {latency_sum_seconds:.6}\n"
        ));
        output.push_str(&format!(
            "pushrelay_request_duration_seconds_count {}\n\n",
            self.latency_count.load(Ordering::Relaxed)
        ));

        output.push_str("# HELP pushrelay_known_accounts Accounts with cached limits\n");
        output.push_str("# TYPE pushrelay_known_accounts gauge\n");
        output.push_str(&format!(
            "pushrelay_known_accounts {}\n",
            self.known_accounts.load(Ordering::Relaxed)
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
