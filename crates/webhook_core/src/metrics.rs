//! Metrics recording abstraction for delivery observability

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry};

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

/// Abstraction for recording delivery metrics.
///
/// # Thread Safety
/// All implementations MUST be thread-safe (Send + Sync).
pub trait EventMetrics: Send + Sync {
    /// Records a successful delivery attempt.
    ///
    /// # Arguments
    /// * `endpoint_url` - Destination URL
    /// * `duration_ms` - Attempt duration in milliseconds
    fn record_delivery_success(&self, endpoint_url: &str, duration_ms: u64);

    /// Records an attempt that got a non-2xx response.
    fn record_delivery_failure(&self, endpoint_url: &str, status_code: u16);

    /// Records an attempt that got no response (timeout, connection, other).
    fn record_delivery_error(&self, endpoint_url: &str);

    /// Increments the in-flight delivery counter.
    fn increment_active_tasks(&self);

    /// Decrements the in-flight delivery counter.
    fn decrement_active_tasks(&self);
}

/// Prometheus metrics collector for webhook delivery.
///
/// # Metrics
/// - `webhook_delivery_attempts_total` (Counter)
/// - `webhook_delivery_successes_total` (Counter)
/// - `webhook_delivery_failures_total` (Counter)
/// - `webhook_delivery_errors_total` (Counter)
/// - `webhook_delivery_duration_seconds` (Histogram)
/// - `webhook_active_deliveries` (Gauge)
///
/// Endpoint URLs are not used as labels: they are unbounded and may carry
/// tokens in their query strings.
pub struct PrometheusEventMetrics {
    delivery_attempts: Counter,
    delivery_successes: Counter,
    delivery_failures: Counter,
    delivery_errors: Counter,
    delivery_duration: Histogram,
    active_tasks: Gauge,
}

impl PrometheusEventMetrics {
    /// Creates the collectors and registers them with `registry`.
    ///
    /// # Errors
    /// Returns `prometheus::Error` if a metric with the same name is already
    /// registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let delivery_attempts = Counter::with_opts(Opts::new(
            "webhook_delivery_attempts_total",
            "Total number of webhook delivery attempts",
        ))?;
        let delivery_successes = Counter::with_opts(Opts::new(
            "webhook_delivery_successes_total",
            "Delivery attempts answered with a 2xx status",
        ))?;
        let delivery_failures = Counter::with_opts(Opts::new(
            "webhook_delivery_failures_total",
            "Delivery attempts answered with a non-2xx status",
        ))?;
        let delivery_errors = Counter::with_opts(Opts::new(
            "webhook_delivery_errors_total",
            "Delivery attempts that received no response",
        ))?;
        let delivery_duration = Histogram::with_opts(HistogramOpts::new(
            "webhook_delivery_duration_seconds",
            "Duration of successful delivery attempts",
        ))?;
        let active_tasks = Gauge::with_opts(Opts::new(
            "webhook_active_deliveries",
            "Deliveries currently being executed",
        ))?;

        registry.register(Box::new(delivery_attempts.clone()))?;
        registry.register(Box::new(delivery_successes.clone()))?;
        registry.register(Box::new(delivery_failures.clone()))?;
        registry.register(Box::new(delivery_errors.clone()))?;
        registry.register(Box::new(delivery_duration.clone()))?;
        registry.register(Box::new(active_tasks.clone()))?;

        Ok(Self {
            delivery_attempts,
            delivery_successes,
            delivery_failures,
            delivery_errors,
            delivery_duration,
            active_tasks,
        })
    }
}

impl EventMetrics for PrometheusEventMetrics {
    fn record_delivery_success(&self, _endpoint_url: &str, duration_ms: u64) {
        self.delivery_attempts.inc();
        self.delivery_successes.inc();
        self.delivery_duration.observe(duration_ms as f64 / 1000.0);
    }

    fn record_delivery_failure(&self, _endpoint_url: &str, _status_code: u16) {
        self.delivery_attempts.inc();
        self.delivery_failures.inc();
    }

    fn record_delivery_error(&self, _endpoint_url: &str) {
        self.delivery_attempts.inc();
        self.delivery_errors.inc();
    }

    fn increment_active_tasks(&self) {
        self.active_tasks.inc();
    }

    fn decrement_active_tasks(&self) {
        self.active_tasks.dec();
    }
}

/// No-op metrics implementation for testing or when metrics are disabled.
pub struct NoOpEventMetrics;

impl NoOpEventMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpEventMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EventMetrics for NoOpEventMetrics {
    fn record_delivery_success(&self, _endpoint_url: &str, _duration_ms: u64) {}
    fn record_delivery_failure(&self, _endpoint_url: &str, _status_code: u16) {}
    fn record_delivery_error(&self, _endpoint_url: &str) {}
    fn increment_active_tasks(&self) {}
    fn decrement_active_tasks(&self) {}
}
