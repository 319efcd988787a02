//! Tests for the metrics module.

use super::*;
use prometheus::proto::MetricFamily;

fn value_of(families: &[MetricFamily], name: &str) -> f64 {
    families
        .iter()
        .find(|mf| mf.get_name() == name)
        .map(|mf| {
            let metric = &mf.get_metric()[0];
            if metric.has_gauge() {
                metric.get_gauge().get_value()
            } else {
                metric.get_counter().get_value()
            }
        })
        .unwrap_or(0.0)
}

mod prometheus_metrics_tests {
    use super::*;

    #[test]
    fn test_registers_all_metrics() {
        let registry = Registry::new();
        let _metrics = PrometheusEventMetrics::new(&registry).unwrap();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|mf| mf.get_name().to_string())
            .collect();

        for expected in [
            "webhook_delivery_attempts_total",
            "webhook_delivery_successes_total",
            "webhook_delivery_failures_total",
            "webhook_delivery_errors_total",
            "webhook_delivery_duration_seconds",
            "webhook_active_deliveries",
        ] {
            assert!(
                names.contains(&expected.to_string()),
                "missing metric {expected}"
            );
        }
    }

    #[test]
    fn test_double_registration_is_an_error() {
        let registry = Registry::new();
        let _first = PrometheusEventMetrics::new(&registry).unwrap();
        assert!(PrometheusEventMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_outcomes_increment_attempts_and_their_own_counter() {
        let registry = Registry::new();
        let metrics = PrometheusEventMetrics::new(&registry).unwrap();

        metrics.record_delivery_success("https://example.com/hook", 120);
        metrics.record_delivery_failure("https://example.com/hook", 500);
        metrics.record_delivery_failure("https://example.com/hook", 503);
        metrics.record_delivery_error("https://example.com/hook");

        let families = registry.gather();
        assert_eq!(value_of(&families, "webhook_delivery_attempts_total"), 4.0);
        assert_eq!(value_of(&families, "webhook_delivery_successes_total"), 1.0);
        assert_eq!(value_of(&families, "webhook_delivery_failures_total"), 2.0);
        assert_eq!(value_of(&families, "webhook_delivery_errors_total"), 1.0);
    }

    #[test]
    fn test_histogram_records_successful_durations() {
        let registry = Registry::new();
        let metrics = PrometheusEventMetrics::new(&registry).unwrap();

        metrics.record_delivery_success("https://example.com", 100);
        metrics.record_delivery_success("https://example.com", 2000);

        let families = registry.gather();
        let histogram = families
            .iter()
            .find(|mf| mf.get_name() == "webhook_delivery_duration_seconds")
            .map(|mf| mf.get_metric()[0].get_histogram().clone())
            .unwrap();
        assert_eq!(histogram.get_sample_count(), 2);
        assert!((histogram.get_sample_sum() - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_active_tasks_gauge_tracks_in_flight() {
        let registry = Registry::new();
        let metrics = PrometheusEventMetrics::new(&registry).unwrap();

        metrics.increment_active_tasks();
        metrics.increment_active_tasks();
        metrics.decrement_active_tasks();

        assert_eq!(
            value_of(&registry.gather(), "webhook_active_deliveries"),
            1.0
        );
    }
}

mod noop_metrics_tests {
    use super::*;

    #[test]
    fn test_noop_metrics_accept_every_call() {
        let metrics = NoOpEventMetrics::new();
        metrics.record_delivery_success("https://example.com", 1);
        metrics.record_delivery_failure("https://example.com", 500);
        metrics.record_delivery_error("https://example.com");
        metrics.increment_active_tasks();
        metrics.decrement_active_tasks();
    }
}
