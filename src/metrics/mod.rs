//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_histogram_with_registry, CounterVec, Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Query pipeline metrics
    pub queries_total: CounterVec,
    pub query_duration: Histogram,
    pub steps_total: CounterVec,
    pub step_duration: HistogramVec,

    // Collector metrics
    pub collector_requests: CounterVec,
    pub collector_request_duration: HistogramVec,

    // LLM collaborator metrics
    pub llm_requests: CounterVec,

    // Health analysis metrics
    pub health_analyses: CounterVec,
    pub correlation_issues: CounterVec,
    pub recommendations_issued: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let queries_total = register_counter_vec_with_registry!(
            Opts::new("triage_queries_total", "Total processed queries"),
            &["status"],
            registry
        )?;

        let query_duration = register_histogram_with_registry!(
            "triage_query_duration_seconds",
            "End-to-end query duration in seconds",
            registry
        )?;

        let steps_total = register_counter_vec_with_registry!(
            Opts::new("triage_steps_total", "Total executed plan steps"),
            &["agent", "status"],
            registry
        )?;

        let step_duration = register_histogram_vec_with_registry!(
            "triage_step_duration_seconds",
            "Plan step duration in seconds",
            &["action"],
            registry
        )?;

        let collector_requests = register_counter_vec_with_registry!(
            Opts::new("triage_collector_requests_total", "Total collector requests"),
            &["target", "status"],
            registry
        )?;

        let collector_request_duration = register_histogram_vec_with_registry!(
            "triage_collector_request_duration_seconds",
            "Collector request duration in seconds",
            &["target"],
            registry
        )?;

        let llm_requests = register_counter_vec_with_registry!(
            Opts::new("triage_llm_requests_total", "Total language model requests"),
            &["operation", "status"],
            registry
        )?;

        let health_analyses = register_counter_vec_with_registry!(
            Opts::new("triage_health_analyses_total", "Total system health analyses"),
            &["status"],
            registry
        )?;

        let correlation_issues = register_counter_vec_with_registry!(
            Opts::new("triage_correlation_issues_total", "Total correlated issues"),
            &["kind"],
            registry
        )?;

        let recommendations_issued = register_counter_vec_with_registry!(
            Opts::new("triage_recommendations_total", "Total recommendations issued"),
            &["priority"],
            registry
        )?;

        Ok(Self {
            registry,
            queries_total,
            query_duration,
            steps_total,
            step_duration,
            collector_requests,
            collector_request_duration,
            llm_requests,
            health_analyses,
            correlation_issues,
            recommendations_issued,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a completed query
    pub fn record_query(&self, status: &str, duration_secs: f64) {
        self.queries_total.with_label_values(&[status]).inc();
        self.query_duration.observe(duration_secs);
    }

    /// Record a plan step result
    pub fn record_step(&self, agent: &str, status: &str) {
        self.steps_total.with_label_values(&[agent, status]).inc();
    }

    /// Record a collector request
    pub fn record_collector_request(&self, target: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.collector_requests
            .with_label_values(&[target, status])
            .inc();
        self.collector_request_duration
            .with_label_values(&[target])
            .observe(duration_secs);
    }

    /// Record a language model request
    pub fn record_llm_request(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.llm_requests
            .with_label_values(&[operation, status])
            .inc();
    }

    /// Record a health analysis outcome
    pub fn record_health_analysis(&self, status: &str) {
        self.health_analyses.with_label_values(&[status]).inc();
    }

    /// Record correlation output
    pub fn record_correlation(&self, issue_kinds: &[&str], priorities: &[&str]) {
        for kind in issue_kinds {
            self.correlation_issues.with_label_values(&[kind]).inc();
        }
        for priority in priorities {
            self.recommendations_issued
                .with_label_values(&[priority])
                .inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_query() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query("completed", 0.42);
        metrics.record_query("failed", 1.8);
        // Metrics should be recorded without panicking
    }

    #[test]
    fn test_record_step_and_collector() {
        let metrics = Metrics::new().unwrap();
        metrics.record_step("control_plane", "success");
        metrics.record_step("tracing", "failed");
        metrics.record_collector_request("kubectl", true, 0.05);
        metrics.record_collector_request("jaeger", false, 0.3);
    }

    #[test]
    fn test_export_contains_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_query("completed", 0.1);
        metrics.record_correlation(&["scheduling_impact"], &["high"]);

        let exported = metrics.export_prometheus();
        assert!(exported.contains("triage_queries_total"));
        assert!(exported.contains("triage_correlation_issues_total"));
    }
}
