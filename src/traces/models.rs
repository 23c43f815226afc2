use serde::{Deserialize, Serialize};

use crate::controlplane::HealthState;

/// Latency distribution over the fetched traces, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p95: f64,
    pub p99: f64,
}

/// A span that carried a truthy `error` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorTrace {
    pub trace_id: String,
    pub service: String,
    pub operation: String,
    pub error_type: String,
}

/// One caller/callee pair observed in span references, with call and error
/// counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub count: u64,
    pub errors: u64,
}

/// Trace-level view of one service's health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub service: String,
    pub status: HealthState,
    pub issues: Vec<String>,
    pub trace_count: usize,
    pub latency: LatencyStats,
    pub error_traces: Vec<ErrorTrace>,
    pub dependencies: Vec<DependencyEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serializes_status_lowercase() {
        let snapshot = TraceSnapshot {
            service: "checkout".to_string(),
            status: HealthState::Degraded,
            issues: vec!["High latency detected (p95 > 1s)".to_string()],
            trace_count: 10,
            latency: LatencyStats::default(),
            error_traces: Vec::new(),
            dependencies: Vec::new(),
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["status"], "degraded");
        assert_eq!(value["trace_count"], 10);
    }

    #[test]
    fn test_latency_stats_default_is_zeroed() {
        let stats = LatencyStats::default();
        assert_eq!(stats.p95, 0.0);
        assert_eq!(stats.max, 0.0);
    }
}
