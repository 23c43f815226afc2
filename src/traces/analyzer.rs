//! Trace analysis over the Jaeger query API.
//!
//! Fetches traces for one service and derives latency stats, error spans,
//! dependency edges, and the issue list that grades the service.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::collectors::{JaegerClient, RawSpan, RawTrace, TraceQuery};
use crate::controlplane::HealthState;
use crate::error::{Result, TriageError};

use super::models::{DependencyEdge, ErrorTrace, LatencyStats, TraceSnapshot};

/// Trace p95 latency threshold in milliseconds.
const P95_THRESHOLD_MS: f64 = 1000.0;

/// Error-span count threshold as a fraction of fetched traces.
const ERROR_TRACE_THRESHOLD: f64 = 0.1;

/// Error fraction threshold for one dependency edge.
const EDGE_ERROR_THRESHOLD: f64 = 0.1;

pub struct TraceAnalyzer {
    jaeger: JaegerClient,
}

impl TraceAnalyzer {
    pub fn new(jaeger: JaegerClient) -> Self {
        Self { jaeger }
    }

    /// Services currently known to the tracing backend.
    pub async fn services(&self) -> Result<Vec<String>> {
        self.jaeger.services().await
    }

    /// Operations recorded for one service.
    pub async fn operations(&self, service: &str) -> Result<Vec<String>> {
        self.jaeger.operations(service).await
    }

    /// Fetch traces matching the query and grade the service from them.
    ///
    /// An empty result set is an error: without traces there is nothing to
    /// grade, and callers treat the step as failed rather than healthy.
    pub async fn analyze(&self, query: &TraceQuery) -> Result<TraceSnapshot> {
        let traces = self.jaeger.find_traces(query).await?;
        if traces.is_empty() {
            return Err(TriageError::Transport(format!(
                "no traces found for service {}",
                query.service
            )));
        }

        let snapshot = snapshot_from_traces(&query.service, &traces);
        debug!(
            service = %snapshot.service,
            status = %snapshot.status,
            traces = snapshot.trace_count,
            issues = snapshot.issues.len(),
            "trace analysis complete"
        );
        Ok(snapshot)
    }
}

/// Derive the full snapshot from already-fetched traces.
pub(crate) fn snapshot_from_traces(service: &str, traces: &[RawTrace]) -> TraceSnapshot {
    let latency = latency_stats(traces);
    let error_traces = collect_error_traces(traces);
    let dependencies = dependency_edges(traces);
    let issues = derive_issues(traces.len(), &latency, &error_traces, &dependencies);
    let status = status_for(&issues);

    TraceSnapshot {
        service: service.to_string(),
        status,
        issues,
        trace_count: traces.len(),
        latency,
        error_traces,
        dependencies,
    }
}

fn latency_stats(traces: &[RawTrace]) -> LatencyStats {
    if traces.is_empty() {
        return LatencyStats::default();
    }

    let mut durations: Vec<f64> = traces.iter().map(|trace| trace.duration).collect();
    durations.sort_by(|a, b| a.total_cmp(b));

    let sum: f64 = durations.iter().sum();
    LatencyStats {
        min: durations[0],
        max: durations[durations.len() - 1],
        avg: sum / durations.len() as f64,
        p95: percentile(&durations, 0.95),
        p99: percentile(&durations, 0.99),
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let idx = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn collect_error_traces(traces: &[RawTrace]) -> Vec<ErrorTrace> {
    let mut errors = Vec::new();
    for trace in traces {
        for span in &trace.spans {
            if span_has_error(span) {
                errors.push(ErrorTrace {
                    trace_id: trace.trace_id.clone(),
                    service: span.service_name.clone(),
                    operation: span.operation_name.clone(),
                    error_type: error_type(span),
                });
            }
        }
    }
    errors
}

fn span_has_error(span: &RawSpan) -> bool {
    span.tags
        .iter()
        .any(|tag| tag.key == "error" && tag_is_truthy(&tag.value))
}

/// Truthiness for error tags. Jaeger clients are inconsistent about the tag
/// type, so booleans, strings, and numbers all appear in the wild.
fn tag_is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !(s.is_empty() || s == "false" || s == "0"),
        Value::Number(n) => n.as_f64().map_or(true, |v| v != 0.0),
        Value::Null => false,
        _ => true,
    }
}

fn error_type(span: &RawSpan) -> String {
    span.tags
        .iter()
        .find(|tag| tag.key == "error.type")
        .map(|tag| match &tag.value {
            Value::String(s) => s.clone(),
            Value::Null => "unknown".to_string(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Build caller/callee edges from span references. Parent spans are looked
/// up across the whole batch, so edges spanning traces still resolve. Edge
/// order follows first observation.
fn dependency_edges(traces: &[RawTrace]) -> Vec<DependencyEdge> {
    let mut span_services: HashMap<&str, &str> = HashMap::new();
    for trace in traces {
        for span in &trace.spans {
            span_services
                .entry(span.span_id.as_str())
                .or_insert(span.service_name.as_str());
        }
    }

    let mut edges: IndexMap<String, DependencyEdge> = IndexMap::new();
    for trace in traces {
        for span in &trace.spans {
            for reference in &span.references {
                let Some(parent) = span_services.get(reference.span_id.as_str()) else {
                    continue;
                };
                let key = format!("{parent}->{}", span.service_name);
                let edge = edges.entry(key).or_insert_with(|| DependencyEdge {
                    source: (*parent).to_string(),
                    target: span.service_name.clone(),
                    count: 0,
                    errors: 0,
                });
                edge.count += 1;
                if span_has_error(span) {
                    edge.errors += 1;
                }
            }
        }
    }

    edges.into_values().collect()
}

fn derive_issues(
    trace_count: usize,
    latency: &LatencyStats,
    error_traces: &[ErrorTrace],
    dependencies: &[DependencyEdge],
) -> Vec<String> {
    let mut issues = Vec::new();

    if latency.p95 > P95_THRESHOLD_MS {
        issues.push("High latency detected (p95 > 1s)".to_string());
    }

    if error_traces.len() as f64 > trace_count as f64 * ERROR_TRACE_THRESHOLD {
        issues.push("High error rate detected (>10%)".to_string());
    }

    for edge in dependencies {
        if edge.errors as f64 / edge.count as f64 > EDGE_ERROR_THRESHOLD {
            issues.push(format!(
                "High error rate in dependency {} -> {}",
                edge.source, edge.target
            ));
        }
    }

    issues
}

fn status_for(issues: &[String]) -> HealthState {
    match issues.len() {
        n if n > 5 => HealthState::Critical,
        n if n > 2 => HealthState::Degraded,
        _ => HealthState::Healthy,
    }
}
