//! Cross-signal correlation between control-plane and trace health.
//!
//! `correlate` is a pure function over one control-plane snapshot and one
//! trace snapshot. Rules run in a fixed order and fire independently of one
//! another, so equal inputs always produce identical output.

use serde::{Deserialize, Serialize};

use crate::controlplane::{ControlPlaneSnapshot, HealthState};
use crate::traces::TraceSnapshot;

/// API server latency in seconds above which an endpoint counts as slow.
const API_LATENCY_THRESHOLD_SECS: f64 = 1.0;

/// Trace p95 in milliseconds above which the service side counts as slow.
const SERVICE_P95_THRESHOLD_MS: f64 = 1000.0;

/// Cross-signal pattern detected by a correlation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    SchedulingImpact,
    ApiServerLatencyImpact,
    EtcdImpact,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::SchedulingImpact => "scheduling_impact",
            IssueKind::ApiServerLatencyImpact => "api_server_latency_impact",
            IssueKind::EtcdImpact => "etcd_impact",
        }
    }
}

/// One typed fact backing a correlated issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub key: String,
    pub value: EvidenceValue,
}

impl Evidence {
    fn new(key: &str, value: EvidenceValue) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

/// Value of one evidence entry. Serializes as the bare value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceValue {
    Count(u64),
    Millis(f64),
    Status(String),
    Items(Vec<String>),
}

/// An issue visible only when both signal sources are read together. The
/// evidence always carries at least one fact from each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub description: String,
    pub evidence: Vec<Evidence>,
}

/// Severity of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator action derived from the correlated picture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub action: String,
    pub details: String,
}

/// Issues and recommendations produced by one correlation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationOutcome {
    #[serde(default)]
    pub issues: Vec<CorrelatedIssue>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl CorrelationOutcome {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.recommendations.is_empty()
    }
}

/// Evaluate every correlation rule against one pair of snapshots.
///
/// Rule order is fixed: scheduling impact, API server latency impact, etcd
/// impact, then the critical-service escalation (which emits a
/// recommendation without an issue). Rules never read each other's output.
pub fn correlate(
    control_plane: &ControlPlaneSnapshot,
    trace: &TraceSnapshot,
) -> CorrelationOutcome {
    let mut outcome = CorrelationOutcome::default();

    // Scheduling failures on one side, an unhealthy service on the other.
    if control_plane.scheduler.failed_schedules > 0 && trace.status != HealthState::Healthy {
        outcome.issues.push(CorrelatedIssue {
            kind: IssueKind::SchedulingImpact,
            description: "Service degradation may be related to pod scheduling issues".to_string(),
            evidence: vec![
                Evidence::new(
                    "failed_schedules",
                    EvidenceValue::Count(control_plane.scheduler.failed_schedules),
                ),
                Evidence::new(
                    "service_status",
                    EvidenceValue::Status(trace.status.to_string()),
                ),
            ],
        });
        outcome.recommendations.push(Recommendation {
            priority: Priority::High,
            action: "Review node resources and pod resource requests/limits".to_string(),
            details: "High scheduling failure rate is affecting service performance".to_string(),
        });
    }

    // Slow API server endpoints alongside slow service traces.
    let slow_endpoints: Vec<String> = control_plane
        .api_server
        .request_latency
        .iter()
        .filter(|(_, latency)| **latency > API_LATENCY_THRESHOLD_SECS)
        .map(|(endpoint, _)| endpoint.clone())
        .collect();

    if !slow_endpoints.is_empty() && trace.latency.p95 > SERVICE_P95_THRESHOLD_MS {
        outcome.issues.push(CorrelatedIssue {
            kind: IssueKind::ApiServerLatencyImpact,
            description: "Service latency may be affected by API server performance".to_string(),
            evidence: vec![
                Evidence::new(
                    "high_latency_endpoints",
                    EvidenceValue::Items(slow_endpoints),
                ),
                Evidence::new(
                    "service_p95_latency_ms",
                    EvidenceValue::Millis(trace.latency.p95),
                ),
            ],
        });
        outcome.recommendations.push(Recommendation {
            priority: Priority::Medium,
            action: "Consider scaling API server resources".to_string(),
            details: "API server latency is impacting service response times".to_string(),
        });
    }

    // etcd trouble while the service is unhealthy.
    if !control_plane.etcd.issues.is_empty() && trace.status != HealthState::Healthy {
        outcome.issues.push(CorrelatedIssue {
            kind: IssueKind::EtcdImpact,
            description: "Service issues may be related to etcd problems".to_string(),
            evidence: vec![
                Evidence::new(
                    "etcd_issues",
                    EvidenceValue::Items(control_plane.etcd.issues.clone()),
                ),
                Evidence::new(
                    "service_issues",
                    EvidenceValue::Items(trace.issues.clone()),
                ),
            ],
        });
        outcome.recommendations.push(Recommendation {
            priority: Priority::High,
            action: "Investigate etcd health issues".to_string(),
            details: "etcd problems are affecting overall system stability".to_string(),
        });
    }

    // A critical service escalates no matter which rule explained it.
    if trace.status == HealthState::Critical {
        outcome.recommendations.push(Recommendation {
            priority: Priority::Critical,
            action: "Consider rolling back recent deployments".to_string(),
            details: "Service is in critical state with multiple issues".to_string(),
        });
    }

    outcome
}
