//! Typed control-plane health facts

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Aggregate health classification shared by control-plane and trace
/// snapshots
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Critical => "critical",
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::Healthy
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pod-level status for one control-plane component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub pods: usize,
    pub ready: usize,
    pub not_ready: usize,
    pub restarts: u64,
    #[serde(default)]
    pub issues: Vec<String>,
    /// Set when the pod listing itself could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health of a single etcd endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub endpoint: String,
    pub healthy: bool,
}

/// Aggregated etcd cluster health
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtcdHealth {
    pub healthy_endpoints: usize,
    pub unhealthy_endpoints: usize,
    #[serde(default)]
    pub endpoints: Vec<EndpointHealth>,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// API server request metrics. Latency is keyed `resource/verb`, rates and
/// errors `resource/code`, etcd requests by operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiServerMetrics {
    #[serde(default)]
    pub request_latency: IndexMap<String, f64>,
    #[serde(default)]
    pub request_rate: IndexMap<String, f64>,
    #[serde(default)]
    pub errors: IndexMap<String, f64>,
    #[serde(default)]
    pub etcd_requests: IndexMap<String, f64>,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Per-node resource utilization in percent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NodeUtilization {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Scheduler decision analysis from recent logs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerAnalysis {
    pub scheduling_attempts: u64,
    pub successful_schedules: u64,
    pub failed_schedules: u64,
    #[serde(default)]
    pub common_failure_reasons: IndexMap<String, u64>,
    #[serde(default)]
    pub node_utilization: IndexMap<String, NodeUtilization>,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Normalized point-in-time control-plane health
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlPlaneSnapshot {
    pub components: IndexMap<String, ComponentStatus>,
    pub etcd: EtcdHealth,
    pub api_server: ApiServerMetrics,
    pub scheduler: SchedulerAnalysis,
    #[serde(default)]
    pub critical_issues: Vec<String>,
    pub overall_health: HealthState,
}
