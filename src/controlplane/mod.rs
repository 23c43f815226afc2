//! Control-plane health: typed snapshot model, raw-output normalizers, and
//! the analyzer that drives the kubectl bridge.

pub mod analyzer;
pub mod models;
pub mod normalizer;

pub use analyzer::ControlPlaneAnalyzer;
pub use models::{
    ApiServerMetrics, ComponentStatus, ControlPlaneSnapshot, EndpointHealth, EtcdHealth,
    HealthState, NodeUtilization, SchedulerAnalysis,
};
