//! Control-plane health collection.
//!
//! Pulls pod listings, etcd state, API server metrics, and scheduler logs
//! through the kubectl bridge, then folds them into a single snapshot. Any
//! individual call may fail without sinking the snapshot; the section it
//! feeds stays empty. Only a total outage is an error.

use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::collectors::{KubectlClient, CONTROL_PLANE_COMPONENTS};
use crate::error::{Result, TriageError};

use super::models::{
    ApiServerMetrics, ComponentStatus, ControlPlaneSnapshot, HealthState, SchedulerAnalysis,
};
use super::normalizer;

pub struct ControlPlaneAnalyzer {
    kubectl: KubectlClient,
}

impl ControlPlaneAnalyzer {
    pub fn new(kubectl: KubectlClient) -> Self {
        Self { kubectl }
    }

    /// Collect a full control-plane snapshot.
    ///
    /// Returns an error only when every kubectl call failed, which means
    /// the bridge itself is unreachable.
    pub async fn snapshot(&self) -> Result<ControlPlaneSnapshot> {
        let mut calls_succeeded = 0usize;

        let listings = join_all(
            CONTROL_PLANE_COMPONENTS
                .iter()
                .map(|component| self.kubectl.component_pods(component)),
        )
        .await;

        let mut components = IndexMap::new();
        for (component, result) in CONTROL_PLANE_COMPONENTS.iter().zip(listings) {
            let status = match result {
                Ok(listing) => {
                    calls_succeeded += 1;
                    normalizer::normalize_component_pods(component, &listing)
                }
                Err(e) => {
                    warn!(component, error = %e, "component pod listing failed");
                    ComponentStatus {
                        error: Some(e.to_string()),
                        ..ComponentStatus::default()
                    }
                }
            };
            components.insert(component.to_string(), status);
        }

        let (health_text, status_json, metrics_text, scheduler_logs, nodes) = tokio::join!(
            self.kubectl.etcd_health_text(),
            self.kubectl.etcd_status_json(),
            self.kubectl.api_server_metrics_text(),
            self.kubectl.scheduler_logs(),
            self.kubectl.nodes_json(),
        );

        let health_text = match health_text {
            Ok(text) => {
                calls_succeeded += 1;
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "etcd endpoint health fetch failed");
                None
            }
        };
        let status_json = match status_json {
            Ok(text) => {
                calls_succeeded += 1;
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "etcd endpoint status fetch failed");
                None
            }
        };
        let etcd = normalizer::normalize_etcd_health(health_text.as_deref(), status_json.as_deref());

        let api_server = match metrics_text {
            Ok(text) => {
                calls_succeeded += 1;
                normalizer::normalize_api_server_metrics(&text)
            }
            Err(e) => {
                warn!(error = %e, "API server metrics fetch failed");
                ApiServerMetrics::default()
            }
        };

        let mut scheduler = match scheduler_logs {
            Ok(logs) => {
                calls_succeeded += 1;
                normalizer::normalize_scheduler_logs(&logs)
            }
            Err(e) => {
                warn!(error = %e, "scheduler log fetch failed");
                SchedulerAnalysis::default()
            }
        };
        match nodes {
            Ok(listing) => {
                calls_succeeded += 1;
                scheduler.node_utilization = normalizer::normalize_node_utilization(&listing);
                normalizer::node_utilization_issues(
                    &scheduler.node_utilization,
                    &mut scheduler.issues,
                );
            }
            Err(e) => warn!(error = %e, "node listing fetch failed"),
        }

        if calls_succeeded == 0 {
            return Err(TriageError::Transport(
                "control-plane collection failed: no kubectl call succeeded".to_string(),
            ));
        }

        let mut snapshot = ControlPlaneSnapshot {
            components,
            etcd,
            api_server,
            scheduler,
            critical_issues: Vec::new(),
            overall_health: HealthState::Healthy,
        };
        aggregate(&mut snapshot);

        debug!(
            health = %snapshot.overall_health,
            critical_issues = snapshot.critical_issues.len(),
            "control-plane snapshot collected"
        );
        Ok(snapshot)
    }
}

/// Fold section issues into the snapshot-level list and grade overall health.
///
/// Component issues are prefixed with the component name. etcd issues only
/// count while at least one endpoint is unhealthy; database-size and raft
/// warnings on a fully healthy cluster stay local to the etcd section.
fn aggregate(snapshot: &mut ControlPlaneSnapshot) {
    let mut critical = Vec::new();

    for (component, status) in &snapshot.components {
        if status.not_ready > 0 || !status.issues.is_empty() {
            critical.extend(
                status
                    .issues
                    .iter()
                    .map(|issue| format!("{component}: {issue}")),
            );
        }
    }

    if snapshot.etcd.unhealthy_endpoints > 0 {
        critical.extend(snapshot.etcd.issues.iter().cloned());
    }

    critical.extend(snapshot.api_server.issues.iter().cloned());
    critical.extend(snapshot.scheduler.issues.iter().cloned());

    snapshot.critical_issues = critical;
    snapshot.overall_health = match snapshot.critical_issues.len() {
        0 => HealthState::Healthy,
        1..=2 => HealthState::Degraded,
        _ => HealthState::Critical,
    };
}
