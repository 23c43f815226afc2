//! Client for the remote kubectl execution bridge

use reqwest::Client;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

use super::{CallFailure, RETRY_DELAY};
use crate::config::KubectlConfig;
use crate::error::{Result, TriageError};
use crate::metrics::METRICS;

/// Control-plane components inspected during a full analysis, in the order
/// their statuses are reported.
pub const CONTROL_PLANE_COMPONENTS: [&str; 4] = [
    "kube-apiserver",
    "kube-controller-manager",
    "kube-scheduler",
    "etcd",
];

/// Client for the kubectl execution endpoint. Commands are posted as
/// `{"command", "namespace"}` to `/execute`; the bridge returns parsed JSON
/// for JSON-producing commands and `{"output": "<text>"}` otherwise.
pub struct KubectlClient {
    http: Client,
    config: KubectlConfig,
}

impl KubectlClient {
    pub fn new(config: KubectlConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Run a kubectl command through the bridge, retrying once on a
    /// transient transport failure.
    pub async fn execute(&self, command: &str, namespace: Option<&str>) -> Result<Value> {
        let start = Instant::now();

        let mut attempt = 0;
        let result = loop {
            attempt += 1;

            match self.call_execute(command, namespace).await {
                Ok(value) => break Ok(value),
                Err(failure) => {
                    if failure.transient && attempt <= self.config.retry_attempts {
                        warn!(
                            command,
                            attempt,
                            error = %failure.error,
                            "kubectl call failed, retrying"
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    break Err(failure.error);
                }
            }
        };

        METRICS.record_collector_request("kubectl", result.is_ok(), start.elapsed().as_secs_f64());
        result
    }

    async fn call_execute(
        &self,
        command: &str,
        namespace: Option<&str>,
    ) -> std::result::Result<Value, CallFailure> {
        let url = format!("{}/execute", self.config.api_url);
        let body = serde_json::json!({
            "command": command,
            "namespace": namespace,
        });

        debug!(command, "executing kubectl command");

        let response = self.http.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CallFailure::from_status("kubectl bridge", status, text));
        }

        response
            .json()
            .await
            .map_err(|e| CallFailure::terminal(TriageError::Parse(e.to_string())))
    }

    /// Pod listing for one control-plane component.
    pub async fn component_pods(&self, component: &str) -> Result<Value> {
        self.execute(
            &format!("get pods -n kube-system -l component={component} -o json"),
            None,
        )
        .await
    }

    /// Per-endpoint etcd health lines.
    pub async fn etcd_health_text(&self) -> Result<String> {
        let value = self
            .execute(
                "exec -n kube-system etcd-control-plane -- etcdctl endpoint health --cluster",
                None,
            )
            .await?;
        Ok(output_text(&value))
    }

    /// etcd endpoint status as a JSON document (db size, raft term).
    pub async fn etcd_status_json(&self) -> Result<String> {
        let value = self
            .execute(
                "exec -n kube-system etcd-control-plane -- etcdctl endpoint status -w json",
                None,
            )
            .await?;
        Ok(output_text(&value))
    }

    /// API server metrics in Prometheus exposition format.
    pub async fn api_server_metrics_text(&self) -> Result<String> {
        let value = self.execute("get --raw /metrics", None).await?;
        Ok(output_text(&value))
    }

    /// Recent scheduler log lines.
    pub async fn scheduler_logs(&self) -> Result<String> {
        let value = self
            .execute("logs -n kube-system -l component=kube-scheduler --tail=1000", None)
            .await?;
        Ok(output_text(&value))
    }

    /// Node descriptors with capacity and allocatable quantities.
    pub async fn nodes_json(&self) -> Result<Value> {
        self.execute("get nodes -o json", None).await
    }
}

fn output_text(value: &Value) -> String {
    value
        .get("output")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
