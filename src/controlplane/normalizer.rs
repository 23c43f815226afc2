//! Pure parsers turning raw collector output into typed health facts.
//!
//! Malformed lines and items are skipped with a warning; a bad record never
//! aborts normalization of the remaining input.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use super::models::{
    ApiServerMetrics, ComponentStatus, EndpointHealth, EtcdHealth, NodeUtilization,
    SchedulerAnalysis,
};

/// Per-pod restart count above which an issue is raised.
const RESTART_THRESHOLD: u64 = 5;

/// etcd database size above which an issue is raised (8 GiB).
const ETCD_DB_SIZE_THRESHOLD: u64 = 8 * 1024 * 1024 * 1024;

/// Raft term above which frequent leader elections are assumed.
const RAFT_TERM_THRESHOLD: u64 = 1000;

/// API server request latency threshold in seconds.
const LATENCY_THRESHOLD_SECS: f64 = 1.0;

/// API server error fraction threshold.
const ERROR_RATE_THRESHOLD: f64 = 0.05;

/// etcd operation duration threshold in seconds.
const ETCD_OP_THRESHOLD_SECS: f64 = 0.1;

/// Scheduling failure fraction threshold.
const SCHEDULING_FAILURE_THRESHOLD: f64 = 0.1;

/// Node resource utilization threshold in percent.
const NODE_UTILIZATION_THRESHOLD: f64 = 80.0;

/// Known scheduling failure reasons, matched in order against the lowercased
/// log line; first match wins.
const SCHEDULING_FAILURE_REASONS: [&str; 5] = [
    "insufficient cpu",
    "insufficient memory",
    "node(s) had taint",
    "node(s) didn't match node selector",
    "0/1 nodes are available",
];

/// Summarize a component's pod listing (`kubectl get pods -o json` shape).
pub fn normalize_component_pods(component: &str, listing: &Value) -> ComponentStatus {
    let mut status = ComponentStatus::default();

    let Some(pods) = listing.get("items").and_then(Value::as_array) else {
        warn!(component, "pod listing has no items array");
        return status;
    };

    status.pods = pods.len();

    for pod in pods {
        let pod_name = pod
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let container_statuses = pod
            .pointer("/status/containerStatuses")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let all_ready = container_statuses
            .iter()
            .all(|c| c.get("ready").and_then(Value::as_bool).unwrap_or(false));
        if all_ready {
            status.ready += 1;
        } else {
            status.not_ready += 1;
        }

        let restarts: u64 = container_statuses
            .iter()
            .map(|c| c.get("restartCount").and_then(Value::as_u64).unwrap_or(0))
            .sum();
        status.restarts += restarts;

        if restarts > RESTART_THRESHOLD {
            status
                .issues
                .push(format!("High restart count ({restarts}) for pod {pod_name}"));
        }

        for container in &container_statuses {
            let container_name = container
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let state = container.get("state").cloned().unwrap_or(Value::Null);

            if state.get("waiting").is_some() || state.get("terminated").is_some() {
                let reason = state
                    .pointer("/waiting/reason")
                    .and_then(Value::as_str)
                    .or_else(|| state.pointer("/terminated/reason").and_then(Value::as_str))
                    .unwrap_or("unknown");
                status.issues.push(format!(
                    "Container {container_name} in pod {pod_name} is {reason}"
                ));
            }
        }
    }

    status
}

/// Combine etcd endpoint health text and endpoint status JSON. Either source
/// may be absent when its fetch failed; absence contributes nothing.
pub fn normalize_etcd_health(health_text: Option<&str>, status_json: Option<&str>) -> EtcdHealth {
    let mut health = EtcdHealth::default();

    if let Some(text) = health_text {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((endpoint, status)) = line.split_once(':') else {
                warn!(line, "skipping malformed etcd health line");
                continue;
            };
            let endpoint = endpoint.trim();
            let healthy = status.to_lowercase().contains("healthy");

            health.endpoints.push(EndpointHealth {
                endpoint: endpoint.to_string(),
                healthy,
            });
            if healthy {
                health.healthy_endpoints += 1;
            } else {
                health.unhealthy_endpoints += 1;
                health
                    .issues
                    .push(format!("Unhealthy etcd endpoint: {endpoint}"));
            }
        }
    }

    if let Some(raw) = status_json {
        match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(endpoints) => {
                for endpoint in endpoints {
                    let db_size = endpoint.get("dbSize").and_then(Value::as_u64).unwrap_or(0);
                    if db_size > ETCD_DB_SIZE_THRESHOLD {
                        health
                            .issues
                            .push(format!("Large etcd database size: {db_size} bytes"));
                    }
                    let raft_term = endpoint.get("raftTerm").and_then(Value::as_u64).unwrap_or(0);
                    if raft_term > RAFT_TERM_THRESHOLD {
                        health.issues.push(
                            "High raft term number indicates frequent leader elections"
                                .to_string(),
                        );
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "etcd status output is not valid JSON");
                health.issues.push("Failed to parse etcd metrics".to_string());
            }
        }
    }

    health
}

/// Parse API server metrics exposition text into keyed samples plus issues.
pub fn normalize_api_server_metrics(text: &str) -> ApiServerMetrics {
    let mut metrics = ApiServerMetrics::default();

    for line in text.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        if line.contains("apiserver_request_duration_seconds") && line.contains("bucket") {
            let Some((labels, value)) = parse_labeled_sample(line) else {
                warn!(line, "skipping malformed latency sample");
                continue;
            };
            if let (Some(resource), Some(verb)) =
                (label_value(&labels, "resource"), label_value(&labels, "verb"))
            {
                metrics
                    .request_latency
                    .insert(format!("{resource}/{verb}"), value);
            }
        } else if line.contains("apiserver_request_total") {
            let Some((labels, value)) = parse_labeled_sample(line) else {
                warn!(line, "skipping malformed request count sample");
                continue;
            };
            if let (Some(resource), Some(code)) =
                (label_value(&labels, "resource"), label_value(&labels, "code"))
            {
                let key = format!("{resource}/{code}");
                metrics.request_rate.insert(key.clone(), value);
                if code.starts_with('5') {
                    metrics.errors.insert(key, value);
                }
            }
        } else if line.contains("etcd_request_duration_seconds") && line.contains("operation") {
            let Some((labels, value)) = parse_labeled_sample(line) else {
                warn!(line, "skipping malformed etcd duration sample");
                continue;
            };
            if let Some(operation) = label_value(&labels, "operation") {
                metrics.etcd_requests.insert(operation.to_string(), value);
            }
        }
    }

    for (endpoint, latency) in &metrics.request_latency {
        if *latency > LATENCY_THRESHOLD_SECS {
            metrics
                .issues
                .push(format!("High latency for {endpoint}: {latency:.2}s"));
        }
    }

    let total_requests: f64 = metrics.request_rate.values().sum();
    if total_requests > 0.0 {
        let error_rate = metrics.errors.values().sum::<f64>() / total_requests;
        if error_rate > ERROR_RATE_THRESHOLD {
            metrics.issues.push(format!(
                "High API server error rate: {:.2}%",
                error_rate * 100.0
            ));
        }
    }

    for (operation, duration) in &metrics.etcd_requests {
        if *duration > ETCD_OP_THRESHOLD_SECS {
            metrics
                .issues
                .push(format!("Slow etcd {operation} operations: {duration:.3}s"));
        }
    }

    metrics
}

/// Count scheduler bind outcomes and classify failure reasons.
pub fn normalize_scheduler_logs(logs: &str) -> SchedulerAnalysis {
    let mut analysis = SchedulerAnalysis::default();

    for line in logs.lines() {
        if line.contains("Successfully bound pod") {
            analysis.successful_schedules += 1;
        } else if line.contains("Failed to schedule pod") {
            analysis.failed_schedules += 1;
            let reason = classify_failure_reason(line);
            *analysis
                .common_failure_reasons
                .entry(reason.to_string())
                .or_insert(0) += 1;
        }
    }

    analysis.scheduling_attempts = analysis.successful_schedules + analysis.failed_schedules;

    if analysis.scheduling_attempts > 0 {
        let failure_rate =
            analysis.failed_schedules as f64 / analysis.scheduling_attempts as f64;
        if failure_rate > SCHEDULING_FAILURE_THRESHOLD {
            analysis
                .issues
                .push("High scheduling failure rate detected".to_string());
        }
    }

    analysis
}

fn classify_failure_reason(line: &str) -> &'static str {
    let lower = line.to_lowercase();
    SCHEDULING_FAILURE_REASONS
        .iter()
        .find(|reason| lower.contains(*reason))
        .copied()
        .unwrap_or("unknown")
}

/// Derive per-node utilization from node descriptors
/// (`kubectl get nodes -o json` shape). Nodes with unparseable quantities
/// are skipped.
pub fn normalize_node_utilization(nodes: &Value) -> IndexMap<String, NodeUtilization> {
    let mut utilization = IndexMap::new();

    let Some(items) = nodes.get("items").and_then(Value::as_array) else {
        warn!("node listing has no items array");
        return utilization;
    };

    for node in items {
        let Some(name) = node.pointer("/metadata/name").and_then(Value::as_str) else {
            warn!("skipping node without a name");
            continue;
        };
        let Some(node_util) = node_utilization(node) else {
            warn!(node = name, "skipping node with unparseable resource quantities");
            continue;
        };
        utilization.insert(name.to_string(), node_util);
    }

    utilization
}

/// Append per-node utilization issues for anything above the threshold.
pub fn node_utilization_issues(
    utilization: &IndexMap<String, NodeUtilization>,
    issues: &mut Vec<String>,
) {
    for (node, util) in utilization {
        if util.cpu_percent > NODE_UTILIZATION_THRESHOLD {
            issues.push(format!("High CPU utilization on node {node}"));
        }
        if util.memory_percent > NODE_UTILIZATION_THRESHOLD {
            issues.push(format!("High memory utilization on node {node}"));
        }
    }
}

fn node_utilization(node: &Value) -> Option<NodeUtilization> {
    let allocatable = node.pointer("/status/allocatable")?;
    let capacity = node.pointer("/status/capacity")?;

    let cpu_alloc = parse_cpu_quantity(allocatable.get("cpu")?.as_str()?)?;
    let cpu_cap = parse_cpu_quantity(capacity.get("cpu")?.as_str()?)?;
    let mem_alloc = parse_memory_quantity(allocatable.get("memory")?.as_str()?)?;
    let mem_cap = parse_memory_quantity(capacity.get("memory")?.as_str()?)?;

    if cpu_cap <= 0.0 || mem_cap <= 0.0 {
        return None;
    }

    Some(NodeUtilization {
        cpu_percent: (cpu_cap - cpu_alloc) / cpu_cap * 100.0,
        memory_percent: (mem_cap - mem_alloc) / mem_cap * 100.0,
    })
}

/// CPU quantity in cores. Accepts plain core counts and the `m` milli
/// suffix.
pub fn parse_cpu_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some(milli) = raw.strip_suffix('m') {
        return milli.parse::<f64>().ok().map(|v| v / 1000.0);
    }
    raw.parse::<f64>().ok()
}

/// Memory quantity in bytes. Accepts plain byte counts and the binary
/// `Ki`/`Mi`/`Gi` suffixes.
pub fn parse_memory_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    for (suffix, factor) in [
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
    ] {
        if let Some(number) = raw.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|v| v * factor);
        }
    }
    raw.parse::<f64>().ok()
}

fn parse_labeled_sample(line: &str) -> Option<(Vec<(String, String)>, f64)> {
    let open = line.find('{')?;
    let close = line[open..].find('}')? + open;

    let labels = line[open + 1..close]
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();

    let value = line[close + 1..].split_whitespace().last()?.parse().ok()?;
    Some((labels, value))
}

fn label_value<'a>(labels: &'a [(String, String)], key: &str) -> Option<&'a str> {
    labels
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(name: &str, containers: Vec<Value>) -> Value {
        json!({
            "metadata": {"name": name},
            "status": {"containerStatuses": containers}
        })
    }

    fn container(name: &str, ready: bool, restarts: u64) -> Value {
        json!({"name": name, "ready": ready, "restartCount": restarts, "state": {"running": {}}})
    }

    #[test]
    fn test_pod_readiness_counts() {
        let listing = json!({"items": [
            pod("apiserver-0", vec![container("apiserver", true, 0)]),
            pod("apiserver-1", vec![
                container("apiserver", true, 0),
                container("sidecar", false, 1),
            ]),
        ]});

        let status = normalize_component_pods("kube-apiserver", &listing);
        assert_eq!(status.pods, 2);
        assert_eq!(status.ready, 1);
        assert_eq!(status.not_ready, 1);
        assert_eq!(status.restarts, 1);
        assert!(status.issues.is_empty());
    }

    #[test]
    fn test_restart_threshold_is_strict() {
        let at_boundary = json!({"items": [pod("etcd-0", vec![container("etcd", true, 5)])]});
        let status = normalize_component_pods("etcd", &at_boundary);
        assert!(status.issues.is_empty(), "5 restarts must not raise an issue");

        let over = json!({"items": [pod("etcd-0", vec![container("etcd", true, 6)])]});
        let status = normalize_component_pods("etcd", &over);
        assert_eq!(status.issues.len(), 1);
        assert_eq!(status.issues[0], "High restart count (6) for pod etcd-0");
    }

    #[test]
    fn test_restarts_sum_across_containers() {
        let listing = json!({"items": [pod("cm-0", vec![
            container("manager", true, 3),
            container("sidecar", true, 3),
        ])]});
        let status = normalize_component_pods("kube-controller-manager", &listing);
        assert_eq!(status.restarts, 6);
        assert_eq!(status.issues.len(), 1, "summed restarts cross the threshold");
    }

    #[test]
    fn test_waiting_container_reported() {
        let listing = json!({"items": [pod("sched-0", vec![json!({
            "name": "scheduler",
            "ready": false,
            "restartCount": 0,
            "state": {"waiting": {"reason": "CrashLoopBackOff"}}
        })])]});

        let status = normalize_component_pods("kube-scheduler", &listing);
        assert_eq!(
            status.issues,
            vec!["Container scheduler in pod sched-0 is CrashLoopBackOff"]
        );
    }

    #[test]
    fn test_terminated_container_reported() {
        let listing = json!({"items": [pod("etcd-0", vec![json!({
            "name": "etcd",
            "ready": false,
            "restartCount": 2,
            "state": {"terminated": {"reason": "OOMKilled"}}
        })])]});

        let status = normalize_component_pods("etcd", &listing);
        assert_eq!(status.issues, vec!["Container etcd in pod etcd-0 is OOMKilled"]);
    }

    #[test]
    fn test_pod_without_containers_counts_ready() {
        let listing = json!({"items": [json!({"metadata": {"name": "p"}, "status": {}})]});
        let status = normalize_component_pods("etcd", &listing);
        assert_eq!(status.ready, 1);
        assert_eq!(status.not_ready, 0);
    }

    #[test]
    fn test_etcd_health_lines() {
        let text = "etcd-0: healthy, took 2ms\netcd-1: connection refused\n\nmalformed line\n";
        let health = normalize_etcd_health(Some(text), None);

        assert_eq!(health.healthy_endpoints, 1);
        assert_eq!(health.unhealthy_endpoints, 1);
        assert_eq!(health.endpoints.len(), 2);
        assert_eq!(health.issues, vec!["Unhealthy etcd endpoint: etcd-1"]);
    }

    #[test]
    fn test_etcd_health_case_insensitive() {
        let health = normalize_etcd_health(Some("etcd-0: Healthy"), None);
        assert_eq!(health.healthy_endpoints, 1);
    }

    #[test]
    fn test_etcd_db_size_boundary() {
        let exactly_8gib = format!("[{{\"dbSize\": {}, \"raftTerm\": 3}}]", 8u64 * 1024 * 1024 * 1024);
        let health = normalize_etcd_health(None, Some(&exactly_8gib));
        assert!(health.issues.is_empty(), "exactly 8 GiB must not raise an issue");

        let over = format!("[{{\"dbSize\": {}, \"raftTerm\": 3}}]", 8u64 * 1024 * 1024 * 1024 + 1);
        let health = normalize_etcd_health(None, Some(&over));
        assert_eq!(health.issues.len(), 1);
        assert!(health.issues[0].starts_with("Large etcd database size:"));
    }

    #[test]
    fn test_etcd_raft_term_boundary() {
        let at_boundary = r#"[{"dbSize": 1024, "raftTerm": 1000}]"#;
        assert!(normalize_etcd_health(None, Some(at_boundary)).issues.is_empty());

        let over = r#"[{"dbSize": 1024, "raftTerm": 1001}]"#;
        let health = normalize_etcd_health(None, Some(over));
        assert_eq!(
            health.issues,
            vec!["High raft term number indicates frequent leader elections"]
        );
    }

    #[test]
    fn test_etcd_status_parse_failure_recorded() {
        let health = normalize_etcd_health(Some("etcd-0: healthy"), Some("not json"));
        assert_eq!(health.healthy_endpoints, 1, "health lines still counted");
        assert_eq!(health.issues, vec!["Failed to parse etcd metrics"]);
    }

    #[test]
    fn test_api_latency_parsing_and_threshold() {
        let text = "\
# HELP apiserver_request_duration_seconds Request latency\n\
apiserver_request_duration_seconds_bucket{resource=\"pods\",verb=\"LIST\",le=\"+Inf\"} 0.9\n\
apiserver_request_duration_seconds_bucket{resource=\"nodes\",verb=\"GET\",le=\"+Inf\"} 1.5\n";

        let metrics = normalize_api_server_metrics(text);
        assert_eq!(metrics.request_latency["pods/LIST"], 0.9);
        assert_eq!(metrics.request_latency["nodes/GET"], 1.5);
        assert_eq!(metrics.issues, vec!["High latency for nodes/GET: 1.50s"]);
    }

    #[test]
    fn test_api_latency_boundary_not_flagged() {
        let text = "apiserver_request_duration_seconds_bucket{resource=\"pods\",verb=\"LIST\"} 1.0\n";
        let metrics = normalize_api_server_metrics(text);
        assert!(metrics.issues.is_empty(), "exactly 1.0s must not raise an issue");
    }

    #[test]
    fn test_api_latency_last_write_wins() {
        let text = "\
apiserver_request_duration_seconds_bucket{resource=\"pods\",verb=\"LIST\",le=\"0.5\"} 0.3\n\
apiserver_request_duration_seconds_bucket{resource=\"pods\",verb=\"LIST\",le=\"+Inf\"} 0.8\n";
        let metrics = normalize_api_server_metrics(text);
        assert_eq!(metrics.request_latency["pods/LIST"], 0.8);
    }

    #[test]
    fn test_api_error_rate() {
        let text = "\
apiserver_request_total{resource=\"pods\",code=\"200\"} 90\n\
apiserver_request_total{resource=\"pods\",code=\"500\"} 10\n";

        let metrics = normalize_api_server_metrics(text);
        assert_eq!(metrics.request_rate.len(), 2);
        assert_eq!(metrics.errors.len(), 1);
        assert_eq!(metrics.issues, vec!["High API server error rate: 10.00%"]);
    }

    #[test]
    fn test_api_error_rate_boundary_not_flagged() {
        let text = "\
apiserver_request_total{resource=\"pods\",code=\"200\"} 95\n\
apiserver_request_total{resource=\"pods\",code=\"500\"} 5\n";
        let metrics = normalize_api_server_metrics(text);
        assert!(metrics.issues.is_empty(), "exactly 5% must not raise an issue");
    }

    #[test]
    fn test_etcd_operation_duration() {
        let text = "\
etcd_request_duration_seconds{operation=\"get\"} 0.05\n\
etcd_request_duration_seconds{operation=\"put\"} 0.25\n";

        let metrics = normalize_api_server_metrics(text);
        assert_eq!(metrics.etcd_requests["get"], 0.05);
        assert_eq!(metrics.issues, vec!["Slow etcd put operations: 0.250s"]);
    }

    #[test]
    fn test_malformed_metric_line_skipped() {
        let text = "\
apiserver_request_duration_seconds_bucket{resource=\"pods\",verb=\"LIST\"} not-a-number\n\
apiserver_request_duration_seconds_bucket{resource=\"nodes\",verb=\"GET\"} 0.4\n";

        let metrics = normalize_api_server_metrics(text);
        assert_eq!(metrics.request_latency.len(), 1);
        assert_eq!(metrics.request_latency["nodes/GET"], 0.4);
    }

    #[test]
    fn test_scheduler_log_counts() {
        let logs = "\
I0101 Successfully bound pod default/web-1 to node-a\n\
I0101 Successfully bound pod default/web-2 to node-b\n\
E0101 Failed to schedule pod default/web-3: 0/1 nodes are available: Insufficient cpu\n";

        let analysis = normalize_scheduler_logs(logs);
        assert_eq!(analysis.successful_schedules, 2);
        assert_eq!(analysis.failed_schedules, 1);
        assert_eq!(analysis.scheduling_attempts, 3);
    }

    #[test]
    fn test_failure_reason_first_match_wins() {
        // The line matches both "insufficient cpu" and "0/1 nodes are
        // available"; the earlier list entry is reported.
        let logs = "Failed to schedule pod: 0/1 nodes are available: Insufficient cpu\n";
        let analysis = normalize_scheduler_logs(logs);
        assert_eq!(analysis.common_failure_reasons["insufficient cpu"], 1);
    }

    #[test]
    fn test_failure_reason_unknown() {
        let logs = "Failed to schedule pod: something novel happened\n";
        let analysis = normalize_scheduler_logs(logs);
        assert_eq!(analysis.common_failure_reasons["unknown"], 1);
    }

    #[test]
    fn test_scheduling_failure_rate_uses_total_attempts() {
        // 1 failure out of 10 attempts is exactly 10%: not flagged.
        let mut logs = String::new();
        for i in 0..9 {
            logs.push_str(&format!("Successfully bound pod default/p{i} to node-a\n"));
        }
        logs.push_str("Failed to schedule pod default/p9: Insufficient memory\n");
        let analysis = normalize_scheduler_logs(&logs);
        assert!(analysis.issues.is_empty(), "exactly 10% must not raise an issue");

        // 2 failures out of 11 attempts crosses the threshold.
        logs.push_str("Failed to schedule pod default/p10: Insufficient memory\n");
        let analysis = normalize_scheduler_logs(&logs);
        assert_eq!(analysis.issues, vec!["High scheduling failure rate detected"]);
    }

    #[test]
    fn test_cpu_quantity_parsing() {
        assert_eq!(parse_cpu_quantity("8"), Some(8.0));
        assert_eq!(parse_cpu_quantity("250m"), Some(0.25));
        assert_eq!(parse_cpu_quantity("7910m"), Some(7.91));
        assert_eq!(parse_cpu_quantity("bogus"), None);
    }

    #[test]
    fn test_memory_quantity_parsing() {
        assert_eq!(parse_memory_quantity("1024"), Some(1024.0));
        assert_eq!(parse_memory_quantity("16238564Ki"), Some(16238564.0 * 1024.0));
        assert_eq!(parse_memory_quantity("512Mi"), Some(512.0 * 1024.0 * 1024.0));
        assert_eq!(parse_memory_quantity("4Gi"), Some(4.0 * 1024.0 * 1024.0 * 1024.0));
        assert_eq!(parse_memory_quantity("4Ti"), None);
    }

    #[test]
    fn test_node_utilization() {
        let nodes = json!({"items": [{
            "metadata": {"name": "node-a"},
            "status": {
                "capacity": {"cpu": "8", "memory": "16Gi"},
                "allocatable": {"cpu": "1000m", "memory": "2Gi"}
            }
        }]});

        let utilization = normalize_node_utilization(&nodes);
        let util = &utilization["node-a"];
        assert!((util.cpu_percent - 87.5).abs() < 1e-9);
        assert!((util.memory_percent - 87.5).abs() < 1e-9);

        let mut issues = Vec::new();
        node_utilization_issues(&utilization, &mut issues);
        assert_eq!(
            issues,
            vec![
                "High CPU utilization on node node-a",
                "High memory utilization on node node-a"
            ]
        );
    }

    #[test]
    fn test_node_utilization_boundary_not_flagged() {
        let nodes = json!({"items": [{
            "metadata": {"name": "node-a"},
            "status": {
                "capacity": {"cpu": "10", "memory": "10Gi"},
                "allocatable": {"cpu": "2", "memory": "2Gi"}
            }
        }]});

        let utilization = normalize_node_utilization(&nodes);
        let util = &utilization["node-a"];
        assert!((util.cpu_percent - 80.0).abs() < 1e-9);

        let mut issues = Vec::new();
        node_utilization_issues(&utilization, &mut issues);
        assert!(issues.is_empty(), "exactly 80% must not raise an issue");
    }

    #[test]
    fn test_node_with_bad_quantities_skipped() {
        let nodes = json!({"items": [
            {
                "metadata": {"name": "bad"},
                "status": {
                    "capacity": {"cpu": "??", "memory": "16Gi"},
                    "allocatable": {"cpu": "1", "memory": "2Gi"}
                }
            },
            {
                "metadata": {"name": "good"},
                "status": {
                    "capacity": {"cpu": "4", "memory": "8Gi"},
                    "allocatable": {"cpu": "3", "memory": "6Gi"}
                }
            }
        ]});

        let utilization = normalize_node_utilization(&nodes);
        assert_eq!(utilization.len(), 1);
        assert!(utilization.contains_key("good"));
    }
}
