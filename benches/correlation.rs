//! Correlation engine benchmarks over synthetic snapshot pairs.
//!
//! The correlation pass runs on every query that resolves both snapshot
//! kinds, so it has to stay cheap next to the network calls around it.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;

use kube_triage::controlplane::{
    ComponentStatus, ControlPlaneSnapshot, EtcdHealth, HealthState, SchedulerAnalysis,
};
use kube_triage::correlation::correlate;
use kube_triage::traces::{DependencyEdge, ErrorTrace, LatencyStats, TraceSnapshot};

fn healthy_control_plane() -> ControlPlaneSnapshot {
    let mut components = IndexMap::new();
    for name in [
        "kube-apiserver",
        "kube-controller-manager",
        "kube-scheduler",
        "etcd",
    ] {
        components.insert(
            name.to_string(),
            ComponentStatus {
                pods: 1,
                ready: 1,
                ..ComponentStatus::default()
            },
        );
    }
    ControlPlaneSnapshot {
        components,
        ..ControlPlaneSnapshot::default()
    }
}

fn degraded_control_plane() -> ControlPlaneSnapshot {
    let mut snapshot = healthy_control_plane();
    snapshot.scheduler = SchedulerAnalysis {
        scheduling_attempts: 40,
        successful_schedules: 28,
        failed_schedules: 12,
        ..SchedulerAnalysis::default()
    };
    snapshot
        .scheduler
        .common_failure_reasons
        .insert("Insufficient cpu".to_string(), 12);
    snapshot
        .scheduler
        .issues
        .push("High scheduling failure rate detected".to_string());
    snapshot
        .api_server
        .request_latency
        .insert("pods/LIST".to_string(), 1.8);
    snapshot
        .api_server
        .request_latency
        .insert("deployments/GET".to_string(), 0.4);
    snapshot.etcd = EtcdHealth {
        healthy_endpoints: 2,
        unhealthy_endpoints: 1,
        endpoints: Vec::new(),
        issues: vec!["1 unhealthy endpoint(s)".to_string()],
    };
    snapshot.critical_issues = vec![
        "kube-scheduler: High scheduling failure rate detected".to_string(),
        "etcd: 1 unhealthy endpoint(s)".to_string(),
    ];
    snapshot.overall_health = HealthState::Degraded;
    snapshot
}

fn healthy_traces() -> TraceSnapshot {
    TraceSnapshot {
        service: "checkout".to_string(),
        status: HealthState::Healthy,
        issues: Vec::new(),
        trace_count: 100,
        latency: LatencyStats {
            min: 12.0,
            max: 480.0,
            avg: 95.0,
            p95: 310.0,
            p99: 420.0,
        },
        error_traces: Vec::new(),
        dependencies: vec![DependencyEdge {
            source: "checkout".to_string(),
            target: "payments".to_string(),
            count: 40,
            errors: 0,
        }],
    }
}

fn critical_traces() -> TraceSnapshot {
    let error_traces = (0..12)
        .map(|i| ErrorTrace {
            trace_id: format!("trace-{i}"),
            service: "checkout".to_string(),
            operation: "POST /checkout".to_string(),
            error_type: "timeout".to_string(),
        })
        .collect();

    TraceSnapshot {
        service: "checkout".to_string(),
        status: HealthState::Critical,
        issues: vec![
            "High latency detected (p95 > 1s)".to_string(),
            "High error rate detected (>10%)".to_string(),
        ],
        trace_count: 100,
        latency: LatencyStats {
            min: 80.0,
            max: 9200.0,
            avg: 1600.0,
            p95: 4200.0,
            p99: 8800.0,
        },
        error_traces,
        dependencies: vec![
            DependencyEdge {
                source: "checkout".to_string(),
                target: "payments".to_string(),
                count: 40,
                errors: 9,
            },
            DependencyEdge {
                source: "checkout".to_string(),
                target: "inventory".to_string(),
                count: 22,
                errors: 0,
            },
        ],
    }
}

fn bench_correlate_healthy_pair(c: &mut Criterion) {
    let control_plane = healthy_control_plane();
    let traces = healthy_traces();
    c.bench_function("correlate_healthy_pair", |b| {
        b.iter(|| correlate(black_box(&control_plane), black_box(&traces)))
    });
}

fn bench_correlate_degraded_pair(c: &mut Criterion) {
    let control_plane = degraded_control_plane();
    let traces = critical_traces();
    c.bench_function("correlate_degraded_pair", |b| {
        b.iter(|| correlate(black_box(&control_plane), black_box(&traces)))
    });
}

criterion_group!(
    benches,
    bench_correlate_healthy_pair,
    bench_correlate_degraded_pair
);
criterion_main!(benches);
