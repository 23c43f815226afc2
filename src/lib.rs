//! kube-triage: Kubernetes control-plane and tracing diagnostics with
//! LLM-assisted query orchestration.
//!
//! The crate turns two raw signal sources, a kubectl execution bridge and a
//! Jaeger query service, into typed health snapshots, correlates them into
//! cross-signal issues and recommendations, and answers natural-language
//! queries through a staged pipeline (classify, plan, execute, correlate,
//! synthesize). Language-model collaborators shape the plan and the prose;
//! every health verdict comes from deterministic local analysis.

pub mod collectors;
pub mod config;
pub mod controlplane;
pub mod correlation;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod traces;

pub use error::{Result, TriageError};

/// Commonly used types, re-exported for consumers and tests.
pub mod prelude {
    pub use crate::collectors::{JaegerClient, KubectlClient, TraceQuery};
    pub use crate::config::Config;
    pub use crate::controlplane::{ControlPlaneAnalyzer, ControlPlaneSnapshot, HealthState};
    pub use crate::correlation::{
        correlate, CorrelatedIssue, CorrelationOutcome, IssueKind, Priority, Recommendation,
    };
    pub use crate::error::{Result, TriageError};
    pub use crate::orchestrator::{
        init_orchestrator, AnalysisRequest, Entity, EntityKind, HealthAnalysis, LanguageModel,
        LlmClient, Orchestrator, QueryOutcome, StepStatus, TaskStage,
    };
    pub use crate::traces::{TraceAnalyzer, TraceSnapshot};
}
