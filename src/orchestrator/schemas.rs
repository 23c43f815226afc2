//! Data models for query orchestration: entities, plans, step records, and
//! the outcome types surfaced to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::controlplane::ControlPlaneSnapshot;
use crate::correlation::CorrelationOutcome;
use crate::traces::TraceSnapshot;

/// Kind of entity extracted from a diagnostic query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Service,
    Pod,
    Trace,
    Metric,
    Error,
}

/// A named thing the classifier found in the query text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: None,
            confidence: default_confidence(),
        }
    }

    /// Confidences outside [0, 1] are clamped rather than rejected so one
    /// loose field never drops a classification.
    pub fn clamped(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Stage of a task as it moves through the pipeline. `Failed` is terminal;
/// every other stage advances monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    Received,
    EntitiesClassified,
    PlanGenerated,
    StepsExecuting,
    StepsResolved,
    Synthesized,
    Failed,
}

impl Default for TaskStage {
    fn default() -> Self {
        Self::Received
    }
}

/// Working state of one query as the pipeline advances it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    pub task_id: Uuid,
    pub conversation_id: Uuid,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Step records in planned order, appended as they resolve.
    #[serde(default)]
    pub history: Vec<StepRecord>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub stage: TaskStage,
}

impl TaskContext {
    pub fn new(task_id: Uuid, conversation_id: Uuid) -> Self {
        Self {
            task_id,
            conversation_id,
            entities: Vec::new(),
            history: Vec::new(),
            priority: TaskPriority::default(),
            stage: TaskStage::default(),
        }
    }
}

/// One step of a generated plan. `depends_on` lists the step numbers that
/// must succeed before this one is scheduled; steps with disjoint
/// dependencies run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step: u32,
    pub action: String,
    pub agent: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub depends_on: Vec<u32>,
}

/// Execution status of one plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    /// Terminal statuses release steps that depend on this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// Typed output of a successful step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StepOutput {
    ControlPlane(Box<ControlPlaneSnapshot>),
    Trace(Box<TraceSnapshot>),
    Services(Vec<String>),
    Operations(Vec<String>),
}

/// A planned step together with its execution result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: PlannedStep,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<StepOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn pending(step: PlannedStep) -> Self {
        Self {
            step,
            status: StepStatus::Pending,
            output: None,
            error: None,
        }
    }
}

/// Request for a deterministic system health analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window_minutes: Option<u64>,
    #[serde(default = "default_include")]
    pub include_control_plane: bool,
    #[serde(default = "default_include")]
    pub include_tracing: bool,
}

fn default_include() -> bool {
    true
}

impl AnalysisRequest {
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service_name: service.into(),
            operation_name: None,
            time_window_minutes: None,
            include_control_plane: true,
            include_tracing: true,
        }
    }
}

/// Combined result of a system health analysis. A side that was excluded or
/// failed is `None`; `degraded` is set when a requested side failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthAnalysis {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<ControlPlaneSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TraceSnapshot>,
    #[serde(default)]
    pub correlation: CorrelationOutcome,
    #[serde(default)]
    pub degraded: bool,
}

/// Final result of one processed query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub conversation_id: Uuid,
    pub task_id: Uuid,
    pub stage: TaskStage,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationOutcome>,
    pub response: String,
    #[serde(default)]
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_confidence_defaults_to_one() {
        let entity: Entity =
            serde_json::from_str(r#"{"type": "service", "name": "checkout"}"#).unwrap();
        assert_eq!(entity.kind, EntityKind::Service);
        assert_eq!(entity.confidence, 1.0);
        assert!(entity.namespace.is_none());
    }

    #[test]
    fn test_entity_confidence_clamping() {
        let high = Entity {
            confidence: 1.7,
            ..Entity::new(EntityKind::Service, "checkout")
        };
        assert_eq!(high.clamped().confidence, 1.0);

        let low = Entity {
            confidence: -0.2,
            ..Entity::new(EntityKind::Pod, "checkout-6d9f")
        };
        assert_eq!(low.clamped().confidence, 0.0);

        let fine = Entity {
            confidence: 0.85,
            ..Entity::new(EntityKind::Error, "OOMKilled")
        };
        assert_eq!(fine.clamped().confidence, 0.85);
    }

    #[test]
    fn test_entity_kind_uses_type_key() {
        let entity = Entity::new(EntityKind::Trace, "abc123");
        let doc = serde_json::to_value(&entity).unwrap();
        assert_eq!(doc["type"], "trace");
        assert_eq!(doc["name"], "abc123");
    }

    #[test]
    fn test_planned_step_defaults() {
        let step: PlannedStep = serde_json::from_str(
            r#"{"step": 1, "action": "analyze_traces", "agent": "tracing"}"#,
        )
        .unwrap();
        assert_eq!(step.step, 1);
        assert!(step.parameters.is_empty());
        assert!(step.rationale.is_empty());
        assert!(step.depends_on.is_empty());
    }

    #[test]
    fn test_planned_step_with_dependencies() {
        let step: PlannedStep = serde_json::from_str(
            r#"{
                "step": 3,
                "action": "analyze_traces",
                "agent": "tracing",
                "parameters": {"service": "checkout", "limit": 20},
                "rationale": "inspect traces after the cluster sweep",
                "depends_on": [1, 2]
            }"#,
        )
        .unwrap();
        assert_eq!(step.depends_on, vec![1, 2]);
        assert_eq!(step.parameters["service"], "checkout");
    }

    #[test]
    fn test_task_stage_serialization() {
        assert_eq!(
            serde_json::to_string(&TaskStage::EntitiesClassified).unwrap(),
            "\"entities_classified\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStage::StepsResolved).unwrap(),
            "\"steps_resolved\""
        );
        let stage: TaskStage = serde_json::from_str("\"synthesized\"").unwrap();
        assert_eq!(stage, TaskStage::Synthesized);
    }

    #[test]
    fn test_step_status_terminality() {
        assert!(StepStatus::Success.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
        assert!(StepStatus::Skipped.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
    }

    #[test]
    fn test_analysis_request_switches_default_on() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"service_name": "checkout"}"#).unwrap();
        assert!(request.include_control_plane);
        assert!(request.include_tracing);
        assert!(request.time_window_minutes.is_none());
    }

    #[test]
    fn test_step_output_tagging() {
        let output = StepOutput::Services(vec!["checkout".to_string(), "payments".to_string()]);
        let doc = serde_json::to_value(&output).unwrap();
        assert_eq!(doc["kind"], "services");
        assert_eq!(doc["data"][0], "checkout");
    }

    #[test]
    fn test_task_context_starts_at_received() {
        let context = TaskContext::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(context.stage, TaskStage::Received);
        assert_eq!(context.priority, TaskPriority::Normal);
        assert!(context.history.is_empty());
    }
}
