//! Query orchestration: the staged pipeline, its collaborator seams, and
//! per-conversation state.

pub mod history;
pub mod llm;
pub mod pipeline;
pub mod schemas;

pub use history::ConversationStore;
pub use llm::{LanguageModel, LlmClient};
pub use pipeline::Orchestrator;
pub use schemas::{
    AnalysisRequest, Entity, EntityKind, HealthAnalysis, PlannedStep, QueryOutcome, StepOutput,
    StepRecord, StepStatus, TaskContext, TaskPriority, TaskStage,
};

use std::sync::Arc;
use tracing::info;

use crate::collectors::{JaegerClient, KubectlClient};
use crate::config::Config;
use crate::controlplane::ControlPlaneAnalyzer;
use crate::error::Result;
use crate::traces::TraceAnalyzer;

/// Wire an orchestrator from configuration: collectors, analyzers, and the
/// language-model client, each constructed once and injected.
pub fn init_orchestrator(config: &Config) -> Result<Orchestrator> {
    let kubectl = KubectlClient::new(config.kubectl.clone())?;
    let jaeger = JaegerClient::new(config.jaeger.clone())?;
    let llm = LlmClient::new(config.llm.clone())?;

    let orchestrator = Orchestrator::new(
        Arc::new(ControlPlaneAnalyzer::new(kubectl)),
        Arc::new(TraceAnalyzer::new(jaeger)),
        Arc::new(llm),
        config.analysis.clone(),
    );

    info!(
        kubectl = %config.kubectl.api_url,
        jaeger = %config.jaeger.base_url,
        model = %config.llm.model,
        workers = config.analysis.worker_pool_size,
        "orchestrator initialized"
    );

    Ok(orchestrator)
}
