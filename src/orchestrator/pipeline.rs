//! The orchestration pipeline: from raw query text to a synthesized answer.
//!
//! A query moves through fixed stages: entity classification, step
//! planning, dependency-wave execution, cross-signal correlation, and
//! synthesis. Collaborator failures degrade the result instead of aborting
//! it; the only hard failure is a plan whose every step failed.

use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collectors::TraceQuery;
use crate::config::AnalysisConfig;
use crate::controlplane::ControlPlaneAnalyzer;
use crate::correlation::{correlate, CorrelationOutcome};
use crate::error::{Result, TriageError};
use crate::metrics::METRICS;
use crate::traces::TraceAnalyzer;

use super::history::ConversationStore;
use super::llm::LanguageModel;
use super::schemas::{
    AnalysisRequest, Entity, EntityKind, HealthAnalysis, PlannedStep, QueryOutcome, StepOutput,
    StepRecord, StepStatus, TaskContext, TaskStage,
};

/// Drives queries and health analyses against the injected collaborators.
/// One instance per process; all methods take `&self` and are safe to call
/// concurrently.
pub struct Orchestrator {
    control_plane: Arc<ControlPlaneAnalyzer>,
    traces: Arc<TraceAnalyzer>,
    llm: Arc<dyn LanguageModel>,
    conversations: Arc<ConversationStore>,
    config: AnalysisConfig,
    workers: Semaphore,
}

impl Orchestrator {
    pub fn new(
        control_plane: Arc<ControlPlaneAnalyzer>,
        traces: Arc<TraceAnalyzer>,
        llm: Arc<dyn LanguageModel>,
        config: AnalysisConfig,
    ) -> Self {
        let workers = Semaphore::new(config.worker_pool_size);
        Self {
            control_plane,
            traces,
            llm,
            conversations: Arc::new(ConversationStore::new()),
            config,
            workers,
        }
    }

    /// Process one natural-language query. A missing conversation id mints a
    /// fresh conversation.
    ///
    /// Classification and planning failures degrade to an empty result and
    /// the pipeline keeps going; synthesis failures fall back to a local
    /// summary. The call fails only when a non-empty plan had every step
    /// fail, which means nothing was collected at all.
    pub async fn process_query(
        &self,
        query: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<QueryOutcome> {
        let started = Instant::now();
        let conversation_id = conversation_id.unwrap_or_else(Uuid::new_v4);
        let task_id = Uuid::new_v4();

        self.conversations.register(conversation_id);
        let mut context = TaskContext::new(task_id, conversation_id);
        info!(%task_id, %conversation_id, "processing query");

        // Classification is advisory. A malformed response means zero
        // entities, not a dead query.
        let entities = match self.llm.classify_entities(query).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(error = %e, "entity classification failed, continuing without entities");
                Vec::new()
            }
        };
        context.entities = entities.clone();
        context.stage = TaskStage::EntitiesClassified;
        debug!(count = entities.len(), "entities classified");

        // Planning degrades the same way: no plan, no steps.
        let steps = match self.llm.plan_steps(query, &entities).await {
            Ok(steps) => steps,
            Err(e) => {
                warn!(error = %e, "step planning failed, continuing with an empty plan");
                Vec::new()
            }
        };
        context.stage = TaskStage::PlanGenerated;
        debug!(count = steps.len(), "plan generated");

        context.stage = TaskStage::StepsExecuting;
        let records = self.execute_plan(conversation_id, &steps, &entities).await;
        context.stage = TaskStage::StepsResolved;

        // A non-empty plan where nothing succeeded, was skipped, or even
        // partially resolved means every collector the query needed is down.
        if !records.is_empty() && records.iter().all(|r| r.status == StepStatus::Failed) {
            context.stage = TaskStage::Failed;
            METRICS.record_query("failed", started.elapsed().as_secs_f64());
            return Err(TriageError::Unrecoverable(
                "all planned steps failed; no collector produced a result".to_string(),
            ));
        }

        let correlation = self.correlate_records(&records);
        context.history.extend(records.iter().cloned());

        let results = synthesis_results(&records, correlation.as_ref());
        let (response, synthesis_fell_back) = match self.llm.synthesize(&context, &results).await {
            Ok(prose) => (prose, false),
            Err(e) => {
                warn!(error = %e, "synthesis failed, falling back to a local summary");
                (fallback_summary(&records, correlation.as_ref()), true)
            }
        };
        context.stage = TaskStage::Synthesized;

        let degraded = synthesis_fell_back
            || records
                .iter()
                .any(|r| matches!(r.status, StepStatus::Failed | StepStatus::Skipped));

        let outcome = QueryOutcome {
            conversation_id,
            task_id,
            stage: context.stage,
            entities,
            steps: records,
            correlation,
            response,
            degraded,
        };

        self.conversations.append(outcome.clone());
        METRICS.record_query("completed", started.elapsed().as_secs_f64());
        info!(%task_id, degraded, "query processed");

        Ok(outcome)
    }

    /// Deterministic health analysis with no language-model involvement.
    /// Requested sides run concurrently; one side failing degrades the
    /// result, both failing is unrecoverable, and asking for nothing yields
    /// an empty healthy analysis.
    pub async fn analyze_system_health(&self, request: &AnalysisRequest) -> Result<HealthAnalysis> {
        let want_control_plane = request.include_control_plane;
        // The tracing side needs a service to query; without a name it is
        // simply not part of this analysis.
        let want_tracing = request.include_tracing && !request.service_name.is_empty();

        info!(
            service = %request.service_name,
            control_plane = want_control_plane,
            tracing = want_tracing,
            "analyzing system health"
        );

        let (control_plane_result, tracing_result) = tokio::join!(
            async {
                if want_control_plane {
                    Some(self.control_plane.snapshot().await)
                } else {
                    None
                }
            },
            async {
                if want_tracing {
                    Some(self.traces.analyze(&self.health_trace_query(request)).await)
                } else {
                    None
                }
            },
        );

        let mut requested = 0usize;
        let mut failed = 0usize;

        let control_plane = match control_plane_result {
            Some(Ok(snapshot)) => {
                requested += 1;
                Some(snapshot)
            }
            Some(Err(e)) => {
                requested += 1;
                failed += 1;
                warn!(error = %e, "control-plane analysis failed");
                None
            }
            None => None,
        };

        let tracing = match tracing_result {
            Some(Ok(snapshot)) => {
                requested += 1;
                Some(snapshot)
            }
            Some(Err(e)) => {
                requested += 1;
                failed += 1;
                warn!(service = %request.service_name, error = %e, "trace analysis failed");
                None
            }
            None => None,
        };

        if requested > 0 && failed == requested {
            METRICS.record_health_analysis("failed");
            return Err(TriageError::Unrecoverable(
                "every requested collector failed; nothing to analyze".to_string(),
            ));
        }

        // Correlation needs both sides; anything less yields empty lists,
        // never a partial pass.
        let correlation = match (&control_plane, &tracing) {
            (Some(cp), Some(trace)) => {
                let outcome = correlate(cp, trace);
                record_correlation_metrics(&outcome);
                outcome
            }
            _ => CorrelationOutcome::default(),
        };

        let degraded = failed > 0;
        METRICS.record_health_analysis(if degraded { "degraded" } else { "completed" });
        info!(
            degraded,
            issues = correlation.issues.len(),
            recommendations = correlation.recommendations.len(),
            "system health analysis complete"
        );

        Ok(HealthAnalysis {
            timestamp: Utc::now(),
            control_plane,
            tracing,
            correlation,
            degraded,
        })
    }

    /// Stop scheduling not-yet-started steps for the conversation's active
    /// task. In-flight calls drain and their results are discarded. Returns
    /// whether the conversation was known.
    pub fn cancel_conversation(&self, conversation_id: &Uuid) -> bool {
        let known = self.conversations.cancel(conversation_id);
        if known {
            info!(%conversation_id, "conversation cancelled");
        }
        known
    }

    /// Outcomes recorded for a conversation, oldest first.
    pub fn conversation_history(&self, conversation_id: &Uuid) -> Vec<QueryOutcome> {
        self.conversations.history(conversation_id)
    }

    /// Run the plan in dependency waves. Steps whose dependencies are all
    /// satisfied run concurrently under the worker pool; a step whose
    /// dependency did not succeed is skipped without running. Records come
    /// back in planned order regardless of completion order.
    async fn execute_plan(
        &self,
        conversation_id: Uuid,
        steps: &[PlannedStep],
        entities: &[Entity],
    ) -> Vec<StepRecord> {
        let mut records: Vec<StepRecord> = steps.iter().cloned().map(StepRecord::pending).collect();
        let mut remaining: Vec<usize> = (0..records.len()).collect();

        while !remaining.is_empty() {
            if self.conversations.is_cancelled(&conversation_id) {
                info!(%conversation_id, "cancelled, skipping remaining steps");
                self.skip_steps(&mut records, &remaining, "conversation cancelled");
                break;
            }

            let (runnable, blocked) = partition_wave(&records, &remaining);

            if runnable.is_empty() && blocked.is_empty() {
                // Nothing is ready and nothing is terminally blocked: the
                // plan has a dependency cycle or a self-reference.
                warn!("plan has unresolvable dependencies, skipping remaining steps");
                self.skip_steps(&mut records, &remaining, "unresolvable step dependency");
                break;
            }

            for &idx in &blocked {
                debug!(step = records[idx].step.step, "dependency did not succeed, skipping");
                records[idx].status = StepStatus::Skipped;
                records[idx].error = Some("dependency did not succeed".to_string());
                METRICS.record_step(&records[idx].step.agent, "skipped");
            }
            remaining.retain(|idx| !blocked.contains(idx));

            if runnable.is_empty() {
                continue;
            }

            for &idx in &runnable {
                records[idx].status = StepStatus::Running;
            }

            let wave: Vec<_> = runnable
                .iter()
                .map(|&idx| {
                    let step = records[idx].step.clone();
                    async move { (idx, self.run_step(&step, entities).await) }
                })
                .collect();
            let results = join_all(wave).await;

            // A cancel that landed mid-wave: the calls drained, their
            // results are discarded.
            let cancelled = self.conversations.is_cancelled(&conversation_id);

            for (idx, result) in results {
                if cancelled {
                    records[idx].status = StepStatus::Skipped;
                    records[idx].error = Some("conversation cancelled".to_string());
                    METRICS.record_step(&records[idx].step.agent, "skipped");
                    continue;
                }
                match result {
                    Ok(output) => {
                        records[idx].status = StepStatus::Success;
                        records[idx].output = Some(output);
                        METRICS.record_step(&records[idx].step.agent, "success");
                    }
                    Err(e) => {
                        warn!(
                            step = records[idx].step.step,
                            action = %records[idx].step.action,
                            error = %e,
                            "step failed"
                        );
                        records[idx].status = StepStatus::Failed;
                        records[idx].error = Some(e.to_string());
                        METRICS.record_step(&records[idx].step.agent, "failed");
                    }
                }
            }
            remaining.retain(|idx| !runnable.contains(idx));
        }

        records
    }

    fn skip_steps(&self, records: &mut [StepRecord], indices: &[usize], reason: &str) {
        for &idx in indices {
            records[idx].status = StepStatus::Skipped;
            records[idx].error = Some(reason.to_string());
            METRICS.record_step(&records[idx].step.agent, "skipped");
        }
    }

    /// Dispatch one step to its agent under a worker permit.
    async fn run_step(&self, step: &PlannedStep, entities: &[Entity]) -> Result<StepOutput> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| TriageError::Unrecoverable("worker pool closed".to_string()))?;

        let started = Instant::now();
        debug!(step = step.step, agent = %step.agent, action = %step.action, "executing step");

        let result = match step.agent.as_str() {
            "control_plane" | "k8s" => self
                .control_plane
                .snapshot()
                .await
                .map(|snapshot| StepOutput::ControlPlane(Box::new(snapshot))),
            "tracing" => self.run_tracing_step(step, entities).await,
            other => Err(TriageError::InvalidTarget(format!(
                "step {} names unknown agent '{other}'",
                step.step
            ))),
        };

        METRICS
            .step_duration
            .with_label_values(&[&step.action])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    async fn run_tracing_step(
        &self,
        step: &PlannedStep,
        entities: &[Entity],
    ) -> Result<StepOutput> {
        match step.action.as_str() {
            "list_services" => self.traces.services().await.map(StepOutput::Services),
            "list_operations" => {
                let service = self.step_service(step, entities)?;
                self.traces
                    .operations(&service)
                    .await
                    .map(StepOutput::Operations)
            }
            // Any other tracing action is a trace analysis.
            _ => {
                let service = self.step_service(step, entities)?;
                let query = self.step_trace_query(step, service);
                self.traces
                    .analyze(&query)
                    .await
                    .map(|snapshot| StepOutput::Trace(Box::new(snapshot)))
            }
        }
    }

    /// Target service for a tracing step: the `service` parameter when the
    /// plan carries one, otherwise the first service entity the classifier
    /// found.
    fn step_service(&self, step: &PlannedStep, entities: &[Entity]) -> Result<String> {
        step.parameters
            .get("service")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                entities
                    .iter()
                    .find(|entity| entity.kind == EntityKind::Service)
                    .map(|entity| entity.name.clone())
            })
            .ok_or_else(|| {
                TriageError::InvalidTarget(format!(
                    "step {} needs a service and none was named or classified",
                    step.step
                ))
            })
    }

    fn step_trace_query(&self, step: &PlannedStep, service: String) -> TraceQuery {
        let limit = step
            .parameters
            .get("limit")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(self.config.trace_limit);

        let mut query = TraceQuery::for_service(service, limit);
        query.operation = step
            .parameters
            .get("operation")
            .and_then(Value::as_str)
            .map(str::to_string);

        let window_minutes = step
            .parameters
            .get("time_window_minutes")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.default_time_window_minutes);
        let end = Utc::now();
        let start = end - chrono::Duration::minutes(window_minutes as i64);
        query.start_micros = Some(start.timestamp_micros());
        query.end_micros = Some(end.timestamp_micros());

        query
    }

    fn health_trace_query(&self, request: &AnalysisRequest) -> TraceQuery {
        let mut query =
            TraceQuery::for_service(request.service_name.clone(), self.config.trace_limit);
        query.operation = request.operation_name.clone();

        let window_minutes = request
            .time_window_minutes
            .unwrap_or(self.config.default_time_window_minutes);
        let end = Utc::now();
        let start = end - chrono::Duration::minutes(window_minutes as i64);
        query.start_micros = Some(start.timestamp_micros());
        query.end_micros = Some(end.timestamp_micros());

        query
    }

    /// Correlate the first control-plane output with the first trace output,
    /// in planned order. Anything less than one of each yields no
    /// correlation at all.
    fn correlate_records(&self, records: &[StepRecord]) -> Option<CorrelationOutcome> {
        let control_plane = records.iter().find_map(|record| match &record.output {
            Some(StepOutput::ControlPlane(snapshot)) => Some(snapshot.as_ref()),
            _ => None,
        });
        let trace = records.iter().find_map(|record| match &record.output {
            Some(StepOutput::Trace(snapshot)) => Some(snapshot.as_ref()),
            _ => None,
        });

        match (control_plane, trace) {
            (Some(cp), Some(tr)) => {
                let outcome = correlate(cp, tr);
                record_correlation_metrics(&outcome);
                Some(outcome)
            }
            _ => None,
        }
    }
}

/// Split the remaining step indices into those whose dependencies are all
/// satisfied (runnable) and those with a dependency that terminally did not
/// succeed or does not exist (blocked). Steps waiting on a still-pending
/// dependency land in neither list.
fn partition_wave(records: &[StepRecord], remaining: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let status_by_number: HashMap<u32, StepStatus> = records
        .iter()
        .map(|record| (record.step.step, record.status))
        .collect();

    let mut runnable = Vec::new();
    let mut blocked = Vec::new();

    'steps: for &idx in remaining {
        let mut waiting = false;
        for dep in &records[idx].step.depends_on {
            match status_by_number.get(dep) {
                Some(StepStatus::Success) => {}
                Some(StepStatus::Failed) | Some(StepStatus::Skipped) | None => {
                    blocked.push(idx);
                    continue 'steps;
                }
                Some(StepStatus::Pending) | Some(StepStatus::Running) => {
                    waiting = true;
                }
            }
        }
        if !waiting {
            runnable.push(idx);
        }
    }

    (runnable, blocked)
}

/// Step results keyed `step_<n>_<action>` in planned order, plus the
/// correlation entry. The fixed key shape keeps the synthesis input and the
/// fallback summary deterministic.
fn synthesis_results(
    records: &[StepRecord],
    correlation: Option<&CorrelationOutcome>,
) -> IndexMap<String, Value> {
    let mut results = IndexMap::new();
    for record in records {
        let key = format!("step_{}_{}", record.step.step, record.step.action);
        results.insert(key, serde_json::to_value(record).unwrap_or(Value::Null));
    }

    let correlation_value = correlation
        .and_then(|outcome| serde_json::to_value(outcome).ok())
        .unwrap_or(Value::Null);
    results.insert("correlation".to_string(), correlation_value);

    results
}

/// Local summary used when the synthesis collaborator is unavailable.
fn fallback_summary(records: &[StepRecord], correlation: Option<&CorrelationOutcome>) -> String {
    let succeeded = records
        .iter()
        .filter(|r| r.status == StepStatus::Success)
        .count();

    let mut summary = format!(
        "Diagnostics completed: {succeeded} of {} steps succeeded.",
        records.len()
    );

    if let Some(outcome) = correlation {
        summary.push_str(&format!(
            " Correlation found {} issue(s) and {} recommendation(s).",
            outcome.issues.len(),
            outcome.recommendations.len()
        ));
        if let Some(top) = outcome.recommendations.first() {
            summary.push_str(&format!(
                " Top recommendation [{}]: {}.",
                top.priority, top.action
            ));
        }
    }

    for record in records.iter().filter(|r| r.status == StepStatus::Failed) {
        summary.push_str(&format!(
            " Step {} ({}) failed: {}.",
            record.step.step,
            record.step.action,
            record.error.as_deref().unwrap_or("unknown error")
        ));
    }

    summary
}

fn record_correlation_metrics(outcome: &CorrelationOutcome) {
    let kinds: Vec<&str> = outcome.issues.iter().map(|i| i.kind.as_str()).collect();
    let priorities: Vec<&str> = outcome
        .recommendations
        .iter()
        .map(|r| r.priority.as_str())
        .collect();
    METRICS.record_correlation(&kinds, &priorities);
}
