//! Language-model collaborators: entity classification, step planning, and
//! result synthesis over a chat-completions endpoint.
//!
//! The pipeline depends on the `LanguageModel` trait, not on the HTTP
//! client, so tests can script collaborator behavior. Responses are parsed
//! once, directly into the target types; anything that does not match the
//! expected envelope is a schema error and the caller decides how far to
//! degrade.

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

use crate::collectors::{CallFailure, RETRY_DELAY};
use crate::config::LlmConfig;
use crate::error::{Result, TriageError};
use crate::metrics::METRICS;

use super::schemas::{Entity, PlannedStep, TaskContext};

const ENTITY_CLASSIFIER_PROMPT: &str = r#"You are an entity classifier for Kubernetes operations.
Identify the entities named in the user query and classify each one.
Entity types: service, pod, trace, metric, error.

Respond with a JSON object only, no prose:
{
  "entities": [
    {"type": "service", "name": "checkout", "namespace": "shop", "confidence": 0.9}
  ]
}

Omit "namespace" when the query does not name one. Confidence is a number
between 0 and 1. Return {"entities": []} when nothing matches."#;

const STEP_PLANNER_PROMPT: &str = r#"You are a reasoning engine for Kubernetes diagnostics.
Break the user query into the smallest set of executable steps. Each step
names the agent that runs it:
- "control_plane": full cluster control-plane health sweep
- "tracing": service trace analysis; actions are "list_services",
  "list_operations", and "analyze_traces" (parameters: service, operation,
  time_window_minutes, limit)

"depends_on" lists the step numbers whose output a step needs; steps with
disjoint dependencies run concurrently.

Respond with a JSON object only, no prose:
{
  "reasoning_steps": [
    {
      "step": 1,
      "action": "analyze_traces",
      "agent": "tracing",
      "parameters": {"service": "checkout"},
      "rationale": "why this step is needed",
      "depends_on": []
    }
  ]
}"#;

const RESULT_SYNTHESIZER_PROMPT: &str = r#"You are a result synthesizer for Kubernetes diagnostics.
Combine the collected technical data into a clear, actionable summary for an
operator. State the overall health first, then the findings that matter,
then recommendations in priority order. Do not invent data that is not in
the results."#;

/// The collaborator seam the pipeline is written against.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Extract typed entities from raw query text.
    async fn classify_entities(&self, query: &str) -> Result<Vec<Entity>>;

    /// Turn a query and its entities into an executable step plan.
    async fn plan_steps(&self, query: &str, entities: &[Entity]) -> Result<Vec<PlannedStep>>;

    /// Compose a prose answer from the task context and the collected step
    /// results, which arrive keyed in planned order.
    async fn synthesize(
        &self,
        context: &TaskContext,
        results: &IndexMap<String, Value>,
    ) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

#[derive(Deserialize)]
struct EntityEnvelope {
    entities: Vec<Entity>,
}

#[derive(Deserialize)]
struct PlanEnvelope {
    reasoning_steps: Vec<PlannedStep>,
}

/// Chat-completions client. The key is read from the environment once at
/// construction and never logged; a missing key fails each call with a
/// config error so deterministic paths keep working without one.
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
    api_key: Option<SecretString>,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(
                env = %config.api_key_env,
                "no API key found; language model calls will fail and queries will degrade"
            );
        }

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    async fn chat(&self, operation: &str, messages: Vec<ChatMessage>) -> Result<String> {
        let start = Instant::now();

        let mut attempt = 0;
        let result = loop {
            attempt += 1;

            match self.call_chat(&messages).await {
                Ok(content) => break Ok(content),
                Err(failure) => {
                    if failure.transient && attempt <= self.config.retry_attempts {
                        warn!(
                            operation,
                            attempt,
                            error = %failure.error,
                            "language model call failed, retrying"
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    break Err(failure.error);
                }
            }
        };

        METRICS.record_llm_request(operation, result.is_ok());
        debug!(
            operation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            success = result.is_ok(),
            "language model call finished"
        );
        result
    }

    async fn call_chat(&self, messages: &[ChatMessage]) -> std::result::Result<String, CallFailure> {
        let Some(key) = &self.api_key else {
            return Err(CallFailure::terminal(TriageError::Config(format!(
                "no API key in {}",
                self.config.api_key_env
            ))));
        };

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: messages.to_vec(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", key.expose_secret()))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CallFailure::from_status("language model", status, text));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| CallFailure::terminal(TriageError::Schema(e.to_string())))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                CallFailure::terminal(TriageError::Schema(
                    "completion contained no choices".to_string(),
                ))
            })?;

        if content.trim().is_empty() {
            return Err(CallFailure::terminal(TriageError::Schema(
                "completion content was empty".to_string(),
            )));
        }

        Ok(content)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn classify_entities(&self, query: &str) -> Result<Vec<Entity>> {
        let messages = vec![
            ChatMessage::system(ENTITY_CLASSIFIER_PROMPT),
            ChatMessage::user(query),
        ];

        let content = self.chat("classify_entities", messages).await?;
        parse_entities(&content)
    }

    async fn plan_steps(&self, query: &str, entities: &[Entity]) -> Result<Vec<PlannedStep>> {
        let messages = vec![
            ChatMessage::system(STEP_PLANNER_PROMPT),
            ChatMessage::user(query),
            ChatMessage::user(format!(
                "Entities found: {}",
                serde_json::to_string(entities)?
            )),
        ];

        let content = self.chat("plan_steps", messages).await?;
        parse_plan(&content)
    }

    async fn synthesize(
        &self,
        context: &TaskContext,
        results: &IndexMap<String, Value>,
    ) -> Result<String> {
        let messages = vec![
            ChatMessage::system(RESULT_SYNTHESIZER_PROMPT),
            ChatMessage::user(format!(
                "Previous context: {}",
                serde_json::to_string(context)?
            )),
            ChatMessage::user(format!(
                "Agent results: {}",
                serde_json::to_string(results)?
            )),
        ];

        self.chat("synthesize", messages).await
    }
}

/// Parse the classifier envelope. One pass, no re-encoding; a mismatch is a
/// schema error the caller degrades from.
fn parse_entities(content: &str) -> Result<Vec<Entity>> {
    let envelope: EntityEnvelope = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| TriageError::Schema(format!("entity classification: {e}")))?;
    Ok(envelope.entities.into_iter().map(Entity::clamped).collect())
}

/// Parse the planner envelope.
fn parse_plan(content: &str) -> Result<Vec<PlannedStep>> {
    let envelope: PlanEnvelope = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| TriageError::Schema(format!("step plan: {e}")))?;
    Ok(envelope.reasoning_steps)
}

/// Models occasionally wrap the JSON payload in a markdown fence despite the
/// prompt. Unwrap it; anything else is returned trimmed, as-is.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    match inner.strip_suffix("```") {
        Some(body) => body.trim(),
        None => trimmed,
    }
}
