//! Client for the Jaeger query API

use indexmap::IndexMap;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::{CallFailure, RETRY_DELAY};
use crate::config::JaegerConfig;
use crate::error::{Result, TriageError};
use crate::metrics::METRICS;

/// Search criteria for a trace query.
#[derive(Debug, Clone, Default)]
pub struct TraceQuery {
    pub service: String,
    pub operation: Option<String>,
    pub start_micros: Option<i64>,
    pub end_micros: Option<i64>,
    pub min_duration: Option<String>,
    pub max_duration: Option<String>,
    pub tags: Option<IndexMap<String, String>>,
    pub limit: u32,
}

impl TraceQuery {
    pub fn for_service(service: impl Into<String>, limit: u32) -> Self {
        Self {
            service: service.into(),
            limit,
            ..Default::default()
        }
    }
}

/// One trace as returned by the query API. Durations are milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrace {
    #[serde(rename = "traceID", default)]
    pub trace_id: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpan {
    #[serde(rename = "spanID", default)]
    pub span_id: String,
    #[serde(rename = "serviceName", default)]
    pub service_name: String,
    #[serde(rename = "operationName", default)]
    pub operation_name: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub tags: Vec<RawTag>,
    #[serde(default)]
    pub references: Vec<RawSpanRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTag {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSpanRef {
    #[serde(rename = "spanID", default)]
    pub span_id: String,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

/// Client for the Jaeger query service. Service and operation catalogs are
/// cached with a short TTL since plans frequently list them back to back.
pub struct JaegerClient {
    http: Client,
    config: JaegerConfig,
    catalog: Cache<String, Arc<Vec<String>>>,
}

impl JaegerClient {
    pub fn new(config: JaegerConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        let catalog = Cache::builder()
            .max_capacity(config.catalog_cache_max_entries)
            .time_to_live(config.catalog_cache_ttl())
            .build();

        Ok(Self {
            http,
            config,
            catalog,
        })
    }

    /// All services known to Jaeger.
    pub async fn services(&self) -> Result<Vec<String>> {
        let key = "services".to_string();
        if let Some(hit) = self.catalog.get(&key).await {
            debug!("service catalog served from cache");
            return Ok(hit.as_ref().clone());
        }

        let services: Vec<String> = self
            .get_json("/api/services", &[])
            .await?
            .unwrap_or_default();
        self.catalog.insert(key, Arc::new(services.clone())).await;
        Ok(services)
    }

    /// Operations recorded for one service.
    pub async fn operations(&self, service: &str) -> Result<Vec<String>> {
        let key = format!("operations/{service}");
        if let Some(hit) = self.catalog.get(&key).await {
            debug!(service, "operation catalog served from cache");
            return Ok(hit.as_ref().clone());
        }

        let operations: Vec<String> = self
            .get_json("/api/operations", &[("service".to_string(), service.to_string())])
            .await?
            .unwrap_or_default();
        self.catalog.insert(key, Arc::new(operations.clone())).await;
        Ok(operations)
    }

    /// Traces matching the query criteria.
    pub async fn find_traces(&self, query: &TraceQuery) -> Result<Vec<RawTrace>> {
        let mut params: Vec<(String, String)> = vec![
            ("service".to_string(), query.service.clone()),
            ("limit".to_string(), query.limit.to_string()),
        ];
        if let Some(operation) = &query.operation {
            params.push(("operation".to_string(), operation.clone()));
        }
        if let Some(start) = query.start_micros {
            params.push(("start".to_string(), start.to_string()));
        }
        if let Some(end) = query.end_micros {
            params.push(("end".to_string(), end.to_string()));
        }
        if let Some(min) = &query.min_duration {
            params.push(("minDuration".to_string(), min.clone()));
        }
        if let Some(max) = &query.max_duration {
            params.push(("maxDuration".to_string(), max.clone()));
        }
        if let Some(tags) = &query.tags {
            params.push(("tags".to_string(), serde_json::to_string(tags)?));
        }

        let traces: Vec<RawTrace> = self
            .get_json("/api/traces", &params)
            .await?
            .unwrap_or_default();
        Ok(traces)
    }

    /// One trace by id.
    pub async fn trace(&self, trace_id: &str) -> Result<RawTrace> {
        let path = format!("/api/traces/{trace_id}");
        let traces: Vec<RawTrace> = self.get_json(&path, &[]).await?.unwrap_or_default();
        traces
            .into_iter()
            .next()
            .ok_or_else(|| TriageError::Transport(format!("trace {trace_id} not found")))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Option<T>> {
        let start = Instant::now();

        let mut attempt = 0;
        let result = loop {
            attempt += 1;

            match self.call_get(path, params).await {
                Ok(envelope) => break Ok(envelope),
                Err(failure) => {
                    if failure.transient && attempt <= self.config.retry_attempts {
                        warn!(
                            path,
                            attempt,
                            error = %failure.error,
                            "jaeger call failed, retrying"
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    break Err(failure.error);
                }
            }
        };

        METRICS.record_collector_request("jaeger", result.is_ok(), start.elapsed().as_secs_f64());
        result.map(|envelope: DataEnvelope<T>| envelope.data)
    }

    async fn call_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> std::result::Result<DataEnvelope<T>, CallFailure> {
        let url = format!("{}{}", self.config.base_url, path);

        debug!(path, "querying jaeger");

        let mut request = self.http.get(&url);
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CallFailure::from_status("jaeger", status, text));
        }

        response
            .json()
            .await
            .map_err(|e| CallFailure::terminal(TriageError::Parse(e.to_string())))
    }
}
