//! Layered configuration: defaults, optional TOML file, environment overrides

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TriageError};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// kubectl execution bridge
    #[serde(default)]
    pub kubectl: KubectlConfig,

    /// Jaeger query service
    #[serde(default)]
    pub jaeger: JaegerConfig,

    /// Language model collaborator
    #[serde(default)]
    pub llm: LlmConfig,

    /// Analysis and orchestration tuning
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load defaults, then the file named by `KUBE_TRIAGE_CONFIG` (if any),
    /// then `KUBE_TRIAGE_`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var("KUBE_TRIAGE_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KUBE_TRIAGE")
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder
            .build()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        let config: Config = raw
            .try_deserialize()
            .map_err(|e| TriageError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.worker_pool_size == 0 {
            return Err(TriageError::Config(
                "analysis.worker_pool_size must be at least 1".to_string(),
            ));
        }
        if self.analysis.trace_limit == 0 {
            return Err(TriageError::Config(
                "analysis.trace_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// kubectl execution bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubectlConfig {
    /// Base URL of the command execution endpoint
    #[serde(default = "default_kubectl_api_url")]
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_collector_timeout")]
    pub timeout_secs: u64,

    /// Retries after a transient transport failure
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_kubectl_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_collector_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    1
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            api_url: default_kubectl_api_url(),
            timeout_secs: default_collector_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl KubectlConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Jaeger query API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JaegerConfig {
    /// Base URL of the Jaeger query service
    #[serde(default = "default_jaeger_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_collector_timeout")]
    pub timeout_secs: u64,

    /// Retries after a transient transport failure
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// TTL for the service/operation catalog cache
    #[serde(default = "default_catalog_cache_ttl")]
    pub catalog_cache_ttl_secs: u64,

    /// Catalog cache capacity
    #[serde(default = "default_catalog_cache_max_entries")]
    pub catalog_cache_max_entries: u64,
}

fn default_jaeger_base_url() -> String {
    "http://localhost:30686".to_string()
}

fn default_catalog_cache_ttl() -> u64 {
    60
}

fn default_catalog_cache_max_entries() -> u64 {
    256
}

impl Default for JaegerConfig {
    fn default() -> Self {
        Self {
            base_url: default_jaeger_base_url(),
            timeout_secs: default_collector_timeout(),
            retry_attempts: default_retry_attempts(),
            catalog_cache_ttl_secs: default_catalog_cache_ttl(),
            catalog_cache_max_entries: default_catalog_cache_max_entries(),
        }
    }
}

impl JaegerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn catalog_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_cache_ttl_secs)
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider (openai, azure, openrouter)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Chat completions endpoint
    #[serde(default = "default_llm_api_url")]
    pub api_url: String,

    /// API key environment variable
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Max completion tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_collector_timeout")]
    pub timeout_secs: u64,

    /// Retries after a transient transport failure
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_model() -> String {
    "gpt-4".to_string()
}

fn default_llm_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_url: default_llm_api_url(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_collector_timeout(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Key material stays wrapped; absent keys are allowed so deterministic
    /// paths can run without one.
    pub fn api_key(&self) -> Option<SecretString> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
    }
}

/// Analysis and orchestration tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Concurrent collector calls per step wave
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Lookback window when a query does not name one
    #[serde(default = "default_time_window_minutes")]
    pub default_time_window_minutes: u64,

    /// Maximum traces fetched per analysis
    #[serde(default = "default_trace_limit")]
    pub trace_limit: u32,
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_time_window_minutes() -> u64 {
    60
}

fn default_trace_limit() -> u32 {
    100
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            default_time_window_minutes: default_time_window_minutes(),
            trace_limit: default_trace_limit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
