//! Configuration for the Tandem matchmaking service
//!
//! The service is configured from a single YAML file. Every section except
//! `embedding` is optional and falls back to the defaults in [`defaults`].
//! String values may reference environment variables as `${VAR}` or
//! `${VAR:-fallback}`; see [`substitution`].

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TandemConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub janitor: JanitorConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(rename = "request_timeout_seconds")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(rename = "cors_enabled")]
    #[serde(default = "default_enabled")]
    pub cors_enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            request_timeout_seconds: default_request_timeout(),
            cors_enabled: default_enabled(),
        }
    }
}

/// Pairing rules
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Minimum cosine similarity (exclusive) for two participants to match
    #[serde(rename = "similarity_threshold")]
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Minimum cosine similarity (exclusive) for two interests to be reported as related
    #[serde(rename = "semantic_threshold")]
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,
    #[serde(rename = "max_common_interests")]
    #[serde(default = "default_max_common_interests")]
    pub max_common_interests: usize,
    /// Recompute embeddings when a waiting participant resubmits different interests
    #[serde(rename = "recompute_on_resubmit")]
    #[serde(default = "default_enabled")]
    pub recompute_on_resubmit: bool,
    #[serde(rename = "max_interests")]
    #[serde(default = "default_max_interests")]
    pub max_interests: usize,
    #[serde(rename = "max_interest_length")]
    #[serde(default = "default_max_interest_length")]
    pub max_interest_length: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            semantic_threshold: default_semantic_threshold(),
            max_common_interests: default_max_common_interests(),
            recompute_on_resubmit: default_enabled(),
            max_interests: default_max_interests(),
            max_interest_length: default_max_interest_length(),
        }
    }
}

/// Stale participant sweep
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JanitorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(rename = "interval_seconds")]
    #[serde(default = "default_janitor_interval")]
    pub interval_seconds: u64,
    #[serde(rename = "staleness_seconds")]
    #[serde(default = "default_staleness_seconds")]
    pub staleness_seconds: u64,
    #[serde(rename = "max_evictions_per_sweep")]
    #[serde(default = "default_max_evictions_per_sweep")]
    pub max_evictions_per_sweep: usize,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_seconds: default_janitor_interval(),
            staleness_seconds: default_staleness_seconds(),
            max_evictions_per_sweep: default_max_evictions_per_sweep(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint
    Http,
    /// Deterministic feature-hashing embedder, no model required
    Hashing,
    /// In-process sentence-transformer (requires the `local-model` feature)
    Local,
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProviderKind::Http => write!(f, "http"),
            EmbeddingProviderKind::Hashing => write!(f, "hashing"),
            EmbeddingProviderKind::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(rename = "api_key")]
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(rename = "timeout_ms")]
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    #[serde(default = "default_store_type")]
    pub store_type: String,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: default_store_type(),
            redis: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "db_index")]
    #[serde(default)]
    pub db_index: u8,
    #[serde(rename = "key_prefix")]
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// Write-behind retry policy for the durable store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    #[serde(rename = "max_attempts")]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(rename = "base_delay_ms")]
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(rename = "max_delay_ms")]
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}
