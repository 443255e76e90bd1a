use crate::*;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("{field} must be between 0 and 1, got: {value}")]
    InvalidThreshold { field: String, value: f64 },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Embedding: {message}")]
    InvalidEmbedding { message: String },

    #[error("Invalid store type: {0}. Must be one of: memory, redis")]
    InvalidStoreType(String),

    #[error("Store: {message}")]
    InvalidStore { message: String },

    #[error("Persistence: {message}")]
    InvalidPersistence { message: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Environment variable '{var}' is missing or invalid: {message}")]
    InvalidEnvVar { var: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

pub fn validate_config(config: &TandemConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.service.name.trim().is_empty() {
        report.add_error(ValidationError::MissingServiceName);
    }

    validate_matching(&config.matching, &mut report);
    validate_janitor(&config.janitor, &mut report);
    validate_embedding(&config.embedding, &mut report);
    validate_store(&config.store, &mut report);
    validate_persistence(&config.persistence, &mut report);

    let formats = ["pretty", "json", "compact"];
    if !formats.contains(&config.logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }

    report
}

fn check_unit_interval(field: &str, value: f64, report: &mut ValidationReport) {
    if !(0.0..=1.0).contains(&value) {
        report.add_error(ValidationError::InvalidThreshold {
            field: field.to_string(),
            value,
        });
    }
}

fn check_positive(field: &str, value: u64, report: &mut ValidationReport) {
    if value == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: field.to_string(),
        });
    }
}

fn validate_matching(matching: &MatchingConfig, report: &mut ValidationReport) {
    check_unit_interval(
        "matching.similarity_threshold",
        matching.similarity_threshold,
        report,
    );
    check_unit_interval(
        "matching.semantic_threshold",
        matching.semantic_threshold,
        report,
    );
    check_positive(
        "matching.max_common_interests",
        matching.max_common_interests as u64,
        report,
    );
    check_positive("matching.max_interests", matching.max_interests as u64, report);
    check_positive(
        "matching.max_interest_length",
        matching.max_interest_length as u64,
        report,
    );

    if matching.similarity_threshold < 0.2 {
        report.add_warning(
            "matching.similarity_threshold",
            "Thresholds below 0.2 pair nearly everyone",
        );
    }

    if !matching.recompute_on_resubmit {
        report.add_warning(
            "matching.recompute_on_resubmit",
            "Resubmitted interests will be matched with the embedding of the first submission",
        );
    }
}

fn validate_janitor(janitor: &JanitorConfig, report: &mut ValidationReport) {
    if !janitor.enabled {
        report.add_warning("janitor.enabled", "Stale participants will never be evicted");
        return;
    }

    check_positive("janitor.interval_seconds", janitor.interval_seconds, report);
    check_positive("janitor.staleness_seconds", janitor.staleness_seconds, report);
    check_positive(
        "janitor.max_evictions_per_sweep",
        janitor.max_evictions_per_sweep as u64,
        report,
    );

    if janitor.interval_seconds > janitor.staleness_seconds {
        report.add_warning(
            "janitor.interval_seconds",
            "Sweep interval is longer than the staleness threshold",
        );
    }
}

fn validate_embedding(embedding: &EmbeddingConfig, report: &mut ValidationReport) {
    check_positive("embedding.timeout_ms", embedding.timeout_ms, report);
    check_positive("embedding.dimension", embedding.dimension as u64, report);

    match embedding.provider {
        EmbeddingProviderKind::Http => match &embedding.endpoint {
            None => report.add_error(ValidationError::InvalidEmbedding {
                message: "endpoint is required for the http provider".to_string(),
            }),
            Some(endpoint) => {
                if has_unresolved_env_vars(endpoint) {
                    report.add_error(ValidationError::InvalidEnvVar {
                        var: endpoint.clone(),
                        message: "embedding.endpoint references an unset variable".to_string(),
                    });
                } else if let Err(e) = Url::parse(endpoint) {
                    report.add_error(ValidationError::InvalidEmbedding {
                        message: format!("endpoint '{}' is not a valid URL: {}", endpoint, e),
                    });
                }
            }
        },
        EmbeddingProviderKind::Hashing => {
            report.add_warning(
                "embedding.provider",
                "Hashing embeddings match on shared words only; use http or local for semantic matching",
            );
        }
        EmbeddingProviderKind::Local => {
            if embedding.model != default_embedding_model() {
                report.add_warning(
                    "embedding.model",
                    "The local provider always loads all-MiniLM-L6-v2",
                );
            }
        }
    }

    if let Some(key) = &embedding.api_key {
        if has_unresolved_env_vars(key) {
            report.add_error(ValidationError::InvalidEnvVar {
                var: key.clone(),
                message: "embedding.api_key references an unset variable".to_string(),
            });
        }
    }
}

fn validate_store(store: &StoreConfig, report: &mut ValidationReport) {
    match store.store_type.to_lowercase().as_str() {
        "memory" | "inmemory" | "in_memory" => {
            report.add_warning(
                "store.type",
                "In-memory store keeps no records across restarts",
            );
        }
        "redis" => match &store.redis {
            None => report.add_error(ValidationError::InvalidStore {
                message: "redis section is required when type is redis".to_string(),
            }),
            Some(redis) => {
                if redis.host.is_empty() {
                    report.add_error(ValidationError::InvalidStore {
                        message: "redis.host is required".to_string(),
                    });
                }
                if redis.key_prefix.is_empty() {
                    report.add_error(ValidationError::InvalidStore {
                        message: "redis.key_prefix must not be empty".to_string(),
                    });
                }
            }
        },
        other => report.add_error(ValidationError::InvalidStoreType(other.to_string())),
    }
}

fn validate_persistence(persistence: &PersistenceConfig, report: &mut ValidationReport) {
    check_positive(
        "persistence.max_attempts",
        persistence.max_attempts as u64,
        report,
    );

    if persistence.base_delay_ms > persistence.max_delay_ms {
        report.add_error(ValidationError::InvalidPersistence {
            message: format!(
                "base_delay_ms ({}) exceeds max_delay_ms ({})",
                persistence.base_delay_ms, persistence.max_delay_ms
            ),
        });
    }
}
