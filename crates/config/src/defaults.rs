pub fn default_enabled() -> bool {
    true
}

pub fn default_service_name() -> String {
    "tandem".to_string()
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    5000
}

pub fn default_request_timeout() -> u64 {
    30
}

pub fn default_similarity_threshold() -> f64 {
    0.5
}

pub fn default_semantic_threshold() -> f64 {
    0.6
}

pub fn default_max_common_interests() -> usize {
    5
}

pub fn default_max_interests() -> usize {
    20
}

pub fn default_max_interest_length() -> usize {
    100
}

pub fn default_janitor_interval() -> u64 {
    60
}

/// One hour
pub fn default_staleness_seconds() -> u64 {
    3600
}

pub fn default_max_evictions_per_sweep() -> usize {
    1000
}

pub fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

pub fn default_embedding_timeout_ms() -> u64 {
    5000
}

pub fn default_embedding_dimension() -> usize {
    384
}

pub fn default_store_type() -> String {
    "memory".to_string()
}

pub fn default_redis_port() -> u16 {
    6379
}

pub fn default_redis_key_prefix() -> String {
    "tandem".to_string()
}

pub fn default_max_attempts() -> u32 {
    5
}

pub fn default_base_delay_ms() -> u64 {
    100
}

pub fn default_max_delay_ms() -> u64 {
    5000
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}
