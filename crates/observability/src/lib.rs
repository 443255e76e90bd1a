//! Observability for the Tandem service
//!
//! - Structured logging via tracing, in pretty, json or compact form
//! - A Prometheus exporter plus per-server request metrics
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("tandem", LogFormat::Json, "info")?;
//! observability::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, RequestMetricsGuard, ServerMetrics};
