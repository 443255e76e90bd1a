//! HTTP server lifecycle for Tandem
//!
//! [`HttpServer`] serves an application router until a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) fires.
//! [`ShutdownController`] turns Ctrl+C and SIGTERM into that cancellation
//! and hands child tokens to background workers.
//!
//! ```ignore
//! let shutdown = ShutdownController::with_signals();
//! let server = HttpServer::new(ServerConfig::from(&config.server), app);
//! server.run(shutdown.child_token()).await?;
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod shutdown;
pub mod traits;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use http::HttpServer;
pub use shutdown::{run_until_shutdown, ShutdownController};
pub use traits::{Server, ServerExt};
