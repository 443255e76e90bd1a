//! Interest-based matchmaking for Tandem
//!
//! Participants submit a list of interests. The [`Matchmaker`] embeds them,
//! compares the result against everyone in the [`WaitingPool`] and pairs the
//! requester with the most similar waiting participant whose cosine
//! similarity is strictly above the configured threshold.
//!
//! # Layout
//!
//! - [`pool`], [`similarity`], [`interests`], [`lifecycle`] - pure matching logic
//! - [`engine`] - the orchestrator owning the single state lock
//! - [`embedding`] - text-to-vector providers (HTTP, hashing, local model)
//! - [`store`] - durable mirror of participants and matches (memory, Redis)
//! - [`persistence`] - ordered write-behind queue between engine and store
//! - [`janitor`] - periodic eviction of stale participants
//! - `api` - axum routes, behind the `api` feature

pub mod domain;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod interests;
pub mod janitor;
pub mod lifecycle;
pub mod metrics;
pub mod persistence;
pub mod pool;
pub mod result;
pub mod similarity;
pub mod store;

#[cfg(feature = "api")]
pub mod api;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{Match, MatchStatus, Participant, ParticipantRecord, ParticipantStatus};
pub use embedding::{EmbeddingError, EmbeddingProvider, ProfileEmbeddings};
pub use engine::{MatchSettings, Matchmaker};
pub use error::{MatchmakingError, MatchmakingResult};
pub use janitor::Janitor;
pub use metrics::{MatchmakingMetrics, MetricsSnapshot};
pub use persistence::{PersistOp, PersistenceWriter, RetryPolicy};
pub use pool::WaitingPool;
pub use result::{EndMatchOutcome, ParticipantSummary, SubmitOutcome};
pub use store::{create_store, MatchmakingStore, StoreError, StoreResult, StoreType};
