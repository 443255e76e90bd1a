//! Text-to-vector providers
//!
//! The engine only sees [`EmbeddingProvider`]. Three adapters exist:
//! an OpenAI-compatible HTTP endpoint, a deterministic feature-hashing
//! embedder for offline use, and an in-process sentence-transformer behind
//! the `local-model` feature.

mod hashing;
mod http;
#[cfg(feature = "local-model")]
mod local;

pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;
#[cfg(feature = "local-model")]
pub use local::LocalEmbedder;

use async_trait::async_trait;
use config::{EmbeddingConfig, EmbeddingProviderKind};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type EmbeddingResult<T> = std::result::Result<T, EmbeddingError>;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One vector for the whole interest list
    async fn embed(&self, interests: &[String]) -> EmbeddingResult<Vec<f32>>;

    /// One vector per interest, in input order
    async fn embed_each(&self, interests: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(interests.len());
        for interest in interests {
            vectors.push(self.embed(std::slice::from_ref(interest)).await?);
        }
        Ok(vectors)
    }
}

/// Everything the engine needs to match and explain a participant
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEmbeddings {
    pub profile: Vec<f32>,
    pub per_interest: Vec<Vec<f32>>,
}

/// Compute the profile vector and per-interest vectors, bounded by `timeout`.
pub async fn embed_profile(
    provider: &dyn EmbeddingProvider,
    interests: &[String],
    timeout: Duration,
) -> EmbeddingResult<ProfileEmbeddings> {
    let work = async {
        tokio::try_join!(provider.embed(interests), provider.embed_each(interests))
    };

    let (profile, per_interest) = tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| EmbeddingError::Timeout(timeout))??;

    if per_interest.len() != interests.len() {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {} interest vectors, got {}",
            interests.len(),
            per_interest.len()
        )));
    }

    if let Some(bad) = per_interest.iter().find(|v| v.len() != profile.len()) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: profile.len(),
            actual: bad.len(),
        });
    }

    Ok(ProfileEmbeddings {
        profile,
        per_interest,
    })
}

pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> EmbeddingResult<()> {
    if expected != 0 && vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Build the provider named in configuration
pub fn create_provider(config: &EmbeddingConfig) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    info!(provider = %config.provider, model = %config.model, "Creating embedding provider");

    match config.provider {
        EmbeddingProviderKind::Http => Ok(Arc::new(HttpEmbedder::from_config(config)?)),
        EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        #[cfg(feature = "local-model")]
        EmbeddingProviderKind::Local => Ok(Arc::new(LocalEmbedder::new()?)),
        #[cfg(not(feature = "local-model"))]
        EmbeddingProviderKind::Local => Err(EmbeddingError::ModelUnavailable(
            "built without the local-model feature".to_string(),
        )),
    }
}
