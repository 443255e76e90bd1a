//! Test doubles shared by the unit tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Participant;
use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingResult, ProfileEmbeddings};

pub fn participant(id: &str, interests: &[&str], embedding: Vec<f32>) -> Participant {
    let interests: Vec<String> = interests.iter().map(|s| s.to_string()).collect();
    Participant::waiting(
        id.into(),
        interests,
        ProfileEmbeddings {
            profile: embedding,
            per_interest: Vec::new(),
        },
        Utc::now(),
    )
}

/// Embedding provider answering from fixed tables.
///
/// Profile vectors are keyed by the whole interest list and unknown lists are
/// an error. Unknown single interests embed to a zero vector.
#[derive(Clone)]
pub struct ScriptedEmbedder {
    dimension: usize,
    profiles: HashMap<Vec<String>, Vec<f32>>,
    interests: HashMap<String, Vec<f32>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            profiles: HashMap::new(),
            interests: HashMap::new(),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn profile(mut self, interests: &[&str], vector: Vec<f32>) -> Self {
        let key = interests.iter().map(|s| s.to_string()).collect();
        self.profiles.insert(key, vector);
        self
    }

    pub fn interest(mut self, interest: &str, vector: Vec<f32>) -> Self {
        self.interests.insert(interest.to_string(), vector);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `embed` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn embed(&self, interests: &[String]) -> EmbeddingResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.profiles
            .get(interests)
            .cloned()
            .ok_or_else(|| EmbeddingError::ModelUnavailable(format!("no vector for {:?}", interests)))
    }

    async fn embed_each(&self, interests: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(interests
            .iter()
            .map(|i| {
                self.interests
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimension])
            })
            .collect())
    }
}
