use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};

/// In-process `all-MiniLM-L6-v2` (384 dimensions).
///
/// Inference is CPU-bound, so every call runs on the blocking pool.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn new() -> EmbeddingResult<Self> {
        info!("Loading local embedding model all-MiniLM-L6-v2");
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }

    async fn run(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let expected = texts.len();

        let vectors = tokio::task::spawn_blocking(move || model.lock().embed(texts, None))
            .await
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        if vectors.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    async fn embed(&self, interests: &[String]) -> EmbeddingResult<Vec<f32>> {
        self.run(vec![interests.join(" ")])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }

    async fn embed_each(&self, interests: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if interests.is_empty() {
            return Ok(Vec::new());
        }
        self.run(interests.to_vec()).await
    }
}
