use async_trait::async_trait;
use config::EmbeddingConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{check_dimension, EmbeddingError, EmbeddingProvider, EmbeddingResult};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
///
/// The profile vector embeds the interests joined by single spaces as one
/// input; per-interest vectors are fetched in a single batched request.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> EmbeddingResult<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            EmbeddingError::ModelUnavailable("http provider requires an endpoint".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            dimension: config.dimension,
        })
    }

    async fn request(&self, input: Vec<String>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let expected = input.len();
        let body = EmbeddingRequest {
            model: &self.model,
            input,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, endpoint = %self.endpoint, "Embedding request failed");
            if e.is_timeout() {
                EmbeddingError::ModelUnavailable(format!("request timed out: {}", e))
            } else {
                EmbeddingError::ModelUnavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, error = %text, "Embedding endpoint returned an error");
            return Err(EmbeddingError::ModelUnavailable(format!(
                "endpoint returned {}: {}",
                status, text
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            check_dimension(vector, self.dimension)?;
        }

        debug!(count = vectors.len(), "Embeddings received");
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn name(&self) -> &str {
        "http"
    }

    async fn embed(&self, interests: &[String]) -> EmbeddingResult<Vec<f32>> {
        let text = interests.join(" ");
        self.request(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }

    async fn embed_each(&self, interests: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if interests.is_empty() {
            return Ok(Vec::new());
        }
        self.request(interests.to_vec()).await
    }
}
