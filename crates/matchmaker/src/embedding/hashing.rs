use async_trait::async_trait;

use super::{EmbeddingProvider, EmbeddingResult};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercased word, and each whole interest, is hashed into one signed
/// bucket; the result is L2-normalized. Lists sharing words score high,
/// unrelated lists score near zero. No model or network is needed, which makes
/// it the default for development and offline deployments.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }

    fn vectorize(&self, interests: &[String]) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for interest in interests {
            let normalized = interest.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            self.add_feature(&mut vector, &normalized, 1.0);
            for word in normalized.split(|c: char| !c.is_alphanumeric()) {
                if !word.is_empty() {
                    self.add_feature(&mut vector, word, 1.0);
                }
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, interests: &[String]) -> EmbeddingResult<Vec<f32>> {
        Ok(self.vectorize(interests))
    }

    async fn embed_each(&self, interests: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(interests
            .iter()
            .map(|i| self.vectorize(std::slice::from_ref(i)))
            .collect())
    }
}
