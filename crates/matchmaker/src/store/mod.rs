//! Durable mirror of participants and matches

mod memory;
mod redis;
mod traits;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;
pub use self::traits::*;

use config::StoreConfig;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    InMemory,
    Redis,
}

impl FromStr for StoreType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inmemory" | "in_memory" | "memory" => Ok(StoreType::InMemory),
            "redis" => Ok(StoreType::Redis),
            other => Err(StoreError::Other(format!("unknown store type: {}", other))),
        }
    }
}

pub async fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn MatchmakingStore>> {
    match config.store_type.parse::<StoreType>()? {
        StoreType::InMemory => {
            info!("Creating in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreType::Redis => {
            let redis_config = config.redis.as_ref().ok_or_else(|| {
                StoreError::Other("redis section required for the redis store".to_string())
            })?;
            info!("Creating Redis store");
            Ok(Arc::new(RedisStore::new(redis_config).await?))
        }
    }
}
