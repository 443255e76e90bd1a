//! Redis store
//!
//! Records are JSON documents under `{prefix}:participant:{id}` and
//! `{prefix}:match:{id}`. Status updates read, modify and write the whole
//! document; the persistence worker is the only writer, so no transaction
//! is needed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MatchId, ParticipantId};
use config::RedisConfig;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{Match, MatchStatus, ParticipantRecord, ParticipantStatus};
use crate::store::traits::{MatchmakingStore, StoreError, StoreResult};

pub struct RedisStore {
    redis: Arc<tokio::sync::Mutex<redis::aio::ConnectionManager>>,
    key_prefix: String,
}

pub(crate) fn connection_url(config: &RedisConfig) -> String {
    if config.password.is_empty() {
        format!("redis://{}:{}/{}", config.host, config.port, config.db_index)
    } else {
        format!(
            "redis://:{}@{}:{}/{}",
            config.password, config.host, config.port, config.db_index
        )
    }
}

impl RedisStore {
    pub async fn new(config: &RedisConfig) -> StoreResult<Self> {
        info!(host = %config.host, port = config.port, db = config.db_index, "Connecting to Redis");

        let client = redis::Client::open(connection_url(config))
            .map_err(|e| StoreError::RedisError(e.to_string()))?;

        let connection_manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::RedisError(e.to_string()))?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(connection_manager)),
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn participant_key(&self, id: &ParticipantId) -> String {
        format!("{}:participant:{}", self.key_prefix, id)
    }

    fn match_key(&self, id: &MatchId) -> String {
        format!("{}:match:{}", self.key_prefix, id)
    }

    async fn write_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let mut redis = self.redis.lock().await;
        redis
            .set::<_, _, ()>(key, json)
            .await
            .map_err(|e| StoreError::RedisError(e.to_string()))
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let raw: Option<String> = {
            let mut redis = self.redis.lock().await;
            redis
                .get(key)
                .await
                .map_err(|e| StoreError::RedisError(e.to_string()))?
        };

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| StoreError::SerializationError(e.to_string()))
        })
        .transpose()
    }
}

#[async_trait]
impl MatchmakingStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn put_participant(&self, record: ParticipantRecord) -> StoreResult<()> {
        let key = self.participant_key(&record.id);
        self.write_json(&key, &record).await?;
        debug!(participant_id = %record.id, "Participant written to Redis");
        Ok(())
    }

    async fn update_participant_status(
        &self,
        id: &ParticipantId,
        status: ParticipantStatus,
        current_match_id: Option<MatchId>,
        last_active: DateTime<Utc>,
    ) -> StoreResult<()> {
        let key = self.participant_key(id);
        let mut record: ParticipantRecord = self
            .read_json(&key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("participant {}", id)))?;

        record.status = status;
        record.current_match_id = current_match_id;
        record.last_active = last_active;
        self.write_json(&key, &record).await
    }

    async fn get_participant(&self, id: &ParticipantId) -> StoreResult<Option<ParticipantRecord>> {
        self.read_json(&self.participant_key(id)).await
    }

    async fn put_match(&self, record: Match) -> StoreResult<()> {
        let key = self.match_key(&record.id);
        self.write_json(&key, &record).await?;
        debug!(match_id = %record.id, "Match written to Redis");
        Ok(())
    }

    async fn update_match_status(
        &self,
        id: &MatchId,
        status: MatchStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let key = self.match_key(id);
        let mut record: Match = self
            .read_json(&key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("match {}", id)))?;

        record.status = status;
        record.ended_at = ended_at;
        self.write_json(&key, &record).await
    }

    async fn get_match(&self, id: &MatchId) -> StoreResult<Option<Match>> {
        self.read_json(&self.match_key(id)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut redis = self.redis.lock().await;
        let reply: String = redis::cmd("PING")
            .query_async(&mut *redis)
            .await
            .map_err(|e| StoreError::RedisError(e.to_string()))?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::RedisError(format!("unexpected PING reply: {}", reply)))
        }
    }
}
