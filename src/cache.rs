//! Translation cache.
//!
//! A key-value store of completed translations keyed by FAQ id and language.
//! The cache is purely an optimization: callers treat read failures as misses
//! and log-and-ignore write failures, so losing the cache only costs extra
//! provider calls.
//!
//! Values are always a `LocalizedText`. In Redis this is a hash with exactly
//! the fields `question` and `answer`, written with HSET and read with HGETALL.

use crate::models::{FaqId, LocalizedText};
use async_trait::async_trait;
use moka::future::Cache;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const QUESTION_FIELD: &str = "question";
const ANSWER_FIELD: &str = "answer";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache command failed: {0}")]
    Command(#[from] redis::RedisError),
}

/// Cache key for one FAQ in one language
pub fn cache_key(id: FaqId, language: &str) -> String {
    format!("faq:{}:translation:{}", id, language)
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<LocalizedText>, CacheError>;

    async fn set(&self, key: &str, value: &LocalizedText) -> Result<(), CacheError>;
}

/// Redis-backed cache shared by every instance of the service
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    ttl_secs: Option<u64>,
}

impl RedisCache {
    /// Connect to Redis. Entries expire after `ttl_secs` when set.
    pub async fn connect(url: &str, ttl_secs: Option<u64>) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        info!("Connected to Redis translation cache");
        Ok(Self { conn, ttl_secs })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<LocalizedText>, CacheError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(text_from_fields(fields))
    }

    async fn set(&self, key: &str, value: &LocalizedText) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(
                key,
                &[
                    (QUESTION_FIELD, value.question.as_str()),
                    (ANSWER_FIELD, value.answer.as_str()),
                ],
            )
            .ignore();
        if let Some(ttl) = self.ttl_secs {
            pipe.expire(key, expire_seconds(ttl)).ignore();
        }

        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}

/// EXPIRE takes a signed count; oversized TTLs saturate instead of wrapping negative
fn expire_seconds(ttl_secs: u64) -> i64 {
    i64::try_from(ttl_secs).unwrap_or(i64::MAX)
}

/// Rebuild a cached pair from a Redis hash. A hash missing either field is a miss.
fn text_from_fields(mut fields: HashMap<String, String>) -> Option<LocalizedText> {
    let question = fields.remove(QUESTION_FIELD)?;
    let answer = fields.remove(ANSWER_FIELD)?;
    Some(LocalizedText { question, answer })
}

/// In-process cache, used when no Redis is configured or reachable
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, LocalizedText>,
}

impl MemoryCache {
    pub fn new(max_entries: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            entries: builder.build(),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<LocalizedText>, CacheError> {
        Ok(self.entries.get(key).await)
    }

    async fn set(&self, key: &str, value: &LocalizedText) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value.clone()).await;
        Ok(())
    }
}
