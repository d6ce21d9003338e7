// /flight-booking/services/payment-service/src/utils/cache.rs

use std::{collections::HashMap, sync::Arc, time::Duration};
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use crate::utils::error::{AppError, AppResult};

enum Backend {
    Redis(ConnectionManager),
    // Fallback in-memory kalau Redis tidak tersedia (dev/test)
    Memory(RwLock<HashMap<String, (String, DateTime<Utc>)>>),
}

/// Key-value cache dengan TTL dan namespace, Redis atau in-memory
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<Backend>,
    namespace: String,
}

impl CacheManager {
    /// Connect ke Redis
    pub async fn new(redis_url: &str, namespace: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache manager berhasil terhubung");

        Ok(Self {
            backend: Arc::new(Backend::Redis(conn_manager)),
            namespace: namespace.to_string(),
        })
    }

    /// Cache in-memory untuk fallback ketika Redis tidak tersedia
    pub fn new_in_memory(namespace: &str) -> Self {
        Self {
            backend: Arc::new(Backend::Memory(RwLock::new(HashMap::new()))),
            namespace: namespace.to_string(),
        }
    }

    /// Connect ke Redis, fallback ke in-memory kalau gagal
    pub async fn connect_or_fallback(redis_url: &str, namespace: &str) -> Self {
        match Self::new(redis_url, namespace).await {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!("⚠️ Redis tidak tersedia, menggunakan in-memory cache: {}", e);
                Self::new_in_memory(namespace)
            }
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Set value dengan TTL
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T, ttl: Duration) -> AppResult<()> {
        let serialized = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Cache serialization gagal: {}", e)))?;
        let full_key = self.make_key(key);

        match self.backend.as_ref() {
            Backend::Redis(conn_manager) => {
                let mut conn = conn_manager.clone();
                conn.set_ex::<_, _, ()>(full_key, serialized, ttl.as_secs().max(1))
                    .await
                    .map_err(redis_error)?;
            }
            Backend::Memory(entries) => {
                let expires_at = Utc::now()
                    + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
                entries.write().await.insert(full_key, (serialized, expires_at));
            }
        }

        tracing::debug!("Cache set: key={}, ttl={}s", key, ttl.as_secs());
        Ok(())
    }

    /// Get value. Entry yang sudah expired dianggap miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let full_key = self.make_key(key);

        let raw: Option<String> = match self.backend.as_ref() {
            Backend::Redis(conn_manager) => {
                let mut conn = conn_manager.clone();
                conn.get::<_, Option<String>>(full_key).await.map_err(redis_error)?
            }
            Backend::Memory(entries) => {
                let mut entries = entries.write().await;
                let now = Utc::now();
                entries.retain(|_, (_, expires_at)| *expires_at > now);
                entries.get(&full_key).map(|(data, _)| data.clone())
            }
        };

        match raw {
            Some(data) => {
                tracing::debug!("Cache hit: key={}", key);
                serde_json::from_str(&data)
                    .map(Some)
                    .map_err(|e| AppError::Internal(format!("Cache deserialization gagal: {}", e)))
            }
            None => {
                tracing::debug!("Cache miss: key={}", key);
                Ok(None)
            }
        }
    }

    /// Delete key dari cache
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let full_key = self.make_key(key);

        match self.backend.as_ref() {
            Backend::Redis(conn_manager) => {
                let mut conn = conn_manager.clone();
                conn.del::<_, ()>(full_key).await.map_err(redis_error)?;
            }
            Backend::Memory(entries) => {
                entries.write().await.remove(&full_key);
            }
        }

        tracing::debug!("Cache delete: key={}", key);
        Ok(())
    }

    pub fn is_using_redis(&self) -> bool {
        matches!(self.backend.as_ref(), Backend::Redis(_))
    }
}

fn redis_error(e: RedisError) -> AppError {
    AppError::Internal(format!("Redis error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_set_get_delete() {
        let cache = CacheManager::new_in_memory("test");
        cache.set("greeting", &vec!["halo".to_string()], Duration::from_secs(60)).await.unwrap();

        let value: Option<Vec<String>> = cache.get("greeting").await.unwrap();
        assert_eq!(value, Some(vec!["halo".to_string()]));

        cache.delete("greeting").await.unwrap();
        let value: Option<Vec<String>> = cache.get("greeting").await.unwrap();
        assert!(value.is_none());
        assert!(!cache.is_using_redis());
    }

    #[tokio::test]
    async fn test_in_memory_expiry() {
        let cache = CacheManager::new_in_memory("test");
        cache.set("short", &1u32, Duration::from_millis(0)).await.unwrap();

        let value: Option<u32> = cache.get("short").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let first = CacheManager::new_in_memory("a");
        first.set("k", &1u32, Duration::from_secs(60)).await.unwrap();

        let second = CacheManager::new_in_memory("b");
        let value: Option<u32> = second.get("k").await.unwrap();
        assert!(value.is_none());
    }
}
