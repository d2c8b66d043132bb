// /stayhub/services/property-service/src/cache.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Client, ErrorKind, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

type MemoryEntries = HashMap<String, (String, DateTime<Utc>)>;

#[derive(Clone)]
enum Backend {
    Redis(ConnectionManager),
    Memory(Arc<RwLock<MemoryEntries>>),
}

/// Namespaced JSON cache backed by Redis, or a process-local map when
/// Redis is not configured or unreachable
#[derive(Clone)]
pub struct CacheManager {
    backend: Backend,
    namespace: String,
}

impl CacheManager {
    pub async fn new(redis_url: &str, namespace: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected (namespace '{}')", namespace);

        Ok(Self {
            backend: Backend::Redis(conn),
            namespace: namespace.to_string(),
        })
    }

    pub fn in_memory(namespace: &str) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(HashMap::new()))),
            namespace: namespace.to_string(),
        }
    }

    /// Connect to Redis when a URL is given, falling back to memory on any failure
    pub async fn connect_or_fallback(redis_url: Option<&str>, namespace: &str) -> Self {
        match redis_url {
            Some(url) => match Self::new(url, namespace).await {
                Ok(cache) => cache,
                Err(e) => {
                    tracing::warn!("⚠️ Redis unavailable ({}), using in-memory cache", e);
                    Self::in_memory(namespace)
                }
            },
            None => {
                tracing::info!("REDIS_URL not set, using in-memory cache");
                Self::in_memory(namespace)
            }
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<(), RedisError> {
        let serialized = serde_json::to_string(value).map_err(|e| {
            RedisError::from((ErrorKind::TypeError, "Serialization failed", e.to_string()))
        })?;
        let full_key = self.make_key(key);

        match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                conn.set_ex::<_, _, ()>(full_key, serialized, ttl_seconds).await?;
            }
            Backend::Memory(entries) => {
                let expires_at = Utc::now() + Duration::seconds(ttl_seconds as i64);
                entries.write().await.insert(full_key, (serialized, expires_at));
            }
        }

        tracing::debug!("Cache set: key={}, ttl={}s", key, ttl_seconds);
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RedisError> {
        let full_key = self.make_key(key);

        let raw = match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                conn.get::<_, Option<String>>(full_key).await?
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
                let value = serde_json::from_str(&data).map_err(|e| {
                    RedisError::from((ErrorKind::TypeError, "Deserialization failed", e.to_string()))
                })?;
                tracing::debug!("Cache hit: key={}", key);
                Ok(Some(value))
            }
            None => {
                tracing::debug!("Cache miss: key={}", key);
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), RedisError> {
        let full_key = self.make_key(key);

        match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                conn.del::<_, ()>(full_key).await?;
            }
            Backend::Memory(entries) => {
                entries.write().await.remove(&full_key);
            }
        }

        tracing::debug!("Cache delete: key={}", key);
        Ok(())
    }

    pub fn is_using_redis(&self) -> bool {
        matches!(self.backend, Backend::Redis(_))
    }

    pub async fn get_stats(&self) -> serde_json::Value {
        match &self.backend {
            Backend::Redis(_) => serde_json::json!({
                "type": "redis",
                "namespace": self.namespace,
            }),
            Backend::Memory(entries) => {
                let entries = entries.read().await;
                let now = Utc::now();
                let active = entries.values().filter(|(_, exp)| *exp > now).count();

                serde_json::json!({
                    "type": "in_memory",
                    "namespace": self.namespace,
                    "active_entries": active,
                    "expired_entries": entries.len() - active,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Listing {
        title: String,
        guests: i32,
    }

    #[test]
    fn test_memory_cache_roundtrip_and_delete() {
        tokio_test::block_on(async {
            let cache = CacheManager::in_memory("test");
            let listing = Listing { title: "Cabin".into(), guests: 3 };

            cache.set("property:1", &listing, 60).await.unwrap();
            assert_eq!(cache.get::<Listing>("property:1").await.unwrap(), Some(listing));

            cache.delete("property:1").await.unwrap();
            assert_eq!(cache.get::<Listing>("property:1").await.unwrap(), None);
            assert!(!cache.is_using_redis());
        });
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        tokio_test::block_on(async {
            let cache = CacheManager::in_memory("test");
            cache.set("gone", &1u8, 0).await.unwrap();

            assert_eq!(cache.get::<u8>("gone").await.unwrap(), None);
            let stats = cache.get_stats().await;
            assert_eq!(stats["active_entries"], 0);
        });
    }

    #[test]
    fn test_fallback_without_url() {
        tokio_test::block_on(async {
            let cache = CacheManager::connect_or_fallback(None, "property_service").await;
            assert!(!cache.is_using_redis());
            assert_eq!(cache.make_key("x"), "property_service:x");
        });
    }
}
