use crate::config::CacheConfig;
use crate::models::*;
use anyhow::Result;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identifies one computed list. The store version is part of the key, so a
/// write to the store makes every earlier entry unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: UserId,
    pub method: String,
    pub params: String,
    pub store_version: u64,
}

impl CacheKey {
    pub fn new(user_id: UserId, method: &str, params: String, store_version: u64) -> Self {
        Self {
            user_id,
            method: method.to_string(),
            params,
            store_version,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recs:{}:{}:{}:v{}",
            self.user_id, self.method, self.params, self.store_version
        )
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    recommendations: Vec<Recommendation>,
    inserted_at: Instant,
}

/// Two-tier memo of recommendation lists: an in-process map, then Redis when
/// a URL is configured.
pub struct RecommendationCache {
    local: DashMap<String, CacheEntry>,
    redis_client: Option<redis::Client>,
    config: CacheConfig,
}

impl RecommendationCache {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let redis_client = match config.redis_url.as_deref() {
            Some(url) if config.enabled => Some(redis::Client::open(url)?),
            _ => None,
        };

        Ok(Self {
            local: DashMap::new(),
            redis_client,
            config: config.clone(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            local: DashMap::new(),
            redis_client: None,
            config: CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_seconds)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Vec<Recommendation>> {
        if !self.config.enabled {
            return None;
        }
        let key = key.to_string();

        if let Some(entry) = self.local.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl() {
                debug!(%key, "Local cache hit");
                return Some(entry.recommendations.clone());
            }
        }
        self.local.remove_if(&key, |_, entry| entry.inserted_at.elapsed() >= self.ttl());

        let client = self.redis_client.as_ref()?;
        match Self::redis_get(client, &key).await {
            Ok(Some(recommendations)) => {
                debug!(%key, "Redis cache hit");
                self.insert_local(key, recommendations.clone());
                Some(recommendations)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Redis cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put(&self, key: &CacheKey, recommendations: &[Recommendation]) {
        if !self.config.enabled {
            return;
        }
        let key = key.to_string();
        self.insert_local(key.clone(), recommendations.to_vec());

        if let Some(client) = &self.redis_client {
            if let Err(e) = Self::redis_set(client, &key, recommendations, self.config.ttl_seconds).await {
                warn!("Redis cache write failed for {}: {}", key, e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    fn insert_local(&self, key: String, recommendations: Vec<Recommendation>) {
        if self.local.len() >= self.config.max_entries {
            let ttl = self.ttl();
            self.local.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        }
        if self.local.len() >= self.config.max_entries {
            // Still full of live entries; drop the oldest one.
            let oldest = self
                .local
                .iter()
                .min_by_key(|entry| entry.inserted_at)
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                self.local.remove(&oldest);
            }
        }

        self.local.insert(
            key,
            CacheEntry {
                recommendations,
                inserted_at: Instant::now(),
            },
        );
    }

    async fn redis_get(client: &redis::Client, key: &str) -> Result<Option<Vec<Recommendation>>> {
        let mut conn = client.get_async_connection().await?;
        let cached: Option<String> = conn.get(key).await?;
        match cached {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn redis_set(
        client: &redis::Client,
        key: &str,
        recommendations: &[Recommendation],
        ttl_seconds: u64,
    ) -> Result<()> {
        let mut conn = client.get_async_connection().await?;
        let data = serde_json::to_string(recommendations)?;
        let _: () = conn.set_ex(key, data, ttl_seconds).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn recs(n: usize) -> Vec<Recommendation> {
        (0..n)
            .map(|i| {
                Recommendation::new(
                    Item::book(format!("Book {}", i), BookMetadata::default()),
                    1.0 / (i + 1) as f64,
                    RecommendationType::Popular,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_round_trip_and_version_invalidation() {
        let cache = RecommendationCache::new(&CacheConfig::default()).unwrap();
        let user = Uuid::new_v4();
        let key = CacheKey::new(user, "hybrid", "limit=3".to_string(), 1);

        assert!(cache.get(&key).await.is_none());
        cache.put(&key, &recs(3)).await;
        assert_eq!(cache.get(&key).await.unwrap().len(), 3);

        let bumped = CacheKey::new(user, "hybrid", "limit=3".to_string(), 2);
        assert!(cache.get(&bumped).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = RecommendationCache::new(&CacheConfig {
            ttl_seconds: 0,
            ..CacheConfig::default()
        })
        .unwrap();
        let key = CacheKey::new(Uuid::new_v4(), "popular", String::new(), 0);
        cache.put(&key, &recs(1)).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = RecommendationCache::new(&CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        })
        .unwrap();
        for version in 0..5 {
            let key = CacheKey::new(Uuid::new_v4(), "content", String::new(), version);
            cache.put(&key, &recs(1)).await;
        }
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = RecommendationCache::disabled();
        let key = CacheKey::new(Uuid::new_v4(), "hybrid", String::new(), 0);
        cache.put(&key, &recs(2)).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_format() {
        let user = Uuid::nil();
        let key = CacheKey::new(user, "collaborative", "limit=10".to_string(), 7);
        assert_eq!(
            key.to_string(),
            format!("recs:{}:collaborative:limit=10:v7", user)
        );
    }
}
