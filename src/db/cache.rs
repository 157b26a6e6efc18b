// db/cache.rs
use std::sync::Arc;

use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};

use crate::{db::DBClient, models::propertymodel::ListingCategory};

/// Cache TTL constants (in seconds)
pub const CATEGORY_CACHE_TTL: usize = 300; // 5 minutes

const CATEGORY_CACHE_PREFIX: &str = "listings:category:";

pub fn category_cache_key(category: ListingCategory) -> String {
    format!("{}{}", CATEGORY_CACHE_PREFIX, category.slug())
}

pub struct CacheHelper;

impl CacheHelper {
    /// Generic get from cache
    pub async fn get<T: DeserializeOwned>(
        redis: &Arc<ConnectionManager>,
        key: &str,
    ) -> Result<Option<T>, redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let cached: Option<String> = conn.get(key).await?;

        match cached {
            Some(data) => match serde_json::from_str::<T>(&data) {
                Ok(value) => {
                    tracing::debug!("Cache HIT: {}", key);
                    Ok(Some(value))
                }
                Err(_) => {
                    tracing::warn!("Cache deserialization failed for: {}", key);
                    Ok(None)
                }
            },
            None => {
                tracing::debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    /// Generic set to cache with TTL
    pub async fn set<T: Serialize>(
        redis: &Arc<ConnectionManager>,
        key: &str,
        value: &T,
        ttl_seconds: usize,
    ) -> Result<(), redis::RedisError> {
        if let Ok(json) = serde_json::to_string(value) {
            let mut conn = ConnectionManager::clone(redis);
            let _: () = conn.set_ex(key, json, ttl_seconds).await?;
            tracing::debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds);
        }
        Ok(())
    }

    // Delete keys matching a pattern using SCAN (non-blocking)
    pub async fn delete_pattern(
        redis: &Arc<ConnectionManager>,
        pattern: &str,
    ) -> Result<usize, redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let mut cursor: u64 = 0;
        let mut deleted_count = 0;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                deleted_count += keys.len();
                let _: () = conn.del(&keys).await?;
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        tracing::debug!("Cache DELETE pattern: {} ({} keys deleted)", pattern, deleted_count);
        Ok(deleted_count)
    }
}

impl DBClient {
    pub async fn cached_category<T: DeserializeOwned>(&self, category: ListingCategory) -> Option<T> {
        let redis = self.redis_client.as_ref()?;
        CacheHelper::get::<T>(redis, &category_cache_key(category))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Category cache read failed: {}", e);
                None
            })
    }

    pub async fn cache_category<T: Serialize>(&self, category: ListingCategory, value: &T) {
        if let Some(redis) = &self.redis_client {
            if let Err(e) =
                CacheHelper::set(redis, &category_cache_key(category), value, CATEGORY_CACHE_TTL).await
            {
                tracing::warn!("Category cache write failed: {}", e);
            }
        }
    }

    /// Drops every cached category page. Failures are logged only; the
    /// cache expires on its own TTL.
    pub async fn invalidate_listing_cache(&self) {
        if let Some(redis) = &self.redis_client {
            let pattern = format!("{}*", CATEGORY_CACHE_PREFIX);
            if let Err(e) = CacheHelper::delete_pattern(redis, &pattern).await {
                tracing::warn!("Failed to invalidate listing cache: {}", e);
            }
        }
    }
}
