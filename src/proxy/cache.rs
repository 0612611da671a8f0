use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use crate::config::CacheConfig;
use crate::error::{AppError, AppResult};
use crate::models::ScimListResponse;
use crate::parser::ResourceType;
use crate::proxy::ResourceStore;

struct CacheEntry {
    body: Value,
    inserted_at: Instant,
}

/// TTL- and capacity-bounded memoization of upstream GET responses.
///
/// Concurrent misses for the same key coalesce into a single upstream fetch:
/// the first arrival installs a cell and runs the fetch, followers await the
/// same cell. A follower cancelling its wait does not disturb the others;
/// completion is shared.
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<OnceCell<Value>>>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        ResponseCache {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_entries)
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: &str, body: Value) {
        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            // Capacity pressure: evict the oldest entry
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                body,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every cached response whose key starts with `prefix`. Writes to a
    /// resource type invalidate both its list pages and its entries.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-through lookup with single-flight coalescing.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> AppResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Value>>,
    {
        if let Some(hit) = self.lookup(key) {
            return Ok(hit);
        }

        let cell = {
            let mut inflight = self.inflight.lock().expect("cache mutex poisoned");
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_try_init(|| async {
                let body = fetch().await?;
                self.insert(key, body.clone());
                Ok::<Value, AppError>(body)
            })
            .await
            .map(Value::clone);

        // Whether the flight succeeded or failed, later requests should go
        // through the entries map (or retry) rather than this cell.
        self.inflight
            .lock()
            .expect("cache mutex poisoned")
            .remove(key);

        result
    }
}

/// Hash of the authentication-relevant request headers, so responses fetched
/// under one credential are never served to another.
fn auth_hash(headers: &HeaderMap) -> u64 {
    let mut hasher = DefaultHasher::new();
    for name in ["authorization", "cookie", "x-api-key", "x-auth-token"] {
        if let Some(value) = headers.get(name) {
            name.hash(&mut hasher);
            value.as_bytes().hash(&mut hasher);
        }
    }
    hasher.finish()
}

fn list_key(resource_type: ResourceType, start_index: i64, count: i64, headers: &HeaderMap) -> String {
    // Query parameters in sorted canonical order
    format!(
        "GET {}?count={}&startIndex={}#{:x}",
        resource_type.endpoint(),
        count,
        start_index,
        auth_hash(headers)
    )
}

fn resource_key(resource_type: ResourceType, id: &str, headers: &HeaderMap) -> String {
    format!(
        "GET {}/{}#{:x}",
        resource_type.endpoint(),
        id,
        auth_hash(headers)
    )
}

/// Read-through caching decorator over a `ResourceStore`. Reads are memoized;
/// writes pass through and invalidate the resource type's key prefix.
pub struct CachedStore {
    inner: Arc<dyn ResourceStore>,
    cache: Arc<ResponseCache>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn ResourceStore>, cache: Arc<ResponseCache>) -> Self {
        CachedStore { inner, cache }
    }

    fn invalidate(&self, resource_type: ResourceType) {
        self.cache
            .invalidate_prefix(&format!("GET {}", resource_type.endpoint()));
    }
}

#[async_trait]
impl ResourceStore for CachedStore {
    async fn list(
        &self,
        resource_type: ResourceType,
        start_index: i64,
        count: i64,
        headers: &HeaderMap,
    ) -> AppResult<ScimListResponse> {
        let key = list_key(resource_type, start_index, count, headers);
        let body = self
            .cache
            .get_or_fetch(&key, || async {
                let page = self
                    .inner
                    .list(resource_type, start_index, count, headers)
                    .await?;
                Ok(serde_json::to_value(page)?)
            })
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn get(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let key = resource_key(resource_type, id, headers);
        self.cache
            .get_or_fetch(&key, || self.inner.get(resource_type, id, headers))
            .await
    }

    async fn create(
        &self,
        resource_type: ResourceType,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let created = self.inner.create(resource_type, body, headers).await?;
        self.invalidate(resource_type);
        Ok(created)
    }

    async fn replace(
        &self,
        resource_type: ResourceType,
        id: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let updated = self.inner.replace(resource_type, id, body, headers).await?;
        self.invalidate(resource_type);
        Ok(updated)
    }

    async fn patch(
        &self,
        resource_type: ResourceType,
        id: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> AppResult<Value> {
        let updated = self.inner.patch(resource_type, id, body, headers).await?;
        self.invalidate(resource_type);
        Ok(updated)
    }

    async fn delete(
        &self,
        resource_type: ResourceType,
        id: &str,
        headers: &HeaderMap,
    ) -> AppResult<()> {
        self.inner.delete(resource_type, id, headers).await?;
        self.invalidate(resource_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(ttl_secs: u64, max_entries: usize) -> ResponseCache {
        ResponseCache::new(Duration::from_secs(ttl_secs), max_entries)
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let cache = cache(60, 10);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let body = cache
                .get_or_fetch("GET /Users/1#0", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"id": "1"}))
                })
                .await
                .unwrap();
            assert_eq!(body, json!({"id": "1"}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let cache = cache(0, 10);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_fetch("GET /Users/1#0", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"id": "1"}))
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = cache(60, 10);
        let calls = AtomicUsize::new(0);

        let err = cache
            .get_or_fetch("GET /Users/1#0", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Value, _>(AppError::UpstreamUnavailable("down".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));

        let body = cache
            .get_or_fetch("GET /Users/1#0", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"id": "1"}))
            })
            .await
            .unwrap();
        assert_eq!(body, json!({"id": "1"}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_entry() {
        let cache = cache(60, 2);
        for key in ["GET /Users/1#0", "GET /Users/2#0", "GET /Users/3#0"] {
            cache
                .get_or_fetch(key, || async { Ok(json!({"key": key})) })
                .await
                .unwrap();
            // Separate insertion instants so the eviction order is stable
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(cache.len(), 2);

        // The oldest key was evicted and must be refetched
        let calls = AtomicUsize::new(0);
        cache
            .get_or_fetch("GET /Users/1#0", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"id": "1"}))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prefix_invalidation() {
        let cache = cache(60, 10);
        cache
            .get_or_fetch("GET /Users/1#0", || async { Ok(json!(1)) })
            .await
            .unwrap();
        cache
            .get_or_fetch("GET /Users?count=10&startIndex=1#0", || async { Ok(json!(2)) })
            .await
            .unwrap();
        cache
            .get_or_fetch("GET /Groups/1#0", || async { Ok(json!(3)) })
            .await
            .unwrap();

        cache.invalidate_prefix("GET /Users");
        assert_eq!(cache.len(), 1);

        let calls = AtomicUsize::new(0);
        cache
            .get_or_fetch("GET /Groups/1#0", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!(3))
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_coalesce() {
        let cache = Arc::new(cache(60, 10));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("GET /Users?count=100&startIndex=1#0", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(json!({"totalResults": 0}))
                    })
                    .await
            }));
        }

        for handle in handles {
            let body = handle.await.unwrap().unwrap();
            assert_eq!(body, json!({"totalResults": 0}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_auth_hash_distinguishes_credentials() {
        let mut alice = HeaderMap::new();
        alice.insert("authorization", "Bearer alice".parse().unwrap());
        let mut bob = HeaderMap::new();
        bob.insert("authorization", "Bearer bob".parse().unwrap());

        assert_ne!(
            list_key(ResourceType::User, 1, 100, &alice),
            list_key(ResourceType::User, 1, 100, &bob)
        );
        assert_eq!(
            list_key(ResourceType::User, 1, 100, &alice),
            list_key(ResourceType::User, 1, 100, &alice)
        );
    }

    #[test]
    fn test_keys_share_resource_type_prefix() {
        let headers = HeaderMap::new();
        let list = list_key(ResourceType::User, 1, 100, &headers);
        let one = resource_key(ResourceType::User, "abc", &headers);
        assert!(list.starts_with("GET /Users"));
        assert!(one.starts_with("GET /Users"));
        let group = resource_key(ResourceType::Group, "abc", &headers);
        assert!(!group.starts_with("GET /Users"));
    }
}
