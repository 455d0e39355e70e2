//! URL and role-resource caches sitting in front of [`crate::store::Store`].
//!
//! Generalizes `r2e_cache::TtlCache<K, V>`'s DashMap-plus-`Instant` expiry
//! into a read-through cache with single-flight-on-miss, in the shape of
//! `caliber`'s `ReadThroughCache`: concurrent misses for the same key share
//! one loader call instead of stampeding the store.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::OnceCell;

/// Read-through, single-flight cache with per-entry TTL. Cheaply `Clone`
/// (an `Arc`'d table) so it can live directly on `AppState`.
#[derive(Clone)]
pub struct ReadThroughCache<K, V> {
    entries: Arc<DashMap<K, (Arc<OnceCell<V>>, Instant)>>,
    ttl: Duration,
}

impl<K, V> ReadThroughCache<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Returns the cached value for `key`, loading it via `loader` on a
    /// miss or expiry. Concurrent callers racing on the same key share one
    /// `loader` invocation.
    pub async fn get_or_load<F, Fut, E>(&self, key: &K, loader: F) -> Result<Option<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        let now = Instant::now();

        let is_fresh = self
            .entries
            .get(key)
            .map(|entry| entry.value().1 > now)
            .unwrap_or(false);

        let cell = if is_fresh {
            self.entries.get(key).unwrap().value().0.clone()
        } else {
            let fresh = Arc::new(OnceCell::new());
            self.entries
                .insert(key.clone(), (fresh.clone(), now + self.ttl));
            fresh
        };

        match cell
            .get_or_try_init(|| async {
                match loader().await {
                    Ok(Some(v)) => Ok(v),
                    Ok(None) => Err(LoadOutcome::Absent),
                    Err(e) => Err(LoadOutcome::Err(e)),
                }
            })
            .await
        {
            Ok(v) => Ok(Some(v.clone())),
            Err(LoadOutcome::Absent) => {
                self.entries.remove(key);
                Ok(None)
            }
            Err(LoadOutcome::Err(e)) => {
                self.entries.remove(key);
                Err(e)
            }
        }
    }

    /// Writes a value through, bypassing the loader. Used by rebuild
    /// protocols and targeted refreshes.
    pub fn put(&self, key: K, value: V) {
        let cell = OnceCell::new();
        let _ = cell.set(value);
        self.entries
            .insert(key, (Arc::new(cell), Instant::now() + self.ttl));
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

enum LoadOutcome<E> {
    Absent,
    Err(E),
}

/// Cached row backing a single `method:normalizedUrl` lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathRecord {
    pub path_no: String,
    pub group: String,
    pub res_code: Option<String>,
    pub method: String,
    pub url: String,
    pub ptype: String,
}

/// Display-only role summary backing `roleNo -> RoleInfo`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleInfo {
    pub role_no: String,
    pub name: String,
}

pub const URL_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
pub const ROLE_RES_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const ROLE_INFO_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// `method:normalizedUrl -> PathRecord`, 30-minute TTL.
#[derive(Clone)]
pub struct UrlCache {
    inner: ReadThroughCache<String, PathRecord>,
}

impl Default for UrlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlCache {
    pub fn new() -> Self {
        Self {
            inner: ReadThroughCache::new(URL_CACHE_TTL),
        }
    }

    pub fn key(method: &str, normalized_url: &str) -> String {
        format!("{}:{}", method.to_uppercase(), normalized_url)
    }

    pub async fn get_or_load<F, Fut, E>(
        &self,
        method: &str,
        normalized_url: &str,
        loader: F,
    ) -> Result<Option<PathRecord>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<PathRecord>, E>>,
    {
        self.inner
            .get_or_load(&Self::key(method, normalized_url), loader)
            .await
    }

    pub fn put(&self, record: PathRecord) {
        let key = Self::key(&record.method, &record.url);
        self.inner.put(key, record);
    }

    pub fn invalidate(&self, method: &str, normalized_url: &str) {
        self.inner.invalidate(&Self::key(method, normalized_url));
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// `role:<roleNo>:res:<resCode> -> ()` sentinel membership cache, 1h TTL.
#[derive(Clone)]
pub struct RoleResCache {
    inner: ReadThroughCache<String, ()>,
}

impl Default for RoleResCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleResCache {
    pub fn new() -> Self {
        Self {
            inner: ReadThroughCache::new(ROLE_RES_CACHE_TTL),
        }
    }

    pub fn key(role_no: &str, res_code: &str) -> String {
        format!("role:{role_no}:res:{res_code}")
    }

    pub async fn contains<F, Fut, E>(
        &self,
        role_no: &str,
        res_code: &str,
        loader: F,
    ) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<()>, E>>,
    {
        Ok(self
            .inner
            .get_or_load(&Self::key(role_no, res_code), loader)
            .await?
            .is_some())
    }

    pub fn mark_member(&self, role_no: &str, res_code: &str) {
        self.inner.put(Self::key(role_no, res_code), ());
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// `roleNo -> RoleInfo`, 10-minute TTL, for display purposes only.
#[derive(Clone)]
pub struct RoleInfoCache {
    inner: ReadThroughCache<String, RoleInfo>,
}

impl Default for RoleInfoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleInfoCache {
    pub fn new() -> Self {
        Self {
            inner: ReadThroughCache::new(ROLE_INFO_CACHE_TTL),
        }
    }

    pub async fn get_or_load<F, Fut, E>(&self, role_no: &str, loader: F) -> Result<Option<RoleInfo>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<RoleInfo>, E>>,
    {
        self.inner.get_or_load(&role_no.to_string(), loader).await
    }

    pub fn put(&self, info: RoleInfo) {
        self.inner.put(info.role_no.clone(), info);
    }
}

/// Normalizes a URL the same way on every producer and the one consumer:
/// trim, strip query string, collapse trailing slashes, default to `"/"`,
/// and guarantee a leading `/`.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_query = match trimmed.find('?') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    let collapsed = if without_query == "/" {
        without_query
    } else {
        without_query.trim_end_matches('/')
    };
    if collapsed.is_empty() {
        return "/".to_string();
    }
    if collapsed.starts_with('/') {
        collapsed.to_string()
    } else {
        format!("/{collapsed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_matches_examples() {
        assert_eq!(normalize_url(""), "/");
        assert_eq!(normalize_url("///"), "/");
        assert_eq!(normalize_url("goauth/test/path//"), "/goauth/test/path");
        assert_eq!(normalize_url("goauth/test/path?a=1"), "/goauth/test/path");
        assert_eq!(normalize_url("  /already/clean  "), "/already/clean");
        assert_eq!(normalize_url("/"), "/");
    }

    #[tokio::test]
    async fn get_or_load_is_single_flight_on_miss() {
        let cache: ReadThroughCache<String, i32> = ReadThroughCache::new(Duration::from_secs(60));
        let calls = Arc::new(std::sync::atomic::AtomicI32::new(0));
        let c1 = calls.clone();
        let r1: Result<Option<i32>, ()> = cache
            .get_or_load(&"k".to_string(), || async move {
                c1.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Some(42))
            })
            .await;
        assert_eq!(r1, Ok(Some(42)));

        let c2 = calls.clone();
        let r2: Result<Option<i32>, ()> = cache
            .get_or_load(&"k".to_string(), || async move {
                c2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Some(99))
            })
            .await;
        assert_eq!(r2, Ok(Some(42)), "second call should hit cache, not reload");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn miss_that_loads_none_is_not_cached() {
        let cache: ReadThroughCache<String, i32> = ReadThroughCache::new(Duration::from_secs(60));
        let r: Result<Option<i32>, ()> = cache
            .get_or_load(&"missing".to_string(), || async { Ok(None) })
            .await;
        assert_eq!(r, Ok(None));
    }

    #[tokio::test]
    async fn role_res_cache_reports_membership() {
        let cache = RoleResCache::new();
        let hit: Result<bool, ()> = cache
            .contains("role_admin", "res_1", || async { Ok(Some(())) })
            .await;
        assert_eq!(hit, Ok(true));
    }
}
