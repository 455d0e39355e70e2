//! Named, TTL'd mutual exclusion.
//!
//! Generalizes `r2e_cache::TtlCache`'s DashMap-plus-`Instant` expiry
//! mechanics from a read cache into a lock table: holding a lock is
//! represented as an entry whose `Instant` is the expiry deadline, and a
//! `tokio::sync::Notify` per key wakes waiters immediately on release
//! instead of leaving them to poll until their own timeout.
//!
//! Lock-ordering rule carried over from the original (`lockPath` is always
//! acquired before `lockResourceGlobal` when both are needed): callers
//! must never acquire the global resource lock while already holding a
//! path lock's guard.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::timeout as tokio_timeout;

#[derive(Debug)]
pub enum LockError {
    /// Could not acquire the lock within the bounded wait.
    Timeout { key: String, waited: Duration },
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Timeout { key, waited } => {
                write!(f, "timed out acquiring lock '{key}' after {waited:?}")
            }
        }
    }
}

impl std::error::Error for LockError {}

struct KeyState {
    held_until: Option<Instant>,
    notify: Arc<Notify>,
}

/// In-process named lock table. One process only ever holds the real
/// MySQL/etcd/redis-backed lock in the original; here the RBAC service is
/// single-writer per deployment so an in-memory table provides the same
/// mutual-exclusion contract without a new external dependency.
#[derive(Clone)]
pub struct DistLock {
    keys: Arc<DashMap<String, Mutex<KeyState>>>,
}

impl Default for DistLock {
    fn default() -> Self {
        Self::new()
    }
}

impl DistLock {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
        }
    }

    fn notify_for(&self, key: &str) -> Arc<Notify> {
        self.keys
            .entry(key.to_string())
            .or_insert_with(|| {
                Mutex::new(KeyState {
                    held_until: None,
                    notify: Arc::new(Notify::new()),
                })
            })
            .lock()
            .unwrap()
            .notify
            .clone()
    }

    /// Try to claim `key` for `ttl`. Returns `true` if claimed, `false` if
    /// already held by someone else (and not yet expired).
    fn try_claim(&self, key: &str, ttl: Duration) -> bool {
        let entry = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| {
                Mutex::new(KeyState {
                    held_until: None,
                    notify: Arc::new(Notify::new()),
                })
            });
        let mut state = entry.lock().unwrap();
        let now = Instant::now();
        let free = match state.held_until {
            None => true,
            Some(deadline) => deadline <= now,
        };
        if free {
            state.held_until = Some(now + ttl);
            true
        } else {
            false
        }
    }

    fn release(&self, key: &str) {
        if let Some(entry) = self.keys.get(key) {
            let mut state = entry.lock().unwrap();
            state.held_until = None;
            state.notify.notify_waiters();
        }
    }

    /// Acquire `key`, run `fut`, then release — even if `fut` errors or
    /// panics. Blocks up to `wait` for the lock to become available.
    pub async fn run<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        wait: Duration,
        fut: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let deadline = Instant::now() + wait;
        loop {
            if self.try_claim(key, ttl) {
                break;
            }
            let notify = self.notify_for(key);
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited: wait,
                }
                .into());
            }
            // Either woken by the release, or fall through to re-check on
            // our own timeout so we never wait past `deadline`.
            let _ = tokio_timeout(remaining, notify.notified()).await;
        }

        let guard = LockGuard {
            lock: self.clone(),
            key: key.to_string(),
        };
        let result = fut().await;
        drop(guard);
        result
    }
}

/// Releases the lock on drop, including on panic unwind through `fut`.
struct LockGuard {
    lock: DistLock,
    key: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.lock.release(&self.key);
    }
}

pub mod keys {
    pub fn global_resource() -> String {
        "user-vault:resource:global".to_string()
    }

    pub fn path(path_no: &str) -> String {
        format!("user-vault:path:{path_no}")
    }

    pub fn role_res_cache() -> String {
        "user-vault:role:res:cache".to_string()
    }

    pub fn user_registration_review(user_id: &str) -> String {
        format!("user-vault:registration:review:{user_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Lock(LockError),
    }
    impl From<LockError> for TestError {
        fn from(e: LockError) -> Self {
            TestError::Lock(e)
        }
    }

    #[tokio::test]
    async fn run_releases_after_success() {
        let lock = DistLock::new();
        let r: Result<i32, TestError> = lock
            .run("k", Duration::from_secs(5), Duration::from_secs(1), || async { Ok(1) })
            .await;
        assert!(matches!(r, Ok(1)));
        assert!(lock.try_claim("k", Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn concurrent_run_serializes() {
        let lock = Arc::new(DistLock::new());
        let counter = Arc::new(std::sync::atomic::AtomicI32::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _: Result<(), TestError> = lock
                    .run("shared", Duration::from_millis(50), Duration::from_secs(2), || async {
                        let before = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        assert_eq!(before, 0, "lock should have been exclusive");
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                        Ok(())
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn run_releases_on_error() {
        let lock = DistLock::new();
        let r: Result<(), TestError> = lock
            .run("k", Duration::from_secs(5), Duration::from_secs(1), || async {
                Err(TestError::Lock(LockError::Timeout {
                    key: "k".into(),
                    waited: Duration::from_secs(0),
                }))
            })
            .await;
        assert!(r.is_err());
        assert!(lock.try_claim("k", Duration::from_secs(5)));
    }
}
