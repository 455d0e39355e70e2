//! Event consumers and cron jobs, grounded on
//! `demos/example-websocket-chat/src/controllers/consumer.rs`'s
//! `#[consumer(bus = "event_bus")]` pattern and `r2e_scheduler`'s
//! `#[scheduled(cron = "...")]`.
//!
//! `EventBus` bounds total in-flight handler concurrency with one global
//! semaphore, not a per-consumer one, so each consumer here additionally
//! guards its own body with a `tokio::sync::Semaphore` sized to its own
//! concurrency budget. Each permit set is wrapped in its own newtype and
//! injected from `AppState` rather than held as a private field: controller
//! fields must all be `#[inject]`/`#[inject(identity)]`/`#[config(..)]`, and
//! `AppState`'s own `BeanState::from_context` resolves fields by Rust type,
//! so four identical `Arc<Semaphore>` fields would be indistinguishable.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use r2e::prelude::*;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::cache::{ReadThroughCache, RoleResCache, UrlCache};
use crate::distlock::{keys, DistLock};
use crate::state::AppState;
use crate::store::Store;

/// Published by the login endpoint on every attempt, success or failure.
#[derive(Clone, Debug)]
pub struct AccessLogEvent {
    pub user_agent: String,
    pub ip_address: String,
    pub user_id: i64,
    pub username: String,
    pub url: String,
    pub success: bool,
}

/// Fans a notification out to an explicit list of user numbers.
#[derive(Clone, Debug)]
pub struct CreateNotifiEvent {
    pub user_nos: Vec<String>,
    pub message: String,
}

/// Fans a notification out to every user holding `res_code` via any role.
#[derive(Clone, Debug)]
pub struct CreateNotifiByAccessEvent {
    pub res_code: String,
    pub message: String,
}

/// Raised on every `INSERT` into `user`; the binlog-hook contract the
/// original system wires through a real binlog consumer. Translated here
/// into a `CreateNotifiByAccessEvent` targeting `manage-users`.
#[derive(Clone, Debug)]
pub struct UserCreatedBinlogEvent {
    pub username: String,
}

const ACCESS_LOG_CONCURRENCY: usize = 2;
const ACCESS_LOG_MAX_RETRIES: u32 = 2;
const CREATE_NOTIFI_CONCURRENCY: usize = 3;
const CREATE_NOTIFI_BY_ACCESS_CONCURRENCY: usize = 2;
const BINLOG_HOOK_CONCURRENCY: usize = 2;
const RESOURCE_USERS_CACHE_TTL: Duration = Duration::from_secs(30);

/// Per-pipeline concurrency guards. `EventBus` only bounds total in-flight
/// handlers with one shared semaphore; these give each pipeline its own
/// bound, matching the distinct concurrency numbers each one is specified
/// with. Distinct newtypes so `AppState`'s by-type dependency injection
/// can tell multiple `Arc<Semaphore>` fields apart.
#[derive(Clone)]
pub struct AccessLogPermits(pub Arc<Semaphore>);
#[derive(Clone)]
pub struct CreateNotifiPermits(pub Arc<Semaphore>);
#[derive(Clone)]
pub struct CreateNotifiByAccessPermits(pub Arc<Semaphore>);
#[derive(Clone)]
pub struct BinlogHookPermits(pub Arc<Semaphore>);

impl Default for AccessLogPermits {
    fn default() -> Self {
        Self(Arc::new(Semaphore::new(ACCESS_LOG_CONCURRENCY)))
    }
}
impl Default for CreateNotifiPermits {
    fn default() -> Self {
        Self(Arc::new(Semaphore::new(CREATE_NOTIFI_CONCURRENCY)))
    }
}
impl Default for CreateNotifiByAccessPermits {
    fn default() -> Self {
        Self(Arc::new(Semaphore::new(CREATE_NOTIFI_BY_ACCESS_CONCURRENCY)))
    }
}
impl Default for BinlogHookPermits {
    fn default() -> Self {
        Self(Arc::new(Semaphore::new(BINLOG_HOOK_CONCURRENCY)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit_sets_default_to_their_configured_concurrency() {
        assert_eq!(AccessLogPermits::default().0.available_permits(), ACCESS_LOG_CONCURRENCY);
        assert_eq!(CreateNotifiPermits::default().0.available_permits(), CREATE_NOTIFI_CONCURRENCY);
        assert_eq!(
            CreateNotifiByAccessPermits::default().0.available_permits(),
            CREATE_NOTIFI_BY_ACCESS_CONCURRENCY
        );
        assert_eq!(BinlogHookPermits::default().0.available_permits(), BINLOG_HOOK_CONCURRENCY);
    }
}

async fn write_access_log_with_retry(store: &Store, event: &AccessLogEvent) {
    let mut attempt = 0;
    loop {
        let result = store
            .insert_access_log(
                &event.user_agent,
                &event.ip_address,
                event.user_id,
                &event.username,
                &event.url,
                event.success,
                Utc::now(),
            )
            .await;
        match result {
            Ok(()) => return,
            Err(e) if attempt < ACCESS_LOG_MAX_RETRIES => {
                attempt += 1;
                warn!(attempt, error = %e, "access-log write failed, retrying");
            }
            Err(e) => {
                error!(error = %e, "access-log write failed, giving up after max retries");
                return;
            }
        }
    }
}

/// Consumes `AccessLogEvent` into `access_log`. At-least-once; duplicate
/// rows are acceptable since the table carries no uniqueness constraint.
#[derive(Controller)]
#[controller(state = AppState)]
pub struct AccessLogConsumer {
    #[inject]
    event_bus: EventBus,
    #[inject]
    store: Store,
    #[inject]
    access_log_permits: AccessLogPermits,
}

#[routes]
impl AccessLogConsumer {
    #[consumer(bus = "event_bus")]
    async fn on_access_log(&self, event: Arc<AccessLogEvent>) {
        let Ok(_permit) = self.access_log_permits.0.acquire().await else {
            return;
        };
        write_access_log_with_retry(&self.store, &event).await;
    }
}

/// Short-TTL `resCode -> [User]` cache feeding `CreateNotifiByAccessPipeline`
/// so a burst of access events doesn't refetch membership per event.
#[derive(Clone)]
pub struct ResourceUsersCache {
    inner: ReadThroughCache<String, Vec<crate::model::User>>,
}

impl Default for ResourceUsersCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceUsersCache {
    pub fn new() -> Self {
        Self {
            inner: ReadThroughCache::new(RESOURCE_USERS_CACHE_TTL),
        }
    }

    pub async fn get_or_load(
        &self,
        res_code: &str,
        store: &Store,
    ) -> Result<Vec<crate::model::User>, r2e_core::AppError> {
        Ok(self
            .inner
            .get_or_load(&res_code.to_string(), || async {
                Ok(Some(store.list_users_with_resource(res_code).await?))
            })
            .await?
            .unwrap_or_default())
    }
}

/// Sends `CreateNotifiEvent`/`CreateNotifiByAccessEvent` to their intended
/// recipients. Invalid events are dropped with an error log, never
/// retried.
#[derive(Controller)]
#[controller(state = AppState)]
pub struct NotificationConsumer {
    #[inject]
    event_bus: EventBus,
    #[inject]
    store: Store,
    #[inject]
    create_notifi_permits: CreateNotifiPermits,
    #[inject]
    create_notifi_by_access_permits: CreateNotifiByAccessPermits,
    #[inject]
    resource_users_cache: ResourceUsersCache,
}

impl NotificationConsumer {
    fn deliver(&self, user_no: &str, message: &str) {
        tracing::info!(user_no, message, "notification delivered");
    }
}

#[routes]
impl NotificationConsumer {
    #[consumer(bus = "event_bus")]
    async fn on_create_notifi(&self, event: Arc<CreateNotifiEvent>) {
        let Ok(_permit) = self.create_notifi_permits.0.acquire().await else {
            return;
        };
        if event.user_nos.is_empty() {
            error!("CreateNotifiEvent dropped: empty user_nos");
            return;
        }
        for user_no in &event.user_nos {
            self.deliver(user_no, &event.message);
        }
    }

    #[consumer(bus = "event_bus")]
    async fn on_create_notifi_by_access(&self, event: Arc<CreateNotifiByAccessEvent>) {
        let Ok(_permit) = self.create_notifi_by_access_permits.0.acquire().await else {
            return;
        };
        if event.res_code.is_empty() {
            error!("CreateNotifiByAccessEvent dropped: empty res_code");
            return;
        }
        let users = match self
            .resource_users_cache
            .get_or_load(&event.res_code, &self.store)
            .await
        {
            Ok(users) => users,
            Err(e) => {
                error!(res_code = %event.res_code, error = %e, "failed to resolve resource users");
                return;
            }
        };
        for user in users {
            self.deliver(&user.user_no, &event.message);
        }
    }
}

/// Translates `UserCreatedBinlogEvent` into a review notification for
/// `manage-users` holders. Contract-only: this workspace has no live
/// binlog stream, so the event is emitted directly by the admin
/// registration path rather than replayed from a change-data-capture feed.
#[derive(Controller)]
#[controller(state = AppState)]
pub struct BinlogHookConsumer {
    #[inject]
    event_bus: EventBus,
    #[inject]
    binlog_hook_permits: BinlogHookPermits,
}

#[routes]
impl BinlogHookConsumer {
    #[consumer(bus = "event_bus")]
    async fn on_user_created(&self, event: Arc<UserCreatedBinlogEvent>) {
        let Ok(_permit) = self.binlog_hook_permits.0.acquire().await else {
            return;
        };
        let message = format!("please review new user {}", event.username);
        self.event_bus
            .emit(CreateNotifiByAccessEvent {
                res_code: "manage-users".to_string(),
                message,
            })
            .await;
    }
}

/// Full rebuild of the URL cache: scans `path LEFT JOIN path_resource`
/// once under `user-vault:path:res:cache`.
pub async fn rebuild_url_cache(store: &Store, distlock: &DistLock, cache: &UrlCache) {
    let result: Result<(), r2e_core::AppError> = distlock
        .run(
            "user-vault:path:res:cache",
            Duration::from_secs(30),
            Duration::from_secs(10),
            || async {
                let records = store.list_all_path_records().await?;
                cache.clear();
                for record in records {
                    cache.put(record);
                }
                Ok(())
            },
        )
        .await;
    if let Err(e) = result {
        error!(error = %e, "full URL-cache rebuild failed");
    }
}

/// Full rebuild of the role-resource cache under
/// `user-vault:role:res:cache`.
pub async fn rebuild_role_res_cache(store: &Store, distlock: &DistLock, cache: &RoleResCache) {
    let result: Result<(), r2e_core::AppError> = distlock
        .run(&keys::role_res_cache(), Duration::from_secs(30), Duration::from_secs(10), || async {
            let pairs = store.list_all_role_resource_pairs().await?;
            cache.clear();
            for (role_no, res_code) in pairs {
                cache.mark_member(&role_no, &res_code);
            }
            Ok(())
        })
        .await;
    if let Err(e) = result {
        error!(error = %e, "full role-resource-cache rebuild failed");
    }
}

/// Cron controller running both full-rebuild jobs every 15 minutes; also
/// invoked once directly on bootstrap (see `main.rs`).
#[derive(Controller)]
#[controller(state = AppState)]
pub struct CacheRebuildJobs {
    #[inject]
    store: Store,
    #[inject]
    distlock: DistLock,
    #[inject]
    url_cache: UrlCache,
    #[inject]
    role_res_cache: RoleResCache,
}

#[routes]
impl CacheRebuildJobs {
    #[scheduled(cron = "0 */15 * * * *")]
    async fn load_path_res_cache(&self) {
        rebuild_url_cache(&self.store, &self.distlock, &self.url_cache).await;
    }

    #[scheduled(cron = "0 */15 * * * *")]
    async fn load_role_res_cache(&self) {
        rebuild_role_res_cache(&self.store, &self.distlock, &self.role_res_cache).await;
    }
}
