//! Application state, wired the same way
//! `demos/example-websocket-chat/src/state.rs` wires its `AppState`:
//! `#[derive(Clone, BeanState)]` generates `FromRef` for every field, which
//! is what lets `TokenUser`'s `impl_claims_identity_extractor!` pull the
//! `Arc<JwtClaimsValidator>` straight out of the request state.

use r2e::prelude::*;
use r2e_data_sqlx::HasPool;
use r2e_events::EventBus;
use r2e_rate_limit::RateLimitRegistry;
use r2e_security::JwtClaimsValidator;
use sqlx::MySql;
use std::sync::Arc;

use crate::access::AccessEngine;
use crate::cache::{RoleInfoCache, RoleResCache, UrlCache};
use crate::config::UserVaultSettings;
use crate::distlock::DistLock;
use crate::pipelines::{
    AccessLogPermits, BinlogHookPermits, CreateNotifiByAccessPermits, CreateNotifiPermits,
    ResourceUsersCache,
};
use crate::store::Store;

#[derive(Clone, BeanState)]
pub struct AppState {
    pub store: Store,
    pub distlock: DistLock,
    pub url_cache: UrlCache,
    pub role_res_cache: RoleResCache,
    pub role_info_cache: RoleInfoCache,
    pub access_engine: AccessEngine,
    pub event_bus: EventBus,
    pub claims_validator: Arc<JwtClaimsValidator>,
    pub rate_limiter: RateLimitRegistry,
    pub settings: UserVaultSettings,
    pub config: R2eConfig,
    /// Distinct newtypes per pipeline: `BeanState::from_context` resolves
    /// DI-provided values by Rust type, so identically-typed
    /// `Arc<Semaphore>` fields would collide if not individually wrapped.
    pub access_log_permits: AccessLogPermits,
    pub create_notifi_permits: CreateNotifiPermits,
    pub create_notifi_by_access_permits: CreateNotifiByAccessPermits,
    pub binlog_hook_permits: BinlogHookPermits,
    pub resource_users_cache: ResourceUsersCache,
}

impl HasPool<MySql> for AppState {
    fn pool(&self) -> &sqlx::MySqlPool {
        self.store.pool()
    }
}
