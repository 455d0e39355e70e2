//! Bootstrap: load config, connect the pool, wire every bean into
//! `AppState`, and register the HTTP/event/cron surface. Grounded on
//! `demos/example-multi-tenant/src/main.rs`'s single-phase
//! `#[tokio::main]` shape — uservault runs as a plain service with no
//! dev-reload hot-patching, so it skips `example-app`'s two-phase
//! `setup()`/`#[r2e::main]` split.

mod access;
mod admin;
mod authn;
mod cache;
mod config;
mod controllers;
mod discovery;
mod distlock;
mod dto;
mod guards;
mod ids;
mod model;
mod pipelines;
mod state;
mod store;

use std::sync::Arc;
use std::time::Duration;

use r2e::prelude::*;
use r2e::r2e_openapi::{OpenApiConfig, OpenApiPlugin};
use r2e::r2e_scheduler::Scheduler;
use r2e_events::EventBus;
use r2e_rate_limit::RateLimitRegistry;
use sqlx::mysql::MySqlPoolOptions;

use access::AccessEngine;
use cache::{RoleInfoCache, RoleResCache, UrlCache};
use config::UserVaultSettings;
use controllers::auth_controller::AuthController;
use controllers::remote_controller::{AccessTestController, RemoteRegistrationController, RemoteUserController};
use controllers::resource_admin_controller::{PathAdminController, ResourceAdminController, RoleAdminController};
use controllers::user_admin_controller::{AccessHistoryController, UserAdminController};
use discovery::{Discovery, StaticServiceRegistry};
use distlock::DistLock;
use pipelines::{
    AccessLogConsumer, AccessLogPermits, BinlogHookConsumer, BinlogHookPermits, CacheRebuildJobs,
    CreateNotifiByAccessPermits, CreateNotifiPermits, NotificationConsumer, ResourceUsersCache,
};
use state::AppState;
use store::Store;

#[tokio::main]
async fn main() {
    r2e::init_tracing();

    let config = R2eConfig::load("dev").unwrap_or_else(|_| R2eConfig::empty());
    let settings = UserVaultSettings::from_config(&config).unwrap_or_else(|e| {
        panic!("invalid uservault configuration: {e}");
    });

    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await
        .expect("failed to connect to database");

    let store = Store::new(pool);
    let distlock = DistLock::new();
    let url_cache = UrlCache::new();
    let role_res_cache = RoleResCache::new();
    let role_info_cache = RoleInfoCache::new();
    let access_engine = AccessEngine::new(store.clone(), url_cache.clone(), role_res_cache.clone());
    let event_bus = EventBus::new();
    let claims_validator =
        authn::build_claims_validator(&settings.jwt_secret, &settings.jwt_issuer, &settings.jwt_audience);

    let monitors = settings.monitors.clone();
    let discovery = Arc::new(Discovery::new(
        AppState {
            store: store.clone(),
            distlock: distlock.clone(),
            url_cache: url_cache.clone(),
            role_res_cache: role_res_cache.clone(),
            role_info_cache: role_info_cache.clone(),
            access_engine: access_engine.clone(),
            event_bus: event_bus.clone(),
            claims_validator: claims_validator.clone(),
            rate_limiter: RateLimitRegistry::default(),
            settings: settings.clone(),
            config: config.clone(),
            access_log_permits: AccessLogPermits::default(),
            create_notifi_permits: CreateNotifiPermits::default(),
            create_notifi_by_access_permits: CreateNotifiByAccessPermits::default(),
            binlog_hook_permits: BinlogHookPermits::default(),
            resource_users_cache: ResourceUsersCache::default(),
        },
        Arc::new(StaticServiceRegistry::new(config.clone())),
        monitors,
    ));

    // Both the cache rebuild and the monitored-service collection run once
    // on bootstrap in addition to their periodic schedule.
    pipelines::rebuild_url_cache(&store, &distlock, &url_cache).await;
    pipelines::rebuild_role_res_cache(&store, &distlock, &role_res_cache).await;
    discovery.collect_all().await;
    tokio::spawn(discovery.run_periodic());

    AppBuilder::new()
        .plugin(Scheduler)
        .provide(store)
        .provide(distlock)
        .provide(url_cache)
        .provide(role_res_cache)
        .provide(role_info_cache)
        .provide(access_engine)
        .provide(event_bus)
        .provide(claims_validator)
        .provide(RateLimitRegistry::default())
        .provide(settings)
        .provide(config.clone())
        .provide(AccessLogPermits::default())
        .provide(CreateNotifiPermits::default())
        .provide(CreateNotifiByAccessPermits::default())
        .provide(BinlogHookPermits::default())
        .provide(ResourceUsersCache::default())
        .build_state::<AppState, _, _>()
        .await
        .with_config(config)
        .with(Health)
        .with(Cors::permissive())
        .with(Tracing)
        .with(SecureHeaders::default())
        .with(RequestIdPlugin)
        .with(ErrorHandling)
        .with_layer(tower_http::timeout::TimeoutLayer::with_status_code(
            r2e::http::StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .with(OpenApiPlugin::new(
            OpenApiConfig::new("user-vault", "0.1.0")
                .with_description("Centralized identity-and-access RBAC service")
                .with_docs_ui(true),
        ))
        .on_start(|_state| async move {
            tracing::info!("uservault startup hook executed");
            Ok(())
        })
        .register_controller::<AuthController>()
        .register_controller::<UserAdminController>()
        .register_controller::<AccessHistoryController>()
        .register_controller::<ResourceAdminController>()
        .register_controller::<RoleAdminController>()
        .register_controller::<PathAdminController>()
        .register_controller::<RemoteUserController>()
        .register_controller::<RemoteRegistrationController>()
        .register_controller::<AccessTestController>()
        .register_controller::<AccessLogConsumer>()
        .register_controller::<NotificationConsumer>()
        .register_controller::<BinlogHookConsumer>()
        .register_controller::<CacheRebuildJobs>()
        .with(NormalizePath)
        .serve("0.0.0.0:8080")
        .await
        .unwrap();
}
