//! Service discovery: periodic and membership-triggered collection of
//! resource/path manifests from monitored services, grounded on
//! `examples/original_source/internal/vault/monitor.go`'s
//! `CreateMonitoredServiceWatch`/`TriggerResourcePathCollection`/
//! `QueryResourcePathAsync`.
//!
//! This workspace has no live service-registry client in scope, so
//! "membership change" is modeled behind a pluggable [`ServiceRegistry`]
//! trait; the periodic ticker and bounded worker pool are real.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::config::MonitorEntryConfig;
use crate::state::AppState;

pub const DEFAULT_MONITOR_PATH: &str = "/auth/resource";
const COLLECTION_TICK: Duration = Duration::from_secs(5 * 60);
const WORKER_POOL_CAPACITY: usize = 500;
const WORKER_POOL_CONCURRENCY: usize = 10;

/// One live instance of a monitored service.
#[derive(Clone, Debug)]
pub struct ServiceInstance {
    pub host: String,
    pub port: u16,
    pub register_time: i64,
}

impl ServiceInstance {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Resolves live instances of a named service. A real deployment backs
/// this with a service-registry client; the default implementation here
/// is a static, config-file-backed stand-in.
pub trait ServiceRegistry: Send + Sync {
    fn instances(&self, service: &str) -> Vec<ServiceInstance>;
}

/// Reads `client.addr.<service>.host`/`.port` from `R2eConfig`, as a
/// single fixed instance per service — the simplest registry that
/// satisfies the contract without a live discovery client dependency.
pub struct StaticServiceRegistry {
    config: r2e_core::config::R2eConfig,
}

impl StaticServiceRegistry {
    pub fn new(config: r2e_core::config::R2eConfig) -> Self {
        Self { config }
    }
}

impl ServiceRegistry for StaticServiceRegistry {
    fn instances(&self, service: &str) -> Vec<ServiceInstance> {
        let host: Option<String> = self
            .config
            .get(&format!("client.addr.{service}.host"))
            .ok();
        let port: Option<i64> = self
            .config
            .get(&format!("client.addr.{service}.port"))
            .ok();
        match (host, port) {
            (Some(host), Some(port)) => vec![ServiceInstance {
                host,
                port: port as u16,
                register_time: 0,
            }],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateResReq {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatePathReq {
    group: String,
    method: String,
    url: String,
    ptype: String,
    #[serde(default)]
    desc: String,
}

#[derive(Debug, Deserialize)]
struct QueryResourcePathRes {
    #[serde(default)]
    resources: Vec<CreateResReq>,
    #[serde(default)]
    paths: Vec<CreatePathReq>,
}

/// Monitors a fixed set of services, fetching their resource/path
/// manifests on bootstrap, every [`COLLECTION_TICK`], and on a reported
/// membership change.
pub struct Discovery {
    state: AppState,
    registry: Arc<dyn ServiceRegistry>,
    http: reqwest::Client,
    services: Vec<MonitorEntryConfig>,
    pool: Arc<Semaphore>,
}

impl Discovery {
    pub fn new(
        state: AppState,
        registry: Arc<dyn ServiceRegistry>,
        services: Vec<MonitorEntryConfig>,
    ) -> Self {
        Self {
            state,
            registry,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("reqwest client must build"),
            services,
            pool: Arc::new(Semaphore::new(WORKER_POOL_CONCURRENCY.min(WORKER_POOL_CAPACITY))),
        }
    }

    /// Collects from every monitored service once. Call on bootstrap and
    /// from the periodic ticker.
    pub async fn collect_all(&self) {
        for service in &self.services {
            self.trigger_collection(service).await;
        }
    }

    /// Re-collects a single service, e.g. after a membership-change
    /// notification from the service registry.
    pub async fn trigger_collection(&self, service: &MonitorEntryConfig) {
        let instances = self.registry.instances(&service.service);
        if instances.is_empty() {
            return;
        }

        let targets: Vec<ServiceInstance> = if service.all {
            instances
        } else {
            instances
                .into_iter()
                .max_by_key(|i| i.register_time)
                .into_iter()
                .collect()
        };

        for instance in targets {
            let permit = self.pool.clone().acquire_owned().await;
            let Ok(permit) = permit else { continue };
            let http = self.http.clone();
            let state = self.state.clone();
            let service_name = service.service.clone();
            let path = service.path.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = collect_one(&http, &state, &service_name, &instance, &path).await
                {
                    error!(service = %service_name, instance = %instance.base_url(), error = %err, "monitor collection failed");
                }
            });
        }
    }

    pub async fn run_periodic(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(COLLECTION_TICK);
        loop {
            ticker.tick().await;
            self.collect_all().await;
        }
    }
}


async fn collect_one(
    http: &reqwest::Client,
    state: &AppState,
    service: &str,
    instance: &ServiceInstance,
    path: &str,
) -> Result<(), String> {
    let url = format!("{}{}", instance.base_url(), path);
    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("non-2xx status: {}", response.status()));
    }
    let body: QueryResourcePathRes = response
        .json()
        .await
        .map_err(|e| format!("invalid response body: {e}"))?;

    debug!(service, resources = body.resources.len(), paths = body.paths.len(), "collected manifest");

    for resource in body.resources {
        if let Err(e) = state
            .store
            .create_resource_if_not_exist(&resource.code, &resource.name, "")
            .await
        {
            error!(service, code = %resource.code, error = %e, "failed to create resource");
        }
    }

    for path_req in body.paths {
        let ptype = match path_req.ptype.parse::<crate::model::PathType>() {
            Ok(ptype) => ptype,
            Err(e) => {
                error!(service, ptype = %path_req.ptype, error = %e, "unknown path type in manifest");
                continue;
            }
        };
        if let Err(e) = crate::admin::create_or_update_path(
            &state.distlock,
            &state.store,
            &state.url_cache,
            &path_req.group,
            &path_req.method,
            &path_req.url,
            ptype,
            &path_req.desc,
            "",
        )
        .await
        {
            error!(service, group = %path_req.group, url = %path_req.url, error = %e, "failed to upsert discovered path");
        }
    }

    Ok(())
}
