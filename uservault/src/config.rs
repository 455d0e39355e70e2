//! Typed configuration for the `uservault.*` section.
//!
//! Scalars load through `R2eConfig::get`/`get_or` the same way every
//! teacher example reads its settings; the `monitor` list is a sequence of
//! mappings, so it gets a small hand-written `FromConfigValue` impl rather
//! than the `#[derive(ConfigProperties)]` macro (which targets flat
//! sections, not nested lists-of-structs).

use r2e_core::config::{ConfigError, ConfigValue, FromConfigValue, R2eConfig};

use crate::model::MonitoredService;

/// One entry of `uservault.monitor[]`.
#[derive(Clone, Debug)]
pub struct MonitorEntryConfig {
    pub service: String,
    pub path: String,
    pub all: bool,
}

pub const DEFAULT_MONITOR_PATH: &str = "/auth/resource";

impl FromConfigValue for MonitorEntryConfig {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let ConfigValue::Map(map) = value else {
            return Err(ConfigError::TypeMismatch {
                key: key.to_string(),
                expected: "Map",
            });
        };
        let service = match map.get("service") {
            Some(v) => String::from_config_value(v, key)?,
            None => {
                return Err(ConfigError::NotFound(format!("{key}.service")));
            }
        };
        let path = match map.get("path") {
            Some(v) => String::from_config_value(v, key)?,
            None => DEFAULT_MONITOR_PATH.to_string(),
        };
        let all = match map.get("all") {
            Some(v) => bool::from_config_value(v, key)?,
            None => false,
        };
        Ok(MonitorEntryConfig { service, path, all })
    }
}

impl From<MonitorEntryConfig> for MonitoredService {
    fn from(e: MonitorEntryConfig) -> Self {
        MonitoredService {
            id: 0,
            service: e.service,
            path: e.path,
            collect_all: e.all,
        }
    }
}

/// Settings read out of `R2eConfig` at bootstrap.
#[derive(Clone, Debug)]
pub struct UserVaultSettings {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub monitors: Vec<MonitorEntryConfig>,
}

impl UserVaultSettings {
    pub fn from_config(config: &R2eConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: config.get("database.url")?,
            jwt_secret: config.get_or(
                "uservault.jwt.secret",
                "uservault-dev-secret-change-in-production".to_string(),
            ),
            jwt_issuer: config.get_or("uservault.jwt.issuer", "uservault".to_string()),
            jwt_audience: config.get_or("uservault.jwt.audience", "user-vault".to_string()),
            monitors: config
                .get::<Vec<MonitorEntryConfig>>("uservault.monitor")
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn monitor_entry_defaults_path_and_all() {
        let mut map = HashMap::new();
        map.insert("service".to_string(), ConfigValue::String("svc-a".into()));
        let cv = ConfigValue::Map(map);
        let entry = MonitorEntryConfig::from_config_value(&cv, "uservault.monitor[0]").unwrap();
        assert_eq!(entry.service, "svc-a");
        assert_eq!(entry.path, DEFAULT_MONITOR_PATH);
        assert!(!entry.all);
    }
}
