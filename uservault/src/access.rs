//! `TestResourceAccess` — the hot path every other request depends on.

use tracing::info;

use crate::cache::{normalize_url, PathRecord, RoleResCache, UrlCache};
use crate::ids::DEFAULT_ADMIN_ROLE_NO;
use crate::store::Store;

/// `Permit`/`Deny` plus the reason, used for logging only — callers see a
/// plain `bool`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny(&'static str),
}

impl Decision {
    pub fn is_permit(self) -> bool {
        matches!(self, Decision::Permit)
    }
}

/// Wraps the URL and role-resource caches with the store fallback that
/// populates them on a miss.
#[derive(Clone)]
pub struct AccessEngine {
    store: Store,
    url_cache: UrlCache,
    role_res_cache: RoleResCache,
}

impl AccessEngine {
    pub fn new(store: Store, url_cache: UrlCache, role_res_cache: RoleResCache) -> Self {
        Self {
            store,
            url_cache,
            role_res_cache,
        }
    }

    pub fn url_cache(&self) -> &UrlCache {
        &self.url_cache
    }

    pub fn role_res_cache(&self) -> &RoleResCache {
        &self.role_res_cache
    }

    /// Steps 1-7 of the access decision, in order. `role` is the caller's
    /// `roleNo`, possibly empty for an anonymous caller.
    pub async fn test_resource_access(
        &self,
        role: &str,
        url: &str,
        method: &str,
    ) -> Result<bool, sqlx::Error> {
        let decision = self.decide(role, url, method).await?;
        if let Decision::Deny(reason) = decision {
            info!(role, url, method, reason, "access denied");
        }
        Ok(decision.is_permit())
    }

    async fn decide(&self, role: &str, url: &str, method: &str) -> Result<Decision, sqlx::Error> {
        let normalized_url = normalize_url(url);
        let normalized_method = method.trim().to_uppercase();

        let store = &self.store;
        let record = self
            .url_cache
            .get_or_load(&normalized_method, &normalized_url, || {
                let store = store.clone();
                let method = normalized_method.clone();
                let url = normalized_url.clone();
                async move { store.find_path_record(&method, &url).await }
            })
            .await?;

        let record: PathRecord = match record {
            Some(r) => r,
            None => return Ok(Decision::Deny("path not found")),
        };

        if record.ptype == "PUBLIC" {
            return Ok(Decision::Permit);
        }

        let role = role.trim();
        if role.is_empty() {
            return Ok(Decision::Deny("no role"));
        }

        let res_code = match record.res_code {
            Some(code) if !code.is_empty() => code,
            _ => return Ok(Decision::Deny("path has no resource bound")),
        };

        if role == DEFAULT_ADMIN_ROLE_NO {
            return Ok(Decision::Permit);
        }

        if self.role_has_resource(role, &res_code).await? {
            Ok(Decision::Permit)
        } else {
            Ok(Decision::Deny("role not bound to resource"))
        }
    }

    /// `true` if `role` holds `res_code`, independent of any particular
    /// URL. The default admin role is not special-cased here — callers
    /// that need the admin bypass go through [`Self::test_resource_access`]
    /// or check `role == DEFAULT_ADMIN_ROLE_NO` themselves.
    pub async fn role_has_resource(&self, role: &str, res_code: &str) -> Result<bool, sqlx::Error> {
        let store = &self.store;
        self.role_res_cache
            .contains(role, res_code, || {
                let store = store.clone();
                let role = role.to_string();
                let res_code = res_code.to_string();
                async move { store.find_role_resource_membership(&role, &res_code).await }
            })
            .await
    }
}
