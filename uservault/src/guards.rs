//! Custom authorization guard protecting this service's own admin surface
//! with the same role/resource membership check `AccessEngine` runs for
//! every other registered service, grounded on
//! `demos/example-multi-tenant/src/tenant_guard.rs`'s `Guard<S, I>` impl.

use r2e::prelude::*;
use r2e::{Guard, GuardContext};

use crate::authn::TokenUser;
use crate::ids::DEFAULT_ADMIN_ROLE_NO;
use crate::state::AppState;

/// Requires the caller's role to hold `res_code`. The default admin role
/// always passes, mirroring `AccessEngine::test_resource_access`'s bypass.
pub struct ResourceGuard {
    res_code: &'static str,
}

impl ResourceGuard {
    pub const fn new(res_code: &'static str) -> Self {
        Self { res_code }
    }
}

impl Guard<AppState, TokenUser> for ResourceGuard {
    fn check(
        &self,
        state: &AppState,
        ctx: &GuardContext<'_, TokenUser>,
    ) -> impl std::future::Future<Output = Result<(), Response>> + Send {
        async move {
            let identity = ctx
                .identity
                .ok_or_else(|| AppError::Unauthorized("authentication required".into()).into_response())?;

            let role = identity.role_no.trim();
            if role.is_empty() {
                return Err(AppError::Forbidden("caller has no role".into()).into_response());
            }
            if role == DEFAULT_ADMIN_ROLE_NO {
                return Ok(());
            }

            match state.access_engine.role_has_resource(role, self.res_code).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(AppError::Forbidden(format!(
                    "role '{role}' is not bound to resource '{}'",
                    self.res_code
                ))
                .into_response()),
                Err(e) => Err(AppError::Internal(e.to_string()).into_response()),
            }
        }
    }
}
