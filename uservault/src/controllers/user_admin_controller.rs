//! Caller-protected user management and self-service endpoints, grounded
//! on `demos/example-multi-tenant/src/controllers/admin_controller.rs`'s
//! `#[guard(...)]` + `#[inject(identity)]` pairing. `manage-users` gates
//! the admin mutations; `basic-user` gates the self-service ones.

use r2e::prelude::*;

use crate::authn::TokenUser;
use crate::distlock::DistLock;
use crate::dto::{AccessLogEntry, RegistrationReviewReq, UpdatePasswordReq, UpdateUserInfoReq, UserInfo};
use crate::guards::ResourceGuard;
use crate::state::AppState;
use crate::store::Store;

#[derive(Controller)]
#[controller(path = "/open/api/user", state = AppState)]
pub struct UserAdminController {
    #[inject]
    store: Store,
    #[inject]
    distlock: DistLock,
}

#[routes]
impl UserAdminController {
    #[post("/list")]
    #[guard(ResourceGuard::new("manage-users"))]
    async fn list_users(
        &self,
        #[inject(identity)] _caller: TokenUser,
    ) -> Result<Json<Vec<UserInfo>>, AppError> {
        let users = self.store.list_users().await?;
        Ok(Json(users.iter().map(UserInfo::from).collect()))
    }

    #[post("/info/update")]
    #[guard(ResourceGuard::new("manage-users"))]
    async fn update_user_info(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<UpdateUserInfoReq>,
    ) -> Result<(), AppError> {
        crate::admin::update_user_info(
            &self.store,
            body.user_id,
            &body.role_no,
            &body.role_name,
            body.is_disabled,
            &caller.username,
        )
        .await
    }

    #[post("/registration/review")]
    #[guard(ResourceGuard::new("manage-users"))]
    async fn review_registration(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<RegistrationReviewReq>,
    ) -> Result<(), AppError> {
        crate::admin::review_registration(&self.distlock, &self.store, body.user_id, body.approve, &caller.username)
            .await
    }

    #[post("/password/update")]
    #[guard(ResourceGuard::new("basic-user"))]
    async fn update_password(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<UpdatePasswordReq>,
    ) -> Result<(), AppError> {
        crate::admin::update_password(&self.store, caller.id, &body.new_password).await
    }
}

/// Split from [`UserAdminController`] only by path prefix — `/open/api`
/// vs `/open/api/user` — `#[controller(path = ...)]` is one fixed prefix
/// per struct.
#[derive(Controller)]
#[controller(path = "/open/api/access", state = AppState)]
pub struct AccessHistoryController {
    #[inject]
    store: Store,
}

#[routes]
impl AccessHistoryController {
    #[post("/history")]
    #[guard(ResourceGuard::new("basic-user"))]
    async fn history(
        &self,
        #[inject(identity)] caller: TokenUser,
    ) -> Result<Json<Vec<AccessLogEntry>>, AppError> {
        let logs = self.store.list_access_logs(caller.id).await?;
        Ok(Json(
            logs.into_iter()
                .map(|l| AccessLogEntry {
                    id: l.id,
                    url: l.url,
                    success: l.success,
                    access_time: l.access_time,
                })
                .collect(),
        ))
    }
}
