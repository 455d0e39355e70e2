//! Service-to-service endpoints under `/remote`. No `#[guard]`/JWT check —
//! these are only reachable from inside the deployment's internal network,
//! the same trust boundary `examples/original_source`'s `remote` package
//! assumes for its Hertz client-generated stubs.

use std::collections::HashMap;

use r2e::prelude::*;

use crate::access::AccessEngine;
use crate::cache::UrlCache;
use crate::distlock::DistLock;
use crate::dto::{
    AccessTestReq, AccessTestRes, CreatePathRes, CreateResourceReq, FindUserReq, ResourceCodeReq, RoleNoReq,
    UserInfo, UserNoToUsernameRes, UserNosReq, UsernameQuery,
};
use crate::state::AppState;
use crate::store::Store;

#[derive(Controller)]
#[controller(path = "/remote/user", state = AppState)]
pub struct RemoteUserController {
    #[inject]
    store: Store,
}

#[routes]
impl RemoteUserController {
    /// Exactly one of `userId`/`userNo`/`username` must be set.
    #[post("/info")]
    async fn info(&self, Json(body): Json<FindUserReq>) -> Result<Json<UserInfo>, AppError> {
        let set_count =
            body.user_id.is_some() as u8 + body.user_no.is_some() as u8 + body.username.is_some() as u8;
        if set_count != 1 {
            return Err(AppError::BadRequest(
                "exactly one of user_id, user_no, username must be set".to_string(),
            ));
        }

        let user = if let Some(id) = body.user_id {
            self.store.find_user_by_id(id).await?
        } else if let Some(user_no) = &body.user_no {
            self.store.find_user_by_user_no(user_no).await?
        } else {
            self.store.find_user_by_username(body.username.as_ref().unwrap()).await?
        };

        let user = user.ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
        Ok(Json(UserInfo::from(&user)))
    }

    #[get("/id")]
    async fn id(&self, Query(q): Query<UsernameQuery>) -> Result<Json<i64>, AppError> {
        let user = self
            .store
            .find_user_by_username(&q.username)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
        Ok(Json(user.id))
    }

    #[post("/userno/username")]
    async fn userno_to_username(&self, Json(body): Json<UserNosReq>) -> Result<Json<UserNoToUsernameRes>, AppError> {
        let mut map = HashMap::with_capacity(body.user_nos.len());
        for user_no in &body.user_nos {
            if let Some(user) = self.store.find_user_by_user_no(user_no).await? {
                map.insert(user.user_no.clone(), user.username);
            }
        }
        Ok(Json(UserNoToUsernameRes {
            user_no_to_username: map,
        }))
    }

    #[post("/list/with-role")]
    async fn list_with_role(&self, Json(body): Json<RoleNoReq>) -> Result<Json<Vec<UserInfo>>, AppError> {
        let users = self.store.list_users_with_role(&body.role_no).await?;
        Ok(Json(users.iter().map(UserInfo::from).collect()))
    }

    #[post("/list/with-resource")]
    async fn list_with_resource(&self, Json(body): Json<ResourceCodeReq>) -> Result<Json<Vec<UserInfo>>, AppError> {
        let users = self.store.list_users_with_resource(&body.resource_code).await?;
        Ok(Json(users.iter().map(UserInfo::from).collect()))
    }
}

#[derive(Controller)]
#[controller(path = "/remote", state = AppState)]
pub struct RemoteRegistrationController {
    #[inject]
    store: Store,
    #[inject]
    distlock: DistLock,
    #[inject]
    url_cache: UrlCache,
}

#[routes]
impl RemoteRegistrationController {
    /// Idempotent: repeated calls for the same code are no-ops.
    #[post("/resource/add")]
    async fn add_resource(&self, Json(body): Json<CreateResourceReq>) -> Result<(), AppError> {
        crate::admin::create_resource(&self.distlock, &self.store, &body.code, &body.name, "").await
    }

    /// Idempotent on `(group, method, normalizedUrl)`.
    #[post("/path/add")]
    async fn add_path(&self, Json(body): Json<crate::dto::CreatePathReq>) -> Result<Json<CreatePathRes>, AppError> {
        let path_no = crate::admin::create_or_update_path(
            &self.distlock,
            &self.store,
            &self.url_cache,
            &body.group,
            &body.method,
            &body.url,
            body.ptype,
            &body.desc,
            "",
        )
        .await?;
        Ok(Json(CreatePathRes { path_no }))
    }
}

/// The hot path: every registered service asks this before serving a
/// protected request.
#[derive(Controller)]
#[controller(path = "/remote/path/resource", state = AppState)]
pub struct AccessTestController {
    #[inject]
    access_engine: AccessEngine,
}

#[routes]
impl AccessTestController {
    #[post("/access-test")]
    async fn access_test(&self, Json(body): Json<AccessTestReq>) -> Result<Json<AccessTestRes>, AppError> {
        let valid = self
            .access_engine
            .test_resource_access(&body.role_no, &body.url, &body.method)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Json(AccessTestRes { valid }))
    }
}
