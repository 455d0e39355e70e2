//! Public, unauthenticated endpoints: login, self-registration, token
//! exchange/introspection, and role display lookup. Grounded on
//! `demos/example-postgres/src/controllers/article_controller.rs`'s
//! `#[routes]`/`Json`/`Query` extractor style; no `#[guard]`/`#[roles]`
//! here since none of these calls require an existing session.

use r2e::prelude::*;
use r2e_events::EventBus;

use crate::authn;
use crate::cache::{RoleInfo, RoleInfoCache};
use crate::config::UserVaultSettings;
use crate::dto::{
    ExchangeTokenReq, LoginReq, RegisterReq, RoleInfoReq, RoleInfoRes, TokenQuery, UserInfoBrief,
};
use crate::pipelines::{AccessLogEvent, UserCreatedBinlogEvent};
use crate::state::AppState;
use crate::store::Store;

#[derive(Controller)]
#[controller(path = "/open/api", state = AppState)]
pub struct AuthController {
    #[inject]
    store: Store,
    #[inject]
    settings: UserVaultSettings,
    #[inject]
    event_bus: EventBus,
    #[inject]
    role_info_cache: RoleInfoCache,
}

#[routes]
impl AuthController {
    /// Always reports the attempt to `event_bus`, success or failure, the
    /// way the original logs every login regardless of outcome.
    #[post("/user/login")]
    async fn login(&self, headers: HeaderMap, Json(body): Json<LoginReq>) -> Result<Json<String>, AppError> {
        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let result = authn::login(&self.store, &self.settings, &body.username, &body.password).await;
        let (success, user_id) = match &result {
            Ok((_, user)) => (true, user.id),
            Err(_) => (false, 0),
        };
        self.event_bus
            .emit(AccessLogEvent {
                user_agent,
                ip_address,
                user_id,
                username: body.username.clone(),
                url: "/open/api/user/login".to_string(),
                success,
            })
            .await;

        result.map(|(token, _)| Json(token))
    }

    /// Fires `UserCreatedBinlogEvent` on success, standing in for the
    /// original's real binlog stream (see `pipelines::BinlogHookConsumer`).
    #[post("/user/register/request")]
    async fn register_request(&self, Json(body): Json<RegisterReq>) -> Result<Json<String>, AppError> {
        let user_no = crate::admin::register_user(&self.store, &body.username, &body.password).await?;
        self.event_bus
            .emit(UserCreatedBinlogEvent {
                username: body.username.clone(),
            })
            .await;
        Ok(Json(user_no))
    }

    #[post("/token/exchange")]
    async fn exchange_token(&self, Json(body): Json<ExchangeTokenReq>) -> Result<Json<String>, AppError> {
        let token = authn::exchange_token(&self.settings.jwt_secret, &body.token)?;
        Ok(Json(token))
    }

    /// Identity lives entirely in the token's claims; no store round-trip.
    #[get("/token/user")]
    async fn token_user(&self, Query(q): Query<TokenQuery>) -> Result<Json<UserInfoBrief>, AppError> {
        let claims = authn::decode_token(&self.settings.jwt_secret, &q.token)?;
        Ok(Json(UserInfoBrief {
            id: claims.id,
            user_no: claims.userno,
            username: claims.username,
            role_no: claims.roleno,
        }))
    }

    #[post("/role/info")]
    async fn role_info(&self, Json(body): Json<RoleInfoReq>) -> Result<Json<RoleInfoRes>, AppError> {
        let store = self.store.clone();
        let role_no = body.role_no.clone();
        let info = self
            .role_info_cache
            .get_or_load(&body.role_no, || async move {
                Ok(store
                    .find_role_by_no(&role_no)
                    .await?
                    .map(|r| RoleInfo {
                        role_no: r.role_no,
                        name: r.name,
                    }))
            })
            .await?
            .ok_or_else(|| AppError::NotFound("role not found".to_string()))?;
        Ok(Json(RoleInfoRes {
            role_no: info.role_no,
            name: info.name,
        }))
    }
}
