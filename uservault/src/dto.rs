//! Request/response bodies for the HTTP surface. Kept separate from
//! `model` so storage rows and wire shapes can evolve independently, the
//! way `demos/example-postgres`'s `models/` module separates row structs
//! from its `dto` request/response types.

use serde::{Deserialize, Serialize};

use crate::model::{PathType, User};

#[derive(Debug, Deserialize)]
pub struct LoginReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeTokenReq {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleInfoReq {
    pub role_no: String,
}

#[derive(Debug, Serialize)]
pub struct RoleInfoRes {
    pub role_no: String,
    pub name: String,
}

/// Returned from `/open/api/token/user` and every `/remote/user/*` lookup.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub user_no: String,
    pub username: String,
    pub role_no: String,
    pub role_name: String,
    pub review_status: String,
    pub is_disabled: bool,
}

impl From<&User> for UserInfo {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            user_no: u.user_no.clone(),
            username: u.username.clone(),
            role_no: u.role_no.clone(),
            role_name: u.role_name.clone(),
            review_status: u.review_status.clone(),
            is_disabled: u.is_disabled,
        }
    }
}

/// The minimal identity summary handed back by `/open/api/token/user`.
#[derive(Debug, Serialize)]
pub struct UserInfoBrief {
    pub id: i64,
    pub user_no: String,
    pub username: String,
    pub role_no: String,
}

impl From<&User> for UserInfoBrief {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            user_no: u.user_no.clone(),
            username: u.username.clone(),
            role_no: u.role_no.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserInfoReq {
    pub user_id: i64,
    pub role_no: String,
    pub role_name: String,
    #[serde(default)]
    pub is_disabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationReviewReq {
    pub user_id: i64,
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordReq {
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AccessLogEntry {
    pub id: i64,
    pub url: String,
    pub success: bool,
    pub access_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateResourceReq {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteResourceReq {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePathReq {
    pub group: String,
    pub method: String,
    pub url: String,
    pub ptype: PathType,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePathRes {
    pub path_no: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePathReq {
    pub path_no: String,
}

#[derive(Debug, Deserialize)]
pub struct BindPathResourceReq {
    pub path_no: String,
    pub res_code: String,
}

#[derive(Debug, Deserialize)]
pub struct UnbindPathResourceReq {
    pub path_no: String,
}

#[derive(Debug, Deserialize)]
pub struct AddRoleReq {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AddRoleRes {
    pub role_no: String,
}

#[derive(Debug, Deserialize)]
pub struct AddRoleResourceReq {
    pub role_no: String,
    pub res_code: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRoleResourceReq {
    pub role_no: String,
    pub res_code: String,
}

/// Exactly one of the three must be set.
#[derive(Debug, Deserialize)]
pub struct FindUserReq {
    pub user_id: Option<i64>,
    pub user_no: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserNosReq {
    pub user_nos: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UserNoToUsernameRes {
    pub user_no_to_username: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleNoReq {
    pub role_no: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ResourceCodeReq {
    pub resource_code: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessTestReq {
    pub role_no: String,
    pub url: String,
    pub method: String,
}

#[derive(Debug, Serialize)]
pub struct AccessTestRes {
    pub valid: bool,
}
