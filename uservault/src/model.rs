//! Row-level entity types for every table the store touches.
//!
//! These mirror `EPath`/`ERes`/`ERole`/`ERoleRes`/`User`/`UserKey`/`AccessLog`
//! from the original Go model, translated into owned Rust structs with
//! `sqlx::FromRow` so they can be fetched directly with `query_as`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A path is either gated behind a resource binding or world-reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum PathType {
    Protected,
    Public,
}

impl PathType {
    pub fn as_str(self) -> &'static str {
        match self {
            PathType::Protected => "PROTECTED",
            PathType::Public => "PUBLIC",
        }
    }
}

impl std::str::FromStr for PathType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROTECTED" => Ok(PathType::Protected),
            "PUBLIC" => Ok(PathType::Public),
            other => Err(format!("unknown path type: {other}")),
        }
    }
}

/// A registered route: `(group, method, url)` uniquely identifies it via
/// [`crate::ids::gen_path_no`].
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Path {
    pub id: i64,
    pub pgroup: String,
    pub path_no: String,
    pub desc: String,
    pub url: String,
    pub method: String,
    pub ptype: String,
    pub create_time: DateTime<Utc>,
    pub create_by: String,
    pub update_time: DateTime<Utc>,
    pub update_by: String,
}

/// An access-control resource: a named permission bucket that paths and
/// roles bind into.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub create_by: String,
    pub update_time: DateTime<Utc>,
    pub update_by: String,
}

/// A role that users are assigned and that resources are bound to.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub role_no: String,
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub create_by: String,
    pub update_time: DateTime<Utc>,
    pub update_by: String,
}

/// Membership row binding a role to a resource.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleResource {
    pub id: i64,
    pub role_no: String,
    pub res_code: String,
    pub create_time: DateTime<Utc>,
    pub create_by: String,
}

/// Binding row attaching a resource to a path.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct PathResource {
    pub id: i64,
    pub path_no: String,
    pub res_code: String,
    pub create_time: DateTime<Utc>,
    pub create_by: String,
}

/// A login principal. `role_no`/`role_name` are denormalized so login can
/// avoid a join on the hot path.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub user_no: String,
    pub username: String,
    pub password: String,
    pub salt: String,
    pub review_status: String,
    pub role_no: String,
    pub role_name: String,
    pub is_disabled: bool,
    pub create_time: DateTime<Utc>,
    pub create_by: String,
    pub update_time: DateTime<Utc>,
    pub update_by: String,
}

pub const REVIEW_PENDING: &str = "PENDING";
pub const REVIEW_APPROVED: &str = "APPROVED";
pub const REVIEW_REJECTED: &str = "REJECTED";

impl User {
    pub fn can_review(&self) -> bool {
        self.review_status == REVIEW_PENDING
    }
}

/// A long-lived API key standing in for a username/password login.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserKey {
    pub id: i64,
    pub user_id: i64,
    pub user_no: String,
    pub name: String,
    pub secret_key: String,
    pub expiration_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
    pub is_del: bool,
}

/// An immutable record of one access decision, written asynchronously.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLog {
    pub id: i64,
    pub user_agent: String,
    pub ip_address: String,
    pub user_id: i64,
    pub username: String,
    pub url: String,
    pub success: bool,
    pub access_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
}

/// A downstream service discovered via the service registry, whose routes
/// are being collected into `path`/`resource`/`path_resource`.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow, JsonSchema)]
pub struct MonitoredService {
    pub id: i64,
    pub service: String,
    /// Relative path the service exposes its resource manifest on.
    pub path: String,
    /// Collect from every healthy instance rather than one at random.
    pub collect_all: bool,
}
