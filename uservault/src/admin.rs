//! Admin mutations: resource/path/role CRUD, path-resource binding, role
//! membership, user management and registration review.
//!
//! Grounded on `examples/original_source/internal/vault/resource.go`'s
//! `BindPathRes`/`AddResToRoleIfNotExist`/`DeleteResource` — every mutation
//! acquires the narrowest relevant [`crate::distlock::DistLock`], in the
//! fixed order path-lock then global-resource-lock, and schedules a
//! best-effort cache refresh on success via a detached `tokio::spawn` child
//! task (the original's `commonPool.Go(...)` with a fresh span).
//!
//! Every function here takes only the narrow set of dependencies it needs
//! rather than the whole [`crate::state::AppState`], the same way
//! `demos/example-postgres`'s services hold exactly the pool/repo they use
//! and `crate::pipelines::rebuild_url_cache`/`rebuild_role_res_cache` take
//! `store`/`distlock`/`cache` directly.

use std::time::Duration;

use r2e_core::AppError;
use tracing::warn;

use crate::cache::{PathRecord, RoleResCache, UrlCache};
use crate::distlock::{keys, DistLock, LockError};
use crate::ids;
use crate::model::{PathType, REVIEW_APPROVED, REVIEW_PENDING, REVIEW_REJECTED};
use crate::store::Store;

const LOCK_TTL: Duration = Duration::from_secs(5);
const LOCK_WAIT: Duration = Duration::from_secs(3);

impl From<LockError> for AppError {
    fn from(e: LockError) -> Self {
        AppError::Internal(e.to_string())
    }
}

/// `[a-zA-Z0-9_\-@.]{6,50}`, checked by hand rather than pulling in a regex
/// dependency for one fixed pattern.
fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    if !(6..=50).contains(&len) {
        return false;
    }
    username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' || c == '@')
}

fn validate_new_credentials(username: &str, password: &str) -> Result<(), AppError> {
    if !is_valid_username(username) {
        return Err(AppError::BadRequest("invalid username".to_string()));
    }
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }
    if username == password {
        return Err(AppError::BadRequest(
            "username and password must differ".to_string(),
        ));
    }
    Ok(())
}

/// Schedules a best-effort, detached refresh of the URL cache entry for a
/// single `pathNo`. Runs in a fresh task so it survives the originating
/// request's cancellation.
fn schedule_path_refresh(store: Store, url_cache: UrlCache, path_no: String) {
    tokio::spawn(async move {
        match store.find_path_by_no(&path_no).await {
            Ok(Some(path)) => {
                let res_code = store
                    .find_role_resource_pairs_for_path(&path_no)
                    .await
                    .ok()
                    .flatten();
                url_cache.put(PathRecord {
                    path_no: path.path_no,
                    group: path.pgroup,
                    res_code,
                    method: path.method,
                    url: path.url,
                    ptype: path.ptype,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(path_no, error = %e, "targeted path-cache refresh failed"),
        }
    });
}

/// Schedules a best-effort, detached refresh of every `(roleNo, resCode)`
/// sentinel for one role.
fn schedule_role_refresh(store: Store, role_res_cache: RoleResCache, role_no: String) {
    tokio::spawn(async move {
        match store.list_role_resources(&role_no).await {
            Ok(codes) => {
                for code in codes {
                    role_res_cache.mark_member(&role_no, &code);
                }
            }
            Err(e) => warn!(role_no, error = %e, "targeted role-cache refresh failed"),
        }
    });
}

// ---- Resource ----

pub async fn create_resource(
    distlock: &DistLock,
    store: &Store,
    code: &str,
    name: &str,
    by: &str,
) -> Result<(), AppError> {
    distlock
        .run(&keys::global_resource(), LOCK_TTL, LOCK_WAIT, || async {
            store.create_resource_if_not_exist(code, name, by).await
        })
        .await
}

pub async fn delete_resource(
    distlock: &DistLock,
    store: &Store,
    url_cache: &UrlCache,
    role_res_cache: &RoleResCache,
    code: &str,
) -> Result<(), AppError> {
    distlock
        .run(&keys::global_resource(), LOCK_TTL, LOCK_WAIT, || async {
            let mut tx = r2e_data_sqlx::Tx(
                store
                    .pool()
                    .begin()
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?,
            );
            store.delete_resource_cascade(&mut tx, code).await?;
            tx.into_inner()
                .commit()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            Ok::<(), AppError>(())
        })
        .await?;
    url_cache.clear();
    role_res_cache.clear();
    Ok(())
}

// ---- Path ----

/// Idempotent on `(group, method, normalizedUrl)`.
#[allow(clippy::too_many_arguments)]
pub async fn create_or_update_path(
    distlock: &DistLock,
    store: &Store,
    url_cache: &UrlCache,
    group: &str,
    method: &str,
    url: &str,
    ptype: PathType,
    desc: &str,
    by: &str,
) -> Result<String, AppError> {
    let normalized_url = crate::cache::normalize_url(url);
    let upper_method = method.trim().to_uppercase();
    let path_no = ids::gen_path_no(group, &upper_method, &normalized_url);

    distlock
        .run(&keys::path(&path_no), LOCK_TTL, LOCK_WAIT, || async {
            let mut tx = r2e_data_sqlx::Tx(
                store
                    .pool()
                    .begin()
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?,
            );
            store
                .upsert_path(
                    &mut tx,
                    &path_no,
                    group,
                    &upper_method,
                    &normalized_url,
                    ptype.as_str(),
                    desc,
                    by,
                )
                .await?;
            tx.into_inner()
                .commit()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            Ok::<(), AppError>(())
        })
        .await?;

    schedule_path_refresh(store.clone(), url_cache.clone(), path_no.clone());
    Ok(path_no)
}

pub async fn delete_path(
    distlock: &DistLock,
    store: &Store,
    url_cache: &UrlCache,
    path_no: &str,
    by: &str,
) -> Result<(), AppError> {
    distlock
        .run(&keys::path(path_no), LOCK_TTL, LOCK_WAIT, || async {
            store.delete_path(path_no, by).await
        })
        .await?;
    url_cache.clear();
    Ok(())
}

/// Binds `path_no` to `res_code`. "Ignore if already bound": a binding to
/// a *different* resource is left untouched. Lock order: path lock, then
/// global resource lock.
pub async fn bind_path_resource(
    distlock: &DistLock,
    store: &Store,
    url_cache: &UrlCache,
    path_no: &str,
    res_code: &str,
    by: &str,
) -> Result<(), AppError> {
    let store2 = store.clone();
    let path_no2 = path_no.to_string();
    let res_code2 = res_code.to_string();
    let by2 = by.to_string();
    let distlock2 = distlock.clone();
    distlock
        .run(&keys::path(path_no), LOCK_TTL, LOCK_WAIT, move || {
            let store = store2;
            let path_no = path_no2;
            let res_code = res_code2;
            let by = by2;
            let distlock = distlock2;
            async move {
                distlock
                    .run(&keys::global_resource(), LOCK_TTL, LOCK_WAIT, || async {
                        store.bind_path_resource(&path_no, &res_code, &by).await
                    })
                    .await
            }
        })
        .await?;

    schedule_path_refresh(store.clone(), url_cache.clone(), path_no.to_string());
    Ok(())
}

/// Ignores `res_code` entirely and removes any binding on `path_no`,
/// per the decided Open Question behavior.
pub async fn unbind_path_resource(
    distlock: &DistLock,
    store: &Store,
    url_cache: &UrlCache,
    path_no: &str,
) -> Result<(), AppError> {
    distlock
        .run(&keys::path(path_no), LOCK_TTL, LOCK_WAIT, || async {
            store.unbind_path_resource(path_no).await
        })
        .await?;
    schedule_path_refresh(store.clone(), url_cache.clone(), path_no.to_string());
    Ok(())
}

// ---- Role / RoleResource ----

pub async fn add_role(store: &Store, name: &str, by: &str) -> Result<String, AppError> {
    let role_no = ids::gen_role_no();
    store.add_role(&role_no, name, by).await?;
    Ok(role_no)
}

pub async fn add_role_resource(
    distlock: &DistLock,
    store: &Store,
    role_res_cache: &RoleResCache,
    role_no: &str,
    res_code: &str,
    by: &str,
) -> Result<(), AppError> {
    let lock_key = format!("user-vault:role:{role_no}");
    let store2 = store.clone();
    let role_no2 = role_no.to_string();
    let res_code2 = res_code.to_string();
    let by2 = by.to_string();
    let distlock2 = distlock.clone();
    distlock
        .run(&lock_key, LOCK_TTL, LOCK_WAIT, move || {
            let store = store2;
            let role_no = role_no2;
            let res_code = res_code2;
            let by = by2;
            let distlock = distlock2;
            async move {
                distlock
                    .run(&keys::global_resource(), LOCK_TTL, LOCK_WAIT, || async {
                        store
                            .add_role_resource_if_not_exist(&role_no, &res_code, &by)
                            .await
                    })
                    .await
            }
        })
        .await?;

    schedule_role_refresh(store.clone(), role_res_cache.clone(), role_no.to_string());
    Ok(())
}

pub async fn remove_role_resource(
    store: &Store,
    role_res_cache: &RoleResCache,
    role_no: &str,
    res_code: &str,
) -> Result<(), AppError> {
    store.remove_role_resource(role_no, res_code).await?;
    schedule_role_refresh(store.clone(), role_res_cache.clone(), role_no.to_string());
    Ok(())
}

// ---- User / registration ----

/// Self-registration leaves `roleNo`/`roleName` empty; an admin assigns a
/// role via [`update_user_info`] once the registration is approved.
pub async fn register_user(store: &Store, username: &str, password: &str) -> Result<String, AppError> {
    validate_new_credentials(username, password)?;
    if store.find_user_by_username(username).await?.is_some() {
        return Err(AppError::BadRequest("username already taken".to_string()));
    }
    let (hash, salt) = crate::authn::hash_new_password(password);
    let user_no = ids::gen_user_no();
    store
        .create_user(&user_no, username, &hash, &salt, REVIEW_PENDING, "", "", "")
        .await?;
    Ok(user_no)
}

pub async fn review_registration(
    distlock: &DistLock,
    store: &Store,
    user_id: i64,
    approve: bool,
    by: &str,
) -> Result<(), AppError> {
    let lock_key = keys::user_registration_review(&user_id.to_string());
    let status = if approve { REVIEW_APPROVED } else { REVIEW_REJECTED };
    let store2 = store.clone();
    let by2 = by.to_string();
    distlock
        .run(&lock_key, LOCK_TTL, LOCK_WAIT, move || {
            let store = store2;
            let by = by2;
            async move {
                let user = store
                    .find_user_by_id(user_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
                if !user.can_review() {
                    return Err(AppError::BadRequest(format!(
                        "user {user_id} has already been reviewed"
                    )));
                }
                store.update_review_status(user_id, status, &by).await
            }
        })
        .await
}

pub async fn update_user_info(
    store: &Store,
    user_id: i64,
    role_no: &str,
    role_name: &str,
    is_disabled: bool,
    by: &str,
) -> Result<(), AppError> {
    store
        .update_user_info(user_id, role_no, role_name, is_disabled, by)
        .await
}

pub async fn update_password(store: &Store, user_id: i64, new_password: &str) -> Result<(), AppError> {
    if new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let (hash, salt) = crate::authn::hash_new_password(new_password);
    store.update_password(user_id, &hash, &salt).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_length_bounds() {
        assert!(!is_valid_username("abcde"));
        assert!(is_valid_username("abcdef"));
        assert!(is_valid_username(&"a".repeat(50)));
        assert!(!is_valid_username(&"a".repeat(51)));
    }

    #[test]
    fn username_charset() {
        assert!(is_valid_username("john_doe-92.x"));
        assert!(is_valid_username("john@doe.com"));
        assert!(!is_valid_username("john doe!!"));
    }

    #[test]
    fn credentials_reject_short_password() {
        let err = validate_new_credentials("validname", "short").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn credentials_reject_username_equal_to_password() {
        let err = validate_new_credentials("samevalue123", "samevalue123").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn credentials_accept_valid_pair() {
        assert!(validate_new_credentials("john_doe", "correct-horse-battery").is_ok());
    }
}
