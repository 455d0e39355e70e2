//! Direct-sqlx persistence for every entity, grounded on
//! `demos/example-postgres/src/services/article_service.rs`'s style:
//! hand-written parameterized queries per operation rather than a generic
//! `Repository<T, ID>` trait, since the joins and aggregates below don't
//! reduce cleanly to one.

use chrono::Utc;
use r2e_core::AppError;
use r2e_data_sqlx::Tx;
use sqlx::MySql;
use sqlx::MySqlPool;

use crate::cache::PathRecord;
use crate::model::{AccessLog, MonitoredService, Path, Resource, Role, User, UserKey};

fn map_sqlx_err(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
        other => AppError::Internal(other.to_string()),
    }
}

/// `#[bean]`-provided data-access layer, one pool shared by every request.
#[derive(Clone)]
pub struct Store {
    pool: MySqlPool,
}

impl r2e_data_sqlx::HasPool<MySql> for Store {
    fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl Store {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    // ---- Path / Resource lookups feeding the caches ----

    /// Fetches the path-resource join row for `(method, normalizedUrl)`.
    /// Feeds `UrlCache`'s loader on a miss.
    pub async fn find_path_record(
        &self,
        method: &str,
        normalized_url: &str,
    ) -> Result<Option<PathRecord>, sqlx::Error> {
        let row = sqlx::query_as::<_, (String, String, String, String, Option<String>)>(
            "SELECT p.path_no, p.pgroup, p.ptype, p.url, pr.res_code \
             FROM path p LEFT JOIN path_resource pr ON pr.path_no = p.path_no \
             WHERE p.method = ? AND p.url = ?",
        )
        .bind(method)
        .bind(normalized_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(path_no, group, ptype, url, res_code)| PathRecord {
            path_no,
            group,
            res_code,
            method: method.to_string(),
            url,
            ptype,
        }))
    }

    /// `true` if `roleNo` holds `resCode` via the `role_resource` table.
    /// Feeds `RoleResCache`'s loader on a miss.
    pub async fn find_role_resource_membership(
        &self,
        role_no: &str,
        res_code: &str,
    ) -> Result<Option<()>, sqlx::Error> {
        let exists: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM role_resource WHERE role_no = ? AND res_code = ? LIMIT 1",
        )
        .bind(role_no)
        .bind(res_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(exists.map(|_| ()))
    }

    /// Full scan backing `LoadPathResCache`.
    pub async fn list_all_path_records(&self) -> Result<Vec<PathRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, Option<String>)>(
            "SELECT p.path_no, p.pgroup, p.ptype, p.method, p.url, pr.res_code \
             FROM path p LEFT JOIN path_resource pr ON pr.path_no = p.path_no",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(path_no, group, ptype, method, url, res_code)| PathRecord {
                path_no,
                group,
                res_code,
                method,
                url,
                ptype,
            })
            .collect())
    }

    /// Full scan backing `LoadRoleResCache`: every `(roleNo, resCode)` pair.
    pub async fn list_all_role_resource_pairs(&self) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as("SELECT role_no, res_code FROM role_resource")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn find_role_resource_pairs_for_path(
        &self,
        path_no: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT res_code FROM path_resource WHERE path_no = ?")
                .bind(path_no)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(c,)| c))
    }

    // ---- Path CRUD ----

    pub async fn find_path_by_no(&self, path_no: &str) -> Result<Option<Path>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM path WHERE path_no = ?")
            .bind(path_no)
            .fetch_optional(&self.pool)
            .await
    }

    /// Idempotent on `(group, method, normalizedUrl)`: existing row with the
    /// same `pathNo` either no-ops or updates `ptype` if it changed.
    pub async fn upsert_path(
        &self,
        tx: &mut Tx<'_, MySql>,
        path_no: &str,
        group: &str,
        method: &str,
        url: &str,
        ptype: &str,
        desc: &str,
        by: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO path (path_no, pgroup, method, url, ptype, `desc`, create_time, create_by, update_time, update_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE ptype = VALUES(ptype), update_time = VALUES(update_time), update_by = VALUES(update_by)",
        )
        .bind(path_no)
        .bind(group)
        .bind(method)
        .bind(url)
        .bind(ptype)
        .bind(desc)
        .bind(now)
        .bind(by)
        .bind(now)
        .bind(by)
        .execute(tx.as_mut())
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn delete_path(&self, path_no: &str, by: &str) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query("UPDATE path SET update_time = ?, update_by = ? WHERE path_no = ?")
            .bind(now)
            .bind(by)
            .bind(path_no)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        sqlx::query("DELETE FROM path WHERE path_no = ?")
            .bind(path_no)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn list_paths(&self) -> Result<Vec<Path>, AppError> {
        sqlx::query_as("SELECT * FROM path ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    // ---- Resource CRUD ----

    pub async fn find_resource_by_code(&self, code: &str) -> Result<Option<Resource>, AppError> {
        sqlx::query_as("SELECT * FROM resource WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn create_resource_if_not_exist(
        &self,
        code: &str,
        name: &str,
        by: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT IGNORE INTO resource (code, name, create_time, create_by, update_time, update_by) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(code)
        .bind(name)
        .bind(now)
        .bind(by)
        .bind(now)
        .bind(by)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    /// Cascading delete: removes dependent `role_resource`/`path_resource`
    /// rows in the same transaction before deleting the resource itself.
    pub async fn delete_resource_cascade(
        &self,
        tx: &mut Tx<'_, MySql>,
        code: &str,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM role_resource WHERE res_code = ?")
            .bind(code)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_err)?;
        sqlx::query("DELETE FROM path_resource WHERE res_code = ?")
            .bind(code)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_err)?;
        sqlx::query("DELETE FROM resource WHERE code = ?")
            .bind(code)
            .execute(tx.as_mut())
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, AppError> {
        sqlx::query_as("SELECT * FROM resource ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    // ---- Path <-> Resource binding ----

    /// "Ignore if already bound": a pre-existing binding to a *different*
    /// resource is left untouched rather than replaced.
    pub async fn bind_path_resource(
        &self,
        path_no: &str,
        res_code: &str,
        by: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT IGNORE INTO path_resource (path_no, res_code, create_time, create_by) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(path_no)
        .bind(res_code)
        .bind(now)
        .bind(by)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    /// Ignores `res_code` and removes any binding for `path_no`, matching
    /// the decided Open Question behavior.
    pub async fn unbind_path_resource(&self, path_no: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM path_resource WHERE path_no = ?")
            .bind(path_no)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    // ---- Role / RoleResource ----

    pub async fn find_role_by_no(&self, role_no: &str) -> Result<Option<Role>, AppError> {
        sqlx::query_as("SELECT * FROM role WHERE role_no = ?")
            .bind(role_no)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn add_role(&self, role_no: &str, name: &str, by: &str) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO role (role_no, name, create_time, create_by, update_time, update_by) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(role_no)
        .bind(name)
        .bind(now)
        .bind(by)
        .bind(now)
        .bind(by)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        sqlx::query_as("SELECT * FROM role ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn add_role_resource_if_not_exist(
        &self,
        role_no: &str,
        res_code: &str,
        by: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT IGNORE INTO role_resource (role_no, res_code, create_time, create_by) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(role_no)
        .bind(res_code)
        .bind(now)
        .bind(by)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn remove_role_resource(&self, role_no: &str, res_code: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM role_resource WHERE role_no = ? AND res_code = ?")
            .bind(role_no)
            .bind(res_code)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn list_role_resources(&self, role_no: &str) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT res_code FROM role_resource WHERE role_no = ?")
                .bind(role_no)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    /// Every user holding `res_code` via any role (admin role included),
    /// used by `CreateNotifiByAccessPipeline`.
    pub async fn list_users_with_resource(&self, res_code: &str) -> Result<Vec<User>, AppError> {
        sqlx::query_as(
            "SELECT u.* FROM user u \
             JOIN role_resource rr ON rr.role_no = u.role_no \
             WHERE rr.res_code = ? AND u.is_del = 0",
        )
        .bind(res_code)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    // ---- User ----

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as("SELECT * FROM user WHERE username = ? AND is_del = 0")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        sqlx::query_as("SELECT * FROM user WHERE id = ? AND is_del = 0")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn find_user_by_user_no(&self, user_no: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as("SELECT * FROM user WHERE user_no = ? AND is_del = 0")
            .bind(user_no)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn list_users_with_role(&self, role_no: &str) -> Result<Vec<User>, AppError> {
        sqlx::query_as("SELECT * FROM user WHERE role_no = ? AND is_del = 0")
            .bind(role_no)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        sqlx::query_as("SELECT * FROM user WHERE is_del = 0 ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn create_user(
        &self,
        user_no: &str,
        username: &str,
        password_hash: &str,
        salt: &str,
        review_status: &str,
        role_no: &str,
        role_name: &str,
        by: &str,
    ) -> Result<i64, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO user \
             (user_no, username, password, salt, review_status, role_no, role_name, is_disabled, create_time, create_by, update_time, update_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
        )
        .bind(user_no)
        .bind(username)
        .bind(password_hash)
        .bind(salt)
        .bind(review_status)
        .bind(role_no)
        .bind(role_name)
        .bind(now)
        .bind(by)
        .bind(now)
        .bind(by)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(result.last_insert_id() as i64)
    }

    pub async fn update_review_status(
        &self,
        user_id: i64,
        status: &str,
        by: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE user SET review_status = ?, update_time = ?, update_by = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(by)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    /// Reassigns a user's role and/or disabled flag. `manage-users` admin
    /// mutation; does not touch credentials.
    pub async fn update_user_info(
        &self,
        user_id: i64,
        role_no: &str,
        role_name: &str,
        is_disabled: bool,
        by: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE user SET role_no = ?, role_name = ?, is_disabled = ?, update_time = ?, update_by = ? WHERE id = ?",
        )
        .bind(role_no)
        .bind(role_name)
        .bind(is_disabled)
        .bind(Utc::now())
        .bind(by)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn update_password(&self, user_id: i64, hash: &str, salt: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE user SET password = ?, salt = ?, update_time = ? WHERE id = ?")
            .bind(hash)
            .bind(salt)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    // ---- UserKey ----

    pub async fn find_valid_user_key(
        &self,
        user_id: i64,
        secret_key: &str,
    ) -> Result<Option<UserKey>, AppError> {
        sqlx::query_as(
            "SELECT * FROM user_key WHERE user_id = ? AND secret_key = ? \
             AND expiration_time > ? AND is_del = 0",
        )
        .bind(user_id)
        .bind(secret_key)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    pub async fn list_user_keys(&self, user_no: &str) -> Result<Vec<UserKey>, AppError> {
        sqlx::query_as("SELECT * FROM user_key WHERE user_no = ? AND is_del = 0")
            .bind(user_no)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    pub async fn create_user_key(
        &self,
        user_id: i64,
        user_no: &str,
        name: &str,
        secret_key: &str,
        expiration_time: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_key (user_id, user_no, name, secret_key, expiration_time, create_time, is_del) \
             VALUES (?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(user_id)
        .bind(user_no)
        .bind(name)
        .bind(secret_key)
        .bind(expiration_time)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn delete_user_key(&self, user_no: &str, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE user_key SET is_del = 1 WHERE user_no = ? AND id = ? AND is_del = 0")
            .bind(user_no)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    // ---- AccessLog ----

    pub async fn insert_access_log(
        &self,
        user_agent: &str,
        ip_address: &str,
        user_id: i64,
        username: &str,
        url: &str,
        success: bool,
        access_time: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO access_log \
             (user_agent, ip_address, user_id, username, url, success, access_time, create_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_agent)
        .bind(ip_address)
        .bind(user_id)
        .bind(username)
        .bind(url)
        .bind(success)
        .bind(access_time)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    pub async fn list_access_logs(&self, user_id: i64) -> Result<Vec<AccessLog>, AppError> {
        sqlx::query_as("SELECT * FROM access_log WHERE user_id = ? ORDER BY id DESC LIMIT 200")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }

    // ---- MonitoredService registry ----

    pub async fn list_monitored_services(&self) -> Result<Vec<MonitoredService>, AppError> {
        sqlx::query_as("SELECT * FROM monitored_service")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)
    }
}
