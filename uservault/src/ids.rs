//! Opaque identifier generation for every entity in the store.
//!
//! `Path` identifiers are deterministic: the same `(group, method, url)`
//! triple always yields the same `path_no`, which is what lets path
//! registration be idempotent. Every other identifier is a random,
//! time-ordered UUIDv7 with a type prefix so ids are sortable by creation
//! order and self-describing in logs.

use base64::Engine;

/// Deterministic path identifier: `"path_" + base64(md5(group + method + url))`.
///
/// Ported bit-for-bit from the original `genPathNo` so that re-registering
/// the same route never produces a different id.
pub fn gen_path_no(group: &str, method: &str, url: &str) -> String {
    let digest = md5::compute(format!("{group}{method}{url}"));
    let encoded = base64::engine::general_purpose::STANDARD.encode(digest.0);
    format!("path_{encoded}")
}

fn prefixed_uuid(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::now_v7().simple())
}

pub fn gen_user_no() -> String {
    prefixed_uuid("UE")
}

pub fn gen_role_no() -> String {
    prefixed_uuid("role_")
}

pub fn gen_resource_no() -> String {
    prefixed_uuid("res_")
}

pub fn gen_user_key() -> String {
    prefixed_uuid("UKEY")
}

pub fn gen_notifi_no() -> String {
    prefixed_uuid("notif_")
}

pub fn gen_access_log_id() -> String {
    prefixed_uuid("alog_")
}

/// The role every fresh database is seeded with — the only role that can
/// never be unbound from a resource via the admin API.
pub const DEFAULT_ADMIN_ROLE_NO: &str = "role_554107924873216177918";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_path_no_is_deterministic() {
        let a = gen_path_no("user-vault", "GET", "/auth/resource");
        let b = gen_path_no("user-vault", "GET", "/auth/resource");
        assert_eq!(a, b);
        assert!(a.starts_with("path_"));
    }

    #[test]
    fn gen_path_no_distinguishes_method_and_url() {
        let a = gen_path_no("user-vault", "GET", "/auth/resource");
        let b = gen_path_no("user-vault", "POST", "/auth/resource");
        let c = gen_path_no("user-vault", "GET", "/auth/resource/other");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn prefixed_ids_are_unique_and_prefixed() {
        let a = gen_user_no();
        let b = gen_user_no();
        assert_ne!(a, b);
        assert!(a.starts_with("UE"));
        assert!(gen_role_no().starts_with("role_"));
        assert!(gen_resource_no().starts_with("res_"));
    }
}
