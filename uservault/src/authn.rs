//! Password verification, JWT mint/verify, and the `TokenUser` principal.
//!
//! JWT handling is grounded on
//! `demos/example-multi-tenant/src/tenant_identity.rs`'s `TenantUser`:
//! a static HS256 key via `JwtClaimsValidator::new_with_static_key`, and
//! `ClaimsIdentity<S>` + `impl_claims_identity_extractor!` wiring the type
//! into Axum extraction.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use r2e_core::guards::Identity;
use r2e_core::AppError;
use r2e_security::{impl_claims_identity_extractor, ClaimsIdentity, JwtClaimsValidator, SecurityConfig};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::UserVaultSettings;
use crate::store::Store;

const TOKEN_TTL_MINUTES: i64 = 15;

/// Claims minted into every token: `{id, username, userno, roleno}` plus
/// the standard `exp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: i64,
    pub username: String,
    pub userno: String,
    pub roleno: String,
    pub exp: i64,
}

/// The principal every protected handler receives, parsed from the JWT.
/// `NilUser` (`is_nil = true`) stands in for internal/system callers.
/// `roles` is derived from `role_no` at construction time and cached so
/// `Identity::roles` can hand back a borrow.
#[derive(Debug, Clone)]
pub struct TokenUser {
    pub id: i64,
    pub username: String,
    pub user_no: String,
    pub role_no: String,
    pub is_nil: bool,
    roles: Vec<String>,
}

impl TokenUser {
    pub fn nil() -> Self {
        Self {
            id: 0,
            username: String::new(),
            user_no: String::new(),
            role_no: String::new(),
            is_nil: true,
            roles: Vec::new(),
        }
    }

    fn roles_from(role_no: &str) -> Vec<String> {
        if role_no.is_empty() {
            Vec::new()
        } else {
            vec![role_no.to_string()]
        }
    }
}

impl Identity for TokenUser {
    fn sub(&self) -> &str {
        &self.user_no
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl<S> ClaimsIdentity<S> for TokenUser
where
    S: Send + Sync,
{
    async fn from_jwt_claims(claims: serde_json::Value, _state: &S) -> Result<Self, AppError> {
        let parsed: TokenClaims = serde_json::from_value(claims)
            .map_err(|e| AppError::Unauthorized(format!("malformed token claims: {e}")))?;
        let roles = Self::roles_from(&parsed.roleno);
        Ok(TokenUser {
            id: parsed.id,
            username: parsed.username,
            user_no: parsed.userno,
            role_no: parsed.roleno,
            is_nil: false,
            roles,
        })
    }
}

impl_claims_identity_extractor!(TokenUser);

/// Builds the static-key validator provided into `AppState`, the same
/// wiring `demos/example-multi-tenant/src/main.rs` performs at startup.
pub fn build_claims_validator(secret: &str, issuer: &str, audience: &str) -> Arc<JwtClaimsValidator> {
    let config = SecurityConfig::new("unused", issuer, audience).with_allowed_algorithm(Algorithm::HS256);
    let key = DecodingKey::from_secret(secret.as_bytes());
    Arc::new(JwtClaimsValidator::new_with_static_key(key, config))
}

fn mint_token(secret: &str, claims: &TokenClaims) -> Result<String, AppError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to mint token: {e}")))
}

pub fn mint_token_for_user(secret: &str, user: &crate::model::User) -> Result<String, AppError> {
    let exp = (Utc::now() + ChronoDuration::minutes(TOKEN_TTL_MINUTES)).timestamp();
    let claims = TokenClaims {
        id: user.id,
        username: user.username.clone(),
        userno: user.user_no.clone(),
        roleno: user.role_no.clone(),
        exp,
    };
    mint_token(secret, &claims)
}

/// Decodes an existing token, requiring it to still be valid (non-expired),
/// and mints a fresh one with the same identity claims.
pub fn exchange_token(secret: &str, old_token: &str) -> Result<String, AppError> {
    let mut validation = jsonwebtoken::Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = jsonwebtoken::decode::<TokenClaims>(
        old_token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AppError::Unauthorized(format!("invalid or expired token: {e}")))?;

    let exp = (Utc::now() + ChronoDuration::minutes(TOKEN_TTL_MINUTES)).timestamp();
    let fresh = TokenClaims {
        exp,
        ..data.claims
    };
    mint_token(secret, &fresh)
}

/// Decodes a token into its claims without minting a new one, backing
/// `/open/api/token/user`.
pub fn decode_token(secret: &str, token: &str) -> Result<TokenClaims, AppError> {
    let mut validation = jsonwebtoken::Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| AppError::Unauthorized(format!("invalid or expired token: {e}")))?;
    Ok(data.claims)
}

/// Extracts the Spring-style `{prefix}` salt marker from a stored hash, if
/// present, for backward compatibility with a legacy hash format.
fn spring_prefix(stored: &str) -> &str {
    if stored.starts_with('{') {
        if let Some(end) = stored.find('}') {
            return &stored[..=end];
        }
    }
    ""
}

pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Verifies `password` against `stored` (the password column) using the
/// Spring-style prefix plus `sha256_hex(password ++ salt)` scheme.
pub fn verify_password(password: &str, salt: &str, stored: &str) -> bool {
    let prefix = spring_prefix(stored);
    let candidate = format!("{prefix}{}", sha256_hex(&format!("{password}{salt}")));
    constant_time_eq(candidate.as_bytes(), stored.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// `salt = randAlpha(6)`, `hash = sha256_hex(password ++ salt)` — the
/// hashing scheme for a brand new user (no Spring prefix).
pub fn hash_new_password(password: &str) -> (String, String) {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .filter(|b| b.is_ascii_alphabetic())
        .take(6)
        .map(char::from)
        .collect();
    let hash = sha256_hex(&format!("{password}{salt}"));
    (hash, salt)
}

/// `login(username, password) -> token`, steps 1-6 of the original
/// algorithm including the user-key fallback. Returns the authenticated
/// user alongside the token so the caller can log the attempt without a
/// second lookup.
pub async fn login(
    store: &Store,
    settings: &UserVaultSettings,
    username: &str,
    password: &str,
) -> Result<(String, crate::model::User), AppError> {
    let user = store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    match user.review_status.as_str() {
        crate::model::REVIEW_PENDING => {
            return Err(AppError::Forbidden("Registration under review".to_string()));
        }
        crate::model::REVIEW_REJECTED => {
            return Err(AppError::Forbidden("Not permitted".to_string()));
        }
        _ => {}
    }
    if user.is_disabled {
        return Err(AppError::Forbidden("User is disabled".to_string()));
    }

    let password_ok = verify_password(password, &user.salt, &user.password);
    if !password_ok {
        let key_ok = store.find_valid_user_key(user.id, password).await?.is_some();
        if !key_ok {
            return Err(AppError::Unauthorized("invalid credentials".to_string()));
        }
    }

    let token = mint_token_for_user(&settings.jwt_secret, &user)?;
    Ok((token, user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spring_prefix_extracts_braced_segment() {
        assert_eq!(spring_prefix("{bcrypt}abcdef"), "{bcrypt}");
        assert_eq!(spring_prefix("abcdef"), "");
    }

    #[test]
    fn verify_password_roundtrips_with_new_hash() {
        let (hash, salt) = hash_new_password("hunter2");
        assert!(verify_password("hunter2", &salt, &hash));
        assert!(!verify_password("wrong", &salt, &hash));
    }

    #[test]
    fn verify_password_respects_spring_prefix() {
        let salt = "abcxyz";
        let inner = sha256_hex(&format!("secret{salt}"));
        let stored = format!("{{legacy}}{inner}");
        assert!(verify_password("secret", salt, &stored));
    }
}
