//! Bearer-token authentication: HS256 tokens and argon2 password
//! hashing. Token signing itself is delegated to `jsonwebtoken`.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::HeaderMap;
use chrono::Utc;
use civicwatch_api::ApiError;
use civicwatch_model::{Role, User, UserId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller, as every handler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: UserId,
    pub role: Role,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
        }
    }

    pub fn issue(&self, user: &User, ttl: Duration) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.as_str().to_string(),
            role: user.role.as_str().to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("token signing failed: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::unauthenticated("invalid or expired token"))?;
        let user = UserId::parse(&claims.sub)
            .map_err(|_| ApiError::unauthenticated("invalid or expired token"))?;
        let role = Role::parse(&claims.role)
            .map_err(|_| ApiError::unauthenticated("invalid or expired token"))?;
        Ok(Identity { user, role })
    }
}

/// Resolves the caller from the `Authorization: Bearer <token>` header.
pub fn authenticate(headers: &HeaderMap, keys: &TokenKeys) -> Result<Identity, ApiError> {
    let raw = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;
    let token = raw
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;
    keys.verify(token.trim())
}

pub fn hash_password(raw: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("password hashing failed: {e}")))
}

#[must_use]
pub fn verify_password(raw: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user(role: Role) -> User {
        User {
            id: UserId::generate(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9999999999".to_string(),
            role,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_verify_and_carry_the_role() {
        let keys = TokenKeys::new(b"test-secret");
        let user = sample_user(Role::Admin);
        let token = keys
            .issue(&user, Duration::from_secs(3600))
            .expect("issue token");
        let identity = keys.verify(&token).expect("verify token");
        assert_eq!(identity.user, user.id);
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let keys = TokenKeys::new(b"test-secret");
        let other = TokenKeys::new(b"other-secret");
        let token = other
            .issue(&sample_user(Role::Citizen), Duration::from_secs(3600))
            .expect("issue token");
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn authenticate_requires_a_bearer_header() {
        let keys = TokenKeys::new(b"test-secret");
        let mut headers = HeaderMap::new();
        assert!(authenticate(&headers, &keys).is_err());

        headers.insert("authorization", "Basic abc".parse().expect("header"));
        assert!(authenticate(&headers, &keys).is_err());

        let token = keys
            .issue(&sample_user(Role::Citizen), Duration::from_secs(3600))
            .expect("issue token");
        headers.insert(
            "authorization",
            format!("Bearer {token}").parse().expect("header"),
        );
        assert!(authenticate(&headers, &keys).is_ok());
    }

    #[test]
    fn password_hashing_round_trips_and_rejects_wrong_input() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
