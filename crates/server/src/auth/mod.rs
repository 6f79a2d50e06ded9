//! Authentication Module
//!
//! Password hashing (bcrypt) and bearer tokens (HS256 JWT, 2 hour expiry).
//! Tokens carry `{username, email, _id}` so resolvers can identify the caller
//! without a database round trip.

pub mod ctx;

pub use ctx::Caller;

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::Yapper;

/// Lifetime of an issued token
pub const TOKEN_TTL_HOURS: i64 = 2;

/// JWT payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub email: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Auth manager handles hashing and token issuance/verification
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    bcrypt_cost: u32,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("secret", &"[REDACTED]")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl AuthManager {
    pub fn new(secret: &Secret<String>, bcrypt_cost: u32) -> Self {
        let raw = secret.expose_secret().as_bytes();
        info!("[Auth] Initialized (bcrypt cost {})", bcrypt_cost);
        Self {
            encoding_key: EncodingKey::from_secret(raw),
            decoding_key: DecodingKey::from_secret(raw),
            bcrypt_cost,
        }
    }

    /// One-way hash a plaintext password
    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(hash(password, self.bcrypt_cost)?)
    }

    /// Check a plaintext password against a stored hash
    pub fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        Ok(verify(password, password_hash)?)
    }

    /// Issue a signed token for a profile
    pub fn sign_token(&self, yapper: &Yapper) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            username: yapper.name.clone(),
            email: yapper.email.clone(),
            id: yapper.id.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        self.encode_claims(&claims)
    }

    /// Sign arbitrary claims
    pub fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("token signing: {e}")))
    }

    /// Verify signature and expiry, returning the payload
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("[Auth] Rejected token: {}", e);
                Error::TokenInvalid(e.to_string())
            })
    }
}
