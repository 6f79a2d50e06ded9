use axum::http::{header, HeaderMap};
use tracing::debug;

use super::{AuthManager, Claims};
use crate::error::{Error, Result};

/// Authenticated caller, placed in the GraphQL request data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    id: String,
    username: String,
    email: String,
}

impl Caller {
    pub fn new(id: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: email.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            username: claims.username,
            email: claims.email,
        }
    }
}

/// Strip the `Bearer ` prefix. A bare token is accepted too.
pub fn bearer_token(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        None if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

impl AuthManager {
    /// Resolve the caller from a raw `Authorization` value
    pub fn caller_from_value(&self, value: &str) -> Result<Caller> {
        let token = bearer_token(value).ok_or(Error::Unauthenticated)?;
        self.verify_token(token).map(Caller::from)
    }

    /// Resolve the caller from HTTP headers.
    ///
    /// Missing or invalid tokens produce `None`; only caller-scoped resolvers
    /// reject the request.
    pub fn caller_from_headers(&self, headers: &HeaderMap) -> Option<Caller> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        match self.caller_from_value(value) {
            Ok(caller) => Some(caller),
            Err(e) => {
                debug!("[Auth] Ignoring authorization header: {}", e);
                None
            }
        }
    }

    /// Resolve the caller from a websocket `connection_init` payload
    pub fn caller_from_init_payload(&self, payload: &serde_json::Value) -> Option<Caller> {
        let value = ["Authorization", "authorization", "authToken"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(|v| v.as_str()))?;
        self.caller_from_value(value).ok()
    }
}
