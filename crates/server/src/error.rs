use async_graphql::ErrorExtensions;
use tracing::error;

use crate::vendors::VendorError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth Errors
    #[error("You need to be logged in")]
    Unauthenticated,
    #[error("Invalid credentials")]
    LoginFail,
    #[error("Auth token invalid: {0}")]
    TokenInvalid(String),

    // Model Errors
    #[error("{0}")]
    Validation(String),
    #[error("A yapper with this {field} already exists")]
    Duplicate { field: &'static str },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // Vendor Errors
    #[error("Failed to generate {feature}: {source}")]
    Vendor {
        feature: &'static str,
        #[source]
        source: VendorError,
    },
    #[error("Failed to generate {feature}: upstream stream closed without data")]
    EmptyStream { feature: &'static str },

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub fn vendor(feature: &'static str) -> impl FnOnce(VendorError) -> Self {
        move |source| Error::Vendor { feature, source }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthenticated | Error::LoginFail | Error::TokenInvalid(_) => "UNAUTHENTICATED",
            Error::Validation(_) => "BAD_USER_INPUT",
            Error::Duplicate { .. } => "DUPLICATE_KEY",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Vendor { source, .. } if source.is_payload() => "VENDOR_PAYLOAD",
            Error::Vendor { .. } => "VENDOR_TRANSPORT",
            Error::EmptyStream { .. } => "EMPTY_STREAM",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

impl ErrorExtensions for Error {
    fn extend(&self) -> async_graphql::Error {
        let message = match self {
            Error::Internal(detail) => {
                error!("[GraphQL] Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let code = self.code();
        async_graphql::Error::new(message).extend_with(|_, e| e.set("code", code))
    }
}

/// Converts crate results into GraphQL results without losing `extensions.code`.
///
/// `async_graphql::Error` has a blanket `From<impl Display>`, so a bare `?`
/// would keep the message but drop the code.
pub trait GqlResultExt<T> {
    fn extended(self) -> async_graphql::Result<T>;
}

impl<T> GqlResultExt<T> for Result<T> {
    fn extended(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.extend())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Internal(format!("database: {err}"))
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        Error::Internal(format!("password hashing: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("json: {err}"))
    }
}
