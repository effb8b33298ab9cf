//! Error handling for the Sproutly Rust client

use std::fmt;
use thiserror::Error;

/// Unified error type for the Sproutly Rust client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A non-2xx response with the most specific message the server gave
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Authentication errors (login, password change, token storage)
    #[error("Authentication error: {0}")]
    Auth(#[from] sproutly_rust_auth::AuthError),

    /// A 401 was received and the session has been torn down. Exactly one
    /// concurrent caller triggers the teardown; every caller gets this.
    #[error("Session expired")]
    SessionExpired,

    /// Local cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] sproutly_rust_cache::CacheError),

    /// An outbox entry whose action tag no replay handler knows
    #[error("Unknown pending action type: {0}")]
    UnknownAction(String),
}

impl Error {
    /// Create a new API error
    pub fn api<T: fmt::Display>(status: u16, message: T) -> Self {
        Error::Api {
            status,
            message: message.to_string(),
        }
    }
}
