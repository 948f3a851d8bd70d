//! Error types.
//!
//! Application-level errors (404, 422, etc.) are expressed as HTTP
//! [`Response`](crate::Response) values, not as errors. The types here
//! surface infrastructure failures (binding a port, accepting a connection)
//! and the failures that can occur while the request pipeline is assembled.

use std::net::AddrParseError;

/// A boxed error from a phase that runs before the pipeline is assembled.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by the server's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid socket address `{addr}`: {source}")]
    Addr { addr: String, source: AddrParseError },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// The single error slot threaded through [`bootstrap`](crate::bootstrap::bootstrap).
///
/// Every failure kind collapses into this one value. Downstream steps only
/// ask whether it is present, never which variant it is.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    /// Supplied by the caller from an earlier startup phase.
    #[error(transparent)]
    Startup(BoxError),

    #[error("session configuration failed: {0}")]
    Session(#[from] SessionConfigError),

    #[error("credential configuration failed: {0}")]
    Credentials(#[from] CredentialConfigError),
}

impl InitializationError {
    /// Wraps any error raised before the pipeline pass began.
    pub fn startup(err: impl Into<BoxError>) -> Self {
        Self::Startup(err.into())
    }
}

/// Raised while the session layer is being constructed.
#[derive(Debug, thiserror::Error)]
pub enum SessionConfigError {
    #[error("`session.salt` must be set to sign session cookies")]
    MissingSecret,

    #[error("session provider `{provider}` has no store configured")]
    UnsupportedProvider { provider: String },

    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// Raised by a [`SessionStore`](crate::auth::SessionStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store backend: {0}")]
    Backend(#[source] BoxError),
}

/// Raised synchronously when the credential provider settings are malformed.
#[derive(Debug, thiserror::Error)]
pub enum CredentialConfigError {
    #[error("authentication scheme `{scheme}` requires the `{section}` section")]
    MissingProvider { scheme: &'static str, section: &'static str },

    #[error("authentication scheme `{scheme}` requires `{field}`")]
    MissingField { scheme: &'static str, field: &'static str },

    #[error("invalid {what} url `{url}`: {source}")]
    InvalidUrl { what: &'static str, url: String, source: url::ParseError },

    #[error("callback path `{path}` {reason}")]
    CallbackPath { path: String, reason: &'static str },
}
