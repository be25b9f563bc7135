//! Typed error definitions for the KIS overseas trading toolkit.
//!
//! Every fallible library call returns [`Result`], so callers can branch on
//! the failure class (fix the config, re-run the login, adjust the request,
//! or inspect the broker's message) instead of parsing strings.

use thiserror::Error;

/// Domain-specific errors for the KIS toolkit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KisError {
    /// Missing or invalid credentials, account identifiers, or settings.
    #[error("config error: {0}")]
    Config(String),

    /// The access-token exchange failed.
    #[error("auth error: {0}")]
    Auth(String),

    /// A request violates a routing rule and was never sent.
    #[error("validation error: {0}")]
    Validation(String),

    /// The broker answered with a non-success business code.
    #[error("remote error [{code}]: {message}")]
    Remote {
        /// Broker message code (`msg_cd`), or the raw `rt_cd` when absent.
        code: String,
        /// Broker message (`msg1`).
        message: String,
    },

    /// Network, timeout, HTTP status, or body decoding failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The hashkey signing call failed.
    #[error("signing error: {0}")]
    Signing(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, KisError>;
