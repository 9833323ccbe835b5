//! Error types for prlab.
//!
//! Every failure coming out of a provider call is folded into one of four
//! transport variants so the handler layer can render a uniform
//! `{status, message}` reply whatever the remote service was.

use thiserror::Error;

/// Main error type for prlab operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No access token, or the token was refused.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The remote service answered with a non-2xx status.
    #[error("Invalid response in '{url}': {message}")]
    RemoteRejected {
        status: u16,
        url: String,
        message: String,
    },

    /// The body could not be decoded (not UTF-8, not JSON, unexpected shape).
    #[error("Invalid response in '{url}': {message}")]
    MalformedResponse { url: String, message: String },

    /// Any other transport failure (DNS, connect, timeout...).
    #[error("Unknown error in '{url}': {message}")]
    Unknown { url: String, message: String },

    /// A caller-supplied value cannot be used.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build the error for a non-2xx remote answer.
    pub fn from_status(status: u16, url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RemoteRejected {
            status,
            url: url.into(),
            message: message.into(),
        }
    }

    /// HTTP status the handler layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Unauthenticated(_) => 400,
            Error::RemoteRejected { status, .. } => *status,
            Error::MalformedResponse { .. } => 400,
            Error::Unknown { .. } => 500,
            Error::InvalidInput(_) => 400,
            Error::Config(_) => 500,
        }
    }

    /// True when the remote answered with the given status.
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, Error::RemoteRejected { status, .. } if *status == code)
    }

    /// Message reported by the remote service, if this is a rejection.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Error::RemoteRejected { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Result type alias for prlab operations.
pub type Result<T> = std::result::Result<T, Error>;
