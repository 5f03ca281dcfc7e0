//! Error types for verification attempts.

use std::io;

use mcverify_mc::ProtocolError;
use thiserror::Error;

/// Errors from RSA or key handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("Public key encoding error: {0}")]
    Spki(#[from] rsa::pkcs8::spki::Error),

    #[error("Shared secret must be 16 bytes, got {0}")]
    InvalidSecretLength(usize),
}

/// Errors from the session server.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session server returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Malformed session response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid profile from session server: {0}")]
    InvalidProfile(String),
}

/// Errors that abort a verification attempt.
///
/// Failed verifications (wrong intent, bad challenge, player not joined)
/// are not errors; they are reported to the client and returned as an
/// [`Outcome`](crate::handler::Outcome).
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type alias using [`VerifyError`].
pub type Result<T> = std::result::Result<T, VerifyError>;
