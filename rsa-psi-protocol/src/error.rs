//! Error types for the intersection protocol.

use thiserror::Error;

/// Errors that can occur while driving an intersection session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PsiError {
    /// The session configuration was rejected before any exchange ran.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A peer message was missing, out of sequence, or malformed, or a
    /// cache entry the peer vouched for could not be attached.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Modular arithmetic failed, such as a blind factor with no inverse
    /// for the negotiated modulus.
    #[error("arithmetic failure: {0}")]
    Arithmetic(String),

    /// The transport failed; the session cannot continue.
    #[error("channel failure: {0}")]
    Channel(String),
}

/// Result type for intersection operations.
pub type Result<T> = std::result::Result<T, PsiError>;
