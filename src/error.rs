//! Error types for the legacy Tor core
//!
//! This module provides the error taxonomy with:
//! - Detailed error variants for different failure modes
//! - Error classification (fatal vs retryable)
//! - Error codes for programmatic handling
//!
//! Malformed key blobs are not errors: the key parsers return `Option` so a
//! bad descriptor key can be rejected without unwinding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TorError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Protocol errors (2xx)
    ProtocolViolation = 200,
    HandshakeFailed = 203,

    // Circuit / stream errors (3xx)
    CircuitClosed = 301,
    StreamDestroyed = 303,
    Interrupted = 304,

    // Cryptographic errors (5xx)
    CryptoError = 500,
    KeyDerivationFailed = 501,
    InvalidSecretLength = 502,
    KeyEncoding = 503,

    // Internal errors (9xx)
    InternalError = 900,
    ResourceExhausted = 901,
}

/// Main error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TorError {
    // ===== Protocol Errors =====
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    // ===== Circuit / Stream Errors =====
    #[error("Circuit closed: {0}")]
    CircuitClosed(String),

    #[error("Stream destroyed")]
    StreamDestroyed,

    #[error("Interrupted: {0}")]
    Interrupted(String),

    // ===== Cryptographic Errors =====
    /// The crypto backend rejected an operation on locally produced input.
    #[error("Crypto: {0}")]
    Crypto(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid secret length: expected {expected} bytes, got {got}")]
    InvalidSecretLength { expected: usize, got: usize },

    #[error("Key encoding: {0}")]
    KeyEncoding(String),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl TorError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            TorError::ProtocolError(_) => ErrorCode::ProtocolViolation,
            TorError::HandshakeFailed(_) => ErrorCode::HandshakeFailed,

            TorError::CircuitClosed(_) => ErrorCode::CircuitClosed,
            TorError::StreamDestroyed => ErrorCode::StreamDestroyed,
            TorError::Interrupted(_) => ErrorCode::Interrupted,

            TorError::Crypto(_) => ErrorCode::CryptoError,
            TorError::KeyDerivationFailed(_) => ErrorCode::KeyDerivationFailed,
            TorError::InvalidSecretLength { .. } => ErrorCode::InvalidSecretLength,
            TorError::KeyEncoding(_) => ErrorCode::KeyEncoding,

            TorError::Internal(_) => ErrorCode::InternalError,
            TorError::ResourceExhausted(_) => ErrorCode::ResourceExhausted,
        }
    }

    /// Whether this error is fatal
    ///
    /// Fatal errors mean the execution environment is broken (the crypto
    /// backend refused locally generated input, or a lock was poisoned by a
    /// panicking thread). They must be propagated, never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TorError::Crypto(_) | TorError::Internal(_))
    }

    /// Whether the operation may succeed on a fresh stream or circuit
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TorError::CircuitClosed(_)
                | TorError::StreamDestroyed
                | TorError::HandshakeFailed(_)
                | TorError::ResourceExhausted(_)
        )
    }

    /// Whether this error reports a cancelled blocking wait
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TorError::Interrupted(_))
    }
}

impl From<rsa::Error> for TorError {
    fn from(err: rsa::Error) -> Self {
        TorError::Crypto(err.to_string())
    }
}
