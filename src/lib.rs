//! # Tor Legacy Core
//!
//! The cryptographic and stream layer of a legacy (TAP handshake) Tor
//! client.
//!
//! ## Architecture
//!
//! ```text
//! Application threads
//!   ↓ send / recv
//! TorStream (per-stream buffer, SENDME window)
//!   ↓ CircuitHandle::send_relay
//! Circuit (owns a StreamTable)
//!   ↓
//! Tor Network
//! ```
//!
//! ## Features
//!
//! - **Onion skins**: hybrid RSA-OAEP/AES-CTR encryption and KDF-TOR
//! - **Keys**: DER codec for relay RSA keys, RSA identity digests
//! - **TAP Diffie-Hellman**: Oakley group 2 key agreement
//! - **Streams**: blocking receive, chunked send, stream-level flow control
//!
//! The library logs through the `log` facade and installs no logger.

pub mod protocol;
mod error;

pub use error::{ErrorCode, Result, TorError};
pub use protocol::{
    CircuitHandle, StreamConfig, StreamListener, StreamState, StreamTable, TorPrivateKey,
    TorPublicKey, TorStream,
};
