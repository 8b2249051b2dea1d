//! Tor protocol implementation
//!
//! This module implements the legacy (TAP era) pieces of the Tor protocol:
//! - Relay cell commands and END reasons
//! - Hybrid RSA/AES onion-skin encryption and KDF-TOR
//! - RSA key DER encoding and relay identity digests
//! - TAP Diffie-Hellman
//! - Stream endpoints with SENDME flow control
//! - Per-circuit stream tables

mod asn1;
mod cell;
mod circuit;
mod crypto;
mod dh;
mod fifo;
mod flow_control;
mod keys;
mod stream;

pub use cell::{EndReason, RelayCommand, CELL_PAYLOAD_SIZE, MAX_PAYLOAD, RELAY_HEADER_SIZE};
pub use circuit::{StreamConfig, StreamTable, StreamTableStats};
pub use crypto::{
    bytes_to_unsigned, hybrid_decrypt, hybrid_encrypt, hybrid_encrypt_with_rng, kdf_tor, sha1,
    unsigned_to_bytes, DH_LEN, DH_SEC_LEN, HASH_LEN, KEY_LEN, M1_LIMIT, PK_ENC_LEN, PK_PAD_LEN,
};
pub use dh::{dh_prime, DhKeyPair, DH_G};
pub use fifo::ByteFifo;
pub use flow_control::StreamFlowControl;
pub use keys::{RsaIdentity, TorPrivateKey, TorPublicKey, RSA_ID_LEN, TOR_PUBLIC_EXPONENT};
pub use stream::{
    CircuitHandle, StreamListener, StreamState, StreamStats, TorStream, DEFAULT_RECV_CAPACITY,
};

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for unit tests

    use super::cell::RelayCommand;
    use super::stream::CircuitHandle;
    use crate::error::Result;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rsa::RsaPrivateKey;
    use std::sync::{Mutex, OnceLock};

    /// A deterministic 1024-bit RSA key, generated once per test binary
    pub(crate) fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| {
            let mut rng = StdRng::seed_from_u64(0x7a9);
            RsaPrivateKey::new(&mut rng, 1024).expect("1024-bit key generation")
        })
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct RecordedCell {
        pub payload: Option<Vec<u8>>,
        pub command: RelayCommand,
        pub is_control: bool,
        pub stream_id: u16,
    }

    /// Circuit stand-in that records every cell and removal
    #[derive(Default)]
    pub(crate) struct RecordingCircuit {
        cells: Mutex<Vec<RecordedCell>>,
        removed: Mutex<Vec<u16>>,
    }

    impl RecordingCircuit {
        pub(crate) fn cells(&self) -> Vec<RecordedCell> {
            self.cells.lock().unwrap().clone()
        }

        pub(crate) fn count(&self, command: RelayCommand) -> usize {
            self.cells
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.command == command)
                .count()
        }

        pub(crate) fn removed(&self) -> Vec<u16> {
            self.removed.lock().unwrap().clone()
        }
    }

    impl CircuitHandle for RecordingCircuit {
        fn send_relay(
            &self,
            payload: Option<&[u8]>,
            command: RelayCommand,
            is_control: bool,
            stream_id: u16,
        ) -> Result<()> {
            self.cells.lock().unwrap().push(RecordedCell {
                payload: payload.map(<[u8]>::to_vec),
                command,
                is_control,
                stream_id,
            });
            Ok(())
        }

        fn remove_stream(&self, stream_id: u16) {
            self.removed.lock().unwrap().push(stream_id);
        }
    }
}
