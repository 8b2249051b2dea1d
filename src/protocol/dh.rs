//! TAP Diffie-Hellman
//!
//! The legacy handshake uses the 1024-bit MODP group from RFC 2409 (Oakley
//! group 2) with generator 2. The shared value `g^xy` is always rendered as
//! 128 bytes and feeds [`kdf_tor`](super::crypto::kdf_tor).

use super::crypto::{unsigned_to_bytes, DH_LEN, DH_SEC_LEN};
use crate::error::{Result, TorError};
use rand::{CryptoRng, RngCore};
use rsa::BigUint;
use zeroize::{Zeroize, Zeroizing};

/// Group generator
pub const DH_G: u32 = 2;

/// Group prime (RFC 2409 section 6.2)
const DH_P: [u8; DH_LEN] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1, 0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22, 0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B, 0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45, 0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x37, 0xED, 0x6B, 0x0B, 0xFF, 0x5C, 0xB6, 0xF4, 0x06, 0xB7, 0xED,
    0xEE, 0x38, 0x6B, 0xFB, 0x5A, 0x89, 0x9F, 0xA5, 0xAE, 0x9F, 0x24, 0x11, 0x7C, 0x4B, 0x1F, 0xE6,
    0x49, 0x28, 0x66, 0x51, 0xEC, 0xE6, 0x53, 0x81, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// The group prime as an integer
pub fn dh_prime() -> BigUint {
    BigUint::from_bytes_be(&DH_P)
}

/// An ephemeral TAP Diffie-Hellman key pair
pub struct DhKeyPair {
    private: BigUint,
    public: [u8; DH_LEN],
}

impl DhKeyPair {
    /// Generate a key pair from the thread-local CSPRNG
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut rand::thread_rng())
    }

    /// Generate a key pair with a 320-bit private exponent
    pub fn generate_with_rng<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut x = Zeroizing::new([0u8; DH_SEC_LEN]);
        rng.fill_bytes(&mut x[..]);

        let private = BigUint::from_bytes_be(&x[..]);
        let public = BigUint::from(DH_G).modpow(&private, &dh_prime());

        Self {
            private,
            public: to_group_bytes(&public),
        }
    }

    /// `g^x mod p` as 128 big-endian bytes (the TAP onion-skin payload)
    pub fn public_bytes(&self) -> [u8; DH_LEN] {
        self.public
    }

    /// Compute the 128-byte shared secret with the peer's public value
    ///
    /// Peer values outside `2 ..= p-2` are rejected: they would force the
    /// shared secret into a tiny subgroup.
    pub fn compute_secret(&self, peer_public: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if peer_public.len() != DH_LEN {
            return Err(TorError::HandshakeFailed(format!(
                "DH public value is {} bytes, expected {}",
                peer_public.len(),
                DH_LEN
            )));
        }

        let p = dh_prime();
        let one = BigUint::from(1u32);
        let y = BigUint::from_bytes_be(peer_public);
        if y <= one || y >= &p - &one {
            return Err(TorError::HandshakeFailed(
                "DH public value out of range".into(),
            ));
        }

        let shared = y.modpow(&self.private, &p);
        Ok(Zeroizing::new(to_group_bytes(&shared).to_vec()))
    }
}

impl Drop for DhKeyPair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

/// Left-pad a group element (always `< p`) to 128 bytes
fn to_group_bytes(n: &BigUint) -> [u8; DH_LEN] {
    let bytes = unsigned_to_bytes(n);
    let mut out = [0u8; DH_LEN];
    let len = bytes.len().min(DH_LEN);
    out[DH_LEN - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    out
}
