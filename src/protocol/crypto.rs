//! Legacy Tor Cryptography
//!
//! Implements the TAP-era primitives still needed to talk to relays:
//! - Unsigned big-integer <-> big-endian byte conversion
//! - SHA-1 (legacy digests and key identities)
//! - KDF-TOR: `SHA1(K0 | 0) | SHA1(K0 | 1) | ...`
//! - Hybrid encryption: RSA-OAEP(SHA-1) followed by AES-128-CTR with a zero IV
//!
//! Security: symmetric keys and derived key material are zeroized on drop.

use crate::error::{Result, TorError};
use crate::protocol::keys::{TorPrivateKey, TorPublicKey};
use aes::Aes128;
use ctr::{cipher::{KeyIvInit, StreamCipher}, Ctr128BE};
use rand::{CryptoRng, RngCore};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep};
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

/// AES-128-CTR cipher type
type Aes128Ctr = Ctr128BE<Aes128>;

/// Symmetric key length (AES-128)
pub const KEY_LEN: usize = 16;

/// Diffie-Hellman group size in bytes; also the KDF-TOR secret length
pub const DH_LEN: usize = 128;

/// Bytes of randomness in a TAP Diffie-Hellman private exponent
pub const DH_SEC_LEN: usize = 40;

/// RSA block size (1024-bit onion keys)
pub const PK_ENC_LEN: usize = 128;

/// OAEP overhead with SHA-1
pub const PK_PAD_LEN: usize = 42;

/// SHA-1 output length
pub const HASH_LEN: usize = 20;

/// Largest plaintext that fits in a single OAEP block
pub const M1_LIMIT: usize = PK_ENC_LEN - PK_PAD_LEN;

/// Plaintext bytes carried inside the RSA block next to the symmetric key
const M1_DATA_LEN: usize = M1_LIMIT - KEY_LEN;

/// KDF-TOR counter is one byte
const KDF_MAX_BLOCKS: usize = 256;

/// Minimal big-endian magnitude of `n`, without a sign byte.
///
/// Zero encodes as the empty vector.
pub fn unsigned_to_bytes(n: &BigUint) -> Vec<u8> {
    if n.bits() == 0 {
        return Vec::new();
    }
    n.to_bytes_be()
}

/// Interpret `bytes` as an unsigned big-endian magnitude.
///
/// Leading zero bytes are accepted and carry no meaning.
pub fn bytes_to_unsigned(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Big-endian two's-complement encoding of a non-negative `n`.
///
/// Adds exactly one `0x00` byte when the top bit of the magnitude is set, so a
/// signed reader (DER INTEGER) cannot mistake the value for a negative one.
pub(crate) fn unsigned_to_signed_bytes(n: &BigUint) -> Vec<u8> {
    let mut bytes = unsigned_to_bytes(n);
    if bytes.first().map_or(true, |b| b & 0x80 != 0) {
        bytes.insert(0, 0);
    }
    bytes
}

/// SHA-1 digest of `data`
pub fn sha1(data: &[u8]) -> [u8; HASH_LEN] {
    Sha1::digest(data).into()
}

/// Tor's legacy key derivation function (KDF-TOR)
///
/// ```text
/// K = SHA1(secret | [0]) | SHA1(secret | [1]) | ...
/// ```
///
/// `secret` must be the 128-byte Diffie-Hellman shared value. The output is
/// truncated to exactly `length` bytes.
pub fn kdf_tor(secret: &[u8], length: usize) -> Result<Zeroizing<Vec<u8>>> {
    if secret.len() != DH_LEN {
        return Err(TorError::InvalidSecretLength {
            expected: DH_LEN,
            got: secret.len(),
        });
    }

    let blocks = length.div_ceil(HASH_LEN);
    if blocks > KDF_MAX_BLOCKS {
        return Err(TorError::KeyDerivationFailed(format!(
            "KDF-TOR cannot produce {} bytes (max {})",
            length,
            KDF_MAX_BLOCKS * HASH_LEN
        )));
    }

    let mut output = Zeroizing::new(Vec::with_capacity(blocks * HASH_LEN));
    let mut hasher = Sha1::new();
    for counter in 0..blocks {
        hasher.update(secret);
        hasher.update([counter as u8]);
        output.extend_from_slice(&hasher.finalize_reset());
    }
    output.truncate(length);

    Ok(output)
}

/// Hybrid-encrypt `plaintext` to a relay's onion key
///
/// Uses the thread-local CSPRNG for OAEP seeds and the symmetric key.
pub fn hybrid_encrypt(plaintext: &[u8], key: &TorPublicKey) -> Result<Vec<u8>> {
    hybrid_encrypt_with_rng(&mut rand::thread_rng(), plaintext, key)
}

/// Hybrid-encrypt `plaintext` to a relay's onion key
///
/// ```text
/// len < 86:  RSA-OAEP(plaintext)
/// otherwise: RSA-OAEP(K | M[0..70]) | AES-CTR(K, IV=0, M[70..])
/// ```
///
/// K is a fresh random 16-byte key, so the all-zero IV is never reused under
/// the same key. The output is `128 + max(0, len - 70)` bytes in the long case.
pub fn hybrid_encrypt_with_rng<R: CryptoRng + RngCore>(
    rng: &mut R,
    plaintext: &[u8],
    key: &TorPublicKey,
) -> Result<Vec<u8>> {
    let rsa_key = key.to_rsa()?;
    if rsa_key.size() != PK_ENC_LEN {
        return Err(TorError::Crypto(format!(
            "onion key is {} bits, expected {}",
            rsa_key.n().bits(),
            PK_ENC_LEN * 8
        )));
    }

    if plaintext.len() < M1_LIMIT {
        return Ok(rsa_key.encrypt(rng, Oaep::new::<Sha1>(), plaintext)?);
    }

    let mut sym_key = Zeroizing::new([0u8; KEY_LEN]);
    rng.fill_bytes(&mut sym_key[..]);

    let (m1, m2) = plaintext.split_at(M1_DATA_LEN);

    let mut rsa_block = Zeroizing::new(Vec::with_capacity(M1_LIMIT));
    rsa_block.extend_from_slice(&sym_key[..]);
    rsa_block.extend_from_slice(m1);

    let mut output = rsa_key.encrypt(rng, Oaep::new::<Sha1>(), &rsa_block)?;
    debug_assert_eq!(output.len(), PK_ENC_LEN);

    let start = output.len();
    output.extend_from_slice(m2);
    apply_zero_iv_ctr(&sym_key, &mut output[start..]);

    log::debug!(
        "Hybrid-encrypted {} bytes into {} bytes",
        plaintext.len(),
        output.len()
    );

    Ok(output)
}

/// Decrypt a hybrid-encrypted payload with the matching private key
///
/// This is the relay side of [`hybrid_encrypt`]. A recovered RSA block shorter
/// than 86 bytes is the whole message; an 86-byte block carries the AES key
/// and the first 70 plaintext bytes.
pub fn hybrid_decrypt(ciphertext: &[u8], key: &TorPrivateKey) -> Result<Vec<u8>> {
    if ciphertext.len() < PK_ENC_LEN {
        return Err(TorError::ProtocolError(format!(
            "Hybrid ciphertext too short: {} bytes",
            ciphertext.len()
        )));
    }

    let rsa_key = key.to_rsa()?;
    let (rsa_part, aes_part) = ciphertext.split_at(PK_ENC_LEN);
    let block = Zeroizing::new(rsa_key.decrypt(Oaep::new::<Sha1>(), rsa_part)?);

    if block.len() < M1_LIMIT {
        if !aes_part.is_empty() {
            return Err(TorError::ProtocolError(
                "Trailing data after single-block hybrid ciphertext".into(),
            ));
        }
        return Ok(block.to_vec());
    }
    if block.len() != M1_LIMIT {
        return Err(TorError::ProtocolError(format!(
            "Unexpected RSA block length {}",
            block.len()
        )));
    }

    let mut sym_key = Zeroizing::new([0u8; KEY_LEN]);
    sym_key.copy_from_slice(&block[..KEY_LEN]);

    let mut plaintext = Vec::with_capacity(M1_DATA_LEN + aes_part.len());
    plaintext.extend_from_slice(&block[KEY_LEN..]);
    plaintext.extend_from_slice(aes_part);
    apply_zero_iv_ctr(&sym_key, &mut plaintext[M1_DATA_LEN..]);

    Ok(plaintext)
}

/// AES-128-CTR with an all-zero IV (encrypt = decrypt)
fn apply_zero_iv_ctr(key: &[u8; KEY_LEN], data: &mut [u8]) {
    let iv = [0u8; 16];
    let mut cipher = Aes128Ctr::new(key.into(), (&iv).into());
    cipher.apply_keystream(data);
}
