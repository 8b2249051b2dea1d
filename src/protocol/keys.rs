//! RSA key material in Tor's DER encodings
//!
//! Tor carries RSA keys as bare PKCS#1 structures, not X.509
//! SubjectPublicKeyInfo:
//!
//! ```text
//! RSAPublicKey  ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }
//! RSAPrivateKey ::= SEQUENCE { version, modulus, publicExponent, privateExponent, ... }
//! ```
//!
//! Parsing is hand-rolled and strict. A malformed blob yields `None`: bad keys
//! arrive from the network and are expected traffic.

use super::asn1::{DerReader, LEN_ONE_BYTE, TAG_INTEGER, TAG_SEQUENCE};
use super::crypto::{bytes_to_unsigned, sha1, unsigned_to_signed_bytes};
use crate::error::{Result, TorError};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use std::fmt;
use zeroize::Zeroize;

/// Public exponent every Tor relay key uses
pub const TOR_PUBLIC_EXPONENT: u32 = 65537;

/// Length of a legacy RSA identity (SHA-1 of the DER public key)
pub const RSA_ID_LEN: usize = 20;

/// Largest exponent encodable with a short-form length byte
const MAX_EXPONENT_LEN: usize = 0x7f;

/// Legacy relay identity: SHA-1 digest of a DER-encoded public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RsaIdentity([u8; RSA_ID_LEN]);

impl RsaIdentity {
    /// Construct from a slice; `None` unless it is exactly 20 bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(RsaIdentity(bytes.try_into().ok()?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RsaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", hex::encode(self.0))
    }
}

impl fmt::Debug for RsaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RsaIdentity {{ {} }}", self)
    }
}

/// An RSA public key (modulus, exponent)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TorPublicKey {
    modulus: BigUint,
    exponent: BigUint,
}

impl TorPublicKey {
    pub fn new(modulus: BigUint, exponent: BigUint) -> Self {
        Self { modulus, exponent }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// Return true iff the public exponent equals `e`
    pub fn exponent_is(&self, e: u32) -> bool {
        self.exponent == BigUint::from(e)
    }

    /// Number of bits in the modulus
    pub fn bits(&self) -> usize {
        self.modulus.bits()
    }

    /// Decode a Tor `RSAPublicKey` blob
    ///
    /// The outer SEQUENCE and the modulus must use the `0x81` or `0x82`
    /// long-form length, the exponent a single length byte. The declared
    /// outer length must account for the whole buffer.
    pub fn from_der(blob: &[u8]) -> Option<Self> {
        let mut reader = DerReader::new(blob);

        reader.expect_tag(TAG_SEQUENCE)?;
        let seq_len = reader.read_long_length()?;
        if seq_len != reader.remaining() {
            return None;
        }

        reader.expect_tag(TAG_INTEGER)?;
        let modulus_len = reader.read_long_length()?;
        let modulus = reader.take(modulus_len)?;

        reader.expect_tag(TAG_INTEGER)?;
        let exponent_len = usize::from(reader.read_u8()?);
        let exponent = reader.take(exponent_len)?;

        if !reader.is_empty() || modulus.is_empty() || exponent.is_empty() {
            return None;
        }

        Some(Self::new(
            bytes_to_unsigned(modulus),
            bytes_to_unsigned(exponent),
        ))
    }

    /// Encode as a Tor `RSAPublicKey` blob
    ///
    /// The SEQUENCE and modulus lengths are written as `0x81 n`, the exponent
    /// length as one short-form byte. Keys whose fields do not fit those forms
    /// are rejected rather than truncated.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let modulus = unsigned_to_signed_bytes(&self.modulus);
        let exponent = unsigned_to_signed_bytes(&self.exponent);

        let modulus_len = u8::try_from(modulus.len()).map_err(|_| {
            TorError::KeyEncoding(format!("modulus of {} bytes too long", modulus.len()))
        })?;
        if exponent.len() > MAX_EXPONENT_LEN {
            return Err(TorError::KeyEncoding(format!(
                "exponent of {} bytes too long",
                exponent.len()
            )));
        }

        let mut inner = Vec::with_capacity(5 + modulus.len() + exponent.len());
        inner.extend_from_slice(&[TAG_INTEGER, LEN_ONE_BYTE, modulus_len]);
        inner.extend_from_slice(&modulus);
        inner.extend_from_slice(&[TAG_INTEGER, exponent.len() as u8]);
        inner.extend_from_slice(&exponent);

        let inner_len = u8::try_from(inner.len()).map_err(|_| {
            TorError::KeyEncoding(format!("key body of {} bytes too long", inner.len()))
        })?;

        let mut der = Vec::with_capacity(3 + inner.len());
        der.extend_from_slice(&[TAG_SEQUENCE, LEN_ONE_BYTE, inner_len]);
        der.extend_from_slice(&inner);
        Ok(der)
    }

    /// Legacy identity of this key
    pub fn rsa_identity(&self) -> Result<RsaIdentity> {
        Ok(RsaIdentity(sha1(&self.to_der()?)))
    }

    /// Convert into the `rsa` crate's key type for OAEP
    pub fn to_rsa(&self) -> Result<RsaPublicKey> {
        Ok(RsaPublicKey::new(self.modulus.clone(), self.exponent.clone())?)
    }
}

impl From<&RsaPublicKey> for TorPublicKey {
    fn from(key: &RsaPublicKey) -> Self {
        Self::new(key.n().clone(), key.e().clone())
    }
}

/// A minimal RSA private key: modulus, public exponent, private exponent
///
/// CRT parameters from the encoded key are not retained.
#[derive(Clone)]
pub struct TorPrivateKey {
    modulus: BigUint,
    public_exponent: BigUint,
    private_exponent: BigUint,
}

impl TorPrivateKey {
    pub fn new(modulus: BigUint, public_exponent: BigUint, private_exponent: BigUint) -> Self {
        Self {
            modulus,
            public_exponent,
            private_exponent,
        }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Decode a PKCS#1 `RSAPrivateKey` blob
    ///
    /// Element 0 (version) is skipped; elements 1..=3 must be INTEGERs.
    pub fn from_der(der: &[u8]) -> Option<Self> {
        let (modulus, public_exponent, private_exponent) = read_private_fields(der)?;
        Some(Self::new(
            bytes_to_unsigned(modulus),
            bytes_to_unsigned(public_exponent),
            bytes_to_unsigned(private_exponent),
        ))
    }

    /// Public key from an encoded private key, using its own exponent
    pub fn public_key_from_der(der: &[u8]) -> Option<TorPublicKey> {
        let (modulus, public_exponent, _) = read_private_fields(der)?;
        Some(TorPublicKey::new(
            bytes_to_unsigned(modulus),
            bytes_to_unsigned(public_exponent),
        ))
    }

    /// Public half of this key, assuming Tor's fixed exponent 65537
    ///
    /// Check [`has_standard_exponent`](Self::has_standard_exponent) when the
    /// key did not come from Tor.
    pub fn public_key(&self) -> TorPublicKey {
        TorPublicKey::new(self.modulus.clone(), BigUint::from(TOR_PUBLIC_EXPONENT))
    }

    pub fn has_standard_exponent(&self) -> bool {
        self.public_exponent == BigUint::from(TOR_PUBLIC_EXPONENT)
    }

    /// Convert into the `rsa` crate's key type (primes recovered from n, e, d)
    pub fn to_rsa(&self) -> Result<RsaPrivateKey> {
        Ok(RsaPrivateKey::from_components(
            self.modulus.clone(),
            self.public_exponent.clone(),
            self.private_exponent.clone(),
            Vec::new(),
        )?)
    }
}

impl From<&RsaPrivateKey> for TorPrivateKey {
    fn from(key: &RsaPrivateKey) -> Self {
        Self::new(key.n().clone(), key.e().clone(), key.d().clone())
    }
}

impl fmt::Debug for TorPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TorPrivateKey")
            .field("modulus_bits", &self.modulus.bits())
            .finish_non_exhaustive()
    }
}

impl Drop for TorPrivateKey {
    fn drop(&mut self) {
        self.private_exponent.zeroize();
    }
}

/// Modulus, public exponent and private exponent of an `RSAPrivateKey`
fn read_private_fields(der: &[u8]) -> Option<(&[u8], &[u8], &[u8])> {
    let mut seq = DerReader::new(der).read_element(TAG_SEQUENCE)?;
    seq.skip_element()?;
    let modulus = seq.read_integer()?;
    let public_exponent = seq.read_integer()?;
    let private_exponent = seq.read_integer()?;
    Some((modulus, public_exponent, private_exponent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::crypto::unsigned_to_bytes;
    use crate::protocol::testing::test_key;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};

    fn public() -> TorPublicKey {
        TorPublicKey::from(&test_key().to_public_key())
    }

    #[test]
    fn test_der_round_trip() {
        let key = public();
        let der = key.to_der().unwrap();
        let parsed = TorPublicKey::from_der(&der).unwrap();
        assert_eq!(parsed, key);
        assert!(parsed.exponent_is(TOR_PUBLIC_EXPONENT));
        assert_eq!(parsed.bits(), 1024);
    }

    #[test]
    fn test_der_matches_pkcs1() {
        let rsa_public = test_key().to_public_key();
        let reference = rsa_public.to_pkcs1_der().unwrap();
        let ours = TorPublicKey::from(&rsa_public).to_der().unwrap();
        assert_eq!(ours, reference.as_bytes());

        let parsed = TorPublicKey::from_der(reference.as_bytes()).unwrap();
        assert_eq!(parsed.to_rsa().unwrap(), rsa_public);
    }

    #[test]
    fn test_small_key_round_trip() {
        let key = TorPublicKey::new(BigUint::from(0xc0ffeeu32), BigUint::from(3u32));
        let der = key.to_der().unwrap();
        assert_eq!(
            der,
            vec![0x30, 0x81, 0x0a, 0x02, 0x81, 0x04, 0x00, 0xc0, 0xff, 0xee, 0x02, 0x01, 0x03]
        );
        assert_eq!(TorPublicKey::from_der(&der).unwrap(), key);
    }

    #[test]
    fn test_two_byte_outer_length() {
        // 0x82 form with a modulus whose high bit is clear
        let modulus = [0x7fu8; 0x80];
        let mut inner = vec![0x02, 0x81, 0x80];
        inner.extend_from_slice(&modulus);
        inner.extend_from_slice(&[0x02, 0x01, 0x03]);
        let mut der = vec![0x30, 0x82, 0x00, inner.len() as u8];
        der.extend_from_slice(&inner);

        let key = TorPublicKey::from_der(&der).unwrap();
        assert_eq!(unsigned_to_bytes(key.modulus()), modulus);
        assert!(key.exponent_is(3));
    }

    #[test]
    fn test_corrupted_outer_length() {
        let mut der = public().to_der().unwrap();
        der[2] = der[2].wrapping_add(1);
        assert!(TorPublicKey::from_der(&der).is_none());

        let mut der = public().to_der().unwrap();
        der[1] = 0x83;
        assert!(TorPublicKey::from_der(&der).is_none());
    }

    #[test]
    fn test_malformed_blobs() {
        let der = public().to_der().unwrap();

        assert!(TorPublicKey::from_der(&[]).is_none());
        assert!(TorPublicKey::from_der(&[0x30]).is_none());

        // Wrong outer tag
        let mut bad = der.clone();
        bad[0] = 0x31;
        assert!(TorPublicKey::from_der(&bad).is_none());

        // Short-form outer length is not accepted
        assert!(TorPublicKey::from_der(&[0x30, 0x03, 0x02, 0x01, 0x01]).is_none());

        // Truncated (outer length no longer matches)
        assert!(TorPublicKey::from_der(&der[..der.len() - 1]).is_none());

        // Wrong modulus tag
        let mut bad = der.clone();
        bad[3] = 0x04;
        assert!(TorPublicKey::from_der(&bad).is_none());

        // Exponent length runs past the end
        let mut bad = der.clone();
        let exp_len_pos = der.len() - 4;
        bad[exp_len_pos] = 0x10;
        assert!(TorPublicKey::from_der(&bad).is_none());

        // Trailing garbage inside the declared sequence
        let mut bad = der.clone();
        bad.push(0x00);
        bad[2] += 1;
        assert!(TorPublicKey::from_der(&bad).is_none());
    }

    #[test]
    fn test_encode_rejects_oversized_key() {
        // 2048-bit modulus needs 257 bytes with its sign byte
        let key = TorPublicKey::new(BigUint::from_bytes_be(&[0xff; 256]), BigUint::from(65537u32));
        assert!(matches!(key.to_der(), Err(TorError::KeyEncoding(_))));

        // Modulus fits, but the SEQUENCE body does not
        let key = TorPublicKey::new(BigUint::from_bytes_be(&[0x7f; 250]), BigUint::from(65537u32));
        assert!(matches!(key.to_der(), Err(TorError::KeyEncoding(_))));

        let key = TorPublicKey::new(BigUint::from(7u32), BigUint::from_bytes_be(&[1u8; 128]));
        assert!(matches!(key.to_der(), Err(TorError::KeyEncoding(_))));
    }

    #[test]
    fn test_private_key_parse() {
        let der = test_key().to_pkcs1_der().unwrap();
        let private = TorPrivateKey::from_der(der.as_bytes()).unwrap();
        assert_eq!(private.modulus(), test_key().n());
        assert!(private.has_standard_exponent());

        let from_blob = TorPrivateKey::public_key_from_der(der.as_bytes()).unwrap();
        assert_eq!(from_blob, private.public_key());
        assert_eq!(private.public_key(), public());

        let rsa_private = private.to_rsa().unwrap();
        assert_eq!(rsa_private.d(), test_key().d());
    }

    #[test]
    fn test_private_key_malformed() {
        let der = test_key().to_pkcs1_der().unwrap();
        let bytes = der.as_bytes();

        assert!(TorPrivateKey::from_der(&[]).is_none());
        assert!(TorPrivateKey::from_der(&bytes[..bytes.len() / 2]).is_none());
        // Public key blob has too few elements
        let public_der = public().to_der().unwrap();
        assert!(TorPrivateKey::from_der(&public_der).is_none());
        // SEQUENCE { INTEGER 0, NULL, ... } - element 1 not an INTEGER
        assert!(TorPrivateKey::from_der(&[0x30, 0x05, 0x02, 0x01, 0x00, 0x05, 0x00]).is_none());
    }

    #[test]
    fn test_private_key_debug_redacted() {
        let private = TorPrivateKey::from(test_key());
        let debug = format!("{:?}", private);
        assert!(debug.contains("modulus_bits: 1024"));
        assert!(!debug.contains("private_exponent"));
    }

    #[test]
    fn test_rsa_identity() {
        let key = public();
        let id = key.rsa_identity().unwrap();
        assert_eq!(id.as_bytes(), &sha1(&key.to_der().unwrap())[..]);

        let shown = id.to_string();
        assert!(shown.starts_with('$'));
        assert_eq!(shown.len(), 41);

        assert_eq!(RsaIdentity::from_bytes(id.as_bytes()), Some(id));
        assert!(RsaIdentity::from_bytes(b"short").is_none());
    }
}
