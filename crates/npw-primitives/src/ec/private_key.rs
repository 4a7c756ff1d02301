//! secp256k1 private key.
//!
//! Wraps a k256 signing key together with the compression flag that selects
//! the public key encoding (and therefore the address) the key signs for.

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;

use crate::base58;
use crate::ec::public_key::PublicKey;
use crate::ec::signature::Signature;
use crate::PrimitivesError;

/// Length of a serialized private key in bytes.
const PRIVATE_KEY_BYTES_LEN: usize = 32;

/// Flag byte appended to WIF payloads for keys with compressed public keys.
const COMPRESS_MAGIC: u8 = 0x01;

/// A secp256k1 private key.
#[derive(Clone, Debug)]
pub struct PrivateKey {
    inner: SigningKey,
    compressed: bool,
}

impl PrivateKey {
    /// Generate a new random private key using the OS random number generator.
    ///
    /// The key signs for its compressed public key.
    pub fn new() -> Self {
        PrivateKey {
            inner: SigningKey::random(&mut OsRng),
            compressed: true,
        }
    }

    /// Create a private key from a raw 32-byte big-endian scalar.
    ///
    /// # Arguments
    /// * `bytes` - A 32-byte slice representing the private key scalar.
    ///
    /// # Returns
    /// `Ok(PrivateKey)` if the scalar is in `[1, n)`, or `InvalidPrivateKey`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() != PRIVATE_KEY_BYTES_LEN {
            return Err(PrimitivesError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_BYTES_LEN,
                bytes.len()
            )));
        }
        let inner = SigningKey::from_bytes(bytes.into())
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { inner, compressed: true })
    }

    /// Create a private key from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.is_empty() {
            return Err(PrimitivesError::InvalidPrivateKey(
                "private key hex is empty".to_string(),
            ));
        }
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    /// Decode a WIF (Wallet Import Format) string.
    ///
    /// The payload is `version || key || [0x01]`; the trailing flag marks a
    /// key whose public key is used compressed.
    ///
    /// # Arguments
    /// * `wif` - Base58Check string.
    ///
    /// # Returns
    /// The key and the version byte it was encoded with, so callers can match
    /// it against their network parameters.
    pub fn from_wif(wif: &str) -> Result<(Self, u8), PrimitivesError> {
        let payload = base58::check_decode(wif)?;
        let compressed = match payload.len() {
            34 => {
                if payload[33] != COMPRESS_MAGIC {
                    return Err(PrimitivesError::InvalidWif(
                        "invalid compression flag".to_string(),
                    ));
                }
                true
            }
            33 => false,
            n => {
                return Err(PrimitivesError::InvalidWif(format!(
                    "invalid payload length {}",
                    n
                )))
            }
        };
        let mut key = Self::from_bytes(&payload[1..1 + PRIVATE_KEY_BYTES_LEN])?;
        key.compressed = compressed;
        Ok((key, payload[0]))
    }

    /// Encode the key as WIF with the given network version byte.
    pub fn to_wif(&self, version: u8) -> String {
        let mut payload = Vec::with_capacity(1 + PRIVATE_KEY_BYTES_LEN + 1);
        payload.push(version);
        payload.extend_from_slice(&self.to_bytes());
        if self.compressed {
            payload.push(COMPRESS_MAGIC);
        }
        base58::check_encode(&payload)
    }

    /// Serialize the private key as a 32-byte big-endian array.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Whether the matching public key is serialized compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Return a copy of this key that signs for the given public key encoding.
    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Derive the public key, carrying over the compression flag.
    pub fn pub_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(*self.inner.verifying_key(), self.compressed)
    }

    /// Sign a 32-byte digest with an RFC6979 deterministic nonce.
    ///
    /// The digest is signed as-is; no further hashing is applied.
    pub fn sign(&self, hash: &[u8]) -> Result<Signature, PrimitivesError> {
        Signature::sign(hash, self)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes() && self.compressed == other.compressed
    }
}

impl Eq for PrivateKey {}
