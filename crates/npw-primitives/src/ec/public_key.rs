//! secp256k1 public key.
//!
//! A point on the curve plus the encoding it is used with. Scripts commit to
//! the serialized bytes, so a compressed and an uncompressed encoding of the
//! same point are distinct keys for hashing, comparison and ordering.

use std::cmp::Ordering;
use std::fmt;

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ec::signature::Signature;
use crate::hash::hash160;
use crate::PrimitivesError;

/// Length of a compressed public key in bytes (prefix + 32 byte x-coordinate).
pub const COMPRESSED_LEN: usize = 33;

/// Length of an uncompressed public key in bytes (prefix + 32 byte x + 32 byte y).
pub const UNCOMPRESSED_LEN: usize = 65;

/// A secp256k1 public key with its serialization form.
#[derive(Clone, Debug)]
pub struct PublicKey {
    inner: VerifyingKey,
    compressed: bool,
}

impl PublicKey {
    /// Parse a SEC1-encoded public key.
    ///
    /// Accepts compressed (33-byte, `02`/`03` prefix) and uncompressed
    /// (65-byte, `04` prefix) encodings and remembers which one was used.
    ///
    /// # Arguments
    /// * `bytes` - SEC1-encoded public key bytes.
    ///
    /// # Returns
    /// `Ok(PublicKey)` on success, or `InvalidPublicKey` if the bytes are not
    /// a point on the curve.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let compressed = match (bytes.len(), bytes.first()) {
            (COMPRESSED_LEN, Some(0x02 | 0x03)) => true,
            (UNCOMPRESSED_LEN, Some(0x04)) => false,
            _ => {
                return Err(PrimitivesError::InvalidPublicKey(format!(
                    "unsupported encoding of {} bytes",
                    bytes.len()
                )))
            }
        };
        let inner = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| PrimitivesError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { inner, compressed })
    }

    /// Parse a hex-encoded SEC1 public key.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    /// Whether the key is serialized in compressed form.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Serialize in the key's own form (33 or 65 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_encoded_point(self.compressed).as_bytes().to_vec()
    }

    /// Serialize the public key in compressed SEC1 format (33 bytes).
    pub fn to_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Serialize the public key in uncompressed SEC1 format (65 bytes).
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(false);
        let mut out = [0u8; UNCOMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Hex of the key in its own form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Hash160 of the serialized key, as committed to by P2PKH scripts.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }

    /// Verify an ECDSA signature against a 32-byte digest.
    pub fn verify(&self, hash: &[u8], sig: &Signature) -> bool {
        sig.verify(hash, self)
    }

    pub(crate) fn from_verifying_key(inner: VerifyingKey, compressed: bool) -> Self {
        PublicKey { inner, compressed }
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic order of the serialized bytes.
impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNCOMPRESSED_G: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
    const COMPRESSED_G: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_parse_keeps_encoding() {
        let c = PublicKey::from_hex(COMPRESSED_G).unwrap();
        assert!(c.is_compressed());
        assert_eq!(c.to_hex(), COMPRESSED_G);

        let u = PublicKey::from_hex(UNCOMPRESSED_G).unwrap();
        assert!(!u.is_compressed());
        assert_eq!(u.to_hex(), UNCOMPRESSED_G);

        // Same point, different serialized key.
        assert_eq!(c.to_compressed(), u.to_compressed());
        assert_ne!(c, u);
        assert_ne!(c.hash160(), u.hash160());
    }

    #[test]
    fn test_hash160_of_generator() {
        let c = PublicKey::from_hex(COMPRESSED_G).unwrap();
        assert_eq!(
            hex::encode(c.hash160()),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(PublicKey::from_bytes(&[]).is_err());
        assert!(PublicKey::from_bytes(&[0x02; 32]).is_err());
        // Hybrid encoding is not accepted.
        let mut hybrid = hex::decode(UNCOMPRESSED_G).unwrap();
        hybrid[0] = 0x06;
        assert!(PublicKey::from_bytes(&hybrid).is_err());
        // x-coordinate not on the curve.
        let mut bad = vec![0x02];
        bad.extend_from_slice(&[0xff; 32]);
        assert!(PublicKey::from_bytes(&bad).is_err());
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let a = PublicKey::from_hex(COMPRESSED_G).unwrap();
        let b = PublicKey::from_hex(
            "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5",
        )
        .unwrap();
        assert!(a < b);
        let mut keys = vec![b.clone(), a.clone()];
        keys.sort();
        assert_eq!(keys, vec![a, b]);
    }

    #[test]
    fn test_serde_hex_string() {
        let key = PublicKey::from_hex(COMPRESSED_G).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", COMPRESSED_G));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
