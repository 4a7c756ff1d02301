//! ECDSA signature with DER serialization and RFC6979 deterministic nonces.
//!
//! Signatures are always produced and serialized with a low S value, which
//! bounds a DER encoding at 71 bytes (72 with the sighash byte appended).

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa;

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// The secp256k1 curve order N.
const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
    0x41, 0x41,
];

/// N/2, the largest S value considered low.
const HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B,
    0x20, 0xA0,
];

/// Length of the digests this module signs and verifies.
pub const DIGEST_LEN: usize = 32;

/// An ECDSA signature with R and S components, each a 32-byte big-endian
/// integer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
}

impl Signature {
    pub fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Signature { r, s }
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Parse a DER-encoded ECDSA signature.
    ///
    /// Expected format: `0x30 <len> 0x02 <r_len> <r> 0x02 <s_len> <s>`.
    /// Bytes after the declared sequence length are ignored.
    ///
    /// # Arguments
    /// * `bytes` - DER-encoded signature bytes, without a sighash byte.
    ///
    /// # Returns
    /// `Ok(Signature)` on success, or `InvalidSignature` if the structure is
    /// malformed or either integer is zero or not below the curve order.
    pub fn from_der(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() < 8 {
            return Err(invalid("too short"));
        }
        if bytes[0] != 0x30 {
            return Err(invalid("no header magic"));
        }

        let sig_len = bytes[1] as usize;
        if sig_len + 2 > bytes.len() || sig_len + 2 < 8 {
            return Err(invalid("bad length"));
        }

        let data = &bytes[..sig_len + 2];
        let mut idx = 2;

        if data[idx] != 0x02 {
            return Err(invalid("no 1st int marker"));
        }
        idx += 1;
        let r_len = data[idx] as usize;
        idx += 1;
        if r_len == 0 || idx + r_len > data.len() - 3 {
            return Err(invalid("bogus R length"));
        }
        let r_bytes = &data[idx..idx + r_len];
        idx += r_len;

        if data[idx] != 0x02 {
            return Err(invalid("no 2nd int marker"));
        }
        idx += 1;
        let s_len = data[idx] as usize;
        idx += 1;
        if s_len == 0 || idx + s_len > data.len() {
            return Err(invalid("bogus S length"));
        }
        let s_bytes = &data[idx..idx + s_len];

        let r = to_32_bytes(r_bytes)?;
        let s = to_32_bytes(s_bytes)?;

        if is_zero(&r) || is_zero(&s) {
            return Err(invalid("zero R or S"));
        }
        if !is_less_than(&r, &CURVE_ORDER) || !is_less_than(&s, &CURVE_ORDER) {
            return Err(invalid("R or S not below curve order"));
        }

        Ok(Signature { r, s })
    }

    /// Serialize in DER format, normalizing S to the lower half of the order.
    pub fn to_der(&self) -> Vec<u8> {
        let s = self.low_s();
        let rb = canonicalize_int(&self.r);
        let sb = canonicalize_int(&s);

        let total_len = 6 + rb.len() + sb.len();
        let mut out = Vec::with_capacity(total_len);
        out.push(0x30);
        out.push((total_len - 2) as u8);
        out.push(0x02);
        out.push(rb.len() as u8);
        out.extend_from_slice(&rb);
        out.push(0x02);
        out.push(sb.len() as u8);
        out.extend_from_slice(&sb);
        out
    }

    /// Whether S is already in the lower half of the curve order.
    pub fn has_low_s(&self) -> bool {
        !is_greater_than(&self.s, &HALF_ORDER)
    }

    /// Sign a 32-byte digest with an RFC6979 deterministic nonce.
    ///
    /// # Arguments
    /// * `hash` - The digest to sign. It is used directly as the ECDSA
    ///   message scalar.
    /// * `priv_key` - The private key to sign with.
    ///
    /// # Returns
    /// A low-S `Signature`, or `InvalidSignature` if the digest is not
    /// 32 bytes long.
    pub fn sign(hash: &[u8], priv_key: &PrivateKey) -> Result<Self, PrimitivesError> {
        if hash.len() != DIGEST_LEN {
            return Err(PrimitivesError::InvalidSignature(format!(
                "digest must be {} bytes, got {}",
                DIGEST_LEN,
                hash.len()
            )));
        }
        let k256_sig: ecdsa::Signature = priv_key
            .signing_key()
            .sign_prehash(hash)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;

        let (r_bytes, s_bytes) = k256_sig.split_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        s.copy_from_slice(&s_bytes);

        let mut sig = Signature { r, s };
        sig.s = sig.low_s();
        Ok(sig)
    }

    /// Verify this signature against a 32-byte digest and public key.
    ///
    /// S and N - S verify identically, so high-S signatures found on chain
    /// are accepted.
    pub fn verify(&self, hash: &[u8], pub_key: &PublicKey) -> bool {
        if hash.len() != DIGEST_LEN {
            return false;
        }
        let k256_sig = match ecdsa::Signature::from_scalars(
            k256::FieldBytes::from(self.r),
            k256::FieldBytes::from(self.low_s()),
        ) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        pub_key
            .verifying_key()
            .verify_prehash(hash, &k256_sig)
            .is_ok()
    }

    fn low_s(&self) -> [u8; 32] {
        if is_greater_than(&self.s, &HALF_ORDER) {
            subtract_from_order(&self.s)
        } else {
            self.s
        }
    }
}

fn invalid(msg: &str) -> PrimitivesError {
    PrimitivesError::InvalidSignature(format!("malformed signature: {}", msg))
}

/// Strip leading zeros and add a 0x00 sign byte when the high bit is set.
fn canonicalize_int(val: &[u8; 32]) -> Vec<u8> {
    let mut start = 0;
    while start < 31 && val[start] == 0 {
        start += 1;
    }
    let trimmed = &val[start..];

    if trimmed[0] & 0x80 != 0 {
        let mut out = Vec::with_capacity(trimmed.len() + 1);
        out.push(0x00);
        out.extend_from_slice(trimmed);
        out
    } else {
        trimmed.to_vec()
    }
}

/// Left-pad a big-endian integer to 32 bytes, rejecting wider values.
fn to_32_bytes(bytes: &[u8]) -> Result<[u8; 32], PrimitivesError> {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    if trimmed.len() > 32 {
        return Err(invalid("integer wider than 32 bytes"));
    }
    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}

fn is_zero(val: &[u8; 32]) -> bool {
    val.iter().all(|&b| b == 0)
}

fn is_less_than(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a < b
}

fn is_greater_than(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a > b
}

/// N - val, for low-S normalization.
fn subtract_from_order(val: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;
    for i in (0..32).rev() {
        let diff = CURVE_ORDER[i] as i32 - val[i] as i32 - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }
    result
}
