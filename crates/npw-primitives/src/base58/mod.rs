//! Base58 and Base58Check encoding.
//!
//! Base58Check (payload followed by the first four bytes of its SHA-256d) is
//! the textual form of addresses and WIF private keys.

use crate::hash::sha256d;
use crate::PrimitivesError;

/// Encode bytes with the Bitcoin Base58 alphabet.
///
/// Leading zero bytes become leading '1' characters.
pub fn encode(data: &[u8]) -> String {
    bs58::encode(data).with_alphabet(bs58::Alphabet::BITCOIN).into_string()
}

/// Decode a Base58 string.
///
/// # Returns
/// `Ok(Vec<u8>)` on success, or `InvalidBase58` for characters outside the
/// alphabet.
pub fn decode(s: &str) -> Result<Vec<u8>, PrimitivesError> {
    bs58::decode(s)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .map_err(|e| PrimitivesError::InvalidBase58(e.to_string()))
}

/// Encode `data` with a 4-byte SHA-256d checksum appended.
///
/// # Arguments
/// * `data` - Version byte(s) followed by the payload.
pub fn check_encode(data: &[u8]) -> String {
    let checksum = sha256d(data);
    let mut payload = Vec::with_capacity(data.len() + 4);
    payload.extend_from_slice(data);
    payload.extend_from_slice(&checksum[..4]);
    encode(&payload)
}

/// Decode a Base58Check string and verify its checksum.
///
/// # Returns
/// The payload without its checksum, `ChecksumMismatch` when the trailing
/// four bytes disagree, or `InvalidBase58` for malformed input.
pub fn check_decode(s: &str) -> Result<Vec<u8>, PrimitivesError> {
    let decoded = decode(s)?;
    if decoded.len() < 4 {
        return Err(PrimitivesError::InvalidBase58(
            "data too short for checksum".to_string(),
        ));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    if checksum != &sha256d(payload)[..4] {
        return Err(PrimitivesError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}
