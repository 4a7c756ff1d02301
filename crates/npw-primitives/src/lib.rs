/// npw SDK - Cryptographic primitives, hashing, and binary encoding.
///
/// This crate provides the building blocks consumed by the script and
/// transaction crates:
/// - Hash functions (SHA-256, SHA-256d, RIPEMD-160, Hash160)
/// - secp256k1 private/public keys and DER-encoded ECDSA signatures
/// - Base58 and Base58Check encoding
/// - Little-endian integer and variable-length integer codec

pub mod hash;
pub mod util;
pub mod base58;
pub mod ec;

mod error;
pub use error::PrimitivesError;
