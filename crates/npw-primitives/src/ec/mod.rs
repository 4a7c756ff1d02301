/// Elliptic curve cryptography on secp256k1.
///
/// Provides private keys (with WIF encoding), public keys in compressed and
/// uncompressed SEC1 form, and DER-encoded ECDSA signatures over prehashed
/// messages.

pub mod private_key;
pub mod public_key;
pub mod signature;

pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use signature::Signature;
