//! Pay-to-public-key-hash spending.
//!
//! Unlocking script: `<signature> <public key>`.

use npw_primitives::ec::PublicKey;
use npw_script::Script;

use super::MAX_SIGNATURE_PUSH_SIZE;
use crate::signature::TransactionSignature;
use crate::TransactionError;

/// Signature push plus the push of a 33-byte compressed key.
pub const SCRIPT_MAX_SIZE: usize = MAX_SIGNATURE_PUSH_SIZE + 34;

/// Whether `key`, in its own encoding, hashes to the output's key hash.
pub(crate) fn matches(locking_script: &Script, key: &PublicKey) -> bool {
    locking_script.public_key_hash() == Some(key.hash160())
}

pub(crate) fn unlocking_script(sig: &TransactionSignature) -> Result<Script, TransactionError> {
    Ok(Script::build_public_key_hash_in(
        &sig.to_script_bytes(),
        &sig.public_key,
    )?)
}

pub(crate) fn is_fully_signed(unlocking_script: &Script) -> bool {
    unlocking_script.is_public_key_hash_in()
}
