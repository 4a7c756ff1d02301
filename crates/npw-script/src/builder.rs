//! Builders for the standard locking and unlocking templates.
//!
//! Locking builders take fixed-size hashes or parsed keys, so they cannot be
//! handed malformed parameters. Builders that push caller-supplied bytes
//! return `Result` because an oversized push is representable in memory but
//! not in a script.

use npw_primitives::ec::PublicKey;

use crate::address::{Address, AddressType};
use crate::opcodes::*;
use crate::script::Script;
use crate::ScriptError;

/// Largest `n` an OP_n OP_CHECKMULTISIG script can express.
pub const MAX_MULTISIG_KEYS: usize = 16;

impl Script {
    // -----------------------------------------------------------------------
    // Locking templates
    // -----------------------------------------------------------------------

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn build_public_key_hash_out(hash: &[u8; 20]) -> Script {
        let mut bytes = Vec::with_capacity(25);
        bytes.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
        bytes.extend_from_slice(hash);
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Script::from(bytes)
    }

    /// `OP_HASH160 <hash> OP_EQUAL`
    pub fn build_script_hash_out_from_hash(hash: &[u8; 20]) -> Script {
        let mut bytes = Vec::with_capacity(23);
        bytes.extend_from_slice(&[OP_HASH160, OP_DATA_20]);
        bytes.extend_from_slice(hash);
        bytes.push(OP_EQUAL);
        Script::from(bytes)
    }

    /// Pay-to-script-hash output committing to `redeem_script`.
    pub fn build_script_hash_out(redeem_script: &Script) -> Script {
        Script::build_script_hash_out_from_hash(&redeem_script.script_hash())
    }

    /// Locking script for an address, chosen by the address type.
    pub fn build_address_out(address: &Address) -> Script {
        match address.address_type {
            AddressType::PayToPublicKeyHash => Script::build_public_key_hash_out(&address.hash),
            AddressType::PayToScriptHash => Script::build_script_hash_out_from_hash(&address.hash),
        }
    }

    /// `<pubkey> OP_CHECKSIG`, with the key in its own encoding.
    pub fn build_public_key_out(public_key: &PublicKey) -> Script {
        let key = public_key.to_bytes();
        let mut bytes = Vec::with_capacity(key.len() + 2);
        bytes.push(key.len() as u8);
        bytes.extend_from_slice(&key);
        bytes.push(OP_CHECKSIG);
        Script::from(bytes)
    }

    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`.
    ///
    /// # Arguments
    /// * `public_keys` - The participating keys.
    /// * `threshold` - Number of signatures required (`m`).
    /// * `sorted` - Order keys by their serialized bytes. Disable only to
    ///   reproduce a script built with a fixed key order.
    ///
    /// # Returns
    /// The script, or `InvalidMultisig` unless `1 <= m <= n <= 16`.
    pub fn build_multisig_out(
        public_keys: &[PublicKey],
        threshold: usize,
        sorted: bool,
    ) -> Result<Script, ScriptError> {
        let n = public_keys.len();
        if n == 0 || n > MAX_MULTISIG_KEYS {
            return Err(ScriptError::InvalidMultisig(format!(
                "key count {} outside 1..={}",
                n, MAX_MULTISIG_KEYS
            )));
        }
        if threshold == 0 || threshold > n {
            return Err(ScriptError::InvalidMultisig(format!(
                "threshold {} outside 1..={}",
                threshold, n
            )));
        }

        let mut keys: Vec<&PublicKey> = public_keys.iter().collect();
        if sorted {
            keys.sort();
        }

        let mut script = Script::new();
        script.append_opcodes(&[small_int_op(threshold).unwrap_or(OP_1)])?;
        for key in keys {
            script.append_push_data(&key.to_bytes())?;
        }
        script.append_opcodes(&[small_int_op(n).unwrap_or(OP_16), OP_CHECKMULTISIG])?;
        Ok(script)
    }

    /// `OP_RETURN <data>`; empty data yields a bare `OP_RETURN`.
    pub fn build_data_out(data: &[u8]) -> Result<Script, ScriptError> {
        let mut script = Script::new();
        script.append_opcodes(&[OP_RETURN])?;
        if !data.is_empty() {
            script.append_push_data(data)?;
        }
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Unlocking templates
    // -----------------------------------------------------------------------

    /// `<signature> <pubkey>`. The signature includes its sighash byte.
    pub fn build_public_key_hash_in(
        signature: &[u8],
        public_key: &PublicKey,
    ) -> Result<Script, ScriptError> {
        let mut script = Script::new();
        script
            .append_push_data(signature)?
            .append_push_data(&public_key.to_bytes())?;
        Ok(script)
    }

    /// `<signature>`
    pub fn build_public_key_in(signature: &[u8]) -> Result<Script, ScriptError> {
        let mut script = Script::new();
        script.append_push_data(signature)?;
        Ok(script)
    }

    /// `OP_0 <signature>...`. The leading OP_0 absorbs the extra stack
    /// element OP_CHECKMULTISIG pops.
    pub fn build_multisig_in(signatures: &[Vec<u8>]) -> Result<Script, ScriptError> {
        let mut script = Script::new();
        script.append_opcodes(&[OP_0])?;
        for sig in signatures {
            script.append_push_data(sig)?;
        }
        Ok(script)
    }

    /// `OP_0 <signature>... <redeem script>`
    pub fn build_p2sh_multisig_in(
        signatures: &[Vec<u8>],
        redeem_script: &Script,
    ) -> Result<Script, ScriptError> {
        let mut script = Script::build_multisig_in(signatures)?;
        script.append_push_data(redeem_script.to_bytes())?;
        Ok(script)
    }
}
