//! Recognition of the standard script templates.
//!
//! Classification looks only at chunk shape and never fails: anything that
//! does not parse, or parses into an unrecognized shape, is `Unknown`.

use npw_primitives::ec::PublicKey;

use crate::address::AddressType;
use crate::opcodes::*;
use crate::script::Script;
use crate::ScriptError;

/// The template a script matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ScriptKind {
    /// `<pubkey> OP_CHECKSIG`
    PublicKeyOut,
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
    PublicKeyHashOut,
    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`
    MultiSigOut,
    /// `OP_HASH160 <20 bytes> OP_EQUAL`
    ScriptHashOut,
    /// `OP_RETURN <push>...`
    DataOut,
    /// `<signature>`
    PublicKeyIn,
    /// `<signature> <pubkey>`
    PublicKeyHashIn,
    /// `OP_0 <signature>...`
    MultiSigIn,
    /// `<push>... <redeem script>` where the redeem script is itself standard.
    ScriptHashIn,
    Unknown,
}

impl ScriptKind {
    /// Whether this kind describes a locking script.
    pub fn is_output(&self) -> bool {
        matches!(
            self,
            ScriptKind::PublicKeyOut
                | ScriptKind::PublicKeyHashOut
                | ScriptKind::MultiSigOut
                | ScriptKind::ScriptHashOut
                | ScriptKind::DataOut
        )
    }
}

/// Whether `data` has the shape of a SEC1 public key.
fn is_public_key_shape(data: &[u8]) -> bool {
    match data.first() {
        Some(0x02 | 0x03) => data.len() == 33,
        Some(0x04 | 0x06 | 0x07) => data.len() == 65,
        _ => false,
    }
}

/// Whether `data` looks like a DER signature (with or without sighash byte).
fn is_signature_shape(data: &[u8]) -> bool {
    data.first() == Some(&0x30)
}

impl Script {
    /// Classify the script. Output templates are tried before input ones.
    pub fn classify(&self) -> ScriptKind {
        if self.is_public_key_out() {
            ScriptKind::PublicKeyOut
        } else if self.is_public_key_hash_out() {
            ScriptKind::PublicKeyHashOut
        } else if self.is_multisig_out() {
            ScriptKind::MultiSigOut
        } else if self.is_script_hash_out() {
            ScriptKind::ScriptHashOut
        } else if self.is_data_out() {
            ScriptKind::DataOut
        } else if self.is_public_key_in() {
            ScriptKind::PublicKeyIn
        } else if self.is_public_key_hash_in() {
            ScriptKind::PublicKeyHashIn
        } else if self.is_multisig_in() {
            ScriptKind::MultiSigIn
        } else if self.is_script_hash_in() {
            ScriptKind::ScriptHashIn
        } else {
            ScriptKind::Unknown
        }
    }

    /// The address type this locking script pays to, if any.
    pub fn address_type(&self) -> Option<AddressType> {
        if self.is_public_key_hash_out() {
            Some(AddressType::PayToPublicKeyHash)
        } else if self.is_script_hash_out() {
            Some(AddressType::PayToScriptHash)
        } else {
            None
        }
    }

    pub fn is_public_key_hash_out(&self) -> bool {
        let Ok(c) = self.chunks() else { return false };
        c.len() == 5
            && c[0].op == OP_DUP
            && c[1].op == OP_HASH160
            && c[2].data().map_or(false, |d| d.len() == 20)
            && c[3].op == OP_EQUALVERIFY
            && c[4].op == OP_CHECKSIG
    }

    /// Pay-to-script-hash is recognized on the exact 23-byte form only.
    pub fn is_script_hash_out(&self) -> bool {
        let b = self.to_bytes();
        b.len() == 23 && b[0] == OP_HASH160 && b[1] == OP_DATA_20 && b[22] == OP_EQUAL
    }

    pub fn is_public_key_out(&self) -> bool {
        let Ok(c) = self.chunks() else { return false };
        c.len() == 2
            && c[0].data().map_or(false, is_public_key_shape)
            && c[1].op == OP_CHECKSIG
    }

    /// Threshold and key pushes framed by small integers with `1 <= m <= n`
    /// and `n` equal to the number of keys.
    pub fn is_multisig_out(&self) -> bool {
        let Ok(c) = self.chunks() else { return false };
        if c.len() < 4 || c[c.len() - 1].op != OP_CHECKMULTISIG {
            return false;
        }
        let keys = &c[1..c.len() - 2];
        let (Some(m), Some(n)) = (small_int_value(c[0].op), small_int_value(c[c.len() - 2].op))
        else {
            return false;
        };
        m >= 1
            && m <= n
            && n == keys.len()
            && keys.iter().all(|k| k.data().map_or(false, |d| !d.is_empty()))
    }

    /// `OP_RETURN` followed only by pushes.
    pub fn is_data_out(&self) -> bool {
        let Ok(c) = self.chunks() else { return false };
        !c.is_empty() && c[0].op == OP_RETURN && c[1..].iter().all(|k| k.is_push())
    }

    pub fn is_public_key_in(&self) -> bool {
        let Ok(c) = self.chunks() else { return false };
        c.len() == 1 && c[0].data().map_or(false, is_signature_shape)
    }

    pub fn is_public_key_hash_in(&self) -> bool {
        let Ok(c) = self.chunks() else { return false };
        c.len() == 2
            && c[0].data().map_or(false, is_signature_shape)
            && c[1].data().map_or(false, is_public_key_shape)
    }

    pub fn is_multisig_in(&self) -> bool {
        let Ok(c) = self.chunks() else { return false };
        c.len() >= 2
            && c[0].op == OP_0
            && c[1..].iter().all(|k| k.data().map_or(false, is_signature_shape))
    }

    /// Push-only script whose last push is a recognizable script.
    pub fn is_script_hash_in(&self) -> bool {
        if !self.is_push_only() {
            return false;
        }
        let Ok(c) = self.chunks() else { return false };
        match c.last().and_then(|k| k.data()) {
            Some(redeem) => Script::from_bytes(redeem).classify() != ScriptKind::Unknown,
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Data extraction
    // -----------------------------------------------------------------------

    /// The 20-byte hash of a pay-to-public-key-hash output.
    pub fn public_key_hash(&self) -> Option<[u8; 20]> {
        if !self.is_public_key_hash_out() {
            return None;
        }
        let chunks = self.chunks().ok()?;
        chunks[2].data()?.try_into().ok()
    }

    /// The 20-byte script hash of a pay-to-script-hash output.
    pub fn script_hash_of_output(&self) -> Option<[u8; 20]> {
        if !self.is_script_hash_out() {
            return None;
        }
        self.to_bytes()[2..22].try_into().ok()
    }

    /// The public key of a pay-to-public-key output.
    pub fn public_key_of_output(&self) -> Option<PublicKey> {
        if !self.is_public_key_out() {
            return None;
        }
        let chunks = self.chunks().ok()?;
        PublicKey::from_bytes(chunks[0].data()?).ok()
    }

    /// Threshold and public keys of a multisig output script.
    ///
    /// # Returns
    /// `(m, keys)` in script order, or `InvalidMultisig` if the script is not
    /// a multisig output or one of its keys is not a valid point.
    pub fn multisig_parts(&self) -> Result<(usize, Vec<PublicKey>), ScriptError> {
        if !self.is_multisig_out() {
            return Err(ScriptError::InvalidMultisig(
                "script is not a multisig output".to_string(),
            ));
        }
        let chunks = self.chunks()?;
        let threshold = small_int_value(chunks[0].op).unwrap_or(0);
        let keys = chunks[1..chunks.len() - 2]
            .iter()
            .map(|k| {
                PublicKey::from_bytes(k.data().unwrap_or_default())
                    .map_err(|e| ScriptError::InvalidMultisig(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((threshold, keys))
    }
}
