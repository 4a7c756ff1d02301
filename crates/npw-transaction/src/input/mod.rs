//! Transaction input referencing a previous output.
//!
//! An `Input` is polymorphic over the strategy used to unlock the output it
//! spends. The strategy is a tag (`InputKind`) chosen from the previous
//! output's locking script; every capability (size estimation, signedness,
//! signature production and placement) dispatches on that tag.

pub mod multisig;
pub mod multisig_script_hash;
pub mod public_key;
pub mod public_key_hash;

use serde::{Deserialize, Serialize};

use npw_primitives::ec::PrivateKey;
use npw_primitives::util::{ByteReader, ByteWriter, VarInt};
use npw_script::{Script, ScriptKind};

use crate::output::{OutputObject, TransactionOutput};
use crate::sighash;
use crate::signature::TransactionSignature;
use crate::transaction::{id_from_hex, id_to_hex, Transaction};
use crate::unspent::UnspentOutput;
use crate::TransactionError;

pub use multisig::MultiSig;
pub use multisig_script_hash::ScriptHashMultiSig;

/// Default sequence number indicating a finalized input (no relative lock-time).
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// Output index used by the null outpoint of coinbase inputs.
pub const NULL_OUTPUT_INDEX: u32 = 0xFFFF_FFFF;

/// Pushed size of the largest low-S DER signature with its sighash byte.
pub const MAX_SIGNATURE_PUSH_SIZE: usize = 73;

/// How an input unlocks the output it spends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// Read off the wire without previous-output information. Its unlocking
    /// script is opaque and counts as signed when non-empty.
    Unclassified,
    PublicKeyHash,
    PublicKey,
    MultiSig(MultiSig),
    ScriptHashMultiSig(ScriptHashMultiSig),
}

/// A single input of an npw transaction.
///
/// # Wire format
///
/// | Field            | Size             |
/// |------------------|------------------|
/// | prev_tx_id       | 32 bytes (LE)    |
/// | output_index     | 4 bytes (LE)     |
/// | script length    | VarInt           |
/// | unlocking_script | variable         |
/// | sequence_number  | 4 bytes (LE)     |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    /// Id of the transaction being spent from, in internal byte order.
    pub prev_tx_id: [u8; 32],

    /// Index of the output within that transaction.
    pub output_index: u32,

    /// Sequence number. Defaults to `0xFFFFFFFF` (finalized).
    pub sequence_number: u32,

    unlocking_script: Script,
    output: Option<TransactionOutput>,
    kind: InputKind,
}

/// Field-map form of an input.
///
/// Multisig inputs carry their key set, threshold and collected signatures
/// so partially signed transactions can be passed between signers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputObject {
    pub prev_tx_id: String,
    pub output_index: u32,
    pub sequence_number: u32,
    pub script: Script,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_keys: Option<Vec<npw_primitives::ec::PublicKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<Script>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<Option<TransactionSignature>>>,
}

impl Input {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// An unclassified input carrying a ready-made unlocking script.
    pub fn new(prev_tx_id: [u8; 32], output_index: u32, unlocking_script: Script) -> Self {
        Input {
            prev_tx_id,
            output_index,
            sequence_number: DEFAULT_SEQUENCE_NUMBER,
            unlocking_script,
            output: None,
            kind: InputKind::Unclassified,
        }
    }

    fn with_kind(
        prev_tx_id: [u8; 32],
        output_index: u32,
        output: TransactionOutput,
        kind: InputKind,
    ) -> Self {
        Input {
            prev_tx_id,
            output_index,
            sequence_number: DEFAULT_SEQUENCE_NUMBER,
            unlocking_script: Script::new(),
            output: Some(output),
            kind,
        }
    }

    /// Spend a pay-to-public-key-hash output.
    pub fn public_key_hash(
        prev_tx_id: [u8; 32],
        output_index: u32,
        output: TransactionOutput,
    ) -> Result<Self, TransactionError> {
        expect_kind(&output, ScriptKind::PublicKeyHashOut)?;
        Ok(Self::with_kind(prev_tx_id, output_index, output, InputKind::PublicKeyHash))
    }

    /// Spend a pay-to-public-key output.
    pub fn public_key(
        prev_tx_id: [u8; 32],
        output_index: u32,
        output: TransactionOutput,
    ) -> Result<Self, TransactionError> {
        expect_kind(&output, ScriptKind::PublicKeyOut)?;
        Ok(Self::with_kind(prev_tx_id, output_index, output, InputKind::PublicKey))
    }

    /// Spend a bare multisig output; keys and threshold come from its script.
    pub fn multisig(
        prev_tx_id: [u8; 32],
        output_index: u32,
        output: TransactionOutput,
    ) -> Result<Self, TransactionError> {
        let state = MultiSig::from_script(&output.locking_script)?;
        Ok(Self::with_kind(prev_tx_id, output_index, output, InputKind::MultiSig(state)))
    }

    /// Spend a pay-to-script-hash output whose redeem script is multisig.
    ///
    /// # Returns
    /// The input, or `UnsupportedScriptType` if the output does not commit
    /// to `redeem_script`.
    pub fn script_hash_multisig(
        prev_tx_id: [u8; 32],
        output_index: u32,
        output: TransactionOutput,
        redeem_script: Script,
    ) -> Result<Self, TransactionError> {
        let state = ScriptHashMultiSig::new(&output.locking_script, redeem_script)?;
        Ok(Self::with_kind(
            prev_tx_id,
            output_index,
            output,
            InputKind::ScriptHashMultiSig(state),
        ))
    }

    /// Pick the strategy by classifying the previous output's script.
    ///
    /// # Returns
    /// The input, or `UnsupportedScriptType` for scripts that need a hint
    /// (pay-to-script-hash) or that no strategy can spend.
    pub fn from_output(
        prev_tx_id: [u8; 32],
        output_index: u32,
        output: TransactionOutput,
    ) -> Result<Self, TransactionError> {
        match output.locking_script.classify() {
            ScriptKind::PublicKeyHashOut => Self::public_key_hash(prev_tx_id, output_index, output),
            ScriptKind::PublicKeyOut => Self::public_key(prev_tx_id, output_index, output),
            ScriptKind::MultiSigOut => Self::multisig(prev_tx_id, output_index, output),
            kind => Err(TransactionError::UnsupportedScriptType(format!(
                "{:?} output {}",
                kind, output.locking_script
            ))),
        }
    }

    pub fn from_unspent(utxo: &UnspentOutput) -> Result<Self, TransactionError> {
        Self::from_output(utxo.tx_id, utxo.output_index, utxo.output())
    }

    pub fn with_sequence_number(mut self, sequence_number: u32) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Previous transaction id as displayed (byte-reversed hex).
    pub fn prev_tx_id_hex(&self) -> String {
        id_to_hex(&self.prev_tx_id)
    }

    pub fn unlocking_script(&self) -> &Script {
        &self.unlocking_script
    }

    /// The output being spent, when known.
    pub fn output(&self) -> Option<&TransactionOutput> {
        self.output.as_ref()
    }

    pub fn kind(&self) -> &InputKind {
        &self.kind
    }

    /// The script signatures for this input commit to.
    pub fn subscript(&self) -> Option<&Script> {
        match &self.kind {
            InputKind::ScriptHashMultiSig(state) => Some(state.redeem_script()),
            InputKind::Unclassified => None,
            _ => self.output.as_ref().map(|o| &o.locking_script),
        }
    }

    /// Whether this is the null outpoint of a coinbase input.
    pub fn is_null(&self) -> bool {
        self.prev_tx_id == [0u8; 32] && self.output_index == NULL_OUTPUT_INDEX
    }

    // -----------------------------------------------------------------------
    // Signing capabilities
    // -----------------------------------------------------------------------

    /// Maximum length of the unlocking script once fully signed.
    ///
    /// Unclassified inputs report their current script length.
    pub fn estimate_size(&self) -> usize {
        match &self.kind {
            InputKind::Unclassified => self.unlocking_script.len(),
            InputKind::PublicKeyHash => public_key_hash::SCRIPT_MAX_SIZE,
            InputKind::PublicKey => public_key::SCRIPT_MAX_SIZE,
            InputKind::MultiSig(state) => state.estimate_size(),
            InputKind::ScriptHashMultiSig(state) => state.estimate_size(),
        }
    }

    /// Serialized size of the whole input once fully signed.
    pub fn estimate_serialized_size(&self) -> usize {
        let script_len = self.estimate_size();
        32 + 4 + VarInt::from(script_len).length() + script_len + 4
    }

    pub fn is_fully_signed(&self) -> bool {
        self.count_missing_signatures() == 0
    }

    /// Number of signatures still needed.
    pub fn count_missing_signatures(&self) -> usize {
        match &self.kind {
            InputKind::Unclassified => usize::from(self.unlocking_script.is_empty()),
            InputKind::PublicKeyHash => {
                usize::from(!public_key_hash::is_fully_signed(&self.unlocking_script))
            }
            InputKind::PublicKey => usize::from(!public_key::is_fully_signed(&self.unlocking_script)),
            InputKind::MultiSig(state) => state.count_missing_signatures(),
            InputKind::ScriptHashMultiSig(state) => state.multisig().count_missing_signatures(),
        }
    }

    /// Whether signing can still change this input. Single-key inputs are
    /// re-signed; multisig inputs stop accepting keys at their threshold.
    pub(crate) fn accepts_signatures(&self) -> bool {
        match &self.kind {
            InputKind::Unclassified => false,
            InputKind::PublicKeyHash | InputKind::PublicKey => true,
            InputKind::MultiSig(_) | InputKind::ScriptHashMultiSig(_) => !self.is_fully_signed(),
        }
    }

    /// Produce the signatures `key` can contribute to this input.
    ///
    /// # Arguments
    /// * `tx` - The transaction containing this input.
    /// * `input_index` - Position of this input in `tx`.
    /// * `key` - The candidate signing key.
    /// * `sighash_type` - The sighash flags to sign with.
    ///
    /// # Returns
    /// An empty vector when `key` is not required by this input, otherwise
    /// its one signature.
    pub fn get_signatures(
        &self,
        tx: &Transaction,
        input_index: usize,
        key: &PrivateKey,
        sighash_type: u32,
    ) -> Result<Vec<TransactionSignature>, TransactionError> {
        let public_key = key.pub_key();
        let matches = match &self.kind {
            InputKind::Unclassified => false,
            InputKind::PublicKeyHash => public_key_hash::matches(self.locking_script()?, &public_key),
            InputKind::PublicKey => public_key::matches(self.locking_script()?, &public_key),
            InputKind::MultiSig(state) => state.contains(&public_key),
            InputKind::ScriptHashMultiSig(state) => state.multisig().contains(&public_key),
        };
        if !matches {
            return Ok(Vec::new());
        }

        let subscript = self.subscript().ok_or_else(|| missing_output(input_index))?;
        let signature = sighash::sign(tx, key, input_index, sighash_type, subscript)?;
        Ok(vec![TransactionSignature {
            public_key,
            prev_tx_id: self.prev_tx_id,
            output_index: self.output_index,
            input_index,
            signature,
            sighash_type,
        }])
    }

    /// Whether `sig` is a valid signature for this input within `tx`.
    pub fn is_valid_signature(&self, tx: &Transaction, sig: &TransactionSignature) -> bool {
        if sig.prev_tx_id != self.prev_tx_id || sig.output_index != self.output_index {
            return false;
        }
        match self.subscript() {
            Some(subscript) => sighash::verify(
                tx,
                &sig.signature,
                &sig.public_key,
                sig.input_index,
                sig.sighash_type,
                subscript,
            ),
            None => false,
        }
    }

    /// Verify `sig` against `tx` and place it in the unlocking script.
    ///
    /// # Returns
    /// `SigningError` if the signature does not verify or its key plays no
    /// part in this input; `UnsupportedScriptType` for unclassified inputs.
    pub fn add_signature(
        &mut self,
        tx: &Transaction,
        sig: TransactionSignature,
    ) -> Result<(), TransactionError> {
        if !self.is_valid_signature(tx, &sig) {
            return Err(TransactionError::SigningError(format!(
                "signature by {} does not verify for input {}",
                sig.public_key, sig.input_index
            )));
        }
        self.insert_signature(sig)
    }

    /// Place an already verified signature.
    fn insert_signature(&mut self, sig: TransactionSignature) -> Result<(), TransactionError> {
        let script = match &mut self.kind {
            InputKind::Unclassified => {
                return Err(TransactionError::UnsupportedScriptType(
                    "cannot add a signature to an unclassified input".to_string(),
                ))
            }
            InputKind::PublicKeyHash => {
                let locking = self.output.as_ref().map(|o| &o.locking_script);
                if !locking.map_or(false, |s| public_key_hash::matches(s, &sig.public_key)) {
                    return Err(foreign_key(&sig));
                }
                public_key_hash::unlocking_script(&sig)?
            }
            InputKind::PublicKey => {
                let locking = self.output.as_ref().map(|o| &o.locking_script);
                if !locking.map_or(false, |s| public_key::matches(s, &sig.public_key)) {
                    return Err(foreign_key(&sig));
                }
                public_key::unlocking_script(&sig)?
            }
            InputKind::MultiSig(state) => {
                state.insert(sig)?;
                state.unlocking_script()?
            }
            InputKind::ScriptHashMultiSig(state) => {
                state.insert(sig)?;
                state.unlocking_script()?
            }
        };
        self.unlocking_script = script;
        Ok(())
    }

    /// Remove all signatures. Unclassified inputs lose their script.
    pub fn clear_signatures(&mut self) {
        match &mut self.kind {
            InputKind::MultiSig(state) => state.clear(),
            InputKind::ScriptHashMultiSig(state) => state.clear(),
            _ => {}
        }
        self.unlocking_script = Script::new();
    }

    fn locking_script(&self) -> Result<&Script, TransactionError> {
        self.output
            .as_ref()
            .map(|o| &o.locking_script)
            .ok_or_else(|| TransactionError::InvalidTransaction(
                "classified input without previous output".to_string(),
            ))
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Deserialize an input from a `ByteReader`.
    ///
    /// The result is `Unclassified`: the wire carries no previous-output
    /// information.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let prev_tx_id = reader.read_array::<32>().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading previous tx id: {}", e))
        })?;
        let output_index = reader.read_u32_le().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading output index: {}", e))
        })?;
        let script_bytes = reader.read_var_bytes().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading unlocking script: {}", e))
        })?;
        let sequence_number = reader.read_u32_le().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading sequence number: {}", e))
        })?;

        Ok(Input::new(prev_tx_id, output_index, Script::from_bytes(script_bytes))
            .with_sequence_number(sequence_number))
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.prev_tx_id);
        writer.write_u32_le(self.output_index);
        writer.write_var_bytes(self.unlocking_script.to_bytes());
        writer.write_u32_le(self.sequence_number);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.size());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialized size with the current unlocking script.
    pub fn size(&self) -> usize {
        let script_len = self.unlocking_script.len();
        32 + 4 + VarInt::from(script_len).length() + script_len + 4
    }

    pub fn to_object(&self) -> InputObject {
        let mut obj = InputObject {
            prev_tx_id: self.prev_tx_id_hex(),
            output_index: self.output_index,
            sequence_number: self.sequence_number,
            script: self.unlocking_script.clone(),
            output: self.output.as_ref().map(TransactionOutput::to_object),
            threshold: None,
            public_keys: None,
            redeem_script: None,
            signatures: None,
        };
        let state = match &self.kind {
            InputKind::MultiSig(state) => state,
            InputKind::ScriptHashMultiSig(state) => {
                obj.redeem_script = Some(state.redeem_script().clone());
                state.multisig()
            }
            _ => return obj,
        };
        obj.threshold = Some(state.threshold());
        obj.public_keys = Some(state.public_keys().to_vec());
        obj.signatures = Some(state.signatures().to_vec());
        obj
    }

    /// Rebuild an input from its field map.
    ///
    /// Without an `output` the input is unclassified. A pay-to-script-hash
    /// output needs `redeemScript`, or `publicKeys` and `threshold` from
    /// which the sorted multisig redeem script is rebuilt.
    pub fn from_object(obj: &InputObject) -> Result<Self, TransactionError> {
        let prev_tx_id = id_from_hex(&obj.prev_tx_id)?;
        let Some(output_obj) = &obj.output else {
            return Ok(Input::new(prev_tx_id, obj.output_index, obj.script.clone())
                .with_sequence_number(obj.sequence_number));
        };
        let output = TransactionOutput::from_object(output_obj)?;

        let mut input = if output.locking_script.is_script_hash_out() {
            let redeem_script = match (&obj.redeem_script, &obj.public_keys, obj.threshold) {
                (Some(redeem), _, _) => redeem.clone(),
                (None, Some(keys), Some(threshold)) => {
                    Script::build_multisig_out(keys, threshold, true)?
                }
                _ => {
                    return Err(TransactionError::UnsupportedScriptType(
                        "pay-to-script-hash input without redeem script".to_string(),
                    ))
                }
            };
            Self::script_hash_multisig(prev_tx_id, obj.output_index, output, redeem_script)?
        } else {
            Self::from_output(prev_tx_id, obj.output_index, output)?
        };
        input.sequence_number = obj.sequence_number;

        match (&mut input.kind, &obj.signatures) {
            (InputKind::MultiSig(state), Some(sigs)) => {
                state.restore(sigs)?;
                input.unlocking_script = state.unlocking_script()?;
            }
            (InputKind::ScriptHashMultiSig(state), Some(sigs)) => {
                state.restore(sigs)?;
                input.unlocking_script = state.unlocking_script()?;
            }
            (InputKind::PublicKeyHash | InputKind::PublicKey, _) => {
                input.unlocking_script = obj.script.clone();
            }
            _ => {}
        }
        Ok(input)
    }
}

fn expect_kind(output: &TransactionOutput, kind: ScriptKind) -> Result<(), TransactionError> {
    let actual = output.locking_script.classify();
    if actual == kind {
        Ok(())
    } else {
        Err(TransactionError::UnsupportedScriptType(format!(
            "expected {:?}, found {:?}",
            kind, actual
        )))
    }
}

fn missing_output(input_index: usize) -> TransactionError {
    TransactionError::InvalidTransaction(format!(
        "input {} has no previous output to sign against",
        input_index
    ))
}

fn foreign_key(sig: &TransactionSignature) -> TransactionError {
    TransactionError::SigningError(format!(
        "public key {} is not required by input {}",
        sig.public_key, sig.input_index
    ))
}
