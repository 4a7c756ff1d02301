//! The npw transaction and its assembler.
//!
//! A `Transaction` is both the wire structure (version, inputs, outputs,
//! lock time) and a fluent builder: `from` funds it from unspent outputs,
//! `to` pays addresses, `change` designates where the remainder goes and
//! `sign` fills in unlocking scripts. After each structural change the
//! change output is recomputed and the cached hash dropped.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use npw_primitives::ec::{PrivateKey, PublicKey, Signature};
use npw_primitives::hash::sha256d;
use npw_primitives::util::{ByteReader, ByteWriter, VarInt};
use npw_script::{Address, Script};

use crate::config::FeePolicy;
use crate::input::{Input, InputKind, InputObject, DEFAULT_SEQUENCE_NUMBER};
use crate::output::{parse_amount, OutputObject, TransactionOutput, MAX_MONEY};
use crate::sighash;
use crate::signature::TransactionSignature;
use crate::unspent::UnspentOutput;
use crate::TransactionError;

/// Version of newly created transactions.
pub const CURRENT_VERSION: i32 = 1;

/// Lock times below this are block heights, at or above it Unix timestamps.
pub const NLOCKTIME_BLOCKHEIGHT_LIMIT: u32 = 500_000_000;

/// Sequence number that leaves lock time enforced.
pub const DEFAULT_LOCKTIME_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFE;

/// Upper bound of version, counts and lock time in the size estimate.
const MAXIMUM_EXTRA_SIZE: usize = 4 + 9 + 9 + 4;

/// Largest transaction `verify` accepts.
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Which checks `serialize` skips.
///
/// The default runs every check. Multi-party workflows that pass partially
/// signed transactions around use `SerializeOptions::partial()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    pub disable_all: bool,
    pub disable_invalid_amounts: bool,
    pub disable_dust_outputs: bool,
    pub disable_more_output_than_input: bool,
    pub disable_large_fees: bool,
    pub disable_small_fees: bool,
    pub disable_is_fully_signed: bool,
}

impl SerializeOptions {
    /// Every check except the one for missing signatures.
    pub fn partial() -> Self {
        SerializeOptions {
            disable_is_fully_signed: true,
            ..Self::default()
        }
    }

    pub fn unchecked() -> Self {
        SerializeOptions {
            disable_all: true,
            ..Self::default()
        }
    }
}

/// Interpretation of a non-zero lock time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockTime {
    BlockHeight(u32),
    /// Unix timestamp in seconds.
    Timestamp(u32),
}

/// An npw transaction under assembly.
///
/// # Wire format
///
/// | Field         | Size            |
/// |---------------|-----------------|
/// | version       | 4 bytes (LE)    |
/// | input count   | VarInt          |
/// | inputs        | variable        |
/// | output count  | VarInt          |
/// | outputs       | variable        |
/// | lock_time     | 4 bytes (LE)    |
#[derive(Clone, Debug)]
pub struct Transaction {
    version: i32,
    inputs: Vec<Input>,
    outputs: Vec<TransactionOutput>,
    lock_time: u32,

    /// Explicit fee; `None` means estimated from size.
    fee: Option<u64>,
    change_script: Option<Script>,
    change_index: Option<usize>,
    policy: FeePolicy,
    hash: OnceLock<[u8; 32]>,
}

/// Field-map form of a transaction, including assembler state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionObject {
    #[serde(default)]
    pub hash: String,
    pub version: i32,
    pub inputs: Vec<InputObject>,
    pub outputs: Vec<OutputObject>,
    pub n_lock_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_script: Option<Script>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<serde_json::Number>,
}

/// Render a transaction id held in internal byte order as displayed hex.
pub fn id_to_hex(id: &[u8; 32]) -> String {
    let mut reversed = *id;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a displayed transaction id into internal byte order.
pub fn id_from_hex(hex_str: &str) -> Result<[u8; 32], TransactionError> {
    let bytes = hex::decode(hex_str)?;
    let mut id: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
        TransactionError::MalformedEncoding(format!(
            "transaction id must be 32 bytes, got {}",
            b.len()
        ))
    })?;
    id.reverse();
    Ok(id)
}

impl Transaction {
    pub fn new() -> Self {
        Self::with_policy(FeePolicy::default())
    }

    /// An empty transaction assembled under `policy`.
    pub fn with_policy(policy: FeePolicy) -> Self {
        Transaction {
            version: CURRENT_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            fee: None,
            change_script: None,
            change_index: None,
            policy,
            hash: OnceLock::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Wire format
    // -----------------------------------------------------------------------

    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    /// Parse a transaction that spans all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if !reader.is_finished() {
            return Err(TransactionError::MalformedEncoding(format!(
                "{} trailing bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    /// Deserialize a transaction from a `ByteReader`.
    ///
    /// Inputs come back unclassified since the wire carries no
    /// previous-output information.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let version = reader.read_i32_le().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading version: {}", e))
        })?;

        let input_count = reader.read_varint().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading input count: {}", e))
        })?;
        // 41 bytes is the smallest possible input
        let mut inputs = Vec::with_capacity(bounded_capacity(input_count, reader.remaining() / 41));
        for _ in 0..input_count.value() {
            inputs.push(Input::read_from(reader)?);
        }

        let output_count = reader.read_varint().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading output count: {}", e))
        })?;
        let mut outputs = Vec::with_capacity(bounded_capacity(output_count, reader.remaining() / 9));
        for _ in 0..output_count.value() {
            outputs.push(TransactionOutput::read_from(reader)?);
        }

        let lock_time = reader.read_u32_le().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading lock time: {}", e))
        })?;

        let mut tx = Transaction::new();
        tx.version = version;
        tx.inputs = inputs;
        tx.outputs = outputs;
        tx.lock_time = lock_time;
        Ok(tx)
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_i32_le(self.version);
        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(writer);
        }
        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(writer);
        }
        writer.write_u32_le(self.lock_time);
    }

    /// Wire bytes, without any of the `serialize` checks.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(256);
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Hex serialization after the checks `opts` leaves enabled.
    ///
    /// # Returns
    /// The hex string, or the first failing check: `InvalidAmount`,
    /// `InsufficientFunds`, `FeeError`, `DustOutput` or `MissingSignatures`.
    pub fn serialize(&self, opts: SerializeOptions) -> Result<String, TransactionError> {
        self.check_serialization(opts)?;
        Ok(self.to_hex())
    }

    pub fn unchecked_serialize(&self) -> String {
        self.to_hex()
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        4 + VarInt::from(self.inputs.len()).length()
            + self.inputs.iter().map(Input::size).sum::<usize>()
            + VarInt::from(self.outputs.len()).length()
            + self.outputs.iter().map(TransactionOutput::size).sum::<usize>()
            + 4
    }

    /// Double SHA-256 of the wire bytes, in internal byte order.
    pub fn hash(&self) -> [u8; 32] {
        *self.hash.get_or_init(|| sha256d(&self.to_bytes()))
    }

    /// Transaction id as displayed (byte-reversed hash).
    pub fn id(&self) -> String {
        id_to_hex(&self.hash())
    }

    fn invalidate(&mut self) {
        self.hash.take();
    }

    /// Drop the cached hash and every signature committing to the old
    /// content. Unclassified inputs keep their opaque scripts.
    fn invalidate_signatures(&mut self) {
        let mut cleared = 0usize;
        for input in &mut self.inputs {
            if matches!(input.kind(), InputKind::Unclassified) {
                continue;
            }
            if !input.unlocking_script().is_empty() {
                cleared += 1;
            }
            input.clear_signatures();
        }
        if cleared > 0 {
            tracing::debug!(inputs = cleared, "signatures invalidated by mutation");
        }
        self.invalidate();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn set_version(&mut self, version: i32) -> &mut Self {
        self.version = version;
        self.invalidate_signatures();
        self
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        &self.outputs
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Raw lock time field.
    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self.invalidate_signatures();
        self
    }

    /// The lock time as a block height or timestamp; `None` when unlocked.
    pub fn locked_until(&self) -> Option<LockTime> {
        match self.lock_time {
            0 => None,
            t if t < NLOCKTIME_BLOCKHEIGHT_LIMIT => Some(LockTime::BlockHeight(t)),
            t => Some(LockTime::Timestamp(t)),
        }
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.policy
    }

    pub fn set_fee_policy(&mut self, policy: FeePolicy) -> &mut Self {
        self.policy = policy;
        self.update_change_output();
        self
    }

    /// The output receiving change, if one was created.
    pub fn change_output(&self) -> Option<&TransactionOutput> {
        self.change_index.and_then(|i| self.outputs.get(i))
    }

    pub fn change_index(&self) -> Option<usize> {
        self.change_index
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_null()
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Spend an unspent output, choosing the input strategy from its script.
    ///
    /// An outpoint that is already spent by this transaction is ignored.
    ///
    /// # Returns
    /// `UnsupportedScriptType` when the script needs a hint or cannot be
    /// spent; use `from_multisig` for pay-to-script-hash multisig.
    pub fn from(&mut self, utxo: &UnspentOutput) -> Result<&mut Self, TransactionError> {
        if self.spends(utxo) {
            tracing::trace!(outpoint = %utxo, "outpoint already spent, ignoring");
            return Ok(self);
        }
        let input = Input::from_unspent(utxo)?;
        Ok(self.add_input(input))
    }

    pub fn from_many(&mut self, utxos: &[UnspentOutput]) -> Result<&mut Self, TransactionError> {
        for utxo in utxos {
            self.from(utxo)?;
        }
        Ok(self)
    }

    /// Spend a multisig output, bare or wrapped in pay-to-script-hash.
    ///
    /// For pay-to-script-hash the redeem script is rebuilt from
    /// `public_keys` and `threshold` with keys sorted.
    ///
    /// # Returns
    /// `UnsupportedScriptType` if the output's script does not match the
    /// given key set.
    pub fn from_multisig(
        &mut self,
        utxo: &UnspentOutput,
        public_keys: &[PublicKey],
        threshold: usize,
    ) -> Result<&mut Self, TransactionError> {
        if self.spends(utxo) {
            tracing::trace!(outpoint = %utxo, "outpoint already spent, ignoring");
            return Ok(self);
        }
        let output = utxo.output();
        let input = if output.locking_script.is_script_hash_out() {
            let redeem_script = Script::build_multisig_out(public_keys, threshold, true)?;
            Input::script_hash_multisig(utxo.tx_id, utxo.output_index, output, redeem_script)?
        } else if output.locking_script.is_multisig_out() {
            let (m, mut keys) = output.locking_script.multisig_parts()?;
            let mut expected = public_keys.to_vec();
            keys.sort();
            expected.sort();
            if m != threshold || keys != expected {
                return Err(TransactionError::UnsupportedScriptType(format!(
                    "multisig output {} does not match the given {}-of-{} key set",
                    output.locking_script,
                    threshold,
                    public_keys.len()
                )));
            }
            Input::multisig(utxo.tx_id, utxo.output_index, output)?
        } else {
            return Err(TransactionError::UnsupportedScriptType(format!(
                "{:?} output is not multisig",
                output.locking_script.classify()
            )));
        };
        Ok(self.add_input(input))
    }

    fn spends(&self, utxo: &UnspentOutput) -> bool {
        self.inputs
            .iter()
            .any(|i| i.prev_tx_id == utxo.tx_id && i.output_index == utxo.output_index)
    }

    pub fn add_input(&mut self, input: Input) -> &mut Self {
        self.inputs.push(input);
        self.invalidate_signatures();
        self.update_change_output();
        self
    }

    /// Remove an input.
    pub fn remove_input(&mut self, index: usize) -> Result<&mut Self, TransactionError> {
        if index >= self.inputs.len() {
            return Err(TransactionError::InvalidTransaction(format!(
                "input index {} out of range (tx has {} inputs)",
                index,
                self.inputs.len()
            )));
        }
        self.inputs.remove(index);
        self.invalidate_signatures();
        self.update_change_output();
        Ok(self)
    }

    /// Pay `satoshis` to `address`.
    pub fn to(&mut self, address: &Address, satoshis: u64) -> &mut Self {
        self.add_output(TransactionOutput::to_address(address, satoshis))
    }

    pub fn add_output(&mut self, output: TransactionOutput) -> &mut Self {
        self.outputs.push(output);
        self.invalidate_signatures();
        self.update_change_output();
        self
    }

    /// Add a zero-value `OP_RETURN` output carrying `data`.
    pub fn add_data(&mut self, data: &[u8]) -> Result<&mut Self, TransactionError> {
        let script = Script::build_data_out(data)?;
        Ok(self.add_output(TransactionOutput::new(0, script)))
    }

    pub fn remove_output(&mut self, index: usize) -> Result<&mut Self, TransactionError> {
        if index >= self.outputs.len() {
            return Err(TransactionError::InvalidTransaction(format!(
                "output index {} out of range (tx has {} outputs)",
                index,
                self.outputs.len()
            )));
        }
        self.outputs.remove(index);
        self.change_index = match self.change_index {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        self.invalidate_signatures();
        self.update_change_output();
        Ok(self)
    }

    /// Remove every output, the change output included.
    pub fn clear_outputs(&mut self) -> &mut Self {
        self.outputs.clear();
        self.change_index = None;
        self.invalidate_signatures();
        self.update_change_output();
        self
    }

    /// Pay exactly `fee`; the change output absorbs the difference.
    pub fn fee(&mut self, fee: u64) -> &mut Self {
        self.fee = Some(fee);
        self.update_change_output();
        self
    }

    /// Override the fee rate used for estimation.
    pub fn fee_per_kb(&mut self, fee_per_kb: u64) -> &mut Self {
        self.policy.fee_per_kb = fee_per_kb;
        self.update_change_output();
        self
    }

    /// Send the remainder to `address`.
    pub fn change(&mut self, address: &Address) -> &mut Self {
        self.change_script = Some(address.to_script());
        self.update_change_output();
        self
    }

    /// Lock until a block height below `NLOCKTIME_BLOCKHEIGHT_LIMIT`.
    ///
    /// Finalized inputs get a sequence number that keeps the lock enforced.
    pub fn lock_until_block_height(&mut self, height: u32) -> Result<&mut Self, TransactionError> {
        if height >= NLOCKTIME_BLOCKHEIGHT_LIMIT {
            return Err(TransactionError::InvalidTransaction(format!(
                "block height {} must be below {}",
                height, NLOCKTIME_BLOCKHEIGHT_LIMIT
            )));
        }
        Ok(self.apply_lock_time(height))
    }

    /// Lock until a Unix timestamp at or above `NLOCKTIME_BLOCKHEIGHT_LIMIT`.
    pub fn lock_until_date(&mut self, timestamp: u32) -> Result<&mut Self, TransactionError> {
        if timestamp < NLOCKTIME_BLOCKHEIGHT_LIMIT {
            return Err(TransactionError::InvalidTransaction(format!(
                "timestamp {} would be read as a block height",
                timestamp
            )));
        }
        Ok(self.apply_lock_time(timestamp))
    }

    fn apply_lock_time(&mut self, lock_time: u32) -> &mut Self {
        for input in &mut self.inputs {
            if input.sequence_number == DEFAULT_SEQUENCE_NUMBER {
                input.sequence_number = DEFAULT_LOCKTIME_SEQUENCE_NUMBER;
            }
        }
        self.lock_time = lock_time;
        self.invalidate_signatures();
        self
    }

    /// Order inputs and outputs canonically (BIP69).
    ///
    /// Inputs sort by displayed previous id then output index, outputs by
    /// amount then script bytes. Signatures are cleared.
    pub fn sort(&mut self) -> &mut Self {
        self.inputs.sort_by(|a, b| {
            a.prev_tx_id
                .iter()
                .rev()
                .cmp(b.prev_tx_id.iter().rev())
                .then(a.output_index.cmp(&b.output_index))
        });

        let mut indexed: Vec<(usize, TransactionOutput)> =
            std::mem::take(&mut self.outputs).into_iter().enumerate().collect();
        indexed.sort_by(|(_, a), (_, b)| {
            a.satoshis
                .cmp(&b.satoshis)
                .then_with(|| a.locking_script.to_bytes().cmp(b.locking_script.to_bytes()))
        });
        self.change_index = self
            .change_index
            .and_then(|old| indexed.iter().position(|(i, _)| *i == old));
        self.outputs = indexed.into_iter().map(|(_, o)| o).collect();

        self.invalidate_signatures();
        self
    }

    // -----------------------------------------------------------------------
    // Amounts and fees
    // -----------------------------------------------------------------------

    /// Whether every input knows the output it spends.
    pub fn has_all_utxo_info(&self) -> bool {
        self.inputs.iter().all(|i| i.output().is_some())
    }

    /// Sum of the spent outputs' amounts.
    ///
    /// # Returns
    /// The sum, or `InvalidTransaction` if an input lacks previous-output
    /// information.
    pub fn input_amount(&self) -> Result<u64, TransactionError> {
        self.inputs.iter().enumerate().try_fold(0u64, |sum, (index, input)| {
            let output = input.output().ok_or_else(|| {
                TransactionError::InvalidTransaction(format!(
                    "input {} has no previous output information",
                    index
                ))
            })?;
            Ok(sum.saturating_add(output.satoshis))
        })
    }

    pub fn output_amount(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |sum, o| sum.saturating_add(o.satoshis))
    }

    /// Inputs minus outputs; `None` without full previous-output information.
    fn unspent_value(&self) -> Option<i128> {
        let inputs = self.input_amount().ok()?;
        Some(i128::from(inputs) - i128::from(self.output_amount()))
    }

    /// The fee this transaction pays or will pay.
    ///
    /// Coinbase transactions pay none. An explicit fee wins. Otherwise the
    /// fee is whatever inputs leave after outputs, which includes change
    /// dropped as dust. Without previous-output amounts it is the size
    /// estimate when a change address is set, else 0.
    pub fn get_fee(&self) -> u64 {
        if self.is_coinbase() {
            return 0;
        }
        if let Some(fee) = self.fee {
            return fee;
        }
        match self.unspent_value() {
            Some(unspent) => u64::try_from(unspent).unwrap_or(0),
            None if self.change_script.is_some() => self.estimate_fee(),
            None => 0,
        }
    }

    /// The fee change is computed against: explicit, or estimated.
    fn target_fee(&self) -> u64 {
        self.fee.unwrap_or_else(|| self.estimate_fee())
    }

    /// Upper bound of the signed serialized size.
    pub fn estimate_size(&self) -> usize {
        MAXIMUM_EXTRA_SIZE
            + self
                .inputs
                .iter()
                .map(Input::estimate_serialized_size)
                .sum::<usize>()
            + self.outputs.iter().map(TransactionOutput::size).sum::<usize>()
    }

    /// Fee for the estimated size, reserving room for a change output when
    /// the remainder can pay for one.
    pub fn estimate_fee(&self) -> u64 {
        let mut size = self.estimate_size();
        let available = self.unspent_value().unwrap_or(0);
        if available > i128::from(self.policy.fee_for_size(size)) {
            size += self.policy.change_output_max_size;
        }
        let fee = self.policy.fee_for_size(size);
        tracing::trace!(size, fee, fee_per_kb = self.policy.fee_per_kb, "estimated fee");
        fee
    }

    /// Rebuild the change output from the current inputs, outputs and fee.
    ///
    /// Signatures are cleared because the outputs they commit to change.
    fn update_change_output(&mut self) {
        let Some(change_script) = self.change_script.clone() else {
            return;
        };
        if let Some(index) = self.change_index.take() {
            if index < self.outputs.len() {
                self.outputs.remove(index);
            }
        }
        self.invalidate_signatures();

        let Some(available) = self.unspent_value() else {
            tracing::debug!("change not computed: missing previous output information");
            return;
        };
        let fee = self.target_fee();
        let change = available - i128::from(fee);
        let Ok(satoshis) = u64::try_from(change) else {
            tracing::debug!(available = %available, fee, "no funds left for change");
            return;
        };
        if satoshis == 0 {
            return;
        }

        let output = TransactionOutput::new(satoshis, change_script);
        if output.is_dust(&self.policy) {
            tracing::debug!(satoshis, "change below dust threshold, left as fee");
            return;
        }
        tracing::debug!(satoshis, fee, index = self.outputs.len(), "change output updated");
        self.change_index = Some(self.outputs.len());
        self.outputs.push(output);
    }

    // -----------------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------------

    /// Sign every input each key can sign.
    ///
    /// Keys that match no input are skipped; check `is_fully_signed`
    /// afterwards to learn whether signing is complete.
    ///
    /// # Returns
    /// `Err` only when an input is structurally unsignable, e.g. a
    /// signature fails to verify after being produced.
    pub fn sign(
        &mut self,
        keys: &[PrivateKey],
        sighash_type: u32,
    ) -> Result<&mut Self, TransactionError> {
        for key in keys {
            for index in 0..self.inputs.len() {
                if !self.inputs[index].accepts_signatures() {
                    continue;
                }
                let sigs = self.inputs[index].get_signatures(self, index, key, sighash_type)?;
                for sig in sigs {
                    self.apply_signature(sig)?;
                }
            }
        }
        Ok(self)
    }

    /// Signatures `key` can contribute across all inputs.
    pub fn get_signatures(
        &self,
        key: &PrivateKey,
        sighash_type: u32,
    ) -> Result<Vec<TransactionSignature>, TransactionError> {
        let mut sigs = Vec::new();
        for (index, input) in self.inputs.iter().enumerate() {
            sigs.extend(input.get_signatures(self, index, key, sighash_type)?);
        }
        Ok(sigs)
    }

    /// Verify a signature and place it in its input.
    ///
    /// # Returns
    /// `InvalidTransaction` for an unknown input index, `SigningError` if
    /// the signature does not verify or its key is foreign to the input.
    pub fn apply_signature(
        &mut self,
        sig: TransactionSignature,
    ) -> Result<&mut Self, TransactionError> {
        let index = sig.input_index;
        let mut input = self
            .inputs
            .get(index)
            .cloned()
            .ok_or_else(|| {
                TransactionError::InvalidTransaction(format!(
                    "signature for input {} but tx has {} inputs",
                    index,
                    self.inputs.len()
                ))
            })?;
        let public_key = sig.public_key.to_hex();
        input.add_signature(self, sig)?;
        self.inputs[index] = input;
        self.invalidate();
        tracing::debug!(input_index = index, %public_key, "signature applied");
        Ok(self)
    }

    /// Whether `sig` verifies for the input it names.
    pub fn is_valid_signature(&self, sig: &TransactionSignature) -> bool {
        self.inputs
            .get(sig.input_index)
            .map_or(false, |input| input.is_valid_signature(self, sig))
    }

    /// Check a raw signature over input `input_index` against `subscript`.
    pub fn verify_signature(
        &self,
        signature: &Signature,
        public_key: &PublicKey,
        input_index: usize,
        subscript: &Script,
        sighash_type: u32,
    ) -> bool {
        sighash::verify(self, signature, public_key, input_index, sighash_type, subscript)
    }

    pub fn is_fully_signed(&self) -> bool {
        self.inputs.iter().all(Input::is_fully_signed)
    }

    pub fn clear_signatures(&mut self) -> &mut Self {
        for input in &mut self.inputs {
            input.clear_signatures();
        }
        self.invalidate();
        self
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    fn check_serialization(&self, opts: SerializeOptions) -> Result<(), TransactionError> {
        if opts.disable_all {
            return Ok(());
        }

        if !opts.disable_invalid_amounts {
            if let Some(output) = self.outputs.iter().find(|o| o.has_invalid_amount()) {
                return Err(TransactionError::InvalidAmount(format!(
                    "output of {} exceeds the maximum of {}",
                    output.satoshis, MAX_MONEY
                )));
            }
        }

        let amount_checks = !(opts.disable_more_output_than_input
            && opts.disable_large_fees
            && opts.disable_small_fees);
        if amount_checks && !self.is_coinbase() {
            let inputs = self.input_amount()?;
            let outputs = self.output_amount();
            match inputs.checked_sub(outputs) {
                None if !opts.disable_more_output_than_input => {
                    return Err(TransactionError::InsufficientFunds { inputs, outputs });
                }
                None => {}
                Some(unspent) => self.check_fee(opts, unspent)?,
            }
        }

        if !opts.disable_dust_outputs {
            if let Some((index, output)) = self
                .outputs
                .iter()
                .enumerate()
                .find(|(_, o)| o.is_dust(&self.policy))
            {
                return Err(TransactionError::DustOutput {
                    index,
                    satoshis: output.satoshis,
                    threshold: self.policy.dust_threshold(output.size()),
                });
            }
        }

        if !opts.disable_is_fully_signed {
            let missing: Vec<usize> = self
                .inputs
                .iter()
                .enumerate()
                .filter(|(_, i)| !i.is_fully_signed())
                .map(|(index, _)| index)
                .collect();
            if !missing.is_empty() {
                return Err(TransactionError::MissingSignatures(missing));
            }
        }
        Ok(())
    }

    fn check_fee(&self, opts: SerializeOptions, unspent: u64) -> Result<(), TransactionError> {
        if let Some(fee) = self.fee {
            if fee != unspent {
                return Err(TransactionError::FeeError(format!(
                    "unspent value is {} but specified fee is {}",
                    unspent, fee
                )));
            }
        }

        let estimate = self.estimate_fee();
        if !opts.disable_large_fees {
            let maximum = self.policy.max_fee(estimate);
            if unspent > maximum {
                return Err(TransactionError::FeeError(if self.change_script.is_none() {
                    format!(
                        "fee of {} is too large and no change address was provided",
                        unspent
                    )
                } else {
                    format!("fee too large: expected less than {} but got {}", maximum, unspent)
                }));
            }
        }
        if !opts.disable_small_fees {
            let minimum = self.policy.min_fee(estimate);
            if unspent < minimum {
                return Err(TransactionError::FeeError(format!(
                    "fee too small: expected more than {} but got {}",
                    minimum, unspent
                )));
            }
        }
        Ok(())
    }

    /// Structural consensus checks independent of the spent outputs.
    ///
    /// # Returns
    /// `Ok(())`, or the first failure: no inputs or outputs, an amount out
    /// of range, oversize, duplicate inputs, a bad coinbase script or a null
    /// input in a regular transaction.
    pub fn verify(&self) -> Result<(), TransactionError> {
        if self.inputs.is_empty() {
            return Err(TransactionError::InvalidTransaction(
                "transaction has no inputs".to_string(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::InvalidTransaction(
                "transaction has no outputs".to_string(),
            ));
        }

        let mut total = 0u64;
        for (index, output) in self.outputs.iter().enumerate() {
            if output.has_invalid_amount() {
                return Err(TransactionError::InvalidAmount(format!(
                    "output {} has {} satoshis",
                    index, output.satoshis
                )));
            }
            total += output.satoshis;
            if total > MAX_MONEY {
                return Err(TransactionError::InvalidAmount(format!(
                    "outputs total {} satoshis",
                    total
                )));
            }
        }

        let size = self.size();
        if size > MAX_BLOCK_SIZE {
            return Err(TransactionError::InvalidTransaction(format!(
                "transaction of {} bytes exceeds {}",
                size, MAX_BLOCK_SIZE
            )));
        }

        let mut outpoints = std::collections::HashSet::with_capacity(self.inputs.len());
        for (index, input) in self.inputs.iter().enumerate() {
            if !outpoints.insert((input.prev_tx_id, input.output_index)) {
                return Err(TransactionError::InvalidTransaction(format!(
                    "input {} spends an outpoint already spent by this transaction",
                    index
                )));
            }
        }

        if self.is_coinbase() {
            let len = self.inputs[0].unlocking_script().len();
            if !(2..=100).contains(&len) {
                return Err(TransactionError::InvalidTransaction(format!(
                    "coinbase script of {} bytes outside 2..=100",
                    len
                )));
            }
        } else if let Some(index) = self.inputs.iter().position(Input::is_null) {
            return Err(TransactionError::InvalidTransaction(format!(
                "input {} has a null outpoint",
                index
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Field map and JSON
    // -----------------------------------------------------------------------

    pub fn to_object(&self) -> TransactionObject {
        TransactionObject {
            hash: self.id(),
            version: self.version,
            inputs: self.inputs.iter().map(Input::to_object).collect(),
            outputs: self.outputs.iter().map(TransactionOutput::to_object).collect(),
            n_lock_time: self.lock_time,
            change_script: self.change_script.clone(),
            change_index: self.change_index,
            fee: self.fee.map(serde_json::Number::from),
        }
    }

    /// Rebuild a transaction, assembler state included, from its field map.
    ///
    /// The change output is taken as recorded rather than recomputed, so
    /// collected signatures survive.
    ///
    /// # Returns
    /// The transaction, or `MalformedEncoding` if the recorded change index
    /// or hash is inconsistent with the rest of the map.
    pub fn from_object(obj: &TransactionObject) -> Result<Self, TransactionError> {
        let mut tx = Transaction::new();
        tx.version = obj.version;
        tx.lock_time = obj.n_lock_time;
        tx.inputs = obj
            .inputs
            .iter()
            .map(Input::from_object)
            .collect::<Result<_, _>>()?;
        tx.outputs = obj
            .outputs
            .iter()
            .map(TransactionOutput::from_object)
            .collect::<Result<_, _>>()?;
        tx.fee = obj.fee.as_ref().map(parse_amount).transpose()?;
        tx.change_script = obj.change_script.clone();

        if let Some(index) = obj.change_index {
            let recorded = tx.outputs.get(index).map(|o| &o.locking_script);
            if tx.change_script.is_none() || recorded != tx.change_script.as_ref() {
                return Err(TransactionError::MalformedEncoding(format!(
                    "change index {} does not point at the change script",
                    index
                )));
            }
            tx.change_index = Some(index);
        }

        if !obj.hash.is_empty() && obj.hash != tx.id() {
            return Err(TransactionError::MalformedEncoding(format!(
                "recorded hash {} does not match computed {}",
                obj.hash,
                tx.id()
            )));
        }
        Ok(tx)
    }

    pub fn to_json(&self) -> Result<String, TransactionError> {
        Ok(serde_json::to_string(&self.to_object())?)
    }

    pub fn from_json(json: &str) -> Result<Self, TransactionError> {
        let obj: TransactionObject = serde_json::from_str(json)?;
        Self::from_object(&obj)
    }
}

/// Preallocation for a decoded element count, capped by what the remaining
/// bytes could hold.
fn bounded_capacity(count: VarInt, max_fit: usize) -> usize {
    usize::try_from(count.value()).map_or(max_fit, |c| c.min(max_fit))
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Transaction {
    /// Compares content and assembler state; the hash cache is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.lock_time == other.lock_time
            && self.fee == other.fee
            && self.change_script == other.change_script
            && self.change_index == other.change_index
            && self.policy == other.policy
    }
}

impl Eq for Transaction {}

impl fmt::Display for Transaction {
    /// Display the transaction as its hex serialization.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Transaction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_object().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let obj = TransactionObject::deserialize(deserializer)?;
        Transaction::from_object(&obj).map_err(serde::de::Error::custom)
    }
}
