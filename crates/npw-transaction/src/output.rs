//! Transaction output with an amount and locking script.
//!
//! Amounts are whole base units held in a `u64`. Values that cannot be
//! represented that way (negative or fractional numbers) can only arrive
//! through the field-map boundary, where they are rejected with
//! `InvalidAmount`.

use serde::{Deserialize, Serialize};

use npw_primitives::util::{ByteReader, ByteWriter, VarInt};
use npw_script::{Address, Script};

use crate::config::FeePolicy;
use crate::TransactionError;

/// Total money supply in base units.
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// A single output of an npw transaction.
///
/// # Wire format
///
/// | Field            | Size           |
/// |------------------|----------------|
/// | satoshis         | 8 bytes (LE)   |
/// | script length    | VarInt         |
/// | locking_script   | variable       |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Amount in base units.
    pub satoshis: u64,

    /// The locking script that defines spending conditions.
    pub locking_script: Script,
}

/// Field-map form of an output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputObject {
    pub satoshis: serde_json::Number,
    pub script: Script,
}

impl TransactionOutput {
    pub fn new(satoshis: u64, locking_script: Script) -> Self {
        TransactionOutput {
            satoshis,
            locking_script,
        }
    }

    /// Output paying `satoshis` to an address, P2PKH or P2SH by its type.
    pub fn to_address(address: &Address, satoshis: u64) -> Self {
        Self::new(satoshis, address.to_script())
    }

    /// Deserialize an output from a `ByteReader`.
    ///
    /// # Returns
    /// `Ok(TransactionOutput)`, or `MalformedEncoding` if the data is
    /// truncated.
    pub fn read_from(reader: &mut ByteReader) -> Result<Self, TransactionError> {
        let satoshis = reader.read_u64_le().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading satoshis: {}", e))
        })?;
        let script_bytes = reader.read_var_bytes().map_err(|e| {
            TransactionError::MalformedEncoding(format!("reading locking script: {}", e))
        })?;

        Ok(TransactionOutput {
            satoshis,
            locking_script: Script::from_bytes(script_bytes),
        })
    }

    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.satoshis);
        writer.write_var_bytes(self.locking_script.to_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.size());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        let script_len = self.locking_script.len();
        8 + VarInt::from(script_len).length() + script_len
    }

    /// Whether the amount exceeds `MAX_MONEY`.
    pub fn has_invalid_amount(&self) -> bool {
        self.satoshis > MAX_MONEY
    }

    /// Whether this output is uneconomical to spend under `policy`.
    ///
    /// Data-carrier outputs are never dust.
    pub fn is_dust(&self, policy: &FeePolicy) -> bool {
        !self.locking_script.is_data_out() && self.satoshis < policy.dust_threshold(self.size())
    }

    pub fn to_object(&self) -> OutputObject {
        OutputObject {
            satoshis: self.satoshis.into(),
            script: self.locking_script.clone(),
        }
    }

    pub fn from_object(obj: &OutputObject) -> Result<Self, TransactionError> {
        Ok(Self::new(parse_amount(&obj.satoshis)?, obj.script.clone()))
    }
}

/// Convert a field-map amount to base units.
///
/// # Returns
/// The amount, or `InvalidAmount` if it is negative, fractional or above
/// `MAX_MONEY`.
pub fn parse_amount(value: &serde_json::Number) -> Result<u64, TransactionError> {
    let satoshis = match value.as_u64() {
        Some(v) => v,
        None if value.is_i64() => {
            return Err(TransactionError::InvalidAmount(format!("{} is negative", value)))
        }
        None => {
            return Err(TransactionError::InvalidAmount(format!(
                "{} is not a whole number of base units",
                value
            )))
        }
    };
    if satoshis > MAX_MONEY {
        return Err(TransactionError::InvalidAmount(format!(
            "{} exceeds the maximum of {}",
            satoshis, MAX_MONEY
        )));
    }
    Ok(satoshis)
}
