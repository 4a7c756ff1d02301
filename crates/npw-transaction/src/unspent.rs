//! Descriptions of spendable outputs handed to the assembler.

use std::fmt;

use serde::{Deserialize, Serialize};

use npw_script::{Address, Script};

use crate::output::{parse_amount, TransactionOutput};
use crate::transaction::{id_from_hex, id_to_hex};
use crate::TransactionError;

/// An unspent output: where it lives, what it pays and how it is locked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UnspentObject", into = "UnspentObject")]
pub struct UnspentOutput {
    /// Id of the transaction holding the output, in internal byte order.
    pub tx_id: [u8; 32],
    pub output_index: u32,
    pub script: Script,
    pub satoshis: u64,
    pub address: Option<Address>,
}

/// Field-map form of an unspent output.
///
/// Accepts the common aliases `txid`, `vout` and `scriptPubKey`. Amounts
/// must already be in base units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentObject {
    #[serde(alias = "txid")]
    pub tx_id: String,
    #[serde(alias = "vout")]
    pub output_index: u32,
    #[serde(alias = "scriptPubKey")]
    pub script: Script,
    pub satoshis: serde_json::Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl UnspentOutput {
    pub fn new(tx_id: [u8; 32], output_index: u32, script: Script, satoshis: u64) -> Self {
        UnspentOutput {
            tx_id,
            output_index,
            script,
            satoshis,
            address: None,
        }
    }

    /// Build from a displayed (byte-reversed) transaction id.
    pub fn from_hex_id(
        tx_id: &str,
        output_index: u32,
        script: Script,
        satoshis: u64,
    ) -> Result<Self, TransactionError> {
        Ok(Self::new(id_from_hex(tx_id)?, output_index, script, satoshis))
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// The output being described.
    pub fn output(&self) -> TransactionOutput {
        TransactionOutput::new(self.satoshis, self.script.clone())
    }

    pub fn to_object(&self) -> UnspentObject {
        UnspentObject {
            tx_id: id_to_hex(&self.tx_id),
            output_index: self.output_index,
            script: self.script.clone(),
            satoshis: self.satoshis.into(),
            address: self.address.clone(),
        }
    }

    pub fn from_object(obj: &UnspentObject) -> Result<Self, TransactionError> {
        Ok(UnspentOutput {
            tx_id: id_from_hex(&obj.tx_id)?,
            output_index: obj.output_index,
            script: obj.script.clone(),
            satoshis: parse_amount(&obj.satoshis)?,
            address: obj.address.clone(),
        })
    }
}

impl From<UnspentOutput> for UnspentObject {
    fn from(utxo: UnspentOutput) -> Self {
        utxo.to_object()
    }
}

impl TryFrom<UnspentObject> for UnspentOutput {
    type Error = TransactionError;

    fn try_from(obj: UnspentObject) -> Result<Self, Self::Error> {
        UnspentOutput::from_object(&obj)
    }
}

impl fmt::Display for UnspentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", id_to_hex(&self.tx_id), self.output_index)
    }
}
