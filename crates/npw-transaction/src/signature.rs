//! Signatures bound to a specific transaction input.

use serde::{Deserialize, Serialize};

use npw_primitives::ec::{PublicKey, Signature};

use crate::transaction::{id_from_hex, id_to_hex};
use crate::TransactionError;

/// A signature together with the key and input it was produced for.
///
/// This is the unit exchanged between signers in multi-party workflows:
/// `Transaction::get_signatures` produces it and
/// `Transaction::apply_signature` consumes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignatureObject", into = "SignatureObject")]
pub struct TransactionSignature {
    pub public_key: PublicKey,
    /// Previous transaction id in internal byte order.
    pub prev_tx_id: [u8; 32],
    pub output_index: u32,
    pub input_index: usize,
    pub signature: Signature,
    pub sighash_type: u32,
}

/// Field-map form of a `TransactionSignature`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureObject {
    pub public_key: String,
    pub prev_tx_id: String,
    pub output_index: u32,
    pub input_index: usize,
    /// DER encoding, hex.
    pub signature: String,
    pub sigtype: u32,
}

impl TransactionSignature {
    /// DER signature followed by the sighash byte, as pushed in scripts.
    pub fn to_script_bytes(&self) -> Vec<u8> {
        let mut out = self.signature.to_der();
        out.push(self.sighash_type as u8);
        out
    }

    pub fn to_object(&self) -> SignatureObject {
        SignatureObject {
            public_key: self.public_key.to_hex(),
            prev_tx_id: id_to_hex(&self.prev_tx_id),
            output_index: self.output_index,
            input_index: self.input_index,
            signature: hex::encode(self.signature.to_der()),
            sigtype: self.sighash_type,
        }
    }

    pub fn from_object(obj: &SignatureObject) -> Result<Self, TransactionError> {
        Ok(TransactionSignature {
            public_key: PublicKey::from_hex(&obj.public_key)?,
            prev_tx_id: id_from_hex(&obj.prev_tx_id)?,
            output_index: obj.output_index,
            input_index: obj.input_index,
            signature: Signature::from_der(&hex::decode(&obj.signature)?)?,
            sighash_type: obj.sigtype,
        })
    }
}

impl From<TransactionSignature> for SignatureObject {
    fn from(sig: TransactionSignature) -> Self {
        sig.to_object()
    }
}

impl TryFrom<SignatureObject> for TransactionSignature {
    type Error = TransactionError;

    fn try_from(obj: SignatureObject) -> Result<Self, Self::Error> {
        TransactionSignature::from_object(&obj)
    }
}
