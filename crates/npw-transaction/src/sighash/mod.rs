//! Signature hash computation for transaction signing.
//!
//! npw uses the original (pre-segwit, pre-FORKID) digest: a masked copy of
//! the transaction is serialized with the sighash type appended and hashed
//! with double SHA-256. The `SIGHASH_SINGLE` out-of-range case yields the
//! historical constant `1` instead of a digest, and must keep doing so for
//! old signatures to verify.

use npw_primitives::ec::{PrivateKey, PublicKey, Signature};
use npw_primitives::hash::sha256d;
use npw_primitives::util::{ByteWriter, VarInt};
use npw_script::Script;

use crate::transaction::Transaction;
use crate::TransactionError;

// -----------------------------------------------------------------------
// Sighash flag constants
// -----------------------------------------------------------------------

/// Sign all inputs and all outputs (the default).
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs but no outputs, allowing outputs to be modified.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and only the output with the same index as the signed input.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Combined with another flag: only sign the current input, allowing other
/// inputs to be added later.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask applied to extract the base sighash type (ALL, NONE, SINGLE).
pub const SIGHASH_MASK: u32 = 0x1f;

/// Digest returned for `SIGHASH_SINGLE` without a matching output: the
/// integer 1 in internal byte order.
pub const SIGHASH_SINGLE_SENTINEL: [u8; 32] = {
    let mut one = [0u8; 32];
    one[0] = 1;
    one
};

/// Satoshi value of the placeholder outputs `SIGHASH_SINGLE` writes before
/// the signed output (-1 as a signed 64-bit integer).
const NULL_OUTPUT_SATOSHIS: u64 = u64::MAX;

// -----------------------------------------------------------------------
// Legacy signature hash
// -----------------------------------------------------------------------

/// Compute the digest an input's signature commits to.
///
/// # Arguments
/// * `tx` - The transaction being signed.
/// * `input_index` - Index of the input being signed.
/// * `sighash_type` - The sighash flags (e.g. `SIGHASH_ALL`).
/// * `subscript` - The script being satisfied: the previous output's locking
///   script, or the redeem script for pay-to-script-hash.
///
/// # Returns
/// The 32-byte digest to sign, or `InvalidTransaction` if `input_index` is
/// out of range.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    sighash_type: u32,
    subscript: &Script,
) -> Result<[u8; 32], TransactionError> {
    match preimage(tx, input_index, sighash_type, subscript) {
        Ok(bytes) => Ok(sha256d(&bytes)),
        Err(TransactionError::SighashSingleOutOfRange { index, outputs }) => {
            tracing::debug!(
                input_index = index,
                outputs,
                "SIGHASH_SINGLE without matching output, using sentinel digest"
            );
            Ok(SIGHASH_SINGLE_SENTINEL)
        }
        Err(e) => Err(e),
    }
}

/// Serialize the masked transaction copy that `signature_hash` hashes.
///
/// The copy is built as follows:
/// 1. `OP_CODESEPARATOR` is removed from the subscript.
/// 2. The signed input carries the subscript; every other input carries an
///    empty script. With `ANYONECANPAY` only the signed input is kept.
/// 3. `NONE` drops all outputs; `SINGLE` keeps outputs up to `input_index`,
///    all but the last replaced by null outputs. Both set the other inputs'
///    sequence numbers to 0.
/// 4. The sighash type is appended as 4 bytes LE.
///
/// # Returns
/// The preimage bytes, `SighashSingleOutOfRange` when `SINGLE` has no
/// output at `input_index`, or `InvalidTransaction` for a bad index.
pub fn preimage(
    tx: &Transaction,
    input_index: usize,
    sighash_type: u32,
    subscript: &Script,
) -> Result<Vec<u8>, TransactionError> {
    let inputs = tx.inputs();
    let outputs = tx.outputs();
    if input_index >= inputs.len() {
        return Err(TransactionError::InvalidTransaction(format!(
            "input index {} out of range (tx has {} inputs)",
            input_index,
            inputs.len()
        )));
    }

    let base_type = sighash_type & SIGHASH_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    if base_type == SIGHASH_SINGLE && input_index >= outputs.len() {
        return Err(TransactionError::SighashSingleOutOfRange {
            index: input_index,
            outputs: outputs.len(),
        });
    }

    let subscript = subscript.remove_codeseparators();
    let zero_other_sequences = base_type == SIGHASH_NONE || base_type == SIGHASH_SINGLE;

    let mut writer = ByteWriter::with_capacity(tx.size() + subscript.len() + 4);
    writer.write_i32_le(tx.version());

    if anyone_can_pay {
        let input = &inputs[input_index];
        writer.write_varint(VarInt::from(1u64));
        writer.write_bytes(&input.prev_tx_id);
        writer.write_u32_le(input.output_index);
        writer.write_var_bytes(subscript.to_bytes());
        writer.write_u32_le(input.sequence_number);
    } else {
        writer.write_varint(VarInt::from(inputs.len()));
        for (i, input) in inputs.iter().enumerate() {
            writer.write_bytes(&input.prev_tx_id);
            writer.write_u32_le(input.output_index);
            if i == input_index {
                writer.write_var_bytes(subscript.to_bytes());
                writer.write_u32_le(input.sequence_number);
            } else {
                writer.write_varint(VarInt::from(0u64));
                writer.write_u32_le(if zero_other_sequences {
                    0
                } else {
                    input.sequence_number
                });
            }
        }
    }

    match base_type {
        SIGHASH_NONE => writer.write_varint(VarInt::from(0u64)),
        SIGHASH_SINGLE => {
            writer.write_varint(VarInt::from(input_index + 1));
            for _ in 0..input_index {
                writer.write_u64_le(NULL_OUTPUT_SATOSHIS);
                writer.write_varint(VarInt::from(0u64));
            }
            outputs[input_index].write_to(&mut writer);
        }
        _ => {
            writer.write_varint(VarInt::from(outputs.len()));
            for output in outputs {
                output.write_to(&mut writer);
            }
        }
    }

    writer.write_u32_le(tx.lock_time());
    writer.write_u32_le(sighash_type);
    Ok(writer.into_bytes())
}

/// Sign an input's digest with `key`.
pub fn sign(
    tx: &Transaction,
    key: &PrivateKey,
    input_index: usize,
    sighash_type: u32,
    subscript: &Script,
) -> Result<Signature, TransactionError> {
    let digest = signature_hash(tx, input_index, sighash_type, subscript)?;
    Ok(key.sign(&digest)?)
}

/// Check a signature over an input's digest.
///
/// Returns `false` rather than an error when the index is out of range.
pub fn verify(
    tx: &Transaction,
    signature: &Signature,
    public_key: &PublicKey,
    input_index: usize,
    sighash_type: u32,
    subscript: &Script,
) -> bool {
    match signature_hash(tx, input_index, sighash_type, subscript) {
        Ok(digest) => public_key.verify(&digest, signature),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Input;
    use crate::output::TransactionOutput;

    /// Block 170: the first transaction spending a coinbase to another key.
    const BLOCK_170_TX: &str = "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c352423edce25857fcd3704000000004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901ffffffff0200ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71302fa28414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee0000000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000";
    const BLOCK_170_PREV_SCRIPT: &str = "410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac";
    const BLOCK_170_SIGHASH: &str =
        "7a05c6145f10101e9d6325494245adf1297d80f8f38d4d576d57cdba220bcb19";
    const BLOCK_170_SIG: &str = "304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d09";

    fn three_by_two() -> Transaction {
        let mut tx = Transaction::new();
        for i in 0..3u8 {
            tx.add_input(Input::new([i + 1; 32], i as u32, Script::from_bytes(&[0x51, i])));
        }
        tx.add_output(TransactionOutput::new(1000, Script::from_hex("51").unwrap()))
            .add_output(TransactionOutput::new(2000, Script::from_hex("52").unwrap()));
        tx
    }

    #[test]
    fn test_block_170_digest_and_signature() {
        let tx = Transaction::from_hex(BLOCK_170_TX).unwrap();
        let subscript = Script::from_hex(BLOCK_170_PREV_SCRIPT).unwrap();
        let digest = signature_hash(&tx, 0, SIGHASH_ALL, &subscript).unwrap();
        assert_eq!(hex::encode(digest), BLOCK_170_SIGHASH);

        let public_key = subscript.public_key_of_output().unwrap();
        let sig = Signature::from_der(&hex::decode(BLOCK_170_SIG).unwrap()).unwrap();
        assert!(verify(&tx, &sig, &public_key, 0, SIGHASH_ALL, &subscript));
        assert!(!verify(&tx, &sig, &public_key, 0, SIGHASH_NONE, &subscript));
    }

    #[test]
    fn test_preimage_layout_all() {
        let tx = Transaction::from_hex(BLOCK_170_TX).unwrap();
        let subscript = Script::from_hex(BLOCK_170_PREV_SCRIPT).unwrap();
        let bytes = preimage(&tx, 0, SIGHASH_ALL, &subscript).unwrap();
        assert_eq!(&bytes[..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[bytes.len() - 4..], &[1, 0, 0, 0]);
        // unlocking script replaced by the 67-byte subscript
        assert_eq!(bytes[41], 67);
        assert_eq!(bytes.len(), tx.size() - 0x48 + 67 + 4);
    }

    #[test]
    fn test_codeseparators_are_removed() {
        let tx = three_by_two();
        let plain = Script::from_hex("76a914000000000000000000000000000000000000000088ac").unwrap();
        let mut separated = Script::from_hex("ab").unwrap();
        separated.append_script(&plain);
        assert_eq!(
            signature_hash(&tx, 1, SIGHASH_ALL, &plain).unwrap(),
            signature_hash(&tx, 1, SIGHASH_ALL, &separated).unwrap()
        );
    }

    #[test]
    fn test_other_unlocking_scripts_do_not_matter() {
        let tx = three_by_two();
        let subscript = Script::from_hex("51").unwrap();
        let before = signature_hash(&tx, 0, SIGHASH_ALL, &subscript).unwrap();
        assert_eq!(before, signature_hash(&tx, 0, SIGHASH_ALL, &subscript).unwrap());

        let mut other = Transaction::new();
        for (i, input) in tx.inputs().iter().enumerate() {
            other.add_input(Input::new(
                input.prev_tx_id,
                input.output_index,
                Script::from_bytes(&[0x60, i as u8, 0xff]),
            ));
        }
        for output in tx.outputs() {
            other.add_output(output.clone());
        }
        assert_eq!(before, signature_hash(&other, 0, SIGHASH_ALL, &subscript).unwrap());
    }

    #[test]
    fn test_none_ignores_outputs() {
        let tx = three_by_two();
        let subscript = Script::from_hex("51").unwrap();
        let none = signature_hash(&tx, 1, SIGHASH_NONE, &subscript).unwrap();
        let all = signature_hash(&tx, 1, SIGHASH_ALL, &subscript).unwrap();
        assert_ne!(none, all);

        let mut changed = tx.clone();
        changed.add_output(TransactionOutput::new(5, Script::from_hex("53").unwrap()));
        assert_eq!(none, signature_hash(&changed, 1, SIGHASH_NONE, &subscript).unwrap());
        assert_ne!(all, signature_hash(&changed, 1, SIGHASH_ALL, &subscript).unwrap());
    }

    #[test]
    fn test_single_writes_null_outputs() {
        let tx = three_by_two();
        let bytes = preimage(&tx, 1, SIGHASH_SINGLE, &Script::new()).unwrap();
        // version(4) + count(1) + 3 inputs, signed one with empty subscript
        let outputs_at = 4 + 1 + 3 * (32 + 4 + 1 + 4);
        assert_eq!(bytes[outputs_at], 2);
        assert_eq!(&bytes[outputs_at + 1..outputs_at + 9], &[0xff; 8]);
        assert_eq!(bytes[outputs_at + 9], 0);
        assert_eq!(
            &bytes[outputs_at + 10..outputs_at + 18],
            &2000u64.to_le_bytes()
        );
        // other sequences zeroed, own kept
        let seq = |i: usize| &bytes[4 + 1 + i * 41 + 37..4 + 1 + i * 41 + 41];
        assert_eq!(seq(0), &[0, 0, 0, 0]);
        assert_eq!(seq(1), &[0xff; 4]);
        assert_eq!(seq(2), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_single_out_of_range_sentinel() {
        let tx = three_by_two();
        let subscript = Script::from_hex("51").unwrap();
        assert!(matches!(
            preimage(&tx, 2, SIGHASH_SINGLE, &subscript),
            Err(TransactionError::SighashSingleOutOfRange { index: 2, outputs: 2 })
        ));
        let digest = signature_hash(&tx, 2, SIGHASH_SINGLE, &subscript).unwrap();
        assert_eq!(digest, SIGHASH_SINGLE_SENTINEL);
        assert_eq!(
            hex::encode(digest),
            "0100000000000000000000000000000000000000000000000000000000000000"
        );
        let anyone = SIGHASH_SINGLE | SIGHASH_ANYONECANPAY;
        assert_eq!(
            signature_hash(&tx, 2, anyone, &subscript).unwrap(),
            SIGHASH_SINGLE_SENTINEL
        );
    }

    #[test]
    fn test_anyone_can_pay_ignores_other_inputs() {
        let tx = three_by_two();
        let subscript = Script::from_hex("51").unwrap();
        let flags = SIGHASH_ALL | SIGHASH_ANYONECANPAY;
        let digest = signature_hash(&tx, 0, flags, &subscript).unwrap();

        let mut fewer = Transaction::new();
        fewer.add_input(tx.inputs()[0].clone());
        for output in tx.outputs() {
            fewer.add_output(output.clone());
        }
        assert_eq!(digest, signature_hash(&fewer, 0, flags, &subscript).unwrap());
        assert_ne!(digest, signature_hash(&tx, 0, SIGHASH_ALL, &subscript).unwrap());
    }

    #[test]
    fn test_index_out_of_range() {
        let tx = three_by_two();
        assert!(matches!(
            signature_hash(&tx, 3, SIGHASH_ALL, &Script::new()),
            Err(TransactionError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_sign_verify_helpers() {
        let tx = three_by_two();
        let key = PrivateKey::from_hex(
            "00bcd120337053759595cb664824ff7168487ddca5e8ed4bb3b8e49984c75e14",
        )
        .unwrap();
        let subscript = Script::build_public_key_hash_out(&key.pub_key().hash160());
        let sig = sign(&tx, &key, 1, SIGHASH_ALL, &subscript).unwrap();
        assert!(sig.has_low_s());
        assert!(verify(&tx, &sig, &key.pub_key(), 1, SIGHASH_ALL, &subscript));
        assert!(!verify(&tx, &sig, &key.pub_key(), 0, SIGHASH_ALL, &subscript));
        assert!(!verify(&tx, &sig, &key.pub_key(), 9, SIGHASH_ALL, &subscript));
    }
}
