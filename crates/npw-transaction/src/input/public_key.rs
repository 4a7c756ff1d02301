//! Pay-to-public-key spending.
//!
//! Unlocking script: `<signature>`.

use npw_primitives::ec::PublicKey;
use npw_script::Script;

use super::MAX_SIGNATURE_PUSH_SIZE;
use crate::signature::TransactionSignature;
use crate::TransactionError;

pub const SCRIPT_MAX_SIZE: usize = MAX_SIGNATURE_PUSH_SIZE;

/// Keys match on their serialized form, so compressed and uncompressed
/// encodings of one point are different keys here.
pub(crate) fn matches(locking_script: &Script, key: &PublicKey) -> bool {
    locking_script.public_key_of_output().as_ref() == Some(key)
}

pub(crate) fn unlocking_script(sig: &TransactionSignature) -> Result<Script, TransactionError> {
    Ok(Script::build_public_key_in(&sig.to_script_bytes())?)
}

pub(crate) fn is_fully_signed(unlocking_script: &Script) -> bool {
    unlocking_script.is_public_key_in()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Input, InputKind};
    use crate::output::TransactionOutput;
    use crate::sighash::SIGHASH_ALL;
    use crate::transaction::Transaction;
    use npw_primitives::ec::PrivateKey;

    fn funded(key: &PrivateKey) -> Transaction {
        let output = TransactionOutput::new(50_000, Script::build_public_key_out(&key.pub_key()));
        let mut tx = Transaction::new();
        tx.add_input(Input::from_output([3; 32], 1, output).unwrap())
            .add_output(TransactionOutput::new(40_000, Script::from_hex("51").unwrap()));
        tx
    }

    #[test]
    fn test_sign_public_key_input() {
        let key = PrivateKey::from_hex(
            "00bcd120337053759595cb664824ff7168487ddca5e8ed4bb3b8e49984c75e14",
        )
        .unwrap();
        let mut tx = funded(&key);
        assert_eq!(tx.inputs()[0].kind(), &InputKind::PublicKey);
        assert_eq!(tx.inputs()[0].estimate_size(), 73);

        tx.sign(&[key], SIGHASH_ALL).unwrap();
        let input = &tx.inputs()[0];
        assert!(input.is_fully_signed());
        assert!(input.unlocking_script().len() <= SCRIPT_MAX_SIZE);
        assert!(input.unlocking_script().is_public_key_in());
    }

    #[test]
    fn test_uncompressed_form_does_not_match() {
        let key = PrivateKey::from_hex(
            "00bcd120337053759595cb664824ff7168487ddca5e8ed4bb3b8e49984c75e14",
        )
        .unwrap();
        let tx = funded(&key);
        let uncompressed = key.with_compressed(false);
        let sigs = tx.inputs()[0]
            .get_signatures(&tx, 0, &uncompressed, SIGHASH_ALL)
            .unwrap();
        assert!(sigs.is_empty());
    }
}
