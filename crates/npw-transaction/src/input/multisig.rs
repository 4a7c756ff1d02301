//! Bare multisig spending and the signature set shared with its
//! pay-to-script-hash form.
//!
//! Signatures are kept in one slot per public key, in the order the keys
//! appear in the script. OP_CHECKMULTISIG walks keys and signatures in step,
//! so the unlocking script must list signatures in key order no matter the
//! order they were collected in.

use npw_primitives::ec::PublicKey;
use npw_script::Script;

use super::MAX_SIGNATURE_PUSH_SIZE;
use crate::signature::TransactionSignature;
use crate::TransactionError;

/// Keys, threshold and collected signatures of an m-of-n input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiSig {
    public_keys: Vec<PublicKey>,
    threshold: usize,
    signatures: Vec<Option<TransactionSignature>>,
}

impl MultiSig {
    /// Read keys and threshold from a multisig script.
    pub fn from_script(script: &Script) -> Result<Self, TransactionError> {
        let (threshold, public_keys) = script.multisig_parts()?;
        let signatures = vec![None; public_keys.len()];
        Ok(MultiSig {
            public_keys,
            threshold,
            signatures,
        })
    }

    /// Keys in script order.
    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// One slot per key; `None` where that key has not signed.
    pub fn signatures(&self) -> &[Option<TransactionSignature>] {
        &self.signatures
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.public_keys.contains(key)
    }

    /// `OP_0` plus one signature push per required signature.
    pub fn estimate_size(&self) -> usize {
        1 + MAX_SIGNATURE_PUSH_SIZE * self.threshold
    }

    pub fn count_signatures(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    pub fn count_missing_signatures(&self) -> usize {
        self.threshold.saturating_sub(self.count_signatures())
    }

    /// Store `sig` in the slot of its public key.
    ///
    /// # Returns
    /// `SigningError` if the key is not part of the set, or if the threshold
    /// is already met by other keys.
    pub(crate) fn insert(&mut self, sig: TransactionSignature) -> Result<(), TransactionError> {
        let slot = self
            .public_keys
            .iter()
            .position(|k| *k == sig.public_key)
            .ok_or_else(|| {
                TransactionError::SigningError(format!(
                    "public key {} is not part of the multisig set",
                    sig.public_key
                ))
            })?;
        if self.signatures[slot].is_none() && self.count_missing_signatures() == 0 {
            return Err(TransactionError::SigningError(format!(
                "input already holds {} of {} signatures",
                self.threshold, self.threshold
            )));
        }
        tracing::trace!(slot, public_key = %sig.public_key, "multisig signature placed");
        self.signatures[slot] = Some(sig);
        Ok(())
    }

    /// Replace the signature set with slots read from a field map.
    pub(crate) fn restore(
        &mut self,
        signatures: &[Option<TransactionSignature>],
    ) -> Result<(), TransactionError> {
        if signatures.len() != self.public_keys.len() {
            return Err(TransactionError::MalformedEncoding(format!(
                "{} signature slots for {} public keys",
                signatures.len(),
                self.public_keys.len()
            )));
        }
        self.clear();
        for sig in signatures.iter().flatten() {
            self.insert(sig.clone())?;
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.signatures.iter_mut().for_each(|s| *s = None);
    }

    /// Signature pushes in key order, each with its sighash byte.
    pub(crate) fn signature_pushes(&self) -> Vec<Vec<u8>> {
        self.signatures
            .iter()
            .flatten()
            .map(TransactionSignature::to_script_bytes)
            .collect()
    }

    /// `OP_0 <sig>...`, or an empty script while nothing is signed.
    pub(crate) fn unlocking_script(&self) -> Result<Script, TransactionError> {
        if self.count_signatures() == 0 {
            return Ok(Script::new());
        }
        Ok(Script::build_multisig_in(&self.signature_pushes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Input, InputKind};
    use crate::output::TransactionOutput;
    use crate::sighash::SIGHASH_ALL;
    use crate::transaction::Transaction;
    use npw_primitives::ec::PrivateKey;

    fn keys() -> Vec<PrivateKey> {
        (1..=3u8)
            .map(|n| {
                let mut bytes = [0u8; 32];
                bytes[31] = n;
                PrivateKey::from_bytes(&bytes).unwrap()
            })
            .collect()
    }

    fn funded(threshold: usize) -> (Vec<PrivateKey>, Transaction) {
        let keys = keys();
        let public: Vec<PublicKey> = keys.iter().map(PrivateKey::pub_key).collect();
        let script = Script::build_multisig_out(&public, threshold, true).unwrap();
        let output = TransactionOutput::new(100_000, script);
        let mut tx = Transaction::new();
        tx.add_input(Input::from_output([5; 32], 0, output).unwrap())
            .add_output(TransactionOutput::new(90_000, Script::from_hex("51").unwrap()));
        (keys, tx)
    }

    fn state(tx: &Transaction) -> &MultiSig {
        match tx.inputs()[0].kind() {
            InputKind::MultiSig(state) => state,
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_estimate_size() {
        let (_, tx) = funded(2);
        assert_eq!(tx.inputs()[0].estimate_size(), 1 + 73 * 2);
        assert_eq!(state(&tx).threshold(), 2);
        assert_eq!(state(&tx).public_keys().len(), 3);
    }

    #[test]
    fn test_signatures_follow_key_order() {
        let (keys, mut tx) = funded(2);
        // sign with the key that sorts last first
        let mut by_slot: Vec<(usize, PrivateKey)> = keys
            .into_iter()
            .map(|k| (state(&tx).public_keys().iter().position(|p| *p == k.pub_key()).unwrap(), k))
            .collect();
        by_slot.sort_by_key(|(slot, _)| std::cmp::Reverse(*slot));

        tx.sign(&[by_slot[0].1.clone()], SIGHASH_ALL).unwrap();
        assert!(!tx.inputs()[0].is_fully_signed());
        assert_eq!(tx.inputs()[0].count_missing_signatures(), 1);
        tx.sign(&[by_slot[2].1.clone()], SIGHASH_ALL).unwrap();
        assert!(tx.inputs()[0].is_fully_signed());

        let chunks = tx.inputs()[0].unlocking_script().chunks().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].op, 0);
        let slots = state(&tx).signatures();
        assert_eq!(chunks[1].data().unwrap(), slots[0].as_ref().unwrap().to_script_bytes());
        assert_eq!(chunks[2].data().unwrap(), slots[2].as_ref().unwrap().to_script_bytes());
        assert!(slots[1].is_none());
    }

    #[test]
    fn test_extra_signature_rejected_once_complete() {
        let (keys, mut tx) = funded(1);
        tx.sign(&keys[..1], SIGHASH_ALL).unwrap();
        assert!(tx.inputs()[0].is_fully_signed());

        let extra = tx.inputs()[0]
            .get_signatures(&tx, 0, &keys[1], SIGHASH_ALL)
            .unwrap()
            .remove(0);
        assert!(matches!(
            tx.apply_signature(extra),
            Err(TransactionError::SigningError(_))
        ));
    }

    #[test]
    fn test_clear_resets_slots() {
        let (keys, mut tx) = funded(2);
        tx.sign(&keys, SIGHASH_ALL).unwrap();
        assert!(tx.inputs()[0].is_fully_signed());
        tx.clear_signatures();
        assert_eq!(state(&tx).count_signatures(), 0);
        assert!(tx.inputs()[0].unlocking_script().is_empty());
    }
}
