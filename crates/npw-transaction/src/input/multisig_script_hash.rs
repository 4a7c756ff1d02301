//! Pay-to-script-hash spending of a multisig redeem script.
//!
//! Unlocking script: `OP_0 <sig>... <redeem script>`. Signatures commit to
//! the redeem script, not to the hash-locked output script.

use npw_script::chunk::push_size;
use npw_script::Script;

use super::multisig::MultiSig;
use crate::signature::TransactionSignature;
use crate::TransactionError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptHashMultiSig {
    multisig: MultiSig,
    redeem_script: Script,
}

impl ScriptHashMultiSig {
    /// # Arguments
    /// * `locking_script` - The pay-to-script-hash output script being spent.
    /// * `redeem_script` - The multisig script it commits to.
    ///
    /// # Returns
    /// The signing state, or `UnsupportedScriptType` if the output is not
    /// pay-to-script-hash of `redeem_script` or the redeem script is not
    /// multisig.
    pub fn new(locking_script: &Script, redeem_script: Script) -> Result<Self, TransactionError> {
        if locking_script.script_hash_of_output() != Some(redeem_script.script_hash()) {
            return Err(TransactionError::UnsupportedScriptType(format!(
                "output {} does not commit to redeem script {}",
                locking_script, redeem_script
            )));
        }
        if !redeem_script.is_multisig_out() {
            return Err(TransactionError::UnsupportedScriptType(format!(
                "redeem script {} is not multisig",
                redeem_script
            )));
        }
        Ok(ScriptHashMultiSig {
            multisig: MultiSig::from_script(&redeem_script)?,
            redeem_script,
        })
    }

    pub fn multisig(&self) -> &MultiSig {
        &self.multisig
    }

    pub fn redeem_script(&self) -> &Script {
        &self.redeem_script
    }

    /// Multisig unlocking size plus the redeem script push.
    pub fn estimate_size(&self) -> usize {
        self.multisig.estimate_size() + push_size(self.redeem_script.len())
    }

    pub(crate) fn insert(&mut self, sig: TransactionSignature) -> Result<(), TransactionError> {
        self.multisig.insert(sig)
    }

    pub(crate) fn restore(
        &mut self,
        signatures: &[Option<TransactionSignature>],
    ) -> Result<(), TransactionError> {
        self.multisig.restore(signatures)
    }

    pub(crate) fn clear(&mut self) {
        self.multisig.clear();
    }

    pub(crate) fn unlocking_script(&self) -> Result<Script, TransactionError> {
        if self.multisig.count_signatures() == 0 {
            return Ok(Script::new());
        }
        Ok(Script::build_p2sh_multisig_in(
            &self.multisig.signature_pushes(),
            &self.redeem_script,
        )?)
    }
}
