//! Fee and dust policy.
//!
//! Relay policy differs between networks and changes over time, so the
//! assembler reads every rate and threshold from a `FeePolicy` value rather
//! than from constants.

use serde::{Deserialize, Serialize};

/// Default fee rate in base units per kilobyte.
pub const DEFAULT_FEE_PER_KB: u64 = 10_000;

/// Default relay fee used for the dust threshold, in base units per kilobyte.
pub const DEFAULT_DUST_RELAY_FEE_PER_KB: u64 = 1_000;

/// Factor bounding the paid fee around the estimate: serialization rejects
/// fees above `estimate * margin` or below `estimate / margin`.
pub const DEFAULT_FEE_SECURITY_MARGIN: u64 = 150;

/// Serialized size reserved for a prospective P2PKH change output.
pub const DEFAULT_CHANGE_OUTPUT_MAX_SIZE: usize = 62;

/// Bytes needed to later spend a typical output, used by the dust formula.
const SPEND_INPUT_SIZE: u64 = 148;

/// Rates and thresholds applied by the transaction assembler.
///
/// Deserializes from camelCase JSON; omitted fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeePolicy {
    pub fee_per_kb: u64,
    pub dust_relay_fee_per_kb: u64,
    pub fee_security_margin: u64,
    pub change_output_max_size: usize,
}

impl FeePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fee_per_kb(mut self, fee_per_kb: u64) -> Self {
        self.fee_per_kb = fee_per_kb;
        self
    }

    pub fn with_dust_relay_fee_per_kb(mut self, rate: u64) -> Self {
        self.dust_relay_fee_per_kb = rate;
        self
    }

    pub fn with_fee_security_margin(mut self, margin: u64) -> Self {
        self.fee_security_margin = margin;
        self
    }

    pub fn with_change_output_max_size(mut self, size: usize) -> Self {
        self.change_output_max_size = size;
        self
    }

    /// Smallest non-dust amount for an output of `output_size` serialized bytes.
    ///
    /// `3 * dust_relay_fee_per_kb * (output_size + 148) / 1000`, which is 546
    /// for a P2PKH output at the default relay fee.
    pub fn dust_threshold(&self, output_size: usize) -> u64 {
        self.dust_relay_fee_per_kb
            .saturating_mul(3)
            .saturating_mul(output_size as u64 + SPEND_INPUT_SIZE)
            / 1000
    }

    /// Largest fee serialization accepts for an `estimate`.
    pub fn max_fee(&self, estimate: u64) -> u64 {
        estimate.saturating_mul(self.fee_security_margin)
    }

    /// Smallest fee serialization accepts for an `estimate`.
    pub fn min_fee(&self, estimate: u64) -> u64 {
        if self.fee_security_margin == 0 {
            0
        } else {
            estimate.div_ceil(self.fee_security_margin)
        }
    }

    /// Fee for `size` bytes, charged per started kilobyte.
    pub fn fee_for_size(&self, size: usize) -> u64 {
        (size as u64).div_ceil(1000).saturating_mul(self.fee_per_kb)
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy {
            fee_per_kb: DEFAULT_FEE_PER_KB,
            dust_relay_fee_per_kb: DEFAULT_DUST_RELAY_FEE_PER_KB,
            fee_security_margin: DEFAULT_FEE_SECURITY_MARGIN,
            change_output_max_size: DEFAULT_CHANGE_OUTPUT_MAX_SIZE,
        }
    }
}
