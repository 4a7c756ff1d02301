/// npw SDK - Transaction assembly, signing and serialization.
///
/// Provides the `Transaction` assembler with fee and change computation,
/// the polymorphic `Input` over the supported unlocking strategies,
/// `TransactionOutput`, the legacy signature hash algorithm, and the
/// field-map and JSON forms consumed by wallet layers.

pub mod config;
pub mod input;
pub mod output;
pub mod sighash;
pub mod signature;
pub mod transaction;
pub mod unspent;

mod error;
pub use config::FeePolicy;
pub use error::TransactionError;
pub use input::{Input, InputKind, DEFAULT_SEQUENCE_NUMBER};
pub use output::{TransactionOutput, MAX_MONEY};
pub use signature::TransactionSignature;
pub use transaction::{SerializeOptions, Transaction};
pub use unspent::UnspentOutput;

#[cfg(test)]
mod tests;
