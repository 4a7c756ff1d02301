#![deny(missing_docs)]

//! npw SDK - Complete SDK.
//!
//! Re-exports all npw SDK components for convenient single-crate usage.

pub use npw_primitives as primitives;
pub use npw_script as script;
pub use npw_transaction as transaction;
