/// npw SDK - Script construction, recognition and address handling.
///
/// Provides the `Script` byte type, opcode definitions, chunk parsing,
/// builders for the standard locking and unlocking templates, total
/// classification of scripts into template kinds, and Base58Check addresses
/// parameterized by `Network`.

pub mod script;
pub mod opcodes;
pub mod chunk;
pub mod builder;
pub mod kind;
pub mod address;

mod error;
pub use error::ScriptError;
pub use script::Script;
pub use address::{Address, AddressType, Network};
pub use chunk::ScriptChunk;
pub use kind::ScriptKind;
