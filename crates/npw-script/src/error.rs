/// Error types for script operations.
///
/// Covers chunk parsing, push encoding limits, ASM parsing, template
/// construction and address decoding.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A push length prefix claims more bytes than the script holds.
    #[error("not enough data")]
    DataTooSmall,

    /// Push data exceeds the largest length OP_PUSHDATA4 can express.
    #[error("push of {0} bytes exceeds the maximum push size")]
    PushTooLarge(usize),

    /// Invalid opcode data encountered during ASM parsing.
    #[error("invalid opcode data: {0}")]
    InvalidOpcodeData(String),

    /// Attempted to append a push opcode without its data.
    #[error("use append_push_data for push data opcodes: {0}")]
    InvalidOpcodeType(String),

    /// Template parameters do not describe a valid multisig script.
    #[error("invalid multisig: {0}")]
    InvalidMultisig(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The address version byte belongs to none of the supplied networks.
    #[error("address not supported: {0}")]
    UnsupportedAddress(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("primitives error: {0}")]
    Primitives(#[from] npw_primitives::PrimitivesError),
}

impl From<hex::FromHexError> for ScriptError {
    fn from(e: hex::FromHexError) -> Self {
        ScriptError::InvalidHex(e.to_string())
    }
}
