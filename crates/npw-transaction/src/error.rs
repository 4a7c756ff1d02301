/// Error types for transaction operations.
///
/// Covers wire and field-map decoding, amount and dust policy, fee checks,
/// signing, and errors propagated from the script and primitives crates.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The bytes or field map do not describe a well-formed transaction.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// The previous output's script matches no signing strategy and no
    /// hint was supplied.
    #[error("unsupported script type: {0}")]
    UnsupportedScriptType(String),

    /// Amount is negative, fractional or above the money supply.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("dust output at index {index}: {satoshis} below threshold {threshold}")]
    DustOutput {
        index: usize,
        satoshis: u64,
        threshold: u64,
    },

    #[error("insufficient funds: inputs {inputs}, outputs {outputs}")]
    InsufficientFunds { inputs: u64, outputs: u64 },

    #[error("missing signatures on input(s) {0:?}")]
    MissingSignatures(Vec<usize>),

    /// SIGHASH_SINGLE was requested for an input with no output at the
    /// same index.
    #[error("SIGHASH_SINGLE input {index} has no matching output ({outputs} outputs)")]
    SighashSingleOutOfRange { index: usize, outputs: usize },

    #[error("fee error: {0}")]
    FeeError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("script error: {0}")]
    Script(#[from] npw_script::ScriptError),

    #[error("primitives error: {0}")]
    Primitives(#[from] npw_primitives::PrimitivesError),
}

impl From<hex::FromHexError> for TransactionError {
    fn from(e: hex::FromHexError) -> Self {
        TransactionError::MalformedEncoding(format!("invalid hex: {}", e))
    }
}
