/// Script type - a sequence of opcodes and data pushes.
///
/// Scripts lock outputs and unlock inputs. The `Script` wraps the raw bytes
/// verbatim, so parsing never normalizes: a script read off the wire always
/// serializes back to the same bytes.

use std::fmt;

use npw_primitives::hash::hash160;

use crate::chunk::{decode_script, push_data_prefix, ScriptChunk};
use crate::opcodes::*;
use crate::ScriptError;

/// A script, represented as a byte vector newtype.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Script(Vec<u8>);

impl Script {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a new empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from a hex-encoded string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string (e.g. "76a914...88ac").
    ///
    /// # Returns
    /// A `Script` wrapping the decoded bytes, or `InvalidHex`.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        Ok(Script(hex::decode(hex_str)?))
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Assemble a script from chunks, keeping each chunk's push encoding.
    pub fn from_chunks(chunks: &[ScriptChunk]) -> Self {
        let mut bytes = Vec::new();
        for chunk in chunks {
            chunk.write_to(&mut bytes);
        }
        Script(bytes)
    }

    /// Create a script from an ASM string.
    ///
    /// Known opcode names are emitted directly; any other token is treated
    /// as hex push data and encoded minimally.
    ///
    /// # Arguments
    /// * `asm` - A space-separated ASM string.
    ///
    /// # Returns
    /// A `Script`, or `InvalidOpcodeData` for a token that is neither.
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for token in asm.split_whitespace() {
            if let Some(opcode) = string_to_opcode(token) {
                script.0.push(opcode);
            } else {
                let data = hex::decode(token)
                    .map_err(|_| ScriptError::InvalidOpcodeData(token.to_string()))?;
                script.append_push_data(&data)?;
            }
        }
        Ok(script)
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Render the script as ASM.
    ///
    /// # Returns
    /// Space-separated tokens; data pushes as hex, opcodes by name. A script
    /// that does not parse renders as an empty string.
    pub fn to_asm(&self) -> String {
        match self.chunks() {
            Ok(chunks) => chunks
                .iter()
                .map(ScriptChunk::to_asm_string)
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => String::new(),
        }
    }

    /// Return a reference to the underlying bytes.
    pub fn to_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the script into its chunks.
    ///
    /// # Returns
    /// The chunks, or `DataTooSmall` if a push is truncated.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, ScriptError> {
        decode_script(&self.0)
    }

    /// Hash160 of the script bytes, as committed to by P2SH outputs.
    pub fn script_hash(&self) -> [u8; 20] {
        hash160(&self.0)
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Append a minimal push of `data`.
    ///
    /// # Returns
    /// `&mut Self` for chaining, or `PushTooLarge` if the data cannot be
    /// expressed as a single push.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<&mut Self, ScriptError> {
        let prefix = push_data_prefix(data.len())?;
        self.0.extend_from_slice(&prefix);
        self.0.extend_from_slice(data);
        Ok(self)
    }

    /// Append raw opcodes.
    ///
    /// Rejects push opcodes (OP_DATA_1..OP_PUSHDATA4), which would leave the
    /// script truncated; use `append_push_data` for those.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> Result<&mut Self, ScriptError> {
        if let Some(&op) = opcodes
            .iter()
            .find(|&&op| (OP_DATA_1..=OP_PUSHDATA4).contains(&op))
        {
            return Err(ScriptError::InvalidOpcodeType(opcode_to_string(op)));
        }
        self.0.extend_from_slice(opcodes);
        Ok(self)
    }

    /// Append the bytes of another script.
    pub fn append_script(&mut self, other: &Script) -> &mut Self {
        self.0.extend_from_slice(&other.0);
        self
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Return a copy with every OP_CODESEPARATOR removed.
    ///
    /// Operations are walked one at a time and copied verbatim, so push data
    /// that happens to contain 0xab is untouched. If a push is truncated the
    /// remaining bytes are copied as they are.
    pub fn remove_codeseparators(&self) -> Script {
        let b = &self.0;
        let mut out = Vec::with_capacity(b.len());
        let mut pos = 0;
        while pos < b.len() {
            let len = match op_len(b, pos) {
                Some(len) => len,
                None => {
                    out.extend_from_slice(&b[pos..]);
                    break;
                }
            };
            if b[pos] != OP_CODESEPARATOR {
                out.extend_from_slice(&b[pos..pos + len]);
            }
            pos += len;
        }
        Script(out)
    }

    /// Whether every chunk is a push (OP_0..=OP_16 and OP_1NEGATE count).
    ///
    /// A script that fails to parse is not push-only.
    pub fn is_push_only(&self) -> bool {
        match self.chunks() {
            Ok(chunks) => chunks.iter().all(|c| c.op <= OP_16 && c.op != OP_RESERVED),
            Err(_) => false,
        }
    }
}

/// Length of the operation starting at `pos`, or `None` if it is truncated.
fn op_len(b: &[u8], pos: usize) -> Option<usize> {
    let op = b[pos];
    let rest = b.len() - pos - 1;
    let (header, data) = match op {
        OP_DATA_1..=OP_DATA_75 => (0, op as usize),
        OP_PUSHDATA1 if rest >= 1 => (1, b[pos + 1] as usize),
        OP_PUSHDATA2 if rest >= 2 => (2, u16::from_le_bytes([b[pos + 1], b[pos + 2]]) as usize),
        OP_PUSHDATA4 if rest >= 4 => (
            4,
            u32::from_le_bytes([b[pos + 1], b[pos + 2], b[pos + 3], b[pos + 4]]) as usize,
        ),
        OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => return None,
        _ => (0, 0),
    };
    if rest < header + data {
        return None;
    }
    Some(1 + header + data)
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Script {
    /// Display the script as a lowercase hex string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl serde::Serialize for Script {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Script {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
