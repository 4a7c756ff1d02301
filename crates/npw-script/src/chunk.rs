//! Script chunk parsing and encoding.
//!
//! A chunk is either a lone opcode or a data push. A push keeps the opcode
//! that introduced it, so a non-minimal push (say OP_PUSHDATA1 with three
//! bytes) re-encodes to exactly the bytes it was parsed from.

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes) this is the length.
    pub op: u8,
    /// The pushed bytes, if this chunk is a push operation.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// A chunk holding a single non-push opcode.
    pub fn opcode(op: u8) -> Self {
        ScriptChunk { op, data: None }
    }

    /// A minimally-encoded push of `data`.
    ///
    /// Empty data becomes OP_0; there is no zero-length direct push.
    pub fn push(data: &[u8]) -> Result<Self, ScriptError> {
        if data.is_empty() {
            return Ok(ScriptChunk::opcode(OP_0));
        }
        let op = push_data_prefix(data.len())?[0];
        Ok(ScriptChunk { op, data: Some(data.to_vec()) })
    }

    /// Whether this chunk pushes data (including OP_0, which pushes nothing).
    pub fn is_push(&self) -> bool {
        self.op <= OP_PUSHDATA4
    }

    /// The pushed bytes, or `None` for opcodes.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Append the chunk's wire encoding to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.op);
        if let Some(ref data) = self.data {
            match self.op {
                OP_PUSHDATA1 => out.push(data.len() as u8),
                OP_PUSHDATA2 => out.extend_from_slice(&(data.len() as u16).to_le_bytes()),
                OP_PUSHDATA4 => out.extend_from_slice(&(data.len() as u32).to_le_bytes()),
                _ => {}
            }
            out.extend_from_slice(data);
        }
    }

    /// Convert this chunk to its ASM token.
    ///
    /// Data pushes render as hex; everything else uses its opcode name.
    pub fn to_asm_string(&self) -> String {
        if self.op > OP_0 && self.op <= OP_PUSHDATA4 {
            if let Some(ref data) = self.data {
                return hex::encode(data);
            }
        }
        opcode_to_string(self.op)
    }
}

/// Decode raw script bytes into chunks.
///
/// Handles direct pushes (0x01..=0x4b) and OP_PUSHDATA1/2/4. Every other
/// byte, OP_RETURN included, is an opcode chunk.
///
/// # Arguments
/// * `bytes` - The raw script bytes to decode.
///
/// # Returns
/// The parsed chunks, or `DataTooSmall` if a push runs past the end.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut chunks = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let op = bytes[pos];
        pos += 1;

        let length = match op {
            OP_DATA_1..=OP_DATA_75 => op as usize,
            OP_PUSHDATA1 => read_len(bytes, &mut pos, 1)?,
            OP_PUSHDATA2 => read_len(bytes, &mut pos, 2)?,
            OP_PUSHDATA4 => read_len(bytes, &mut pos, 4)?,
            _ => {
                chunks.push(ScriptChunk::opcode(op));
                continue;
            }
        };

        if bytes.len() - pos < length {
            return Err(ScriptError::DataTooSmall);
        }
        chunks.push(ScriptChunk {
            op,
            data: Some(bytes[pos..pos + length].to_vec()),
        });
        pos += length;
    }

    Ok(chunks)
}

/// Read a little-endian length field of `width` bytes.
fn read_len(bytes: &[u8], pos: &mut usize, width: usize) -> Result<usize, ScriptError> {
    if bytes.len() - *pos < width {
        return Err(ScriptError::DataTooSmall);
    }
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(&bytes[*pos..*pos + width]);
    *pos += width;
    Ok(u32::from_le_bytes(buf) as usize)
}

/// Compute the minimal push prefix for a payload of the given length.
///
/// # Arguments
/// * `data_len` - The length of the data to be pushed.
///
/// # Returns
/// The prefix bytes, or `PushTooLarge` beyond `u32::MAX` bytes.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len <= OP_DATA_75 as usize {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xFF {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xFFFF {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len as u64 <= 0xFFFF_FFFF {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::PushTooLarge(data_len))
    }
}

/// Serialized size of a minimal push of `data_len` bytes.
pub fn push_size(data_len: usize) -> usize {
    let prefix = match data_len {
        0..=0x4b => 1,
        0x4c..=0xff => 2,
        0x100..=0xffff => 3,
        _ => 5,
    };
    prefix + data_len
}
