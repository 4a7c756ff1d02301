//! Binary codec for the npw wire format.
//!
//! Provides the compact `VarInt` encoding and the `ByteReader` / `ByteWriter`
//! pair that every serialized structure (scripts, inputs, outputs,
//! transactions, sighash preimages) is read from and written through.
//! All multi-byte integers are little-endian.

use crate::PrimitivesError;

// ---------------------------------------------------------------------------
// VarInt
// ---------------------------------------------------------------------------

/// A protocol variable-length integer.
///
/// Values below `0xfd` occupy a single byte; larger values are prefixed with
/// `0xfd`, `0xfe` or `0xff` followed by a 16, 32 or 64-bit little-endian
/// integer respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Return the wire-format byte length of this VarInt.
    ///
    /// # Returns
    /// 1, 3, 5, or 9 depending on the value.
    pub fn length(&self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    /// Encode the VarInt into a new byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let v = self.0;
        let mut buf = Vec::with_capacity(self.length());
        match self.length() {
            1 => buf.push(v as u8),
            3 => {
                buf.push(0xfd);
                buf.extend_from_slice(&(v as u16).to_le_bytes());
            }
            5 => {
                buf.push(0xfe);
                buf.extend_from_slice(&(v as u32).to_le_bytes());
            }
            _ => {
                buf.push(0xff);
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        buf
    }

    /// Return the underlying u64 value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for VarInt {
    fn from(v: u64) -> Self {
        VarInt(v)
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        VarInt(v as u64)
    }
}

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// A cursor-based reader over a byte slice.
///
/// Every read either consumes exactly the requested number of bytes or fails
/// with `PrimitivesError::UnexpectedEof` without advancing.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a new reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// Read `n` bytes and advance the position.
    ///
    /// # Arguments
    /// * `n` - Number of bytes to read.
    ///
    /// # Returns
    /// A byte slice of length `n`, or an error if insufficient data remains.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], PrimitivesError> {
        if n > self.remaining() {
            return Err(PrimitivesError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read `N` bytes into a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PrimitivesError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read `n` bytes and return them in reversed order.
    ///
    /// Used for fields that are displayed big-endian but stored little-endian
    /// (transaction ids).
    pub fn read_reverse(&mut self, n: usize) -> Result<Vec<u8>, PrimitivesError> {
        let mut out = self.read_bytes(n)?.to_vec();
        out.reverse();
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, PrimitivesError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, PrimitivesError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, PrimitivesError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, PrimitivesError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, PrimitivesError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a VarInt and advance the position accordingly.
    ///
    /// Wide encodings of values that fit a narrower form are rejected so that
    /// every accepted encoding re-serializes to the same bytes.
    ///
    /// # Returns
    /// The decoded `VarInt`, or an error if the data is truncated or the
    /// encoding is not canonical.
    pub fn read_varint(&mut self) -> Result<VarInt, PrimitivesError> {
        let first = self.read_u8()?;
        let (value, min) = match first {
            0xff => (self.read_u64_le()?, 0x1_0000_0000),
            0xfe => (self.read_u32_le()? as u64, 0x1_0000),
            0xfd => (self.read_u16_le()? as u64, 0xfd),
            b => return Ok(VarInt(b as u64)),
        };
        if value < min {
            return Err(PrimitivesError::NonCanonicalVarInt(value));
        }
        Ok(VarInt(value))
    }

    /// Read a VarInt length prefix followed by that many bytes.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8], PrimitivesError> {
        let len = self.read_varint()?.value();
        let len = usize::try_from(len).map_err(|_| PrimitivesError::UnexpectedEof {
            needed: usize::MAX,
            remaining: self.remaining(),
        })?;
        self.read_bytes(len)
    }

    /// Return the number of bytes remaining.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether every byte has been consumed.
    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }
}

// ---------------------------------------------------------------------------
// ByteWriter
// ---------------------------------------------------------------------------

/// A growable little-endian byte writer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        ByteWriter { buf: Vec::new() }
    }

    /// Create a new writer with a pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter { buf: Vec::with_capacity(capacity) }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `bytes` in reversed order.
    pub fn write_reverse(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    pub fn write_u16_le(&mut self, val: u16) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u32_le(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, val: i32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    pub fn write_varint(&mut self, varint: VarInt) {
        self.buf.extend_from_slice(&varint.to_bytes());
    }

    /// Append a VarInt length prefix followed by `bytes`.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(VarInt::from(bytes.len()));
        self.write_bytes(bytes);
    }

    /// Consume the writer and return the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Return a reference to the current buffer contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_encoding_boundaries() {
        let cases: Vec<(u64, Vec<u8>)> = vec![
            (0, vec![0x00]),
            (1, vec![0x01]),
            (252, vec![0xfc]),
            (253, vec![0xfd, 0xfd, 0x00]),
            (65535, vec![0xfd, 0xff, 0xff]),
            (65536, vec![0xfe, 0x00, 0x00, 0x01, 0x00]),
            (4294967295, vec![0xfe, 0xff, 0xff, 0xff, 0xff]),
            (4294967296, vec![0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]),
            (u64::MAX, vec![0xff; 9]),
        ];

        for (value, expected) in cases {
            let vi = VarInt(value);
            assert_eq!(vi.to_bytes(), expected, "encoding mismatch for {}", value);
            assert_eq!(vi.length(), expected.len(), "length mismatch for {}", value);

            let mut reader = ByteReader::new(&expected);
            assert_eq!(reader.read_varint().unwrap(), vi, "decode mismatch for {}", value);
            assert!(reader.is_finished());
        }
    }

    #[test]
    fn test_varint_rejects_non_canonical() {
        // 5 encoded with the 0xfd prefix.
        let mut reader = ByteReader::new(&[0xfd, 0x05, 0x00]);
        assert!(matches!(
            reader.read_varint(),
            Err(PrimitivesError::NonCanonicalVarInt(5))
        ));

        // 0xffff encoded with the 0xfe prefix.
        let mut reader = ByteReader::new(&[0xfe, 0xff, 0xff, 0x00, 0x00]);
        assert!(reader.read_varint().is_err());

        // 0xffffffff encoded with the 0xff prefix.
        let mut reader = ByteReader::new(&[0xff, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
        assert!(reader.read_varint().is_err());
    }

    #[test]
    fn test_varint_truncated() {
        let mut reader = ByteReader::new(&[0xfe, 0x01]);
        assert!(matches!(
            reader.read_varint(),
            Err(PrimitivesError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_reader_writer_roundtrip() {
        let mut writer = ByteWriter::new();
        writer.write_u8(0x42);
        writer.write_u16_le(0x1234);
        writer.write_u32_le(0xDEADBEEF);
        writer.write_i32_le(-2);
        writer.write_u64_le(0x0102030405060708);
        writer.write_varint(VarInt(300));
        writer.write_var_bytes(b"hello");
        writer.write_reverse(&[1, 2, 3]);

        let data = writer.into_bytes();
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x42);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u32_le().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_i32_le().unwrap(), -2);
        assert_eq!(reader.read_u64_le().unwrap(), 0x0102030405060708);
        assert_eq!(reader.read_varint().unwrap(), VarInt(300));
        assert_eq!(reader.read_var_bytes().unwrap(), b"hello");
        assert_eq!(reader.read_reverse(3).unwrap(), vec![1, 2, 3]);
        assert!(reader.is_finished());
    }

    #[test]
    fn test_reader_eof_does_not_advance() {
        let data = [0x01, 0x02];
        let mut reader = ByteReader::new(&data);
        assert!(reader.read_u32_le().is_err());
        assert_eq!(reader.remaining(), 2);
        assert_eq!(reader.read_u16_le().unwrap(), 0x0201);
    }

    #[test]
    fn test_var_bytes_overrun() {
        // Claims 10 bytes, only 2 follow.
        let mut reader = ByteReader::new(&[0x0a, 0x01, 0x02]);
        assert!(reader.read_var_bytes().is_err());
    }
}
