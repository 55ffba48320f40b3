// Little-endian byte writer and bounds-checked reader shared by the binary schema and payload code.
use crate::core::error::Error;

#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_len(&mut self, len: usize) {
        self.put_u64(len as u64);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a `u32` length prefix followed by the utf-8 bytes.
    pub fn put_str(&mut self, value: &str) -> Result<(), Error> {
        let len = u32::try_from(value.len())
            .map_err(|_| Error::malformed("string exceeds u32 length prefix"))?;
        self.put_u32(len);
        self.put_bytes(value.as_bytes());
        Ok(())
    }

    pub(crate) fn buf_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.remaining() {
            return Err(Error::malformed(format!(
                "truncated input: need {len} bytes, {} remain",
                self.remaining()
            ))
            .with_offset(self.pos as u64));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    pub fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Reads a `u64` length and checks it against the bytes still available
    /// when each element needs at least `min_elem_bytes`.
    pub fn count(&mut self, min_elem_bytes: usize) -> Result<usize, Error> {
        let at = self.pos;
        let raw = self.u64()?;
        let len = usize::try_from(raw)
            .map_err(|_| Error::malformed("length does not fit in memory").with_offset(at as u64))?;
        if min_elem_bytes > 0 && len.saturating_mul(min_elem_bytes) > self.remaining() {
            return Err(Error::malformed(format!("declared length {len} exceeds input"))
                .with_offset(at as u64));
        }
        Ok(len)
    }

    pub fn str(&mut self) -> Result<&'a str, Error> {
        let at = self.pos;
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|err| {
            Error::malformed("invalid utf-8 in string")
                .with_offset(at as u64)
                .with_source(err)
        })
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
