// Immutable bit-packed bitmaps (validity and boolean values) and their row-order builder.
use bytes::Bytes;

use crate::core::error::Error;

/// LSB-first bitmap over shared bytes. Bits past `len` are padding and never read.
#[derive(Clone, Debug)]
pub struct Bitmap {
    bytes: Bytes,
    len: usize,
}

impl Bitmap {
    pub fn new_set(len: usize) -> Self {
        let mut builder = BitmapBuilder::with_capacity(len);
        builder.extend_constant(len, true);
        builder.finish()
    }

    pub fn new_unset(len: usize) -> Self {
        Self {
            bytes: Bytes::from(vec![0u8; byte_len(len)]),
            len,
        }
    }

    pub fn from_bytes(bytes: Bytes, len: usize) -> Result<Self, Error> {
        if bytes.len() != byte_len(len) {
            return Err(Error::malformed(format!(
                "bitmap of {len} bits needs {} bytes, got {}",
                byte_len(len),
                bytes.len()
            )));
        }
        Ok(Self { bytes, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        self.bytes[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn count_unset(&self) -> usize {
        self.len - self.iter().filter(|bit| *bit).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |index| self.get(index))
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut builder = BitmapBuilder::new();
        for bit in iter {
            builder.push(bit);
        }
        builder.finish()
    }
}

pub(crate) fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

#[derive(Debug, Default)]
pub struct BitmapBuilder {
    bytes: Vec<u8>,
    len: usize,
}

impl BitmapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(byte_len(bits)),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (self.len % 8);
        }
        self.len += 1;
    }

    pub fn extend_constant(&mut self, count: usize, bit: bool) {
        for _ in 0..count {
            self.push(bit);
        }
    }

    pub fn finish(self) -> Bitmap {
        Bitmap {
            bytes: Bytes::from(self.bytes),
            len: self.len,
        }
    }
}
