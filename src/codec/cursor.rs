//! Byte cursors for the blob codecs
//!
//! Values are written in native byte order. Every read is bounds-checked and
//! fails with [`CodecError::Truncated`] instead of reading past the end.

use crate::error::{CodecError, CodecResult};

/// Appends native-endian scalars to a caller-owned buffer
pub struct ByteWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_ne_bytes());
    }

    pub fn write_f32s(&mut self, values: &[f32]) {
        self.buf.reserve(values.len() * 4);
        for &v in values {
            self.write_f32(v);
        }
    }

    pub fn write_u32s(&mut self, values: &[u32]) {
        self.buf.reserve(values.len() * 4);
        for &v in values {
            self.write_u32(v);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Reads native-endian scalars from a borrowed slice
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        if self.remaining() < N {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: N,
                available: self.remaining(),
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.take::<4>().map(u32::from_ne_bytes)
    }

    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.take::<4>().map(i32::from_ne_bytes)
    }

    pub fn read_f32(&mut self) -> CodecResult<f32> {
        self.take::<4>().map(f32::from_ne_bytes)
    }

    pub fn read_f64(&mut self) -> CodecResult<f64> {
        self.take::<8>().map(f64::from_ne_bytes)
    }

    pub fn read_f32_array<const N: usize>(&mut self) -> CodecResult<[f32; N]> {
        let mut out = [0.0f32; N];
        for v in out.iter_mut() {
            *v = self.read_f32()?;
        }
        Ok(out)
    }

    pub fn read_f32_vec(&mut self, count: usize) -> CodecResult<Vec<f32>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_f32()?);
        }
        Ok(out)
    }

    /// Reject `count` elements of `elem_size` bytes that cannot fit in what
    /// is left, before anything gets allocated for them.
    pub fn check_count(&self, count: u32, elem_size: usize) -> CodecResult<()> {
        let needed = count as u64 * elem_size as u64;
        if needed > self.remaining() as u64 {
            return Err(CodecError::CountOverflow { count });
        }
        Ok(())
    }

    /// Succeeds only if every byte has been consumed
    pub fn finish(self) -> CodecResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}
