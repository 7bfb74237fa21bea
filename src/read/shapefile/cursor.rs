//! Bounds-checked primitive reads.
//!
//! Shapefiles mix byte orders: framing (file code, file length, record
//! headers, index entries) is big-endian and everything else is
//! little-endian. Every read here checks bounds first and reports
//! `TruncatedData` instead of panicking.

use std::io;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::error::{Result, ShapefileError};
use crate::geo::Point;

/// Width of one (x, y) pair of little-endian doubles.
pub const POINT_LENGTH: usize = 16;

/// A read position over an in-memory byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor { buf: buf, pos: 0 }
    }

    /// A cursor starting at `pos`. Positions past the end are allowed; the
    /// first read from there fails.
    pub fn at(buf: &'a [u8], pos: usize) -> ByteCursor<'a> {
        ByteCursor { buf: buf, pos: pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Borrows the next `n` bytes and advances past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(ShapefileError::TruncatedData {
                offset: self.pos,
                needed: n,
                available: available,
            });
        }
        let bytes = &self.buf[self.pos .. self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        self.take(4).map(LittleEndian::read_i32)
    }

    pub fn read_f64_le(&mut self) -> Result<f64> {
        self.take(8).map(LittleEndian::read_f64)
    }

    /// Reads a big-endian i32. Equivalent to reversing the four bytes and
    /// reading them little-endian.
    pub fn read_i32_be(&mut self) -> Result<i32> {
        self.take(4).map(BigEndian::read_i32)
    }

    /// Reads `n` bytes and returns them in reverse order.
    ///
    /// Reversing a run of consecutive big-endian words turns it into the
    /// same words, little-endian, in reverse order.
    pub fn read_reversed(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut bytes = self.take(n)?.to_vec();
        bytes.reverse();
        Ok(bytes)
    }

    pub fn read_i32_le_at(&self, offset: usize) -> Result<i32> {
        ByteCursor::at(self.buf, offset).read_i32_le()
    }

    /// Reads one little-endian (x, y) pair.
    pub fn read_point(&mut self) -> Result<Point> {
        let bytes = self.take(POINT_LENGTH)?;
        Ok(Point::new(
            LittleEndian::read_f64(&bytes[0..8]),
            LittleEndian::read_f64(&bytes[8..16]),
        ))
    }
}

/// Reads into `buf` until it is full or the reader runs dry.
///
/// Returns the number of bytes read. Unlike `read_exact`, running out early
/// is not an error: callers treat a short count as end-of-data.
pub fn read_up_to(reader: &mut dyn io::Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut n_read = 0;
    while n_read < buf.len() {
        match reader.read(&mut buf[n_read ..]) {
            Ok(0) => break,
            Ok(n) => n_read += n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {},
            Err(err) => return Err(err),
        }
    }
    Ok(n_read)
}
