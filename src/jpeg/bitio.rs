// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Bit-level I/O for JPEG entropy-coded data.
//!
//! Provides [`BitReader`] for decoding and [`BitWriter`] for encoding the
//! entropy-coded scan data. Both handle JPEG byte-stuffing (0xFF -> 0xFF 0x00)
//! and operate in MSB-first bit order.

use super::error::{JpegError, Result};

/// Result of looking for a marker at a byte boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerCheck {
    /// An RSTn marker was found and consumed; holds `n` (0–7).
    Restart(u8),
    /// Some other marker sits at the cursor. It is left unconsumed.
    Other(u8),
    /// No marker prefix at the cursor.
    None,
}

/// Bit-level reader for JPEG entropy-coded data.
///
/// Strips stuffed zero bytes and stops at the first marker: bytes after a
/// marker prefix are never loaded into the bit buffer, so the marker stays
/// at [`BitReader::position`] until [`BitReader::check_marker`] consumes it.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Valid bits are the low `bits_left` bits, oldest bit highest.
    buf: u32,
    bits_left: u8,
    /// Marker code that stopped the last fill, if any.
    marker: Option<u8>,
}

impl<'a> BitReader<'a> {
    /// Create a reader over `data`, starting at byte offset `pos`
    /// (the first byte after the SOS header).
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            buf: 0,
            bits_left: 0,
            marker: None,
        }
    }

    /// Read `count` bits (0–16) and return them right-aligned.
    pub fn read_bits(&mut self, count: u8) -> Result<u16> {
        debug_assert!(count <= 16);
        if count == 0 {
            return Ok(0);
        }
        self.ensure(count);
        if self.bits_left < count {
            return Err(JpegError::UnexpectedEndOfStream);
        }
        self.bits_left -= count;
        let val = (self.buf >> self.bits_left) & ((1u32 << count) - 1);
        Ok(val as u16)
    }

    /// Peek at the next `count` bits (1–16) without consuming them.
    pub fn peek_bits(&mut self, count: u8) -> Result<u16> {
        debug_assert!((1..=16).contains(&count));
        self.ensure(count);
        if self.bits_left < count {
            return Err(JpegError::UnexpectedEndOfStream);
        }
        let val = (self.buf >> (self.bits_left - count)) & ((1u32 << count) - 1);
        Ok(val as u16)
    }

    /// Next 16 bits, left-justified. Missing bits past the end of the
    /// segment read as zero; check [`BitReader::bits_available`] before
    /// consuming them.
    pub fn peek_window(&mut self) -> u16 {
        self.ensure(16);
        let window = if self.bits_left >= 16 {
            self.buf >> (self.bits_left - 16)
        } else {
            self.buf << (16 - self.bits_left)
        };
        (window & 0xFFFF) as u16
    }

    /// Discard `count` bits that have already been buffered.
    pub fn skip_bits(&mut self, count: u8) -> Result<()> {
        if count > self.bits_left {
            self.bits_left = 0;
            return Err(JpegError::UnexpectedEndOfStream);
        }
        self.bits_left -= count;
        Ok(())
    }

    /// Number of bits currently buffered.
    pub fn bits_available(&self) -> u8 {
        self.bits_left
    }

    /// Drop the bits remaining in a partially consumed byte.
    pub fn byte_align(&mut self) {
        self.bits_left -= self.bits_left % 8;
    }

    /// Current byte position in the underlying data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The marker that ended the data loaded so far, if one was reached.
    pub fn marker(&self) -> Option<u8> {
        self.marker
    }

    /// True once no more data bits can be loaded.
    pub fn is_exhausted(&self) -> bool {
        self.bits_left == 0 && (self.marker.is_some() || self.pos >= self.data.len())
    }

    /// Byte-align and look for a marker at the cursor.
    ///
    /// Fill bytes (0xFF 0xFF ...) before the marker code are skipped. An
    /// RSTn marker is consumed. Any other marker is left in place, with the
    /// cursor rewound to its first 0xFF byte.
    pub fn check_marker(&mut self) -> MarkerCheck {
        self.byte_align();
        if self.bits_left > 0 {
            // Whole data bytes are still buffered: not at a boundary.
            return MarkerCheck::None;
        }
        let start = self.pos;
        if self.data.get(start) != Some(&0xFF) {
            return MarkerCheck::None;
        }
        let mut p = start + 1;
        while self.data.get(p) == Some(&0xFF) {
            p += 1;
        }
        match self.data.get(p).copied() {
            Some(code @ 0xD0..=0xD7) => {
                self.pos = p + 1;
                self.marker = None;
                MarkerCheck::Restart(code & 0x07)
            }
            Some(0x00) | None => MarkerCheck::None,
            Some(code) => {
                self.pos = start;
                self.marker = Some(code);
                MarkerCheck::Other(code)
            }
        }
    }

    fn ensure(&mut self, count: u8) {
        while self.bits_left < count {
            if !self.fill_byte() {
                break;
            }
        }
    }

    fn fill_byte(&mut self) -> bool {
        if self.marker.is_some() || self.pos >= self.data.len() {
            return false;
        }
        let byte = self.data[self.pos];
        if byte == 0xFF {
            match self.data.get(self.pos + 1).copied() {
                Some(0x00) => {
                    // Byte-stuffed 0xFF
                    self.pos += 2;
                }
                Some(_) => {
                    let mut p = self.pos + 1;
                    while self.data.get(p) == Some(&0xFF) {
                        p += 1;
                    }
                    match self.data.get(p) {
                        Some(&code) => self.marker = Some(code),
                        None => self.pos = self.data.len(),
                    }
                    return false;
                }
                None => {
                    self.pos = self.data.len();
                    return false;
                }
            }
        } else {
            self.pos += 1;
        }
        self.buf = (self.buf << 8) | byte as u32;
        self.bits_left += 8;
        true
    }
}

/// Bit-level writer for JPEG entropy-coded data.
///
/// Bits accumulate MSB-first in a small register; every completed byte is
/// emitted immediately, followed by a stuffed 0x00 when it is 0xFF.
#[derive(Default)]
pub struct BitWriter {
    output: Vec<u8>,
    buf: u32,
    bits_used: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `count` bits (0–16) from the low bits of `value`.
    pub fn write_bits(&mut self, value: u16, count: u8) {
        debug_assert!(count <= 16);
        if count == 0 {
            return;
        }
        let mask = (1u32 << count) - 1;
        self.buf = (self.buf << count) | (value as u32 & mask);
        self.bits_used += count;
        while self.bits_used >= 8 {
            self.bits_used -= 8;
            let byte = (self.buf >> self.bits_used) as u8;
            self.emit_byte(byte);
        }
        self.buf &= (1u32 << self.bits_used) - 1;
    }

    /// Pad the current byte with 1-bits up to the next byte boundary.
    pub fn byte_align(&mut self) {
        if self.bits_used > 0 {
            let pad = 8 - self.bits_used;
            self.write_bits((1u16 << pad) - 1, pad);
        }
    }

    /// Force any partial byte out, padded with 1-bits.
    pub fn flush(&mut self) {
        self.byte_align();
    }

    /// Align and append a marker (0xFF, `code`) without stuffing.
    pub fn write_marker(&mut self, code: u8) {
        self.flush();
        self.output.push(0xFF);
        self.output.push(code);
    }

    /// Bytes emitted so far (excluding any partial byte).
    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty() && self.bits_used == 0
    }

    /// Flush and return the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.output
    }

    fn emit_byte(&mut self, byte: u8) {
        self.output.push(byte);
        if byte == 0xFF {
            self.output.push(0x00);
        }
    }
}
