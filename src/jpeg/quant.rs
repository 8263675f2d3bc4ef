// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Quantization tables.
//!
//! Values are stored in zig-zag order, as they appear in a DQT segment.
//! Blocks are in raster order, so every raster position `i` is paired with
//! the entry at `NATURAL_TO_ZIGZAG[i]`.

use super::block::Block8x8;
use super::error::{JpegError, Result};
use super::zigzag::{NATURAL_TO_ZIGZAG, ZIGZAG_TO_NATURAL};

/// Element width of a quantization table (`Pq` in a DQT segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantPrecision {
    Bits8 = 0,
    Bits16 = 1,
}

impl QuantPrecision {
    pub fn from_pq(pq: u8) -> Option<Self> {
        match pq {
            0 => Some(Self::Bits8),
            1 => Some(Self::Bits16),
            _ => None,
        }
    }

    pub fn pq(self) -> u8 {
        self as u8
    }
}

/// Quantization table for one destination (0–3). Every element is ≥ 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    precision: QuantPrecision,
    id: u8,
    /// Zig-zag order.
    values: [u16; 64],
}

impl QuantTable {
    /// Build a table from zig-zag ordered values. The precision is the
    /// smallest one that holds every value.
    pub fn new(id: u8, values: [u16; 64]) -> Result<Self> {
        let precision = if values.iter().all(|&v| v <= 255) {
            QuantPrecision::Bits8
        } else {
            QuantPrecision::Bits16
        };
        Self::with_precision(precision, id, values)
    }

    /// Build a table with an explicit precision, as read from a DQT segment.
    pub fn with_precision(precision: QuantPrecision, id: u8, values: [u16; 64]) -> Result<Self> {
        if id > 3 {
            return Err(JpegError::InvalidQuantTableId(id));
        }
        if let Some(index) = values.iter().position(|&v| v == 0) {
            return Err(JpegError::InvalidQuantValue { index });
        }
        if precision == QuantPrecision::Bits8 && values.iter().any(|&v| v > 255) {
            return Err(JpegError::InvalidMarkerData("8-bit quantization value above 255"));
        }
        Ok(Self {
            precision,
            id,
            values,
        })
    }

    /// Build a table from raster-ordered values.
    pub fn from_natural(id: u8, natural: &[u16; 64]) -> Result<Self> {
        let mut values = [0u16; 64];
        for (zi, v) in values.iter_mut().enumerate() {
            *v = natural[ZIGZAG_TO_NATURAL[zi]];
        }
        Self::new(id, values)
    }

    /// IJG quality scaling of a raster-ordered base table.
    ///
    /// Quality 50 keeps the base values; lower quality scales them up,
    /// higher quality down. Results are clamped to 1..=255.
    pub fn scaled(id: u8, base: &[u16; 64], quality: u8) -> Result<Self> {
        let q = quality.clamp(1, 100) as u32;
        let scale = if q < 50 { 5000 / q } else { 200 - q * 2 };
        let mut natural = [0u16; 64];
        for (dst, &b) in natural.iter_mut().zip(base.iter()) {
            *dst = ((b as u32 * scale + 50) / 100).clamp(1, 255) as u16;
        }
        Self::from_natural(id, &natural)
    }

    pub fn precision(&self) -> QuantPrecision {
        self.precision
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Values in zig-zag order.
    pub fn values(&self) -> &[u16; 64] {
        &self.values
    }

    /// Values in raster order.
    pub fn natural(&self) -> [u16; 64] {
        let mut out = [0u16; 64];
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.values[NATURAL_TO_ZIGZAG[i]];
        }
        out
    }

    /// Multiply each raster-ordered coefficient by its quantizer.
    pub fn dequantize(&self, block: &Block8x8<i16>) -> Block8x8<f32> {
        let mut out = Block8x8::<f32>::default();
        for i in 0..64 {
            out[i] = block[i] as f32 * self.values[NATURAL_TO_ZIGZAG[i]] as f32;
        }
        out
    }

    /// Divide each raster-ordered coefficient by its quantizer and round to
    /// nearest (add ±0.5, truncate).
    pub fn quantize(&self, block: &Block8x8<f32>) -> Block8x8<i16> {
        let mut out = Block8x8::<i16>::default();
        for i in 0..64 {
            let q = block[i] / self.values[NATURAL_TO_ZIGZAG[i]] as f32;
            let rounded = if q >= 0.0 { q + 0.5 } else { q - 0.5 };
            out[i] = (rounded as i32).clamp(-32767, 32767) as i16;
        }
        out
    }
}
