// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! 8×8 blocks and per-component grids of coefficient blocks.
//!
//! [`Block8x8`] holds 64 values in raster order (`y * 8 + x`): `i16` for
//! quantized frequency coefficients, `f32` for dequantized coefficients and
//! spatial samples. [`CoeffGrid`] stores the quantized blocks of one
//! component in block-raster order.

use std::ops::{Add, Index, IndexMut, Mul};

use super::plane::Plane;

/// Level shift for 8-bit samples, `2^(P-1)`.
pub const LEVEL_SHIFT: f32 = 128.0;

/// Largest 8-bit sample value.
pub const SAMPLE_MAX: f32 = 255.0;

/// 64 values of one 8×8 block, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block8x8<T> {
    data: [T; 64],
}

impl<T: Copy + Default> Default for Block8x8<T> {
    fn default() -> Self {
        Self {
            data: [T::default(); 64],
        }
    }
}

impl<T: Copy> Block8x8<T> {
    pub fn new(data: [T; 64]) -> Self {
        Self { data }
    }

    /// Block with every element set to `value`.
    pub fn splat(value: T) -> Self {
        Self { data: [value; 64] }
    }

    /// Value at column `x`, row `y`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> T {
        debug_assert!(x < 8 && y < 8);
        self.data[y * 8 + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        debug_assert!(x < 8 && y < 8);
        self.data[y * 8 + x] = value;
    }

    pub fn as_array(&self) -> &[T; 64] {
        &self.data
    }

    pub fn as_array_mut(&mut self) -> &mut [T; 64] {
        &mut self.data
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> Self {
        let mut out = *self;
        for y in 0..8 {
            for x in 0..8 {
                out.data[x * 8 + y] = self.data[y * 8 + x];
            }
        }
        out
    }

    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Block8x8<U> {
        Block8x8 {
            data: self.data.map(f),
        }
    }
}

impl<T: Copy + Mul<Output = T>> Block8x8<T> {
    /// Elementwise product.
    pub fn mul_elementwise(&self, other: &Self) -> Self {
        let mut out = *self;
        for (o, &b) in out.data.iter_mut().zip(other.data.iter()) {
            *o = *o * b;
        }
        out
    }

    pub fn scale(&self, factor: T) -> Self {
        self.map(|v| v * factor)
    }
}

impl<T: Copy + Add<Output = T>> Block8x8<T> {
    /// Elementwise sum.
    pub fn add_elementwise(&self, other: &Self) -> Self {
        let mut out = *self;
        for (o, &b) in out.data.iter_mut().zip(other.data.iter()) {
            *o = *o + b;
        }
        out
    }
}

impl<T> Index<usize> for Block8x8<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T> IndexMut<usize> for Block8x8<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}

impl Block8x8<i16> {
    pub fn to_f32(&self) -> Block8x8<f32> {
        self.map(f32::from)
    }
}

impl Block8x8<f32> {
    /// Add `offset`, clamp to `[0, max]` and round half away from zero.
    pub fn round_clamp(&self, offset: f32, max: f32) -> Block8x8<u8> {
        self.map(|v| (v + offset).clamp(0.0, max).round() as u8)
    }

    /// Copy the 8×8 area at pixel `(x0, y0)` out of `plane`, level-shifted
    /// to be centred on zero. Samples past the plane edge replicate the
    /// last row/column.
    pub fn read_plane(plane: &Plane, x0: usize, y0: usize) -> Self {
        let mut out = Self::default();
        for y in 0..8 {
            for x in 0..8 {
                out.data[y * 8 + x] = plane.get_clamped(x0 + x, y0 + y) as f32 - LEVEL_SHIFT;
            }
        }
        out
    }

    /// Level-shift, clamp and round the block into `plane` at pixel
    /// `(x0, y0)`. Pixels outside the plane are dropped.
    pub fn write_plane(&self, plane: &mut Plane, x0: usize, y0: usize) {
        let samples = self.round_clamp(LEVEL_SHIFT, SAMPLE_MAX);
        let w = plane.width().saturating_sub(x0).min(8);
        let h = plane.height().saturating_sub(y0).min(8);
        for y in 0..h {
            let row = plane.row_mut(y0 + y);
            for x in 0..w {
                row[x0 + x] = samples.data[y * 8 + x];
            }
        }
    }
}

/// Quantized coefficient blocks of one component, in block-raster order.
#[derive(Debug, Clone, PartialEq)]
pub struct CoeffGrid {
    blocks_wide: usize,
    blocks_tall: usize,
    blocks: Vec<Block8x8<i16>>,
}

impl CoeffGrid {
    /// Create a new grid initialized to zero.
    pub fn new(blocks_wide: usize, blocks_tall: usize) -> Self {
        Self {
            blocks_wide,
            blocks_tall,
            blocks: vec![Block8x8::default(); blocks_wide * blocks_tall],
        }
    }

    pub fn blocks_wide(&self) -> usize {
        self.blocks_wide
    }

    pub fn blocks_tall(&self) -> usize {
        self.blocks_tall
    }

    /// Block at block row `br`, block column `bc`.
    pub fn block(&self, br: usize, bc: usize) -> &Block8x8<i16> {
        &self.blocks[self.index(br, bc)]
    }

    pub fn block_mut(&mut self, br: usize, bc: usize) -> &mut Block8x8<i16> {
        let idx = self.index(br, bc);
        &mut self.blocks[idx]
    }

    /// Block at `(br, bc)`, or `None` outside the grid.
    pub fn try_block(&self, br: usize, bc: usize) -> Option<&Block8x8<i16>> {
        (br < self.blocks_tall && bc < self.blocks_wide).then(|| &self.blocks[br * self.blocks_wide + bc])
    }

    pub fn blocks(&self) -> &[Block8x8<i16>] {
        &self.blocks
    }

    fn index(&self, br: usize, bc: usize) -> usize {
        debug_assert!(br < self.blocks_tall, "block row {br} >= {}", self.blocks_tall);
        debug_assert!(bc < self.blocks_wide, "block col {bc} >= {}", self.blocks_wide);
        br * self.blocks_wide + bc
    }
}
