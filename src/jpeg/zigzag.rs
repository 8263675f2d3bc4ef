// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Zig-zag scan order permutations.
//!
//! Entropy-coded data and DQT segments carry coefficients in zig-zag order
//! (increasing spatial frequency). Blocks are processed in raster order
//! (`y * 8 + x`), or in transposed raster order (`x * 8 + y`) when a
//! transform pass leaves them column-major.

/// Maps zig-zag index (0–63) to raster index `row * 8 + col`.
pub const ZIGZAG_TO_NATURAL: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Maps raster index to zig-zag index. Inverse of [`ZIGZAG_TO_NATURAL`].
pub const NATURAL_TO_ZIGZAG: [usize; 64] = invert(&ZIGZAG_TO_NATURAL);

/// Maps zig-zag index to the transposed raster index `col * 8 + row`.
pub const ZIGZAG_TO_TRANSPOSED: [usize; 64] = {
    let mut table = [0usize; 64];
    let mut i = 0;
    while i < 64 {
        table[i] = transpose_index(ZIGZAG_TO_NATURAL[i]);
        i += 1;
    }
    table
};

/// Maps transposed raster index to zig-zag index.
pub const TRANSPOSED_TO_ZIGZAG: [usize; 64] = invert(&ZIGZAG_TO_TRANSPOSED);

/// Swap row and column of a raster index.
#[inline]
pub const fn transpose_index(i: usize) -> usize {
    (i % 8) * 8 + i / 8
}

const fn invert(perm: &[usize; 64]) -> [usize; 64] {
    let mut table = [0usize; 64];
    let mut i = 0;
    while i < 64 {
        table[perm[i]] = i;
        i += 1;
    }
    table
}
