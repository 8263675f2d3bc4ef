// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! 8×8 forward and inverse DCT.
//!
//! Orthonormal DCT-II/DCT-III pair:
//! `F(u,v) = 1/4 · C(u) · C(v) · Σx Σy f(x,y) · cos((2x+1)uπ/16) · cos((2y+1)vπ/16)`
//! with `C(0) = 1/√2` and `C(k) = 1` otherwise.
//!
//! [`forward_dct`] and [`inverse_dct`] run two 1-D passes (rows, then
//! columns). The `_direct` variants evaluate the double sum per output
//! coefficient and serve as the reference the separable versions are
//! tested against. Both accumulate in `f64`.

use std::sync::OnceLock;

use super::block::Block8x8;

/// Pre-computed 8×8 cosine table.
/// `COSINE[u][x] = cos((2*x + 1) * u * PI / 16)`
static COSINE: OnceLock<[[f64; 8]; 8]> = OnceLock::new();

/// Normalization constants: C(0) = 1/sqrt(8), C(u>0) = 1/2.
static NORM: OnceLock<[f64; 8]> = OnceLock::new();

fn cosine_table() -> &'static [[f64; 8]; 8] {
    COSINE.get_or_init(|| {
        let mut table = [[0.0f64; 8]; 8];
        for (u, row) in table.iter_mut().enumerate() {
            for (x, c) in row.iter_mut().enumerate() {
                *c = ((2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0).cos();
            }
        }
        table
    })
}

fn norm_table() -> &'static [f64; 8] {
    NORM.get_or_init(|| {
        let mut n = [0.5f64; 8];
        n[0] = 1.0 / (8.0f64).sqrt();
        n
    })
}

/// 1-D forward transform of each row, in place.
fn fdct_rows(data: &mut [f64; 64]) {
    let cos = cosine_table();
    let c = norm_table();
    for row in data.chunks_exact_mut(8) {
        let mut out = [0.0f64; 8];
        for (u, o) in out.iter_mut().enumerate() {
            let sum: f64 = row.iter().enumerate().map(|(x, &s)| s * cos[u][x]).sum();
            *o = c[u] * sum;
        }
        row.copy_from_slice(&out);
    }
}

/// 1-D inverse transform of each row, in place.
fn idct_rows(data: &mut [f64; 64]) {
    let cos = cosine_table();
    let c = norm_table();
    for row in data.chunks_exact_mut(8) {
        let mut out = [0.0f64; 8];
        for (x, o) in out.iter_mut().enumerate() {
            *o = row.iter().enumerate().map(|(u, &f)| c[u] * f * cos[u][x]).sum();
        }
        row.copy_from_slice(&out);
    }
}

fn transpose(data: &mut [f64; 64]) {
    for y in 0..8 {
        for x in (y + 1)..8 {
            data.swap(y * 8 + x, x * 8 + y);
        }
    }
}

fn to_f64(block: &Block8x8<f32>) -> [f64; 64] {
    block.as_array().map(f64::from)
}

fn to_block(data: &[f64; 64]) -> Block8x8<f32> {
    Block8x8::new(data.map(|v| v as f32))
}

/// Separable forward DCT of a level-shifted spatial block.
pub fn forward_dct(block: &Block8x8<f32>) -> Block8x8<f32> {
    let mut data = to_f64(block);
    fdct_rows(&mut data);
    transpose(&mut data);
    fdct_rows(&mut data);
    transpose(&mut data);
    to_block(&data)
}

/// Separable inverse DCT of a dequantized coefficient block.
pub fn inverse_dct(block: &Block8x8<f32>) -> Block8x8<f32> {
    let mut data = to_f64(block);
    idct_rows(&mut data);
    transpose(&mut data);
    idct_rows(&mut data);
    transpose(&mut data);
    to_block(&data)
}

/// Forward DCT evaluated as the full double sum for each `(u, v)`.
pub fn forward_dct_direct(block: &Block8x8<f32>) -> Block8x8<f32> {
    let cos = cosine_table();
    let c = norm_table();
    let f = to_f64(block);
    let mut out = [0.0f64; 64];
    for v in 0..8 {
        for u in 0..8 {
            let mut sum = 0.0;
            for y in 0..8 {
                for x in 0..8 {
                    sum += f[y * 8 + x] * cos[u][x] * cos[v][y];
                }
            }
            out[v * 8 + u] = c[u] * c[v] * sum;
        }
    }
    to_block(&out)
}

/// Inverse DCT evaluated as the full double sum for each `(x, y)`.
pub fn inverse_dct_direct(block: &Block8x8<f32>) -> Block8x8<f32> {
    let cos = cosine_table();
    let c = norm_table();
    let f = to_f64(block);
    let mut out = [0.0f64; 64];
    for y in 0..8 {
        for x in 0..8 {
            let mut sum = 0.0;
            for v in 0..8 {
                for u in 0..8 {
                    sum += c[u] * c[v] * f[v * 8 + u] * cos[u][x] * cos[v][y];
                }
            }
            out[y * 8 + x] = sum;
        }
    }
    to_block(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn random_block(rng: &mut ChaCha20Rng) -> Block8x8<f32> {
        let mut block = Block8x8::default();
        for i in 0..64 {
            block[i] = rng.gen_range(-1024..=1023) as f32;
        }
        block
    }

    #[test]
    fn dc_only_inverse_is_uniform() {
        let mut block = Block8x8::<f32>::default();
        block[0] = 8.0;
        let spatial = inverse_dct(&block);
        for i in 0..64 {
            assert!((spatial[i] - 1.0).abs() < 1e-5, "i={i}: {}", spatial[i]);
        }
    }

    #[test]
    fn uniform_block_has_only_dc() {
        let block = Block8x8::splat(10.0f32);
        let freq = forward_dct(&block);
        assert!((freq[0] - 80.0).abs() < 1e-3);
        for i in 1..64 {
            assert!(freq[i].abs() < 1e-3, "i={i}: {}", freq[i]);
        }
    }

    #[test]
    fn impulse_round_trips_exactly() {
        let mut block = Block8x8::<f32>::default();
        block[27] = 100.0;
        let back = inverse_dct(&forward_dct(&block));
        for i in 0..64 {
            let expected = if i == 27 { 100.0 } else { 0.0 };
            assert_eq!(back[i].round(), expected, "i={i}");
        }
    }

    #[test]
    fn random_round_trip_within_one() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        for _ in 0..100 {
            let block = random_block(&mut rng);
            let back = inverse_dct(&forward_dct(&block));
            for i in 0..64 {
                assert!((back[i].round() - block[i]).abs() <= 1.0, "i={i}");
            }
        }
    }

    #[test]
    fn separable_matches_direct() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..20 {
            let block = random_block(&mut rng);
            let fast = forward_dct(&block);
            let slow = forward_dct_direct(&block);
            for i in 0..64 {
                assert!((fast[i] - slow[i]).abs() < 0.01, "fdct i={i}");
            }
            let fast = inverse_dct(&block);
            let slow = inverse_dct_direct(&block);
            for i in 0..64 {
                assert!((fast[i] - slow[i]).abs() < 0.01, "idct i={i}");
            }
        }
    }
}
