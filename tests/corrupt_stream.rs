// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Damaged entropy data degrades the image instead of failing the decode.

use mediakit_jpeg::jpeg::frame::ComponentInfo;
use mediakit_jpeg::{DecodeOptions, EncodeOptions, FrameInfo, JpegImage, Plane};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn textured_gray(width: usize, height: usize, seed: u64) -> Plane {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let data = (0..width * height)
        .map(|i| {
            let (x, y) = (i % width, i / width);
            ((x * 3 + y * 2) as i32 + rng.gen_range(-20..=20)).clamp(0, 255) as u8
        })
        .collect();
    Plane::from_vec(width, height, data).unwrap()
}

fn encode_gray(width: u16, height: u16, options: &EncodeOptions) -> Vec<u8> {
    let frame = FrameInfo::new(width, height, vec![ComponentInfo::new(1, 1, 1, 0)]).unwrap();
    let plane = textured_gray(width as usize, height as usize, 3);
    JpegImage::encode(&[plane], &frame, options).unwrap()
}

/// Offset of the first entropy-coded byte (after the SOS segment).
fn scan_start(bytes: &[u8]) -> usize {
    let sos = bytes.windows(2).position(|w| w == [0xFF, 0xDA]).unwrap();
    let len = u16::from_be_bytes([bytes[sos + 2], bytes[sos + 3]]) as usize;
    sos + 2 + len
}

#[test]
fn truncated_file_decodes_with_gray_tail() {
    init_logger();
    let bytes = encode_gray(64, 64, &EncodeOptions::default());
    let start = scan_start(&bytes);
    let cut = start + (bytes.len() - start) / 2;

    let image = JpegImage::from_bytes(&bytes[..cut]).unwrap();
    let report = &image.scan_reports()[0];
    assert!(report.truncated);
    assert_eq!(report.blocks, 64);

    // The last block row received no data: flat at the last decoded DC.
    let plane = image.plane(0);
    let last_row: Vec<u8> = (56..64).flat_map(|y| (0..64).map(move |x| (x, y))).map(|(x, y)| plane.get(x, y)).collect();
    assert!(last_row.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn random_garbage_never_fails_tolerant_decode() {
    init_logger();
    let bytes = encode_gray(48, 40, &EncodeOptions::default().with_restart_interval(2));
    let start = scan_start(&bytes);
    let end = bytes.len() - 2;
    let mut rng = ChaCha20Rng::seed_from_u64(99);

    for _ in 0..20 {
        let mut damaged = bytes.clone();
        for _ in 0..8 {
            let at = rng.gen_range(start..end);
            damaged[at] = rng.gen();
        }
        // A flipped byte may form a marker that ends the file early or is
        // unsupported; anything else must decode.
        if let Ok(image) = JpegImage::from_bytes(&damaged) {
            assert_eq!(image.plane(0).width(), 48);
            assert_eq!(image.plane(0).height(), 40);
        }
    }
}

#[test]
fn restart_markers_localize_damage() {
    init_logger();
    let options = EncodeOptions::default().with_restart_interval(1);
    let bytes = encode_gray(64, 8, &options);
    let clean = JpegImage::from_bytes(&bytes).unwrap();

    // Cut the first interval down to one byte. Its block starves at the
    // marker and every later interval restarts cleanly.
    let start = scan_start(&bytes);
    let first_rst = bytes[start..].windows(2).position(|w| w == [0xFF, 0xD0]).unwrap() + start;
    let mut damaged = bytes[..start].to_vec();
    damaged.push(0x00);
    damaged.extend_from_slice(&bytes[first_rst..]);

    let image = JpegImage::from_bytes_with(&damaged, DecodeOptions::default()).unwrap();
    let report = &image.scan_reports()[0];
    assert_eq!(report.restarts, 7);
    assert!(report.truncated);
    for x in 8..64 {
        for y in 0..8 {
            assert_eq!(image.plane(0).get(x, y), clean.plane(0).get(x, y), "pixel ({x},{y})");
        }
    }
}

#[test]
fn missing_eoi_is_tolerated() {
    init_logger();
    let bytes = encode_gray(16, 16, &EncodeOptions::default());
    let image = JpegImage::from_bytes(&bytes[..bytes.len() - 2]).unwrap();
    let full = JpegImage::from_bytes(&bytes).unwrap();
    assert_eq!(image.planes(), full.planes());
    assert!(image.scan_reports()[0].is_clean());
}
