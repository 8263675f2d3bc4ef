// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Restart interval behaviour: predictor resets, marker sequence and
//! resynchronization on damaged marker data.

use mediakit_jpeg::jpeg::frame::ComponentInfo;
use mediakit_jpeg::jpeg::huffman::HuffmanClass;
use mediakit_jpeg::jpeg::marker::{ScanHeader, ScanSelector};
use mediakit_jpeg::jpeg::scan::{count_symbols, decode_scan_coefficients, encode_scan_coefficients, new_grids};
use mediakit_jpeg::{CoeffGrid, DecodeOptions, FrameInfo, JpegError, ScanParams, TablePool};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two 1×1 components, two MCUs side by side.
fn two_component_frame() -> FrameInfo {
    FrameInfo::new(16, 8, vec![ComponentInfo::new(1, 1, 1, 0), ComponentInfo::new(2, 1, 1, 1)]).unwrap()
}

fn header() -> ScanHeader {
    ScanHeader::baseline(vec![
        ScanSelector {
            component_id: 1,
            dc_table: 0,
            ac_table: 0,
        },
        ScanSelector {
            component_id: 2,
            dc_table: 1,
            ac_table: 1,
        },
    ])
}

fn dc_grids(frame: &FrameInfo, luma: [i16; 2], chroma: [i16; 2]) -> Vec<CoeffGrid> {
    let mut grids = new_grids(frame);
    for col in 0..2 {
        grids[0].block_mut(0, col)[0] = luma[col];
        grids[1].block_mut(0, col)[0] = chroma[col];
    }
    grids
}

fn find_marker(bytes: &[u8], code: u8) -> Option<usize> {
    bytes.windows(2).position(|w| w == [0xFF, code])
}

#[test]
fn dc_is_coded_relative_to_zero_after_restart() {
    init_logger();
    let frame = two_component_frame();
    let header = header();
    let grids = dc_grids(&frame, [10, 25], [-4, -4]);

    let with_restart = ScanParams {
        frame: &frame,
        header: &header,
        restart_interval: 1,
    };
    let without_restart = ScanParams {
        restart_interval: 0,
        ..with_restart
    };

    // Second luma DC: difference 25 (category 5) after a reset, 15 (category 4) without.
    let counts = count_symbols(with_restart, &grids).unwrap();
    assert_eq!(counts.table(HuffmanClass::Dc, 0).get(4), 1);
    assert_eq!(counts.table(HuffmanClass::Dc, 0).get(5), 1);
    // Second chroma DC: -4 again after a reset, difference 0 without.
    assert_eq!(counts.table(HuffmanClass::Dc, 1).get(3), 2);

    let counts = count_symbols(without_restart, &grids).unwrap();
    assert_eq!(counts.table(HuffmanClass::Dc, 0).get(4), 2);
    assert_eq!(counts.table(HuffmanClass::Dc, 1).get(0), 1);

    let pool = TablePool::standard(75).unwrap();
    let bytes = encode_scan_coefficients(with_restart, &pool, &grids).unwrap();
    assert!(find_marker(&bytes, 0xD0).is_some());
    assert!(find_marker(&bytes, 0xD1).is_none());

    let mut decoded = new_grids(&frame);
    let report =
        decode_scan_coefficients(&bytes, 0, with_restart, &pool, DecodeOptions::default(), &mut decoded).unwrap();
    assert_eq!(report.restarts, 1);
    assert!(report.is_clean());
    assert_eq!(decoded, grids);
}

#[test]
fn markers_cycle_through_rst0_to_rst7() {
    init_logger();
    let frame = FrameInfo::new(80, 8, vec![ComponentInfo::new(1, 1, 1, 0)]).unwrap();
    let header = ScanHeader::baseline(vec![ScanSelector {
        component_id: 1,
        dc_table: 0,
        ac_table: 0,
    }]);
    let params = ScanParams {
        frame: &frame,
        header: &header,
        restart_interval: 1,
    };
    let pool = TablePool::standard(75).unwrap();
    let grids = new_grids(&frame);
    let bytes = encode_scan_coefficients(params, &pool, &grids).unwrap();

    let markers: Vec<u8> = bytes
        .windows(2)
        .filter(|w| w[0] == 0xFF && (0xD0..=0xD7).contains(&w[1]))
        .map(|w| w[1])
        .collect();
    assert_eq!(markers, vec![0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD0]);

    let mut decoded = new_grids(&frame);
    let report = decode_scan_coefficients(&bytes, 0, params, &pool, DecodeOptions::default(), &mut decoded).unwrap();
    assert_eq!(report.restarts, 9);
}

#[test]
fn wrong_marker_index_is_tolerated_unless_strict() {
    init_logger();
    let frame = two_component_frame();
    let header = header();
    let params = ScanParams {
        frame: &frame,
        header: &header,
        restart_interval: 1,
    };
    let pool = TablePool::standard(75).unwrap();
    let grids = dc_grids(&frame, [10, 25], [-4, 7]);
    let mut bytes = encode_scan_coefficients(params, &pool, &grids).unwrap();
    let at = find_marker(&bytes, 0xD0).unwrap();
    bytes[at + 1] = 0xD3;

    let mut decoded = new_grids(&frame);
    let report = decode_scan_coefficients(&bytes, 0, params, &pool, DecodeOptions::default(), &mut decoded).unwrap();
    assert_eq!(report.restarts, 1);
    assert_eq!(decoded, grids);

    let strict = DecodeOptions::default().with_strict_restart(true);
    let mut decoded = new_grids(&frame);
    let err = decode_scan_coefficients(&bytes, 0, params, &pool, strict, &mut decoded).unwrap_err();
    assert_eq!(
        err,
        JpegError::RestartSyncLost {
            expected: 0,
            found: Some(0xD3)
        }
    );
}

#[test]
fn missing_marker_keeps_predictors_running() {
    init_logger();
    let frame = two_component_frame();
    let header = header();
    let params = ScanParams {
        frame: &frame,
        header: &header,
        restart_interval: 1,
    };
    let pool = TablePool::standard(75).unwrap();
    let grids = dc_grids(&frame, [10, 25], [-4, 7]);
    let mut bytes = encode_scan_coefficients(params, &pool, &grids).unwrap();
    let at = find_marker(&bytes, 0xD0).unwrap();
    bytes.drain(at..at + 2);

    let mut decoded = new_grids(&frame);
    let report = decode_scan_coefficients(&bytes, 0, params, &pool, DecodeOptions::default(), &mut decoded).unwrap();
    assert_eq!(report.missing_restarts, 1);
    // The second MCU was coded against reset predictors but decoded without one.
    assert_eq!(decoded[0].block(0, 1)[0], 10 + 25);
    assert_eq!(decoded[1].block(0, 1)[0], -4 + 7);
    assert_eq!(decoded[0].block(0, 0)[0], 10);
}

#[test]
fn foreign_marker_ends_scan_with_implicit_boundary() {
    init_logger();
    let frame = two_component_frame();
    let header = header();
    let params = ScanParams {
        frame: &frame,
        header: &header,
        restart_interval: 1,
    };
    let pool = TablePool::standard(75).unwrap();
    let grids = dc_grids(&frame, [10, 25], [-4, 7]);
    let mut bytes = encode_scan_coefficients(params, &pool, &grids).unwrap();
    let at = find_marker(&bytes, 0xD0).unwrap();
    bytes.truncate(at);
    bytes.extend_from_slice(&[0xFF, 0xD9]);

    let mut decoded = new_grids(&frame);
    let report = decode_scan_coefficients(&bytes, 0, params, &pool, DecodeOptions::default(), &mut decoded).unwrap();
    assert_eq!(report.implicit_boundaries, 1);
    assert!(report.truncated);
    assert_eq!(decoded[0].block(0, 0)[0], 10);
    // Nothing left to read: the reset predictor stands in for the DC value.
    assert_eq!(decoded[0].block(0, 1)[0], 0);
    assert_eq!(report.end_position, at);
}
