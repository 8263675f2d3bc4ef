// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Error types for the baseline JPEG core.

use thiserror::Error;

/// Kind of table a scan looks up in the [`TablePool`](super::tables::TablePool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Quantization,
    HuffmanDc,
    HuffmanAc,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quantization => f.write_str("quantization"),
            Self::HuffmanDc => f.write_str("DC Huffman"),
            Self::HuffmanAc => f.write_str("AC Huffman"),
        }
    }
}

/// Errors that can occur while building tables or coding a scan.
///
/// Only table construction and caller misuse reach the caller during a
/// scan decode. `UnexpectedEndOfStream`, `InvalidHuffmanCode` and
/// `RestartSyncLost` are recovered inside the scan decoder unless strict
/// restart checking is enabled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JpegError {
    /// Canonical Huffman table violates the code-space invariant.
    #[error("malformed Huffman table: {0}")]
    MalformedTable(&'static str),
    /// The bit reader ran out of entropy-coded data.
    #[error("unexpected end of entropy-coded data")]
    UnexpectedEndOfStream,
    /// No code of length 1..=16 matched the bit window.
    #[error("invalid Huffman code in scan data")]
    InvalidHuffmanCode,
    /// Restart marker expected but a different marker (or none) was found.
    #[error("restart sync lost: expected RST{expected}, found {found:?}")]
    RestartSyncLost { expected: u8, found: Option<u8> },
    /// A scan referenced a table destination that was never defined.
    #[error("{kind} table {id} is not installed")]
    TableNotInstalled { kind: TableKind, id: u8 },
    /// The encode table has no code for a symbol the scan needs.
    #[error("Huffman table has no code for symbol 0x{symbol:02X}")]
    MissingHuffmanCode { symbol: u8 },
    /// A quantization table entry is zero.
    #[error("quantization value at zig-zag index {index} is zero")]
    InvalidQuantValue { index: usize },
    /// Quantization table destination out of range (0–3).
    #[error("invalid quantization table ID: {0}")]
    InvalidQuantTableId(u8),
    /// Huffman table class/destination byte out of range.
    #[error("invalid Huffman table ID: 0x{0:02X}")]
    InvalidHuffmanTableId(u8),
    /// A marker segment has invalid or inconsistent length/content.
    #[error("invalid marker data: {0}")]
    InvalidMarkerData(&'static str),
    /// Missing SOI (0xFFD8) at start of data.
    #[error("missing SOI marker (not a JPEG)")]
    InvalidSoi,
    /// Non-baseline process (progressive, lossless, arithmetic).
    #[error("unsupported JPEG marker: 0xFF{0:02X}")]
    UnsupportedMarker(u8),
    /// Sample precision other than 8 bits.
    #[error("unsupported sample precision: {0}-bit")]
    UnsupportedPrecision(u8),
    /// Component ID referenced in SOS not found in SOF.
    #[error("unknown component ID in SOS: {0}")]
    UnknownComponentId(u8),
    /// Image dimensions or sampling factors are invalid.
    #[error("invalid image dimensions or sampling factors")]
    InvalidDimensions,
    /// Caller passed planes that do not match the frame's components.
    #[error("plane count or size does not match the frame components")]
    PlaneMismatch,
    /// A DC difference or AC coefficient needs a magnitude category that
    /// baseline coding cannot express.
    #[error("coefficient {value} needs category {category}, beyond baseline limits")]
    CoefficientOutOfRange { value: i32, category: u8 },
}

pub type Result<T> = std::result::Result<T, JpegError>;
