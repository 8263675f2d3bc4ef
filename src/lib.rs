// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! # mediakit-jpeg
//!
//! The entropy-coded block pipeline of baseline JPEG: canonical Huffman
//! tables, bit-level stream access with byte stuffing and markers, zig-zag
//! ordering, quantization, the 8×8 DCT, restart intervals and the scan codec
//! built from them.
//!
//! Everything lives in the [`jpeg`] module; the common entry points are
//! re-exported here.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use mediakit_jpeg::{EncodeOptions, FrameInfo, JpegImage, Plane};
//! use mediakit_jpeg::jpeg::frame::ComponentInfo;
//!
//! let frame = FrameInfo::new(64, 48, vec![ComponentInfo::new(1, 1, 1, 0)])?;
//! let plane = Plane::from_vec(64, 48, vec![128; 64 * 48])?;
//! let bytes = JpegImage::encode(&[plane], &frame, &EncodeOptions::default())?;
//! let image = JpegImage::from_bytes(&bytes)?;
//! assert_eq!(image.plane(0).width(), 64);
//! ```

pub mod jpeg;

pub use jpeg::block::{Block8x8, CoeffGrid};
pub use jpeg::error::{JpegError, Result as JpegResult};
pub use jpeg::frame::{ComponentState, FrameInfo};
pub use jpeg::huffman::{HuffmanClass, HuffmanTable};
pub use jpeg::plane::Plane;
pub use jpeg::quant::QuantTable;
pub use jpeg::restart::RestartController;
pub use jpeg::scan::{decode_scan, encode_scan, DecodeOptions, ScanParams, ScanReport};
pub use jpeg::tables::TablePool;
pub use jpeg::{EncodeOptions, JpegImage};
