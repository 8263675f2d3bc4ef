// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Table pool plus DQT/DHT segment parsing and serialization.
//!
//! Handles DQT (Define Quantization Table) and DHT (Define Huffman Table)
//! marker segments. Supports both 8-bit and 16-bit quantization precision
//! and multiple tables per marker segment. Also carries the example tables
//! of ITU-T T.81 Annex K.

use super::error::{JpegError, Result, TableKind};
use super::huffman::{HuffmanClass, HuffmanTable};
use super::marker::{DHT, DQT};
use super::quant::{QuantPrecision, QuantTable};

/// Annex K.1 luminance quantization table, raster order.
pub const STD_LUMA_QUANT: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Annex K.1 chrominance quantization table, raster order.
pub const STD_CHROMA_QUANT: [u16; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

// Table K.3
pub const STD_DC_LUMA_BITS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
pub const STD_DC_LUMA_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

// Table K.4
pub const STD_DC_CHROMA_BITS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
pub const STD_DC_CHROMA_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

// Table K.5
pub const STD_AC_LUMA_BITS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7D];
pub const STD_AC_LUMA_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12,
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08,
    0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16,
    0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79,
    0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
    0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7,
    0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6,
    0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5,
    0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4,
    0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2,
    0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA,
    0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA,
];

// Table K.6
pub const STD_AC_CHROMA_BITS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
pub const STD_AC_CHROMA_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21,
    0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91,
    0xA1, 0xB1, 0xC1, 0x09, 0x23, 0x33, 0x52, 0xF0,
    0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24, 0x34,
    0xE1, 0x25, 0xF1, 0x17, 0x18, 0x19, 0x1A, 0x26,
    0x27, 0x28, 0x29, 0x2A, 0x35, 0x36, 0x37, 0x38,
    0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58,
    0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78,
    0x79, 0x7A, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96,
    0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5,
    0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4,
    0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3,
    0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2,
    0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA,
    0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9,
    0xEA, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8,
    0xF9, 0xFA,
];

/// Quantization and Huffman tables installed by DQT/DHT segments.
///
/// Scans borrow the pool immutably; installing a table needs `&mut`, so a
/// table cannot change under an in-flight decode.
#[derive(Debug, Clone, Default)]
pub struct TablePool {
    quant: [Option<QuantTable>; 4],
    dc: [Option<HuffmanTable>; 4],
    ac: [Option<HuffmanTable>; 4],
}

impl TablePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool holding the Annex K tables: luminance in destination 0,
    /// chrominance in destination 1, quantization scaled to `quality`.
    pub fn standard(quality: u8) -> Result<Self> {
        let mut pool = Self::new();
        pool.install_quant(QuantTable::scaled(0, &STD_LUMA_QUANT, quality)?);
        pool.install_quant(QuantTable::scaled(1, &STD_CHROMA_QUANT, quality)?);
        pool.install_huffman(HuffmanTable::new(
            HuffmanClass::Dc,
            0,
            STD_DC_LUMA_BITS,
            STD_DC_LUMA_VALUES.to_vec(),
        )?);
        pool.install_huffman(HuffmanTable::new(
            HuffmanClass::Ac,
            0,
            STD_AC_LUMA_BITS,
            STD_AC_LUMA_VALUES.to_vec(),
        )?);
        pool.install_huffman(HuffmanTable::new(
            HuffmanClass::Dc,
            1,
            STD_DC_CHROMA_BITS,
            STD_DC_CHROMA_VALUES.to_vec(),
        )?);
        pool.install_huffman(HuffmanTable::new(
            HuffmanClass::Ac,
            1,
            STD_AC_CHROMA_BITS,
            STD_AC_CHROMA_VALUES.to_vec(),
        )?);
        Ok(pool)
    }

    /// Install (or replace) the table at its destination id.
    pub fn install_quant(&mut self, table: QuantTable) {
        let id = table.id() as usize;
        self.quant[id] = Some(table);
    }

    /// Install (or replace) the table at its class and destination id.
    pub fn install_huffman(&mut self, table: HuffmanTable) {
        let id = table.id() as usize;
        match table.class() {
            HuffmanClass::Dc => self.dc[id] = Some(table),
            HuffmanClass::Ac => self.ac[id] = Some(table),
        }
    }

    pub fn quant(&self, id: u8) -> Result<&QuantTable> {
        lookup(&self.quant, TableKind::Quantization, id)
    }

    pub fn huffman(&self, class: HuffmanClass, id: u8) -> Result<&HuffmanTable> {
        match class {
            HuffmanClass::Dc => lookup(&self.dc, TableKind::HuffmanDc, id),
            HuffmanClass::Ac => lookup(&self.ac, TableKind::HuffmanAc, id),
        }
    }

    /// Installed quantization tables, by destination.
    pub fn quant_tables(&self) -> impl Iterator<Item = &QuantTable> {
        self.quant.iter().flatten()
    }

    /// Installed Huffman tables, DC destinations first.
    pub fn huffman_tables(&self) -> impl Iterator<Item = &HuffmanTable> {
        self.dc.iter().chain(self.ac.iter()).flatten()
    }
}

fn lookup<T>(slots: &[Option<T>; 4], kind: TableKind, id: u8) -> Result<&T> {
    slots
        .get(id as usize)
        .and_then(Option::as_ref)
        .ok_or(JpegError::TableNotInstalled { kind, id })
}

/// Parse a DQT marker segment body (after the 2-byte length).
///
/// A single DQT segment can contain multiple tables.
pub fn parse_dqt(data: &[u8]) -> Result<Vec<QuantTable>> {
    let mut tables = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let pq_tq = data[pos];
        pos += 1;
        let table_id = pq_tq & 0x0F;
        let precision = QuantPrecision::from_pq(pq_tq >> 4)
            .ok_or(JpegError::InvalidMarkerData("invalid DQT precision"))?;

        let mut values = [0u16; 64];
        match precision {
            QuantPrecision::Bits8 => {
                let bytes = data
                    .get(pos..pos + 64)
                    .ok_or(JpegError::InvalidMarkerData("truncated DQT segment"))?;
                for (v, &b) in values.iter_mut().zip(bytes) {
                    *v = b as u16;
                }
                pos += 64;
            }
            QuantPrecision::Bits16 => {
                let bytes = data
                    .get(pos..pos + 128)
                    .ok_or(JpegError::InvalidMarkerData("truncated DQT segment"))?;
                for (v, pair) in values.iter_mut().zip(bytes.chunks_exact(2)) {
                    *v = u16::from_be_bytes([pair[0], pair[1]]);
                }
                pos += 128;
            }
        }

        tables.push(QuantTable::with_precision(precision, table_id, values)?);
    }

    Ok(tables)
}

/// Write a DQT marker segment (including 0xFFDB marker and length).
pub fn write_dqt(table: &QuantTable) -> Vec<u8> {
    let precision = table.precision();
    let data_len = match precision {
        QuantPrecision::Bits8 => 64,
        QuantPrecision::Bits16 => 128,
    };
    let length = 2 + 1 + data_len;

    let mut out = Vec::with_capacity(2 + length);
    out.extend_from_slice(&[0xFF, DQT]);
    out.extend_from_slice(&(length as u16).to_be_bytes());
    out.push((precision.pq() << 4) | table.id());
    for &v in table.values() {
        match precision {
            QuantPrecision::Bits8 => out.push(v as u8),
            QuantPrecision::Bits16 => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
    out
}

/// Parse a DHT marker segment body (after the 2-byte length).
///
/// Every table is validated; a malformed code-length set fails the segment.
pub fn parse_dht(data: &[u8]) -> Result<Vec<HuffmanTable>> {
    let mut tables = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let tc_th = data[pos];
        pos += 1;
        let class = HuffmanClass::from_tc(tc_th >> 4).ok_or(JpegError::InvalidHuffmanTableId(tc_th))?;
        let id = tc_th & 0x0F;
        if id > 3 {
            return Err(JpegError::InvalidHuffmanTableId(tc_th));
        }

        let mut bits = [0u8; 16];
        bits.copy_from_slice(
            data.get(pos..pos + 16)
                .ok_or(JpegError::InvalidMarkerData("truncated DHT segment"))?,
        );
        pos += 16;

        let total: usize = bits.iter().map(|&b| b as usize).sum();
        let values = data
            .get(pos..pos + total)
            .ok_or(JpegError::InvalidMarkerData("truncated DHT segment"))?
            .to_vec();
        pos += total;

        tables.push(HuffmanTable::new(class, id, bits, values)?);
    }

    Ok(tables)
}

/// Write a DHT marker segment (including 0xFFC4 marker and length).
pub fn write_dht(table: &HuffmanTable) -> Vec<u8> {
    let length = 2 + 1 + 16 + table.values().len();
    let mut out = Vec::with_capacity(2 + length);
    out.extend_from_slice(&[0xFF, DHT]);
    out.extend_from_slice(&(length as u16).to_be_bytes());
    out.push((table.class().tc() << 4) | table.id());
    out.extend_from_slice(table.bits());
    out.extend_from_slice(table.values());
    out
}
