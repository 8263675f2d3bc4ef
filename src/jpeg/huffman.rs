// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Canonical Huffman tables for JPEG entropy decoding and encoding.
//!
//! A [`HuffmanTable`] is the validated DHT definition (per-length counts
//! plus symbols). Scans derive a [`HuffmanDecodeTable`] or a
//! [`HuffmanEncodeTable`] from it once and reuse it for every block.

use super::bitio::BitReader;
use super::error::{JpegError, Result};

/// Huffman table class (`Tc` in a DHT segment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HuffmanClass {
    Dc = 0,
    Ac = 1,
}

impl HuffmanClass {
    pub fn from_tc(tc: u8) -> Option<Self> {
        match tc {
            0 => Some(Self::Dc),
            1 => Some(Self::Ac),
            _ => None,
        }
    }

    pub fn tc(self) -> u8 {
        self as u8
    }
}

/// Canonical Huffman table definition (ITU-T T.81 Annex C).
///
/// Invariants checked at construction: `sum(bits) == values.len() <= 256`,
/// and no code length overflows its code space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    class: HuffmanClass,
    id: u8,
    /// `bits[i]` = number of codes of length `i + 1`.
    bits: [u8; 16],
    /// Symbols ordered by increasing code length.
    values: Vec<u8>,
}

impl HuffmanTable {
    /// Validate and wrap a DHT definition.
    pub fn new(class: HuffmanClass, id: u8, bits: [u8; 16], values: Vec<u8>) -> Result<Self> {
        if id > 3 {
            return Err(JpegError::InvalidHuffmanTableId((class.tc() << 4) | id));
        }
        let total: usize = bits.iter().map(|&b| b as usize).sum();
        if total != values.len() {
            return Err(JpegError::MalformedTable("symbol count does not match code lengths"));
        }
        if total > 256 {
            return Err(JpegError::MalformedTable("more than 256 symbols"));
        }
        generate_codes(&bits)?;
        Ok(Self {
            class,
            id,
            bits,
            values,
        })
    }

    pub fn class(&self) -> HuffmanClass {
        self.class
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn bits(&self) -> &[u8; 16] {
        &self.bits
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Canonical `(code, length)` for each entry of [`values`](Self::values),
    /// in the same order.
    pub fn codes(&self) -> Vec<(u16, u8)> {
        // Validated in `new`.
        generate_codes(&self.bits).unwrap_or_default()
    }

    /// Inclusive `(first, last)` code for each length 1..=16, `None` when
    /// the length has no codes.
    pub fn code_ranges(&self) -> [Option<(u16, u16)>; 16] {
        let mut ranges = [None; 16];
        let mut code: u32 = 0;
        for (i, &count) in self.bits.iter().enumerate() {
            if count > 0 {
                ranges[i] = Some((code as u16, (code + count as u32 - 1) as u16));
            }
            code = (code + count as u32) << 1;
        }
        ranges
    }

    pub fn decode_table(&self) -> HuffmanDecodeTable {
        HuffmanDecodeTable::build(self)
    }

    pub fn encode_table(&self) -> HuffmanEncodeTable {
        HuffmanEncodeTable::build(self)
    }
}

/// Assign canonical codes, rejecting tables whose codes overflow a length.
fn generate_codes(bits: &[u8; 16]) -> Result<Vec<(u16, u8)>> {
    let mut codes = Vec::new();
    let mut code: u32 = 0;
    for length in 1..=16u8 {
        let count = bits[(length - 1) as usize];
        for _ in 0..count {
            codes.push((code as u16, length));
            code += 1;
        }
        // A code of all 1-bits, or one that needs more than `length` bits,
        // would alias with longer codes.
        if code >= 1u32 << length {
            return Err(JpegError::MalformedTable("code space overflow"));
        }
        code <<= 1;
    }
    Ok(codes)
}

/// Number of bits resolved by the direct lookup table.
pub const LOOKUP_BITS: u8 = 8;

/// Lookup slot length meaning "code longer than [`LOOKUP_BITS`]".
const TOO_LONG: u8 = LOOKUP_BITS + 1;

/// Decode accelerator derived from a [`HuffmanTable`].
///
/// Codes of up to 8 bits resolve with one lookup. Longer codes search
/// lengths 9..=16 against left-justified `max_code` bounds and map the
/// matched code to a symbol through `val_offset`.
#[derive(Clone)]
pub struct HuffmanDecodeTable {
    /// Indexed by the next 8 bits: (code length, symbol).
    lookup: [(u8, u8); 256],
    /// Largest code of each length, left-justified to 16 bits with the low
    /// bits set; -1 for unused lengths. `max_code[17]` is a sentinel.
    max_code: [i32; 18],
    /// Index into `values` minus the first code of each length.
    val_offset: [i32; 18],
    values: Vec<u8>,
}

impl HuffmanDecodeTable {
    pub fn build(table: &HuffmanTable) -> Self {
        let mut lookup = [(TOO_LONG, 0u8); 256];
        let mut max_code = [-1i32; 18];
        let mut val_offset = [0i32; 18];

        let mut code: i32 = 0;
        let mut k: i32 = 0;
        for length in 1..=16usize {
            let count = table.bits[length - 1] as i32;
            val_offset[length] = k - code;
            if count > 0 {
                if length <= LOOKUP_BITS as usize {
                    let shift = LOOKUP_BITS as usize - length;
                    for i in 0..count {
                        let symbol = table.values[(k + i) as usize];
                        let base = ((code + i) as usize) << shift;
                        for slot in &mut lookup[base..base + (1 << shift)] {
                            *slot = (length as u8, symbol);
                        }
                    }
                }
                let last = code + count - 1;
                let low = (1i32 << (16 - length)) - 1;
                max_code[length] = (last << (16 - length)) | low;
            }
            code = (code + count) << 1;
            k += count;
        }
        max_code[17] = i32::MAX;

        Self {
            lookup,
            max_code,
            val_offset,
            values: table.values.clone(),
        }
    }

    /// Decode one symbol from the bit stream.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u8> {
        let window = reader.peek_window();
        let (length, symbol) = self.lookup[(window >> 8) as usize];
        if length <= LOOKUP_BITS {
            reader.skip_bits(length)?;
            return Ok(symbol);
        }

        let window = window as i32;
        let mut length = TOO_LONG as usize;
        while window > self.max_code[length] {
            length += 1;
        }
        if length > 16 {
            return Err(JpegError::InvalidHuffmanCode);
        }
        let index = self.val_offset[length] + (window >> (16 - length));
        let symbol = usize::try_from(index)
            .ok()
            .and_then(|i| self.values.get(i))
            .copied()
            .ok_or(JpegError::InvalidHuffmanCode)?;
        reader.skip_bits(length as u8)?;
        Ok(symbol)
    }
}

/// Huffman encode table: maps symbol → (code_bits, code_length).
#[derive(Clone)]
pub struct HuffmanEncodeTable {
    /// Length 0 means the symbol is not in the table.
    table: [(u16, u8); 256],
}

impl HuffmanEncodeTable {
    pub fn build(table: &HuffmanTable) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        for (&symbol, code) in table.values.iter().zip(table.codes()) {
            codes[symbol as usize] = code;
        }
        Self { table: codes }
    }

    /// Encode a symbol: returns (code_bits, code_length).
    pub fn encode(&self, symbol: u8) -> Result<(u16, u8)> {
        let (code, len) = self.table[symbol as usize];
        if len == 0 {
            Err(JpegError::MissingHuffmanCode { symbol })
        } else {
            Ok((code, len))
        }
    }
}

/// Magnitude category: 0 for 0, otherwise the bit length of `|value|`.
#[inline]
pub fn category(value: i32) -> u8 {
    (32 - value.unsigned_abs().leading_zeros()) as u8
}

/// Extend a signed value from its `bits`-wide "additional bits" form.
///
/// Per ITU-T T.81 Table F.1: if the high bit is 0, the value is negative.
pub fn extend_sign(value: u16, bits: u8) -> i32 {
    if bits == 0 {
        return 0;
    }
    let half = 1i32 << (bits - 1);
    if (value as i32) < half {
        value as i32 - (1i32 << bits) + 1
    } else {
        value as i32
    }
}

/// Encode a signed value into its "additional bits" form.
/// Returns (magnitude_bits, category).
pub fn encode_value(value: i32) -> (u16, u8) {
    let size = category(value);
    if size == 0 {
        return (0, 0);
    }
    // Negative values use one's complement within `size` bits.
    let bits = if value > 0 { value } else { value - 1 };
    ((bits as u32 & ((1u32 << size) - 1)) as u16, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::bitio::BitWriter;
    use crate::jpeg::tables::{STD_AC_LUMA_BITS, STD_AC_LUMA_VALUES};

    // Standard JPEG luminance DC Huffman table (ITU-T T.81 Table K.3)
    fn lum_dc_table() -> HuffmanTable {
        let bits = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        HuffmanTable::new(HuffmanClass::Dc, 0, bits, (0..12).collect()).unwrap()
    }

    fn lum_ac_table() -> HuffmanTable {
        HuffmanTable::new(HuffmanClass::Ac, 0, STD_AC_LUMA_BITS, STD_AC_LUMA_VALUES.to_vec())
            .unwrap()
    }

    #[test]
    fn canonical_codes_for_dc_table() {
        let table = lum_dc_table();
        let codes = table.codes();
        assert_eq!(codes[0], (0b00, 2));
        assert_eq!(codes[1], (0b010, 3));
        assert_eq!(codes[5], (0b110, 3));
        assert_eq!(codes[6], (0b1110, 4));
        assert_eq!(codes[11], (0b1_1111_1110, 9));
        let ranges = table.code_ranges();
        assert_eq!(ranges[0], None);
        assert_eq!(ranges[2], Some((0b010, 0b110)));
    }

    #[test]
    fn rejects_overflowing_table() {
        let mut bits = [0u8; 16];
        bits[0] = 3;
        let err = HuffmanTable::new(HuffmanClass::Dc, 0, bits, vec![0, 1, 2]).unwrap_err();
        assert!(matches!(err, JpegError::MalformedTable(_)));

        // Two 1-bit codes leave no room for anything, including the all-ones code.
        bits[0] = 2;
        assert!(HuffmanTable::new(HuffmanClass::Dc, 0, bits, vec![0, 1]).is_err());
    }

    #[test]
    fn rejects_count_mismatch() {
        let mut bits = [0u8; 16];
        bits[1] = 2;
        assert!(matches!(
            HuffmanTable::new(HuffmanClass::Ac, 1, bits, vec![0]),
            Err(JpegError::MalformedTable(_))
        ));
    }

    #[test]
    fn decodes_concatenated_codes_in_order() {
        for table in [lum_dc_table(), lum_ac_table()] {
            let mut w = BitWriter::new();
            for (code, len) in table.codes() {
                w.write_bits(code, len);
            }
            let bytes = w.finish();
            let dec = table.decode_table();
            let mut reader = BitReader::new(&bytes, 0);
            for &expected in table.values() {
                assert_eq!(dec.decode(&mut reader).unwrap(), expected);
            }
        }
    }

    #[test]
    fn long_codes_use_search_path() {
        let table = lum_ac_table();
        let enc = table.encode_table();
        let dec = table.decode_table();
        // 0xFA is the last (16-bit) AC code.
        let (code, len) = enc.encode(0xFA).unwrap();
        assert_eq!(len, 16);
        let mut w = BitWriter::new();
        w.write_bits(code, len);
        let bytes = w.finish();
        let mut reader = BitReader::new(&bytes, 0);
        assert_eq!(dec.decode(&mut reader).unwrap(), 0xFA);
    }

    #[test]
    fn all_ones_window_is_invalid() {
        let dec = lum_dc_table().decode_table();
        let data = [0xFF, 0x00, 0xFF, 0x00];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(dec.decode(&mut reader), Err(JpegError::InvalidHuffmanCode));
    }

    #[test]
    fn truncated_code_is_end_of_stream() {
        let table = lum_ac_table();
        let (code, len) = table.encode_table().encode(0xFA).unwrap();
        // Only the first 8 bits of a 16-bit code are present.
        let data = [(code >> 8) as u8, 0x00];
        let mut reader = BitReader::new(&data, 0);
        assert_eq!(
            table.decode_table().decode(&mut reader),
            Err(JpegError::UnexpectedEndOfStream)
        );
        assert_eq!(len, 16);
    }

    #[test]
    fn missing_symbol_reported() {
        let enc = lum_dc_table().encode_table();
        assert_eq!(enc.encode(12), Err(JpegError::MissingHuffmanCode { symbol: 12 }));
    }

    #[test]
    fn extend_sign_values() {
        // Category 1: value 0 → -1, value 1 → +1
        assert_eq!(extend_sign(0, 1), -1);
        assert_eq!(extend_sign(1, 1), 1);

        // Category 3: values 0–3 → -7 to -4, values 4–7 → +4 to +7
        assert_eq!(extend_sign(0, 3), -7);
        assert_eq!(extend_sign(3, 3), -4);
        assert_eq!(extend_sign(4, 3), 4);
        assert_eq!(extend_sign(7, 3), 7);

        assert_eq!(extend_sign(0, 0), 0);
    }

    #[test]
    fn sign_extension_inverts_encoding() {
        for t in 1..=11u8 {
            let lo = 1i32 << (t - 1);
            let hi = (1i32 << t) - 1;
            for v in (lo..=hi).chain(-hi..=-lo) {
                let (bits, size) = encode_value(v);
                assert_eq!(size, t);
                assert_eq!(extend_sign(bits, size), v, "t={t} v={v}");
            }
        }
    }

    #[test]
    fn category_values() {
        assert_eq!(category(0), 0);
        assert_eq!(category(1), 1);
        assert_eq!(category(-1), 1);
        assert_eq!(category(255), 8);
        assert_eq!(category(-1024), 11);
        assert_eq!(category(2047), 11);
    }
}
