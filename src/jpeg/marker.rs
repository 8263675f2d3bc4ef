// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! JPEG marker parsing and iteration.
//!
//! Walks the marker segments in a JPEG byte stream and parses the SOS and
//! DRI segment bodies into records. Entropy-coded data after each SOS
//! header is skipped, so one pass yields every scan of a baseline file.

use super::error::{JpegError, Result};

/// JPEG marker constants.
pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOF0: u8 = 0xC0;
pub const SOF1: u8 = 0xC1;
pub const DHT: u8 = 0xC4;
pub const DQT: u8 = 0xDB;
pub const DRI: u8 = 0xDD;
pub const SOS: u8 = 0xDA;
pub const COM: u8 = 0xFE;
/// First restart marker; RSTn is `RST0 + n`.
pub const RST0: u8 = 0xD0;

/// True for RST0..RST7.
pub fn is_restart(marker: u8) -> bool {
    (RST0..=RST0 + 7).contains(&marker)
}

/// Parsed marker with position information.
#[derive(Debug, Clone)]
pub struct MarkerEntry {
    pub marker: u8,
    /// Segment data without marker and length (empty for standalone markers).
    pub data: Vec<u8>,
    /// Byte offset of the marker (the 0xFF byte) in the original data.
    pub offset: usize,
    /// For SOS: offset of the first entropy-coded byte.
    pub scan_start: Option<usize>,
}

/// Iterate over the marker segments of a JPEG file.
///
/// Entropy-coded data after each SOS is skipped. A missing EOI or trailing
/// bytes after the last scan end the walk without error.
pub fn iterate_markers(data: &[u8]) -> Result<Vec<MarkerEntry>> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(JpegError::InvalidSoi);
    }
    let mut entries = vec![MarkerEntry {
        marker: SOI,
        data: Vec::new(),
        offset: 0,
        scan_start: None,
    }];
    let mut pos = 2;

    loop {
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        // Skip fill bytes
        while pos + 1 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 1 >= data.len() {
            log::warn!("JPEG data ends without EOI");
            return Ok(entries);
        }

        let marker_offset = pos;
        let marker = data[pos + 1];
        pos += 2;

        if marker == 0x00 {
            continue;
        }

        if marker == EOI || is_restart(marker) {
            entries.push(MarkerEntry {
                marker,
                data: Vec::new(),
                offset: marker_offset,
                scan_start: None,
            });
            if marker == EOI {
                return Ok(entries);
            }
            continue;
        }

        if is_unsupported(marker) {
            return Err(JpegError::UnsupportedMarker(marker));
        }

        let length = data
            .get(pos..pos + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
            .ok_or(JpegError::InvalidMarkerData("truncated segment length"))?;
        if length < 2 || pos + length > data.len() {
            return Err(JpegError::InvalidMarkerData("invalid segment length"));
        }
        let segment_data = data[pos + 2..pos + length].to_vec();
        pos += length;

        let scan_start = (marker == SOS).then_some(pos);
        entries.push(MarkerEntry {
            marker,
            data: segment_data,
            offset: marker_offset,
            scan_start,
        });

        if marker == SOS {
            pos = skip_scan_data(data, pos);
        }
    }
}

/// Non-baseline processes: progressive, lossless, hierarchical, arithmetic.
fn is_unsupported(marker: u8) -> bool {
    matches!(
        marker,
        0xC2 // SOF2 progressive
        | 0xC3 // SOF3 lossless
        | 0xC5..=0xC7 // SOF5-7 differential
        | 0xC9..=0xCB // SOF9-11 arithmetic
        | 0xCC // DAC
        | 0xCD..=0xCF // SOF13-15 differential arithmetic
    )
}

/// Skip past entropy-coded scan data to find the next marker.
///
/// Starting from `pos` (the first byte after an SOS header), returns the
/// byte offset of the 0xFF of the first marker that is neither a stuffed
/// byte nor RSTn, or `data.len()` if the data ends first.
pub fn skip_scan_data(data: &[u8], mut pos: usize) -> usize {
    while pos < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data.get(pos + 1) {
            None => return data.len(),
            Some(0x00) => pos += 2,
            Some(&next) if is_restart(next) => pos += 2,
            Some(0xFF) => pos += 1,
            Some(_) => return pos,
        }
    }
    data.len()
}

/// One component selector of an SOS header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSelector {
    /// Component identifier (`Cs`), matching a SOF component id.
    pub component_id: u8,
    /// DC Huffman table destination (`Td`).
    pub dc_table: u8,
    /// AC Huffman table destination (`Ta`).
    pub ac_table: u8,
}

/// Parsed SOS (Start of Scan) header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub selectors: Vec<ScanSelector>,
    /// Start of spectral selection (0 in baseline).
    pub ss: u8,
    /// End of spectral selection (63 in baseline).
    pub se: u8,
    /// Successive approximation high bit (0 in baseline).
    pub ah: u8,
    /// Successive approximation low bit (0 in baseline).
    pub al: u8,
}

impl ScanHeader {
    /// Baseline header (`Ss=0, Se=63, Ah=Al=0`) for the given selectors.
    pub fn baseline(selectors: Vec<ScanSelector>) -> Self {
        Self {
            selectors,
            ss: 0,
            se: 63,
            ah: 0,
            al: 0,
        }
    }

    /// Parse an SOS segment body (after the 2-byte length).
    ///
    /// Spectral selection and successive approximation fields are kept as
    /// read; baseline decoding ignores them.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (&count, rest) = data
            .split_first()
            .ok_or(JpegError::InvalidMarkerData("empty SOS"))?;
        let count = count as usize;
        if !(1..=4).contains(&count) {
            return Err(JpegError::InvalidMarkerData("SOS component count out of range"));
        }
        if rest.len() < count * 2 + 3 {
            return Err(JpegError::InvalidMarkerData("truncated SOS"));
        }

        let selectors: Vec<ScanSelector> = rest[..count * 2]
            .chunks_exact(2)
            .map(|pair| ScanSelector {
                component_id: pair[0],
                dc_table: pair[1] >> 4,
                ac_table: pair[1] & 0x0F,
            })
            .collect();
        if selectors.iter().any(|s| s.dc_table > 3 || s.ac_table > 3) {
            return Err(JpegError::InvalidMarkerData("SOS table selector out of range"));
        }

        let params = &rest[count * 2..];
        let header = Self {
            selectors,
            ss: params[0],
            se: params[1],
            ah: params[2] >> 4,
            al: params[2] & 0x0F,
        };
        if !header.is_baseline() {
            log::warn!(
                "SOS with Ss={} Se={} Ah={} Al={} treated as a baseline scan",
                header.ss,
                header.se,
                header.ah,
                header.al
            );
        }
        Ok(header)
    }

    pub fn is_baseline(&self) -> bool {
        self.ss == 0 && self.se == 63 && self.ah == 0 && self.al == 0
    }

    /// Serialize as a complete SOS segment (marker, length, body).
    pub fn to_bytes(&self) -> Vec<u8> {
        let length = 2 + 1 + self.selectors.len() * 2 + 3;
        let mut out = Vec::with_capacity(2 + length);
        out.extend_from_slice(&[0xFF, SOS]);
        out.extend_from_slice(&(length as u16).to_be_bytes());
        out.push(self.selectors.len() as u8);
        for s in &self.selectors {
            out.push(s.component_id);
            out.push((s.dc_table << 4) | s.ac_table);
        }
        out.push(self.ss);
        out.push(self.se);
        out.push((self.ah << 4) | self.al);
        out
    }
}

/// Parse DRI (Define Restart Interval) marker data.
pub fn parse_dri(data: &[u8]) -> Result<u16> {
    match data {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(JpegError::InvalidMarkerData("truncated DRI")),
    }
}

/// Write a complete DRI segment.
pub fn write_dri(interval: u16) -> Vec<u8> {
    let mut out = vec![0xFF, DRI, 0x00, 0x04];
    out.extend_from_slice(&interval.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterate_minimal_jpeg() {
        let data = [0xFF, 0xD8, 0xFF, 0xD9];
        let entries = iterate_markers(&data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].marker, SOI);
        assert_eq!(entries[1].marker, EOI);
    }

    #[test]
    fn invalid_soi() {
        let data = [0x00, 0x00];
        assert!(matches!(iterate_markers(&data), Err(JpegError::InvalidSoi)));
    }

    #[test]
    fn reject_progressive_and_lossless() {
        for sof in [0xC2u8, 0xC3, 0xC9] {
            let data = [0xFF, 0xD8, 0xFF, sof, 0x00, 0x02];
            assert!(matches!(
                iterate_markers(&data),
                Err(JpegError::UnsupportedMarker(m)) if m == sof
            ));
        }
    }

    #[test]
    fn scans_are_skipped_and_recorded() {
        let mut data = vec![0xFF, 0xD8];
        let header = ScanHeader::baseline(vec![ScanSelector {
            component_id: 1,
            dc_table: 0,
            ac_table: 0,
        }]);
        data.extend_from_slice(&header.to_bytes());
        let scan_start = data.len();
        // Entropy data with a stuffed byte and a restart marker.
        data.extend_from_slice(&[0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0x56]);
        data.extend_from_slice(&write_dri(4));
        data.extend_from_slice(&[0xFF, 0xD9]);

        let entries = iterate_markers(&data).unwrap();
        let markers: Vec<u8> = entries.iter().map(|e| e.marker).collect();
        assert_eq!(markers, vec![SOI, SOS, DRI, EOI]);
        assert_eq!(entries[1].scan_start, Some(scan_start));
        assert_eq!(ScanHeader::parse(&entries[1].data).unwrap(), header);
        assert_eq!(parse_dri(&entries[2].data).unwrap(), 4);
    }

    #[test]
    fn missing_eoi_is_tolerated() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&write_dri(1));
        data.extend_from_slice(&[0x00, 0x01]);
        let entries = iterate_markers(&data).unwrap();
        assert_eq!(entries.last().map(|e| e.marker), Some(DRI));
    }

    #[test]
    fn parse_sos_header() {
        // 2 components: comp1 uses DC0/AC0, comp2 uses DC1/AC1
        let data = [2, 1, 0x00, 2, 0x11, 0, 63, 0];
        let header = ScanHeader::parse(&data).unwrap();
        assert_eq!(header.selectors.len(), 2);
        assert_eq!(header.selectors[1].component_id, 2);
        assert_eq!(header.selectors[1].dc_table, 1);
        assert_eq!(header.selectors[1].ac_table, 1);
        assert!(header.is_baseline());
        assert_eq!(&header.to_bytes()[4..], &data);
    }

    #[test]
    fn sos_rejects_bad_selectors() {
        assert!(ScanHeader::parse(&[]).is_err());
        assert!(ScanHeader::parse(&[1, 1, 0x00, 0]).is_err());
        assert!(ScanHeader::parse(&[1, 1, 0x40, 0, 63, 0]).is_err());
        assert!(ScanHeader::parse(&[0, 0, 63, 0]).is_err());
    }

    #[test]
    fn non_baseline_params_are_kept() {
        let header = ScanHeader::parse(&[1, 1, 0x00, 1, 5, 0x01]).unwrap();
        assert!(!header.is_baseline());
        assert_eq!((header.ss, header.se, header.ah, header.al), (1, 5, 0, 1));
    }

    #[test]
    fn dri_round_trip() {
        let seg = write_dri(10);
        assert_eq!(seg, vec![0xFF, 0xDD, 0x00, 0x04, 0x00, 0x0A]);
        assert_eq!(parse_dri(&seg[4..]).unwrap(), 10);
        assert!(parse_dri(&[0x01]).is_err());
    }

    #[test]
    fn skip_stops_at_real_marker() {
        let data = [0x01, 0xFF, 0x00, 0xFF, 0xD3, 0xFF, 0xFF, 0xD9];
        assert_eq!(skip_scan_data(&data, 0), 6);
        assert_eq!(skip_scan_data(&data[..3], 0), 3);
    }
}
