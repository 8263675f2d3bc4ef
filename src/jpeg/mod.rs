// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Baseline JPEG block pipeline.
//!
//! Canonical Huffman coding, the bit cursor, zig-zag ordering, quantization,
//! the 8×8 DCT and the scan codec that ties them together, with restart
//! interval handling. [`JpegImage`] wraps the pipeline for whole files.
//!
//! Supports:
//! - Baseline sequential DCT (SOF0/SOF1), 8-bit precision
//! - Interleaved and single-component scans, any sampling factors up to 4
//! - Restart markers (DRI/RST), with resynchronization on damaged data
//! - Lossless re-encoding of decoded coefficients
//! - Optimal Huffman tables from symbol statistics
//!
//! Does NOT support:
//! - Progressive, lossless or hierarchical processes -- rejected at parse time
//! - Arithmetic coding (SOF9+) -- rejected at parse time
//! - 12-bit precision -- rejected at parse time
//! - Colour conversion or resampling: planes are at component resolution

pub mod bitio;
pub mod block;
pub mod dct;
pub mod error;
pub mod frame;
pub mod huffman;
pub mod huffman_opt;
pub mod marker;
pub mod plane;
pub mod quant;
pub mod restart;
pub mod scan;
pub mod tables;
pub mod zigzag;

use block::CoeffGrid;
use error::{JpegError, Result};
use frame::FrameInfo;
use huffman::{HuffmanClass, HuffmanTable};
use huffman_opt::ScanSymbolCounts;
use marker::{iterate_markers, parse_dri, write_dri, ScanHeader, ScanSelector};
use plane::Plane;
use quant::QuantTable;
use scan::{DecodeOptions, ScanJob, ScanParams, ScanReport};
use tables::{parse_dht, parse_dqt, write_dht, write_dqt, TablePool};

/// Settings for [`JpegImage::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// IJG quality, 1–100.
    pub quality: u8,
    /// MCUs between RSTn markers, 0 = none.
    pub restart_interval: u16,
    /// Fit the Huffman tables to the image instead of using Annex K tables.
    pub optimize_huffman: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 75,
            restart_interval: 0,
            optimize_huffman: false,
        }
    }
}

impl EncodeOptions {
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = interval;
        self
    }

    pub fn with_optimize_huffman(mut self, optimize: bool) -> Self {
        self.optimize_huffman = optimize;
        self
    }
}

/// A decoded baseline JPEG.
///
/// Holds the quantized coefficients of every component together with the
/// reconstructed sample planes. [`JpegImage::to_bytes`] re-encodes the
/// coefficients without loss.
#[derive(Debug, Clone)]
pub struct JpegImage {
    frame: FrameInfo,
    /// Quantized coefficients per frame component, padded to whole MCUs.
    coefficients: Vec<CoeffGrid>,
    /// Samples per frame component, at component resolution.
    planes: Vec<Plane>,
    /// Quantization table each component was coded with.
    quant: Vec<QuantTable>,
    /// Tables in effect at the end of the stream.
    pool: TablePool,
    restart_interval: u16,
    /// One report per scan, in stream order.
    reports: Vec<ScanReport>,
}

/// A scan found while walking the markers, with the tables in effect for it.
struct PendingScan {
    header: ScanHeader,
    scan_start: usize,
    restart_interval: u16,
    pool: TablePool,
}

impl JpegImage {
    /// Parse and decode a baseline JPEG file.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with(data, DecodeOptions::default())
    }

    /// Parse and decode a baseline JPEG file with explicit decoder options.
    ///
    /// Tables and the restart interval may change between scans; each scan
    /// uses the ones defined before its SOS. Independent scans are decoded
    /// in parallel when the `parallel` feature is on.
    pub fn from_bytes_with(data: &[u8], options: DecodeOptions) -> Result<Self> {
        let mut pool = TablePool::new();
        let mut frame: Option<FrameInfo> = None;
        let mut restart_interval = 0u16;
        let mut pending: Vec<PendingScan> = Vec::new();

        for entry in iterate_markers(data)? {
            match entry.marker {
                marker::DQT => {
                    for table in parse_dqt(&entry.data)? {
                        pool.install_quant(table);
                    }
                }
                marker::DHT => {
                    for table in parse_dht(&entry.data)? {
                        pool.install_huffman(table);
                    }
                }
                marker::SOF0 | marker::SOF1 => {
                    if frame.is_some() {
                        return Err(JpegError::InvalidMarkerData("more than one frame header"));
                    }
                    frame = Some(FrameInfo::parse_sof(&entry.data)?);
                }
                marker::DRI => restart_interval = parse_dri(&entry.data)?,
                marker::SOS => {
                    if frame.is_none() {
                        return Err(JpegError::InvalidMarkerData("SOS before frame header"));
                    }
                    let scan_start = entry
                        .scan_start
                        .ok_or(JpegError::InvalidMarkerData("SOS without scan data"))?;
                    pending.push(PendingScan {
                        header: ScanHeader::parse(&entry.data)?,
                        scan_start,
                        restart_interval,
                        pool: pool.clone(),
                    });
                }
                other => log::trace!("skipping marker 0xFF{other:02X} at byte {}", entry.offset),
            }
        }

        let frame = frame.ok_or(JpegError::InvalidMarkerData("no frame header"))?;
        if pending.is_empty() {
            return Err(JpegError::InvalidMarkerData("no scan"));
        }
        log::debug!(
            "{}×{} frame, {} components, {} scans",
            frame.width,
            frame.height,
            frame.components.len(),
            pending.len()
        );

        let results = {
            let jobs: Vec<ScanJob> = pending
                .iter()
                .map(|p| ScanJob {
                    data,
                    scan_start: p.scan_start,
                    params: ScanParams {
                        frame: &frame,
                        header: &p.header,
                        restart_interval: p.restart_interval,
                    },
                    pool: &p.pool,
                    options,
                })
                .collect();
            scan::decode_scans_parallel(&jobs)
        };

        // Later scans of a component replace earlier ones; the quantization
        // table comes from the pool of the scan that delivered it.
        let mut coefficients = scan::new_grids(&frame);
        let mut quant_source: Vec<Option<&TablePool>> = vec![None; frame.components.len()];
        let mut reports = Vec::with_capacity(results.len());
        for (pending_scan, result) in pending.iter().zip(results) {
            let (mut grids, report) = result?;
            for sel in &pending_scan.header.selectors {
                let idx = frame.component_index(sel.component_id)?;
                std::mem::swap(&mut coefficients[idx], &mut grids[idx]);
                quant_source[idx] = Some(&pending_scan.pool);
            }
            reports.push(report);
        }

        let mut quant = Vec::with_capacity(frame.components.len());
        let mut planes = Vec::with_capacity(frame.components.len());
        for (idx, comp) in frame.components.iter().enumerate() {
            let source = quant_source[idx].unwrap_or(&pool);
            let table = source.quant(comp.quant_table_id)?;
            planes.push(scan::coefficients_to_plane(
                &coefficients[idx],
                table,
                frame.component_width(idx),
                frame.component_height(idx),
            ));
            quant.push(table.clone());
        }

        Ok(Self {
            frame,
            coefficients,
            planes,
            quant,
            pool,
            restart_interval,
            reports,
        })
    }

    /// Encode component planes as a baseline JPEG file.
    ///
    /// `planes` are indexed like `frame.components` and must have the
    /// component dimensions. Quantization tables come from the Annex K
    /// tables scaled to `options.quality`, so components may only refer to
    /// quantization tables 0 (luminance) and 1 (chrominance).
    pub fn encode(planes: &[Plane], frame: &FrameInfo, options: &EncodeOptions) -> Result<Vec<u8>> {
        let pool = TablePool::standard(options.quality)?;
        if planes.len() != frame.components.len() {
            return Err(JpegError::PlaneMismatch);
        }
        let mut grids = Vec::with_capacity(planes.len());
        let mut quant = Vec::with_capacity(planes.len());
        for (idx, (plane, comp)) in planes.iter().zip(&frame.components).enumerate() {
            if plane.width() != frame.component_width(idx) || plane.height() != frame.component_height(idx) {
                return Err(JpegError::PlaneMismatch);
            }
            let table = pool.quant(comp.quant_table_id)?;
            grids.push(scan::plane_to_coefficients(
                plane,
                table,
                frame.blocks_wide(idx),
                frame.blocks_tall(idx),
            ));
            quant.push(table.clone());
        }
        write_file(frame, &quant, pool, &grids, options.restart_interval, options.optimize_huffman)
    }

    /// Re-encode the stored coefficients.
    ///
    /// Huffman tables are fitted to the coefficients and each component
    /// keeps the quantization table it was decoded with. Edited values
    /// whose magnitude category exceeds baseline limits (DC difference
    /// beyond ±2047, AC beyond ±1023) fail with
    /// [`JpegError::CoefficientOutOfRange`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        write_file(
            &self.frame,
            &self.quant,
            self.pool.clone(),
            &self.coefficients,
            self.restart_interval,
            true,
        )
    }

    pub fn frame_info(&self) -> &FrameInfo {
        &self.frame
    }

    pub fn num_components(&self) -> usize {
        self.frame.components.len()
    }

    /// Quantized coefficients of a frame component.
    pub fn coefficients(&self, component: usize) -> &CoeffGrid {
        &self.coefficients[component]
    }

    /// Mutable coefficients. Planes are not updated; call
    /// [`JpegImage::render_planes`] to refresh them.
    pub fn coefficients_mut(&mut self, component: usize) -> &mut CoeffGrid {
        &mut self.coefficients[component]
    }

    /// Decoded samples of a frame component.
    pub fn plane(&self, component: usize) -> &Plane {
        &self.planes[component]
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Tables in effect at the end of the stream.
    pub fn tables(&self) -> &TablePool {
        &self.pool
    }

    /// Quantization table a component was coded with.
    pub fn quant_table(&self, component: usize) -> &QuantTable {
        &self.quant[component]
    }

    pub fn restart_interval(&self) -> u16 {
        self.restart_interval
    }

    /// Decoder reports, one per scan.
    pub fn scan_reports(&self) -> &[ScanReport] {
        &self.reports
    }

    /// Rebuild the sample planes from the stored coefficients.
    pub fn render_planes(&mut self) -> Result<()> {
        for (idx, quant) in self.quant.iter().enumerate() {
            self.planes[idx] = scan::coefficients_to_plane(
                &self.coefficients[idx],
                quant,
                self.frame.component_width(idx),
                self.frame.component_height(idx),
            );
        }
        Ok(())
    }
}

/// Huffman destinations: component 0 uses tables 0, the others tables 1.
fn scan_selectors(frame: &FrameInfo) -> Vec<ScanSelector> {
    frame
        .components
        .iter()
        .enumerate()
        .map(|(idx, comp)| {
            let table = u8::from(idx > 0);
            ScanSelector {
                component_id: comp.id,
                dc_table: table,
                ac_table: table,
            }
        })
        .collect()
}

/// Scans for a frame: one interleaved scan when all components fit a
/// 10-block MCU, otherwise one scan per component.
fn scan_headers(frame: &FrameInfo) -> Vec<ScanHeader> {
    let selectors = scan_selectors(frame);
    let blocks: usize = frame
        .components
        .iter()
        .map(|c| c.h_sampling as usize * c.v_sampling as usize)
        .sum();
    if selectors.len() == 1 || blocks <= 10 {
        vec![ScanHeader::baseline(selectors)]
    } else {
        selectors.into_iter().map(|sel| ScanHeader::baseline(vec![sel])).collect()
    }
}

/// Give every distinct quantization table a destination.
///
/// Components coded with identical tables share one destination. A
/// component keeps its destination unless another table already took it.
/// Returns the frame with updated destinations and the tables to write.
fn assign_quant_tables(frame: &FrameInfo, quant: &[QuantTable]) -> Result<(FrameInfo, Vec<QuantTable>)> {
    if quant.len() != frame.components.len() {
        return Err(JpegError::PlaneMismatch);
    }
    let mut frame = frame.clone();
    let mut written: Vec<QuantTable> = Vec::with_capacity(quant.len());
    for (comp, table) in frame.components.iter_mut().zip(quant) {
        if let Some(same) = written
            .iter()
            .find(|t| t.precision() == table.precision() && t.values() == table.values())
        {
            comp.quant_table_id = same.id();
            continue;
        }
        let taken = |id: u8| written.iter().any(|t| t.id() == id);
        let id = if taken(comp.quant_table_id) {
            (0..4u8)
                .find(|&id| !taken(id))
                .ok_or(JpegError::InvalidQuantTableId(comp.quant_table_id))?
        } else {
            comp.quant_table_id
        };
        comp.quant_table_id = id;
        written.push(QuantTable::with_precision(table.precision(), id, *table.values())?);
    }
    written.sort_by_key(|t| t.id());
    Ok((frame, written))
}

/// Assemble a complete file: SOI, DQT, SOF0, DHT, DRI, then SOS and data
/// per scan, EOI.
///
/// `quant` holds the quantization table of each frame component.
fn write_file(
    frame: &FrameInfo,
    quant: &[QuantTable],
    mut pool: TablePool,
    grids: &[CoeffGrid],
    restart_interval: u16,
    optimize_huffman: bool,
) -> Result<Vec<u8>> {
    let (frame, quant_tables) = assign_quant_tables(frame, quant)?;
    let frame = &frame;
    let headers = scan_headers(frame);
    let scans: Vec<ScanParams> = headers
        .iter()
        .map(|header| ScanParams {
            frame,
            header,
            restart_interval,
        })
        .collect();

    let mut huffman_ids: Vec<u8> = headers
        .iter()
        .flat_map(|h| h.selectors.iter().map(|s| s.dc_table))
        .collect();
    huffman_ids.sort_unstable();
    huffman_ids.dedup();

    if optimize_huffman {
        let mut counts = ScanSymbolCounts::default();
        for &params in &scans {
            counts.merge(&scan::count_symbols(params, grids)?);
        }
        for &id in &huffman_ids {
            for class in [HuffmanClass::Dc, HuffmanClass::Ac] {
                pool.install_huffman(HuffmanTable::optimal(class, id, counts.table(class, id))?);
            }
        }
    }
    let entropy = scans
        .iter()
        .map(|&params| scan::encode_scan_coefficients(params, &pool, grids))
        .collect::<Result<Vec<_>>>()?;

    let mut out = vec![0xFF, marker::SOI];
    for table in &quant_tables {
        out.extend_from_slice(&write_dqt(table));
    }
    out.extend_from_slice(&frame.to_sof_bytes());
    for &id in &huffman_ids {
        for class in [HuffmanClass::Dc, HuffmanClass::Ac] {
            out.extend_from_slice(&write_dht(pool.huffman(class, id)?));
        }
    }
    if restart_interval > 0 {
        out.extend_from_slice(&write_dri(restart_interval));
    }
    for (header, data) in headers.iter().zip(&entropy) {
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(data);
    }
    out.extend_from_slice(&[0xFF, marker::EOI]);

    log::debug!(
        "encoded {}×{} frame: {} bytes, {} scans",
        frame.width,
        frame.height,
        out.len(),
        headers.len()
    );
    Ok(out)
}
