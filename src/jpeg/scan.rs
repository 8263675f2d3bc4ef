// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Baseline scan decoding and encoding.
//!
//! A scan walks its MCUs in raster order. Each MCU holds `H×V` blocks of
//! every scan component when the scan is interleaved, or a single block of
//! its only component otherwise. Blocks are decoded into [`CoeffGrid`]s or
//! straight into sample [`Plane`]s (dequantize, inverse DCT, level shift),
//! and encoded from either.
//!
//! Corrupt entropy data never aborts a decode: a starved reader yields
//! zero coefficients, an unmatched code is read as symbol 0 and an
//! overlong run is clamped to the last coefficient. The [`ScanReport`]
//! counts what was recovered.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::bitio::{BitReader, BitWriter};
use super::block::{Block8x8, CoeffGrid};
use super::dct::{forward_dct, inverse_dct};
use super::error::{JpegError, Result};
use super::frame::{ComponentState, FrameInfo};
use super::huffman::{
    encode_value, extend_sign, HuffmanClass, HuffmanDecodeTable, HuffmanEncodeTable,
};
use super::huffman_opt::ScanSymbolCounts;
use super::marker::ScanHeader;
use super::plane::Plane;
use super::quant::QuantTable;
use super::restart::{RestartController, RestartOutcome};
use super::tables::TablePool;
use super::zigzag::{NATURAL_TO_ZIGZAG, ZIGZAG_TO_NATURAL};

/// Largest DC magnitude category in baseline 8-bit data.
const MAX_DC_CATEGORY: u8 = 11;

/// Largest AC magnitude category in baseline 8-bit data.
const MAX_AC_CATEGORY: u8 = 10;

/// Decoder behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail with [`JpegError::RestartSyncLost`] instead of resynchronizing
    /// when a restart marker is wrong or missing.
    pub strict_restart: bool,
}

impl DecodeOptions {
    pub fn with_strict_restart(mut self, strict: bool) -> Self {
        self.strict_restart = strict;
        self
    }
}

/// Frame geometry and scan header a scan is coded against.
#[derive(Debug, Clone, Copy)]
pub struct ScanParams<'a> {
    pub frame: &'a FrameInfo,
    pub header: &'a ScanHeader,
    /// MCUs between restart markers, 0 = none.
    pub restart_interval: u16,
}

/// Where a block sits: scan component, frame component and block position
/// within that component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPos {
    pub scan_index: usize,
    pub component_index: usize,
    pub row: usize,
    pub col: usize,
}

/// Recoveries and restart events seen while decoding a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub blocks: usize,
    /// The entropy data ran out before the last block.
    pub truncated: bool,
    pub invalid_codes: usize,
    pub index_overflows: usize,
    pub restarts: usize,
    pub implicit_boundaries: usize,
    pub missing_restarts: usize,
    /// Byte offset where the reader stopped.
    pub end_position: usize,
}

impl ScanReport {
    /// True when the scan decoded without any recovery.
    pub fn is_clean(&self) -> bool {
        !self.truncated
            && self.invalid_codes == 0
            && self.index_overflows == 0
            && self.implicit_boundaries == 0
            && self.missing_restarts == 0
    }

    fn note_truncated(&mut self, position: usize) {
        if !self.truncated {
            log::warn!("entropy data ends early at byte {position}, remaining coefficients set to 0");
            self.truncated = true;
        }
    }

    fn note_invalid_code(&mut self, position: usize) {
        if self.invalid_codes == 0 {
            log::warn!("invalid Huffman code near byte {position}, treated as symbol 0");
        }
        self.invalid_codes += 1;
    }

    fn note_overflow(&mut self) {
        if self.index_overflows == 0 {
            log::warn!("AC run past coefficient 63, clamped");
        }
        self.index_overflows += 1;
    }
}

/// Decode one symbol, mapping stream errors to the recovery policy.
/// `None` means the data ran out.
fn decode_symbol(reader: &mut BitReader, table: &HuffmanDecodeTable, report: &mut ScanReport) -> Option<u8> {
    match table.decode(reader) {
        Ok(symbol) => Some(symbol),
        Err(JpegError::UnexpectedEndOfStream) => {
            report.note_truncated(reader.position());
            None
        }
        Err(_) => {
            report.note_invalid_code(reader.position());
            Some(0)
        }
    }
}

/// Entropy-decode one block into raster order.
///
/// The DC difference is added to the component's predictor. Decoding stops
/// at EOB, after coefficient 63, or when the data runs out; coefficients
/// not reached stay 0.
pub fn decode_block(
    reader: &mut BitReader,
    dc: &HuffmanDecodeTable,
    ac: &HuffmanDecodeTable,
    state: &mut ComponentState,
    report: &mut ScanReport,
) -> Block8x8<i16> {
    let mut block = Block8x8::<i16>::default();
    report.blocks += 1;

    let Some(mut size) = decode_symbol(reader, dc, report) else {
        block[0] = clamp_i16(state.dc_predictor());
        return block;
    };
    if size > MAX_DC_CATEGORY {
        report.note_invalid_code(reader.position());
        size = 0;
    }
    let diff = match reader.read_bits(size) {
        Ok(bits) => extend_sign(bits, size),
        Err(_) => {
            report.note_truncated(reader.position());
            block[0] = clamp_i16(state.dc_predictor());
            return block;
        }
    };
    block[0] = clamp_i16(state.apply_dc_diff(diff));

    let mut k = 1;
    while k < 64 {
        let Some(rs) = decode_symbol(reader, ac, report) else {
            break;
        };
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;

        if size == 0 {
            if run == 15 {
                // ZRL: skip 16 zeros
                k += 16;
                continue;
            }
            // EOB (other runs are not defined and end the block too)
            break;
        }

        k += run;
        if k > 63 {
            report.note_overflow();
            k = 63;
        }
        match reader.read_bits(size) {
            Ok(bits) => block[ZIGZAG_TO_NATURAL[k]] = clamp_i16(extend_sign(bits, size)),
            Err(_) => {
                report.note_truncated(reader.position());
                break;
            }
        }
        k += 1;
    }
    block
}

#[inline]
fn clamp_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Receives the symbols of an encoded scan.
///
/// Bit emission and symbol counting for optimal tables share one traversal
/// through this trait.
trait SymbolSink {
    /// One Huffman symbol followed by `extra_len` raw bits.
    fn symbol(&mut self, scan_index: usize, class: HuffmanClass, symbol: u8, extra: u16, extra_len: u8)
        -> Result<()>;

    /// Handle a restart boundary before the next MCU.
    fn boundary(&mut self, restart: &mut RestartController, states: &mut [ComponentState]);
}

struct HuffmanSink {
    writer: BitWriter,
    /// (DC, AC) encode tables per scan component.
    tables: Vec<(HuffmanEncodeTable, HuffmanEncodeTable)>,
}

impl SymbolSink for HuffmanSink {
    fn symbol(&mut self, scan_index: usize, class: HuffmanClass, symbol: u8, extra: u16, extra_len: u8) -> Result<()> {
        let (dc, ac) = &self.tables[scan_index];
        let table = match class {
            HuffmanClass::Dc => dc,
            HuffmanClass::Ac => ac,
        };
        let (code, len) = table.encode(symbol)?;
        self.writer.write_bits(code, len);
        self.writer.write_bits(extra, extra_len);
        Ok(())
    }

    fn boundary(&mut self, restart: &mut RestartController, states: &mut [ComponentState]) {
        restart.emit(&mut self.writer, states);
    }
}

struct CountingSink {
    counts: ScanSymbolCounts,
    /// (DC, AC) table destinations per scan component.
    selectors: Vec<(u8, u8)>,
}

impl SymbolSink for CountingSink {
    fn symbol(&mut self, scan_index: usize, class: HuffmanClass, symbol: u8, _extra: u16, _extra_len: u8) -> Result<()> {
        let (dc, ac) = self.selectors[scan_index];
        let id = match class {
            HuffmanClass::Dc => dc,
            HuffmanClass::Ac => ac,
        };
        self.counts.table_mut(class, id).add(symbol);
        Ok(())
    }

    fn boundary(&mut self, restart: &mut RestartController, states: &mut [ComponentState]) {
        restart.next_marker(states);
    }
}

/// Emit the symbols of one raster-ordered block: DC difference, then
/// run/size AC symbols with ZRL and EOB.
fn encode_block<S: SymbolSink>(
    sink: &mut S,
    scan_index: usize,
    state: &mut ComponentState,
    block: &Block8x8<i16>,
) -> Result<()> {
    let mut zz = [0i16; 64];
    for ni in 0..64 {
        zz[NATURAL_TO_ZIGZAG[ni]] = block[ni];
    }

    let diff = state.take_dc_diff(zz[0] as i32);
    let (bits, size) = encode_value(diff);
    if size > MAX_DC_CATEGORY {
        return Err(JpegError::CoefficientOutOfRange {
            value: diff,
            category: size,
        });
    }
    sink.symbol(scan_index, HuffmanClass::Dc, size, bits, size)?;

    let mut k = 1;
    while k < 64 {
        let mut run = 0usize;
        while k + run < 64 && zz[k + run] == 0 {
            run += 1;
        }
        if k + run >= 64 {
            sink.symbol(scan_index, HuffmanClass::Ac, 0x00, 0, 0)?;
            break;
        }
        while run >= 16 {
            sink.symbol(scan_index, HuffmanClass::Ac, 0xF0, 0, 0)?;
            run -= 16;
            k += 16;
        }
        k += run;
        let (bits, size) = encode_value(zz[k] as i32);
        if size > MAX_AC_CATEGORY {
            return Err(JpegError::CoefficientOutOfRange {
                value: zz[k] as i32,
                category: size,
            });
        }
        sink.symbol(scan_index, HuffmanClass::Ac, ((run as u8) << 4) | size, bits, size)?;
        k += 1;
    }
    Ok(())
}

/// MCU traversal order of one scan.
#[derive(Debug, Clone, Copy)]
struct McuLayout {
    mcus_wide: usize,
    mcus_tall: usize,
    interleaved: bool,
}

impl McuLayout {
    fn new(frame: &FrameInfo, states: &[ComponentState]) -> Self {
        match states {
            [single] => {
                let idx = single.component_index;
                Self {
                    mcus_wide: frame.component_width(idx).div_ceil(8),
                    mcus_tall: frame.component_height(idx).div_ceil(8),
                    interleaved: false,
                }
            }
            _ => Self {
                mcus_wide: frame.mcus_wide as usize,
                mcus_tall: frame.mcus_tall as usize,
                interleaved: true,
            },
        }
    }

    fn mcu_count(&self) -> usize {
        self.mcus_wide * self.mcus_tall
    }

    /// Blocks per MCU (wide, tall) for a scan component.
    fn blocks_per_mcu(&self, state: &ComponentState) -> (usize, usize) {
        if self.interleaved {
            (state.h_sampling as usize, state.v_sampling as usize)
        } else {
            (1, 1)
        }
    }

    /// Visit every block position of one MCU, in coding order.
    fn for_each_block<E>(
        &self,
        mcu: usize,
        states: &mut [ComponentState],
        mut f: impl FnMut(BlockPos, &mut ComponentState) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        let mcu_row = mcu / self.mcus_wide;
        let mcu_col = mcu % self.mcus_wide;
        for (scan_index, state) in states.iter_mut().enumerate() {
            let (bw, bh) = self.blocks_per_mcu(state);
            for v in 0..bh {
                for h in 0..bw {
                    let pos = BlockPos {
                        scan_index,
                        component_index: state.component_index,
                        row: mcu_row * bh + v,
                        col: mcu_col * bw + h,
                    };
                    f(pos, state)?;
                }
            }
        }
        Ok(())
    }
}

/// Resolve the SOS selectors against the frame.
fn scan_states(frame: &FrameInfo, header: &ScanHeader) -> Result<Vec<ComponentState>> {
    let mut states: Vec<ComponentState> = Vec::with_capacity(header.selectors.len());
    for sel in &header.selectors {
        let idx = frame.component_index(sel.component_id)?;
        if states.iter().any(|s| s.component_index == idx) {
            return Err(JpegError::InvalidMarkerData("component repeated in SOS"));
        }
        if sel.dc_table > 3 || sel.ac_table > 3 {
            return Err(JpegError::InvalidMarkerData("SOS table selector out of range"));
        }
        states.push(ComponentState::new(idx, &frame.components[idx], sel.dc_table, sel.ac_table));
    }
    if states.is_empty() {
        return Err(JpegError::InvalidMarkerData("scan without components"));
    }
    // Blocks per interleaved MCU are limited to 10 (B.2.3).
    if states.len() > 1 && states.iter().map(|s| s.h_sampling as usize * s.v_sampling as usize).sum::<usize>() > 10 {
        return Err(JpegError::InvalidMarkerData("more than 10 blocks per MCU"));
    }
    Ok(states)
}

struct DecodeTables<'a> {
    dc: HuffmanDecodeTable,
    ac: HuffmanDecodeTable,
    quant: &'a QuantTable,
}

/// Decoder for one baseline scan.
///
/// Owns its decode accelerators, component states and restart controller;
/// borrows the table pool, which cannot change while the decoder lives.
pub struct ScanDecoder<'a> {
    frame: &'a FrameInfo,
    states: Vec<ComponentState>,
    tables: Vec<DecodeTables<'a>>,
    layout: McuLayout,
    restart: RestartController,
}

impl<'a> ScanDecoder<'a> {
    /// Look up every table the scan needs. Fails with
    /// [`JpegError::TableNotInstalled`] before any data is read.
    pub fn new(params: ScanParams<'a>, pool: &'a TablePool, options: DecodeOptions) -> Result<Self> {
        let states = scan_states(params.frame, params.header)?;
        let tables = states
            .iter()
            .map(|s| {
                Ok(DecodeTables {
                    dc: pool.huffman(HuffmanClass::Dc, s.dc_table)?.decode_table(),
                    ac: pool.huffman(HuffmanClass::Ac, s.ac_table)?.decode_table(),
                    quant: pool.quant(s.quant_table)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            frame: params.frame,
            layout: McuLayout::new(params.frame, &states),
            states,
            tables,
            restart: RestartController::new(params.restart_interval).with_strict(options.strict_restart),
        })
    }

    pub fn components(&self) -> &[ComponentState] {
        &self.states
    }

    fn run(&mut self, reader: &mut BitReader, mut visit: impl FnMut(BlockPos, &Block8x8<i16>)) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let layout = self.layout;
        log::debug!(
            "decoding scan: {} components, {} MCUs, restart interval {}",
            self.states.len(),
            layout.mcu_count(),
            self.restart.interval()
        );
        self.restart.start(reader.position());

        for mcu in 0..layout.mcu_count() {
            if mcu > 0 {
                match self.restart.resync(reader, &mut self.states)? {
                    RestartOutcome::Continue => {}
                    RestartOutcome::Restarted(_) => report.restarts += 1,
                    RestartOutcome::ImplicitBoundary(_) => report.implicit_boundaries += 1,
                    RestartOutcome::Missing => report.missing_restarts += 1,
                }
            }
            let tables = &self.tables;
            layout.for_each_block(mcu, &mut self.states, |pos, state| {
                let t = &tables[pos.scan_index];
                let block = decode_block(reader, &t.dc, &t.ac, state, &mut report);
                visit(pos, &block);
                Ok::<(), JpegError>(())
            })?;
            self.restart.mcu_done();
        }

        report.end_position = reader.position();
        log::debug!(
            "scan done at byte {}: {} blocks, {} restarts",
            report.end_position,
            report.blocks,
            report.restarts
        );
        Ok(report)
    }

    /// Decode quantized coefficients into `grids`, indexed by frame
    /// component. Blocks outside a grid are decoded and dropped.
    pub fn decode_coefficients(&mut self, reader: &mut BitReader, grids: &mut [CoeffGrid]) -> Result<ScanReport> {
        if grids.len() != self.frame.components.len() {
            return Err(JpegError::PlaneMismatch);
        }
        self.run(reader, |pos, block| {
            let grid = &mut grids[pos.component_index];
            if pos.row < grid.blocks_tall() && pos.col < grid.blocks_wide() {
                *grid.block_mut(pos.row, pos.col) = *block;
            }
        })
    }

    /// Decode, dequantize and inverse-transform into `planes`, indexed by
    /// frame component. Each plane must have its component's dimensions.
    pub fn decode_planes(&mut self, reader: &mut BitReader, planes: &mut [Plane]) -> Result<ScanReport> {
        check_planes(self.frame, planes)?;
        let quants: Vec<&QuantTable> = self.tables.iter().map(|t| t.quant).collect();
        self.run(reader, |pos, block| {
            let spatial = inverse_dct(&quants[pos.scan_index].dequantize(block));
            spatial.write_plane(&mut planes[pos.component_index], pos.col * 8, pos.row * 8);
        })
    }
}

fn check_planes(frame: &FrameInfo, planes: &[Plane]) -> Result<()> {
    if planes.len() != frame.components.len() {
        return Err(JpegError::PlaneMismatch);
    }
    for (idx, plane) in planes.iter().enumerate() {
        if plane.width() != frame.component_width(idx) || plane.height() != frame.component_height(idx) {
            return Err(JpegError::PlaneMismatch);
        }
    }
    Ok(())
}

/// Zeroed coefficient grids for every frame component, padded to whole MCUs.
pub fn new_grids(frame: &FrameInfo) -> Vec<CoeffGrid> {
    (0..frame.components.len())
        .map(|i| CoeffGrid::new(frame.blocks_wide(i), frame.blocks_tall(i)))
        .collect()
}

/// Sample planes of every frame component at component resolution.
pub fn new_planes(frame: &FrameInfo) -> Vec<Plane> {
    (0..frame.components.len())
        .map(|i| Plane::new(frame.component_width(i), frame.component_height(i)))
        .collect()
}

/// Decode the entropy-coded data starting at `scan_start` into sample planes.
pub fn decode_scan(
    data: &[u8],
    scan_start: usize,
    params: ScanParams<'_>,
    pool: &TablePool,
    options: DecodeOptions,
    planes: &mut [Plane],
) -> Result<ScanReport> {
    let mut decoder = ScanDecoder::new(params, pool, options)?;
    let mut reader = BitReader::new(data, scan_start);
    decoder.decode_planes(&mut reader, planes)
}

/// Decode the entropy-coded data starting at `scan_start` into coefficient grids.
pub fn decode_scan_coefficients(
    data: &[u8],
    scan_start: usize,
    params: ScanParams<'_>,
    pool: &TablePool,
    options: DecodeOptions,
    grids: &mut [CoeffGrid],
) -> Result<ScanReport> {
    let mut decoder = ScanDecoder::new(params, pool, options)?;
    let mut reader = BitReader::new(data, scan_start);
    decoder.decode_coefficients(&mut reader, grids)
}

/// Encoder for one baseline scan.
pub struct ScanEncoder<'a> {
    frame: &'a FrameInfo,
    states: Vec<ComponentState>,
    layout: McuLayout,
    restart: RestartController,
}

impl<'a> ScanEncoder<'a> {
    pub fn new(params: ScanParams<'a>) -> Result<Self> {
        let states = scan_states(params.frame, params.header)?;
        Ok(Self {
            frame: params.frame,
            layout: McuLayout::new(params.frame, &states),
            states,
            restart: RestartController::new(params.restart_interval),
        })
    }

    fn run<S: SymbolSink>(&mut self, sink: &mut S, mut source: impl FnMut(BlockPos) -> Block8x8<i16>) -> Result<()> {
        let layout = self.layout;
        for mcu in 0..layout.mcu_count() {
            if mcu > 0 {
                sink.boundary(&mut self.restart, &mut self.states);
            }
            layout.for_each_block(mcu, &mut self.states, |pos, state| {
                let block = source(pos);
                encode_block(&mut *sink, pos.scan_index, state, &block)
            })?;
            self.restart.mcu_done();
        }
        Ok(())
    }

    fn huffman_sink(&self, pool: &TablePool) -> Result<HuffmanSink> {
        let tables = self
            .states
            .iter()
            .map(|s| {
                Ok((
                    pool.huffman(HuffmanClass::Dc, s.dc_table)?.encode_table(),
                    pool.huffman(HuffmanClass::Ac, s.ac_table)?.encode_table(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(HuffmanSink {
            writer: BitWriter::new(),
            tables,
        })
    }

    /// Encode quantized coefficient grids (indexed by frame component).
    /// Positions outside a grid encode as zero blocks.
    pub fn encode_coefficients(&mut self, pool: &TablePool, grids: &[CoeffGrid]) -> Result<Vec<u8>> {
        if grids.len() != self.frame.components.len() {
            return Err(JpegError::PlaneMismatch);
        }
        let mut sink = self.huffman_sink(pool)?;
        self.run(&mut sink, |pos| {
            grids[pos.component_index]
                .try_block(pos.row, pos.col)
                .copied()
                .unwrap_or_default()
        })?;
        Ok(sink.writer.finish())
    }

    /// Transform, quantize and encode sample planes (indexed by frame
    /// component, at component resolution).
    pub fn encode_planes(&mut self, pool: &TablePool, planes: &[Plane]) -> Result<Vec<u8>> {
        check_planes(self.frame, planes)?;
        let quants = self
            .states
            .iter()
            .map(|s| pool.quant(s.quant_table))
            .collect::<Result<Vec<_>>>()?;
        let mut sink = self.huffman_sink(pool)?;
        self.run(&mut sink, |pos| {
            let spatial = Block8x8::<f32>::read_plane(&planes[pos.component_index], pos.col * 8, pos.row * 8);
            quants[pos.scan_index].quantize(&forward_dct(&spatial))
        })?;
        Ok(sink.writer.finish())
    }

    /// Count the Huffman symbols encoding `grids` would emit, per table
    /// destination, without producing bits.
    pub fn count_symbols(&mut self, grids: &[CoeffGrid]) -> Result<ScanSymbolCounts> {
        if grids.len() != self.frame.components.len() {
            return Err(JpegError::PlaneMismatch);
        }
        let mut sink = CountingSink {
            counts: ScanSymbolCounts::default(),
            selectors: self.states.iter().map(|s| (s.dc_table, s.ac_table)).collect(),
        };
        self.run(&mut sink, |pos| {
            grids[pos.component_index]
                .try_block(pos.row, pos.col)
                .copied()
                .unwrap_or_default()
        })?;
        Ok(sink.counts)
    }
}

/// Encode sample planes into entropy-coded bytes, with RSTn markers
/// between restart intervals.
pub fn encode_scan(params: ScanParams<'_>, pool: &TablePool, planes: &[Plane]) -> Result<Vec<u8>> {
    ScanEncoder::new(params)?.encode_planes(pool, planes)
}

/// Encode quantized coefficient grids into entropy-coded bytes.
pub fn encode_scan_coefficients(params: ScanParams<'_>, pool: &TablePool, grids: &[CoeffGrid]) -> Result<Vec<u8>> {
    ScanEncoder::new(params)?.encode_coefficients(pool, grids)
}

/// Symbol statistics of a scan, for [`HuffmanTable::optimal`](super::huffman::HuffmanTable::optimal).
pub fn count_symbols(params: ScanParams<'_>, grids: &[CoeffGrid]) -> Result<ScanSymbolCounts> {
    ScanEncoder::new(params)?.count_symbols(grids)
}

/// Quantize every block of a plane into a coefficient grid.
pub fn plane_to_coefficients(plane: &Plane, quant: &QuantTable, blocks_wide: usize, blocks_tall: usize) -> CoeffGrid {
    let mut grid = CoeffGrid::new(blocks_wide, blocks_tall);
    for br in 0..blocks_tall {
        for bc in 0..blocks_wide {
            let spatial = Block8x8::<f32>::read_plane(plane, bc * 8, br * 8);
            *grid.block_mut(br, bc) = quant.quantize(&forward_dct(&spatial));
        }
    }
    grid
}

/// Reconstruct a `width × height` plane from a coefficient grid.
pub fn coefficients_to_plane(grid: &CoeffGrid, quant: &QuantTable, width: usize, height: usize) -> Plane {
    let mut plane = Plane::new(width, height);
    for br in 0..grid.blocks_tall().min(height.div_ceil(8)) {
        for bc in 0..grid.blocks_wide().min(width.div_ceil(8)) {
            let spatial = inverse_dct(&quant.dequantize(grid.block(br, bc)));
            spatial.write_plane(&mut plane, bc * 8, br * 8);
        }
    }
    plane
}

/// One independent scan for [`decode_scans_parallel`].
#[derive(Debug, Clone, Copy)]
pub struct ScanJob<'a> {
    pub data: &'a [u8],
    pub scan_start: usize,
    pub params: ScanParams<'a>,
    /// Tables in effect for this scan.
    pub pool: &'a TablePool,
    pub options: DecodeOptions,
}

impl ScanJob<'_> {
    /// Decode into fresh coefficient grids for every frame component.
    pub fn decode(&self) -> Result<(Vec<CoeffGrid>, ScanReport)> {
        let mut grids = new_grids(self.params.frame);
        let report =
            decode_scan_coefficients(self.data, self.scan_start, self.params, self.pool, self.options, &mut grids)?;
        Ok((grids, report))
    }
}

/// Decode independent scans concurrently.
///
/// Each job gets its own reader, accelerators and component states; table
/// pools are only read. Results are in job order.
pub fn decode_scans_parallel(jobs: &[ScanJob<'_>]) -> Vec<Result<(Vec<CoeffGrid>, ScanReport)>> {
    #[cfg(feature = "parallel")]
    let results: Vec<_> = jobs.par_iter().map(ScanJob::decode).collect();
    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = jobs.iter().map(ScanJob::decode).collect();
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::frame::ComponentInfo;
    use crate::jpeg::huffman::HuffmanTable;
    use crate::jpeg::marker::ScanSelector;

    fn gray_frame(w: u16, h: u16) -> FrameInfo {
        FrameInfo::new(w, h, vec![ComponentInfo::new(1, 1, 1, 0)]).unwrap()
    }

    fn luma_header() -> ScanHeader {
        ScanHeader::baseline(vec![ScanSelector {
            component_id: 1,
            dc_table: 0,
            ac_table: 0,
        }])
    }

    #[test]
    fn eob_first_leaves_ac_zero_and_stops_reading() {
        let pool = TablePool::standard(75).unwrap();
        let dc = pool.huffman(HuffmanClass::Dc, 0).unwrap();
        let ac = pool.huffman(HuffmanClass::Ac, 0).unwrap();

        // DC category 3, value +5, then EOB, then a marker byte we read back.
        let mut w = BitWriter::new();
        let (code, len) = dc.encode_table().encode(3).unwrap();
        w.write_bits(code, len);
        w.write_bits(0b101, 3);
        let (code, len) = ac.encode_table().encode(0x00).unwrap();
        w.write_bits(code, len);
        w.byte_align();
        w.write_bits(0xA5, 8);
        let bytes = w.finish();

        let mut reader = BitReader::new(&bytes, 0);
        let frame = gray_frame(8, 8);
        let mut state = ComponentState::new(0, &frame.components[0], 0, 0);
        let mut report = ScanReport::default();
        let block = decode_block(&mut reader, &dc.decode_table(), &ac.decode_table(), &mut state, &mut report);
        assert_eq!(block[0], 5);
        assert!((1..64).all(|i| block[i] == 0));
        assert!(report.is_clean());
        reader.byte_align();
        assert_eq!(reader.read_bits(8).unwrap(), 0xA5);
    }

    #[test]
    fn block_symbols_round_trip() {
        let pool = TablePool::standard(75).unwrap();
        let frame = gray_frame(8, 8);
        let mut block = Block8x8::<i16>::default();
        block[0] = -37;
        block[1] = 4;
        block[ZIGZAG_TO_NATURAL[20]] = -1;
        // Runs of 18 and 40 zeros need one and two ZRLs.
        block[ZIGZAG_TO_NATURAL[61]] = 300;
        let mut grids = new_grids(&frame);
        *grids[0].block_mut(0, 0) = block;

        let header = luma_header();
        let params = ScanParams {
            frame: &frame,
            header: &header,
            restart_interval: 0,
        };
        let bytes = encode_scan_coefficients(params, &pool, &grids).unwrap();
        let counts = count_symbols(params, &grids).unwrap();
        assert_eq!(counts.ac[0].get(0xF0), 3);
        assert_eq!(counts.ac[0].get(0x00), 1);

        let mut out = new_grids(&frame);
        let report = decode_scan_coefficients(&bytes, 0, params, &pool, DecodeOptions::default(), &mut out).unwrap();
        assert!(report.is_clean());
        assert_eq!(out[0].block(0, 0), &block);
    }

    #[test]
    fn index_overflow_is_clamped() {
        let pool = TablePool::standard(75).unwrap();
        let dc = pool.huffman(HuffmanClass::Dc, 0).unwrap().encode_table();
        let ac = pool.huffman(HuffmanClass::Ac, 0).unwrap().encode_table();
        let mut w = BitWriter::new();
        let (code, len) = dc.encode(0).unwrap();
        w.write_bits(code, len);
        // Three ZRLs take k to 49, then run 15 with size 1 overshoots 63.
        for _ in 0..3 {
            let (code, len) = ac.encode(0xF0).unwrap();
            w.write_bits(code, len);
        }
        let (code, len) = ac.encode(0xF1).unwrap();
        w.write_bits(code, len);
        w.write_bits(1, 1);
        let bytes = w.finish();

        let frame = gray_frame(8, 8);
        let mut state = ComponentState::new(0, &frame.components[0], 0, 0);
        let mut report = ScanReport::default();
        let mut reader = BitReader::new(&bytes, 0);
        let pool_ac = pool.huffman(HuffmanClass::Ac, 0).unwrap().decode_table();
        let pool_dc = pool.huffman(HuffmanClass::Dc, 0).unwrap().decode_table();
        let block = decode_block(&mut reader, &pool_dc, &pool_ac, &mut state, &mut report);
        assert_eq!(report.index_overflows, 1);
        assert_eq!(block[63], 1);
    }

    #[test]
    fn empty_stream_substitutes_predictor() {
        let pool = TablePool::standard(75).unwrap();
        let frame = gray_frame(16, 8);
        let header = luma_header();
        let params = ScanParams {
            frame: &frame,
            header: &header,
            restart_interval: 0,
        };
        let mut grids = new_grids(&frame);
        let report = decode_scan_coefficients(&[], 0, params, &pool, DecodeOptions::default(), &mut grids).unwrap();
        assert!(report.truncated);
        assert_eq!(report.blocks, 2);
        assert!(grids[0].blocks().iter().all(|b| b.as_array().iter().all(|&c| c == 0)));
    }

    #[test]
    fn missing_table_is_reported() {
        let pool = TablePool::new();
        let frame = gray_frame(8, 8);
        let header = luma_header();
        let params = ScanParams {
            frame: &frame,
            header: &header,
            restart_interval: 0,
        };
        let err = ScanDecoder::new(params, &pool, DecodeOptions::default()).err();
        assert!(matches!(err, Some(JpegError::TableNotInstalled { .. })));
    }

    #[test]
    fn non_interleaved_layout_follows_component_size() {
        let frame = FrameInfo::new(
            20,
            20,
            vec![ComponentInfo::new(1, 2, 2, 0), ComponentInfo::new(2, 1, 1, 1)],
        )
        .unwrap();
        let states = scan_states(&frame, &ScanHeader::baseline(vec![ScanSelector {
            component_id: 2,
            dc_table: 1,
            ac_table: 1,
        }]))
        .unwrap();
        let layout = McuLayout::new(&frame, &states);
        // Chroma is 10×10 samples: 2×2 blocks, one per MCU.
        assert_eq!((layout.mcus_wide, layout.mcus_tall), (2, 2));
        assert!(!layout.interleaved);

        let states = scan_states(
            &frame,
            &ScanHeader::baseline(vec![
                ScanSelector { component_id: 1, dc_table: 0, ac_table: 0 },
                ScanSelector { component_id: 2, dc_table: 1, ac_table: 1 },
            ]),
        )
        .unwrap();
        let layout = McuLayout::new(&frame, &states);
        assert_eq!((layout.mcus_wide, layout.mcus_tall), (2, 2));
        assert_eq!(layout.blocks_per_mcu(&states[0]), (2, 2));
    }

    #[test]
    fn categories_beyond_baseline_fail_to_encode() {
        let pool = TablePool::standard(75).unwrap();
        let frame = gray_frame(16, 8);
        let header = luma_header();
        let params = ScanParams {
            frame: &frame,
            header: &header,
            restart_interval: 0,
        };

        // Largest codable values: DC step of 2047 and AC of ±1023.
        let mut grids = new_grids(&frame);
        grids[0].block_mut(0, 0)[0] = 1023;
        grids[0].block_mut(0, 0)[1] = 1023;
        grids[0].block_mut(0, 1)[0] = -1024;
        grids[0].block_mut(0, 1)[8] = -1023;
        let counts = count_symbols(params, &grids).unwrap();
        let mut fitted = TablePool::new();
        for class in [HuffmanClass::Dc, HuffmanClass::Ac] {
            fitted.install_huffman(HuffmanTable::optimal(class, 0, counts.table(class, 0)).unwrap());
        }
        fitted.install_quant(pool.quant(0).unwrap().clone());
        let bytes = encode_scan_coefficients(params, &fitted, &grids).unwrap();
        let mut out = new_grids(&frame);
        let report = decode_scan_coefficients(&bytes, 0, params, &fitted, DecodeOptions::default(), &mut out).unwrap();
        assert!(report.is_clean());
        assert_eq!(out, grids);

        // DC difference of -4094 needs category 12.
        let mut grids = new_grids(&frame);
        grids[0].block_mut(0, 0)[0] = 2047;
        grids[0].block_mut(0, 1)[0] = -2047;
        let expected = Some(JpegError::CoefficientOutOfRange {
            value: -4094,
            category: 12,
        });
        assert_eq!(count_symbols(params, &grids).err(), expected);
        assert_eq!(encode_scan_coefficients(params, &pool, &grids).err(), expected);

        // i16::MIN would spill into the run nibble of the AC symbol.
        let mut grids = new_grids(&frame);
        grids[0].block_mut(0, 0)[1] = i16::MIN;
        assert_eq!(
            count_symbols(params, &grids).err(),
            Some(JpegError::CoefficientOutOfRange {
                value: i16::MIN as i32,
                category: 16,
            })
        );

        grids[0].block_mut(0, 0)[1] = 1024;
        assert!(matches!(
            encode_scan_coefficients(params, &pool, &grids),
            Err(JpegError::CoefficientOutOfRange { category: 11, .. })
        ));
    }

    #[test]
    fn table_selector_out_of_range_is_rejected() {
        let pool = TablePool::standard(75).unwrap();
        let frame = gray_frame(8, 8);
        let grids = new_grids(&frame);
        let expected = Some(JpegError::InvalidMarkerData("SOS table selector out of range"));
        for (dc_table, ac_table) in [(4, 0), (0, 4), (255, 255)] {
            let header = ScanHeader::baseline(vec![ScanSelector {
                component_id: 1,
                dc_table,
                ac_table,
            }]);
            let params = ScanParams {
                frame: &frame,
                header: &header,
                restart_interval: 0,
            };
            assert_eq!(count_symbols(params, &grids).err(), expected);
            assert_eq!(encode_scan_coefficients(params, &pool, &grids).err(), expected);
            assert_eq!(ScanDecoder::new(params, &pool, DecodeOptions::default()).err(), expected);
        }
    }

    #[test]
    fn blocks_per_mcu_limit_applies_to_interleaved_scans() {
        let frame = FrameInfo::new(
            40,
            40,
            vec![ComponentInfo::new(1, 4, 4, 0), ComponentInfo::new(2, 1, 1, 1)],
        )
        .unwrap();
        let both = ScanHeader::baseline(vec![
            ScanSelector { component_id: 1, dc_table: 0, ac_table: 0 },
            ScanSelector { component_id: 2, dc_table: 1, ac_table: 1 },
        ]);
        assert_eq!(
            scan_states(&frame, &both).err(),
            Some(JpegError::InvalidMarkerData("more than 10 blocks per MCU"))
        );

        let luma = ScanHeader::baseline(vec![ScanSelector { component_id: 1, dc_table: 0, ac_table: 0 }]);
        let states = scan_states(&frame, &luma).unwrap();
        let layout = McuLayout::new(&frame, &states);
        assert!(!layout.interleaved);
        assert_eq!((layout.mcus_wide, layout.mcus_tall), (5, 5));
    }
}
