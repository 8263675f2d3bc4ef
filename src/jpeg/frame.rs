// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Frame geometry (SOF0) and per-scan component state.
//!
//! [`FrameInfo`] holds image dimensions, component information and sampling
//! factors from the Start of Frame segment. [`ComponentState`] is the
//! mutable per-component state a scan carries from block to block.

use super::error::{JpegError, Result};
use super::marker::SOF0;

/// Information about one image component from SOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Component ID (typically 1=Y, 2=Cb, 3=Cr).
    pub id: u8,
    /// Horizontal sampling factor (1–4).
    pub h_sampling: u8,
    /// Vertical sampling factor (1–4).
    pub v_sampling: u8,
    /// Quantization table ID (0–3).
    pub quant_table_id: u8,
}

impl ComponentInfo {
    pub fn new(id: u8, h_sampling: u8, v_sampling: u8, quant_table_id: u8) -> Self {
        Self {
            id,
            h_sampling,
            v_sampling,
            quant_table_id,
        }
    }
}

/// Frame information from a baseline SOF0 segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    /// Sample precision in bits (must be 8).
    pub precision: u8,
    /// Image height in pixels.
    pub height: u16,
    /// Image width in pixels.
    pub width: u16,
    /// Components in the frame.
    pub components: Vec<ComponentInfo>,
    /// Maximum horizontal sampling factor across all components.
    pub max_h_sampling: u8,
    /// Maximum vertical sampling factor across all components.
    pub max_v_sampling: u8,
    /// Number of MCUs horizontally.
    pub mcus_wide: u16,
    /// Number of MCUs vertically.
    pub mcus_tall: u16,
}

impl FrameInfo {
    /// Validate dimensions and sampling factors and derive MCU geometry.
    pub fn new(width: u16, height: u16, components: Vec<ComponentInfo>) -> Result<Self> {
        if width == 0 || height == 0 || components.is_empty() || components.len() > 4 {
            return Err(JpegError::InvalidDimensions);
        }
        let mut max_h = 0u8;
        let mut max_v = 0u8;
        for (i, c) in components.iter().enumerate() {
            if !(1..=4).contains(&c.h_sampling) || !(1..=4).contains(&c.v_sampling) {
                return Err(JpegError::InvalidDimensions);
            }
            if c.quant_table_id > 3 {
                return Err(JpegError::InvalidQuantTableId(c.quant_table_id));
            }
            if components[..i].iter().any(|o| o.id == c.id) {
                return Err(JpegError::InvalidMarkerData("duplicate component ID"));
            }
            max_h = max_h.max(c.h_sampling);
            max_v = max_v.max(c.v_sampling);
        }

        let mcu_width = max_h as u32 * 8;
        let mcu_height = max_v as u32 * 8;
        Ok(Self {
            precision: 8,
            height,
            width,
            components,
            max_h_sampling: max_h,
            max_v_sampling: max_v,
            mcus_wide: (width as u32).div_ceil(mcu_width) as u16,
            mcus_tall: (height as u32).div_ceil(mcu_height) as u16,
        })
    }

    /// Parse a SOF0 marker segment body (after the 2-byte length).
    pub fn parse_sof(data: &[u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(JpegError::InvalidMarkerData("truncated SOF"));
        }
        let precision = data[0];
        if precision != 8 {
            return Err(JpegError::UnsupportedPrecision(precision));
        }
        let height = u16::from_be_bytes([data[1], data[2]]);
        let width = u16::from_be_bytes([data[3], data[4]]);
        let num_components = data[5] as usize;
        let body = data
            .get(6..6 + num_components * 3)
            .ok_or(JpegError::InvalidMarkerData("truncated SOF"))?;

        let components = body
            .chunks_exact(3)
            .map(|c| ComponentInfo::new(c[0], c[1] >> 4, c[1] & 0x0F, c[2]))
            .collect();
        Self::new(width, height, components)
    }

    /// Serialize as a complete SOF0 segment (marker, length, body).
    pub fn to_sof_bytes(&self) -> Vec<u8> {
        let length = 2 + 6 + self.components.len() * 3;
        let mut out = Vec::with_capacity(2 + length);
        out.extend_from_slice(&[0xFF, SOF0]);
        out.extend_from_slice(&(length as u16).to_be_bytes());
        out.push(self.precision);
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.width.to_be_bytes());
        out.push(self.components.len() as u8);
        for c in &self.components {
            out.push(c.id);
            out.push((c.h_sampling << 4) | c.v_sampling);
            out.push(c.quant_table_id);
        }
        out
    }

    /// Index of the component with the given id.
    pub fn component_index(&self, id: u8) -> Result<usize> {
        self.components
            .iter()
            .position(|c| c.id == id)
            .ok_or(JpegError::UnknownComponentId(id))
    }

    /// Number of 8×8 blocks wide for a given component, padded to whole MCUs.
    pub fn blocks_wide(&self, comp_idx: usize) -> usize {
        let comp = &self.components[comp_idx];
        (self.mcus_wide as usize) * (comp.h_sampling as usize)
    }

    /// Number of 8×8 blocks tall for a given component, padded to whole MCUs.
    pub fn blocks_tall(&self, comp_idx: usize) -> usize {
        let comp = &self.components[comp_idx];
        (self.mcus_tall as usize) * (comp.v_sampling as usize)
    }

    /// Component width in samples: `ceil(width * h / max_h)` (A.1.1).
    pub fn component_width(&self, comp_idx: usize) -> usize {
        let h = self.components[comp_idx].h_sampling as usize;
        (self.width as usize * h).div_ceil(self.max_h_sampling as usize)
    }

    /// Component height in samples: `ceil(height * v / max_v)`.
    pub fn component_height(&self, comp_idx: usize) -> usize {
        let v = self.components[comp_idx].v_sampling as usize;
        (self.height as usize * v).div_ceil(self.max_v_sampling as usize)
    }
}

/// Mutable state of one component within a scan.
///
/// The DC predictor starts at 0 and changes only through DC coding and
/// restart handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentState {
    /// Index into [`FrameInfo::components`].
    pub component_index: usize,
    pub id: u8,
    pub h_sampling: u8,
    pub v_sampling: u8,
    /// Quantization table destination.
    pub quant_table: u8,
    /// DC Huffman table destination.
    pub dc_table: u8,
    /// AC Huffman table destination.
    pub ac_table: u8,
    dc_predictor: i32,
}

impl ComponentState {
    pub fn new(component_index: usize, info: &ComponentInfo, dc_table: u8, ac_table: u8) -> Self {
        Self {
            component_index,
            id: info.id,
            h_sampling: info.h_sampling,
            v_sampling: info.v_sampling,
            quant_table: info.quant_table_id,
            dc_table,
            ac_table,
            dc_predictor: 0,
        }
    }

    pub fn dc_predictor(&self) -> i32 {
        self.dc_predictor
    }

    /// Decode side: add a DC difference to the predictor and return the new DC.
    pub(crate) fn apply_dc_diff(&mut self, diff: i32) -> i32 {
        self.dc_predictor = self.dc_predictor.saturating_add(diff);
        self.dc_predictor
    }

    /// Encode side: return `dc - predictor` and make `dc` the new predictor.
    pub(crate) fn take_dc_diff(&mut self, dc: i32) -> i32 {
        let diff = dc - self.dc_predictor;
        self.dc_predictor = dc;
        diff
    }

    pub(crate) fn reset_predictor(&mut self) {
        self.dc_predictor = 0;
    }
}
