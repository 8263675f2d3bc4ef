// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Restart interval handling (DRI / RSTn).
//!
//! The controller counts MCUs down from the restart interval. When the
//! count reaches zero the decoder asks it to resynchronize on the next
//! marker, and the encoder asks it to emit one. DC predictors of every
//! scan component are reset at each boundary.

use super::bitio::{BitReader, BitWriter, MarkerCheck};
use super::error::{JpegError, Result};
use super::frame::ComponentState;
use super::marker::RST0;

/// Position of the controller in its restart cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartState {
    /// Restart interval is 0: MCUs are never counted.
    Disabled,
    /// MCUs remain before the next boundary.
    Counting,
    /// The interval is used up; a marker is due before the next MCU.
    AtBoundary,
}

/// What [`RestartController::resync`] found at a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Not at a boundary; nothing read.
    Continue,
    /// RSTn consumed and predictors reset; holds `n`.
    Restarted(u8),
    /// A non-restart marker ends the data. Predictors were reset and the
    /// marker left unconsumed.
    ImplicitBoundary(u8),
    /// No marker at the boundary; decoding goes on without a reset.
    Missing,
}

/// Restart interval countdown shared by the scan decoder and encoder.
#[derive(Debug, Clone)]
pub struct RestartController {
    interval: u16,
    remaining: u16,
    /// Index `n` of the next RSTn marker, 0–7.
    expected: u8,
    /// Byte offset of the last boundary (scan start or marker), for logs.
    bookmark: usize,
    state: RestartState,
    strict: bool,
}

impl RestartController {
    /// Controller for the given interval in MCUs; 0 disables restarts.
    pub fn new(interval: u16) -> Self {
        Self {
            interval,
            remaining: interval,
            expected: 0,
            bookmark: 0,
            state: if interval == 0 {
                RestartState::Disabled
            } else {
                RestartState::Counting
            },
            strict: false,
        }
    }

    /// Treat a wrong or missing restart marker as a hard error.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn interval(&self) -> u16 {
        self.interval
    }

    pub fn state(&self) -> RestartState {
        self.state
    }

    /// Index of the next expected RSTn marker.
    pub fn expected(&self) -> u8 {
        self.expected
    }

    /// Byte offset recorded at the last boundary.
    pub fn bookmark(&self) -> usize {
        self.bookmark
    }

    /// Record the position where entropy-coded data starts.
    pub fn start(&mut self, position: usize) {
        self.bookmark = position;
    }

    /// Count one finished MCU.
    pub fn mcu_done(&mut self) {
        if self.state == RestartState::Counting {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.state = RestartState::AtBoundary;
            }
        }
    }

    pub fn at_boundary(&self) -> bool {
        self.state == RestartState::AtBoundary
    }

    /// Decode side: at a boundary, look for the restart marker and reset
    /// predictors. Call before each MCU except the first.
    pub fn resync(&mut self, reader: &mut BitReader, components: &mut [ComponentState]) -> Result<RestartOutcome> {
        if !self.at_boundary() {
            return Ok(RestartOutcome::Continue);
        }
        self.state = RestartState::Counting;
        self.remaining = self.interval;

        match reader.check_marker() {
            MarkerCheck::Restart(n) => {
                if n != self.expected {
                    if self.strict {
                        return Err(JpegError::RestartSyncLost {
                            expected: self.expected,
                            found: Some(RST0 + n),
                        });
                    }
                    log::warn!("expected RST{} at byte {}, found RST{n}", self.expected, reader.position());
                }
                log::trace!(
                    "RST{n} at byte {} ({} bytes since last boundary)",
                    reader.position(),
                    reader.position().saturating_sub(self.bookmark)
                );
                self.expected = (n + 1) & 7;
                self.bookmark = reader.position();
                reset_predictors(components);
                Ok(RestartOutcome::Restarted(n))
            }
            MarkerCheck::Other(code) => {
                if self.strict {
                    return Err(JpegError::RestartSyncLost {
                        expected: self.expected,
                        found: Some(code),
                    });
                }
                log::warn!(
                    "expected RST{}, found marker 0xFF{code:02X} at byte {}",
                    self.expected,
                    reader.position()
                );
                self.bookmark = reader.position();
                reset_predictors(components);
                Ok(RestartOutcome::ImplicitBoundary(code))
            }
            MarkerCheck::None => {
                if self.strict {
                    return Err(JpegError::RestartSyncLost {
                        expected: self.expected,
                        found: None,
                    });
                }
                log::warn!("missing RST{} near byte {}", self.expected, reader.position());
                Ok(RestartOutcome::Missing)
            }
        }
    }

    /// Encode side: at a boundary, reset predictors and return the index
    /// `n` of the RSTn marker to write. Call before each MCU except the first.
    pub fn next_marker(&mut self, components: &mut [ComponentState]) -> Option<u8> {
        if !self.at_boundary() {
            return None;
        }
        let n = self.expected;
        self.expected = (n + 1) & 7;
        self.state = RestartState::Counting;
        self.remaining = self.interval;
        reset_predictors(components);
        Some(n)
    }

    /// Encode side: write the RSTn marker due at a boundary, if any.
    pub fn emit(&mut self, writer: &mut BitWriter, components: &mut [ComponentState]) -> bool {
        match self.next_marker(components) {
            Some(n) => {
                writer.write_marker(RST0 + n);
                self.bookmark = writer.len();
                true
            }
            None => false,
        }
    }
}

fn reset_predictors(components: &mut [ComponentState]) {
    for c in components.iter_mut() {
        c.reset_predictor();
    }
}
