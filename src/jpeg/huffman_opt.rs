// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Optimal Huffman tables from symbol statistics (ITU-T T.81 Annex K.2).

use std::cmp::Reverse;
use std::collections::VecDeque;

use super::error::Result;
use super::huffman::{HuffmanClass, HuffmanTable};

/// Occurrence count of each of the 256 symbols of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolCounts {
    counts: [u32; 256],
}

impl Default for SymbolCounts {
    fn default() -> Self {
        Self { counts: [0; 256] }
    }
}

impl SymbolCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: u8) {
        self.counts[symbol as usize] = self.counts[symbol as usize].saturating_add(1);
    }

    pub fn get(&self, symbol: u8) -> u32 {
        self.counts[symbol as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Add the counts of another table.
    pub fn merge(&mut self, other: &SymbolCounts) {
        for (c, o) in self.counts.iter_mut().zip(other.counts.iter()) {
            *c = c.saturating_add(*o);
        }
    }
}

/// Symbol counts of a scan, by Huffman table destination.
#[derive(Debug, Clone, Default)]
pub struct ScanSymbolCounts {
    pub dc: [SymbolCounts; 4],
    pub ac: [SymbolCounts; 4],
}

impl ScanSymbolCounts {
    pub fn table(&self, class: HuffmanClass, id: u8) -> &SymbolCounts {
        match class {
            HuffmanClass::Dc => &self.dc[id as usize],
            HuffmanClass::Ac => &self.ac[id as usize],
        }
    }

    pub(crate) fn table_mut(&mut self, class: HuffmanClass, id: u8) -> &mut SymbolCounts {
        match class {
            HuffmanClass::Dc => &mut self.dc[id as usize],
            HuffmanClass::Ac => &mut self.ac[id as usize],
        }
    }

    /// Add the counts of another scan that shares these destinations.
    pub fn merge(&mut self, other: &ScanSymbolCounts) {
        for (mine, theirs) in self.dc.iter_mut().zip(&other.dc) {
            mine.merge(theirs);
        }
        for (mine, theirs) in self.ac.iter_mut().zip(&other.ac) {
            mine.merge(theirs);
        }
    }
}

/// Reserved symbol that takes the all-ones code and is dropped afterwards.
const PSEUDO_SYMBOL: u16 = 256;

impl HuffmanTable {
    /// Build a canonical table with code lengths ≤ 16 fitted to `counts`.
    ///
    /// Symbols with a zero count get no code. An empty histogram yields a
    /// table holding only symbol 0 (EOB for AC, category 0 for DC).
    pub fn optimal(class: HuffmanClass, id: u8, counts: &SymbolCounts) -> Result<Self> {
        let mut symbols: Vec<(u16, u32)> = counts
            .counts
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(sym, &f)| (sym as u16, f))
            .collect();

        if symbols.is_empty() {
            symbols.push((0, 1));
        }
        if symbols.len() == 1 {
            let mut bits = [0u8; 16];
            bits[0] = 1;
            return HuffmanTable::new(class, id, bits, vec![symbols[0].0 as u8]);
        }

        symbols.push((PSEUDO_SYMBOL, 1));
        let n = symbols.len();

        // Ascending frequency; among equal counts the pseudo-symbol comes
        // first so it is merged first and ends up among the longest codes.
        symbols.sort_by_key(|&(sym, f)| (f, Reverse(sym)));

        let mut lengths = code_lengths(&symbols);
        // The pseudo-symbol (index 0) must hold a longest code.
        if let Some(deepest) = (0..n).max_by_key(|&i| lengths[i]) {
            lengths.swap(0, deepest);
        }

        let max_len = lengths.iter().copied().max().unwrap_or(0);
        let mut bits_count = vec![0u32; max_len + 1];
        for &len in &lengths {
            bits_count[len] += 1;
        }
        let lengths = if max_len > 16 {
            limit_lengths(&mut bits_count);
            // Longest codes go to the least frequent symbols (lowest indices).
            let mut reassigned = Vec::with_capacity(n);
            for len in (1..=16usize).rev() {
                reassigned.extend(std::iter::repeat(len).take(bits_count[len] as usize));
            }
            reassigned
        } else {
            lengths
        };

        // Canonical order: by length, then symbol value. The pseudo-symbol
        // sorts last in the longest length and its code is left unused.
        let mut sym_len: Vec<(u16, usize)> =
            symbols.iter().zip(lengths.iter()).map(|(&(sym, _), &len)| (sym, len)).collect();
        sym_len.sort_by_key(|&(sym, len)| (len, sym));

        let mut bits = [0u8; 16];
        let mut values = Vec::with_capacity(n - 1);
        for &(sym, len) in &sym_len {
            if sym == PSEUDO_SYMBOL {
                continue;
            }
            bits[len - 1] += 1;
            values.push(sym as u8);
        }

        log::debug!(
            "optimal {:?} table {id}: {} symbols, longest code {} bits",
            class,
            values.len(),
            sym_len.last().map_or(0, |&(_, l)| l)
        );
        HuffmanTable::new(class, id, bits, values)
    }
}

/// Huffman code length of each symbol (sorted ascending by frequency),
/// using the two-queue merge.
fn code_lengths(symbols: &[(u16, u32)]) -> Vec<usize> {
    let n = symbols.len();
    let total_nodes = 2 * n - 1;
    let mut parent = vec![0usize; total_nodes];
    let mut next_internal = n;

    let mut leaves: VecDeque<(u64, usize)> =
        symbols.iter().enumerate().map(|(idx, &(_, f))| (f as u64, idx)).collect();
    let mut merged: VecDeque<(u64, usize)> = VecDeque::with_capacity(n);

    let pick_min = |leaves: &mut VecDeque<(u64, usize)>, merged: &mut VecDeque<(u64, usize)>| {
        match (leaves.front().copied(), merged.front().copied()) {
            (Some(a), Some(b)) if a.0 > b.0 => merged.pop_front(),
            (Some(_), _) => leaves.pop_front(),
            (None, _) => merged.pop_front(),
        }
    };

    for _ in 0..(n - 1) {
        let (Some((f1, idx1)), Some((f2, idx2))) =
            (pick_min(&mut leaves, &mut merged), pick_min(&mut leaves, &mut merged))
        else {
            break;
        };
        parent[idx1] = next_internal;
        parent[idx2] = next_internal;
        merged.push_back((f1 + f2, next_internal));
        next_internal += 1;
    }

    let root = total_nodes - 1;
    (0..n)
        .map(|leaf| {
            let mut depth = 0;
            let mut node = leaf;
            while node != root {
                node = parent[node];
                depth += 1;
            }
            depth
        })
        .collect()
}

/// Annex K.3 Adjust_BITS: move codes longer than 16 bits up the tree.
fn limit_lengths(bits_count: &mut Vec<u32>) {
    let mut i = bits_count.len() - 1;
    while i > 16 {
        while bits_count[i] > 0 {
            // Donor level j <= i-2 with a code to split.
            let mut j = i - 2;
            while j > 0 && bits_count[j] == 0 {
                j -= 1;
            }
            if j == 0 {
                bits_count[16] += bits_count[i];
                bits_count[i] = 0;
                break;
            }
            bits_count[i] -= 2;
            bits_count[i - 1] += 1;
            bits_count[j + 1] += 2;
            bits_count[j] -= 1;
        }
        i -= 1;
    }
    bits_count.truncate(17);
}
