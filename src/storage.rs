//! Block Storage: block-compressed influence matrix
//!
//! The matrix maps control values (columns) to output channels (rows). Rows
//! are grouped into blocks of `W ∈ {4, 8, 12, 16}` lanes, one lane per output
//! row. Each block reads one or more contiguous column spans of the input.
//!
//! # Layout
//!
//! ```text
//! block coefficients (column-interleaved, W lanes per column):
//!
//!   span 0: col a     [r0 r1 r2 .. rW-1]
//!           col a+1   [r0 r1 r2 .. rW-1]
//!   span 1: col b     [r0 r1 r2 .. rW-1]
//!           ...
//! ```
//!
//! Lanes past `row_count` are padding and hold exact `0.0`. A kernel can load
//! every column as full `W`-lane vectors and still sum each row's products in
//! ascending column order, the same order the scalar kernel uses.
//!
//! Storage is immutable once built and safe to share between threads.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use core::ops::Range;

use thiserror::Error;
use tracing::debug;

use crate::error::ConfigError;
use crate::lod::{Lod, LodSpec};

/// Alignment unit of the padded control/output extents
pub const LANE_UNIT: usize = 4;

// ============================================================================
// Block geometry
// ============================================================================

/// Number of output-row lanes in a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum BlockWidth {
    /// One SSE / NEON register
    W4 = 4,
    /// One AVX register
    W8 = 8,
    /// AVX + SSE register
    W12 = 12,
    /// Two AVX registers / one AVX-512 register
    W16 = 16,
}

impl BlockWidth {
    /// All widths, narrowest first
    pub const ALL: [BlockWidth; 4] = [BlockWidth::W4, BlockWidth::W8, BlockWidth::W12, BlockWidth::W16];

    /// Lane count
    #[inline(always)]
    pub const fn lanes(self) -> usize {
        self as usize
    }

    /// Narrowest width with at least `rows` lanes (capped at 16)
    pub const fn fit(rows: usize) -> Self {
        match rows {
            0..=4 => BlockWidth::W4,
            5..=8 => BlockWidth::W8,
            9..=12 => BlockWidth::W12,
            _ => BlockWidth::W16,
        }
    }

    /// Lane mask with every lane set
    #[inline(always)]
    pub const fn full_mask(self) -> u16 {
        ((1u32 << self.lanes()) - 1) as u16
    }

    const fn index(self) -> usize {
        self.lanes() / LANE_UNIT - 1
    }
}

/// Contiguous run of input columns read by a block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpan {
    /// First column
    pub start: u32,
    /// One past the last column
    pub end: u32,
}

impl ColumnSpan {
    /// Number of columns
    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Column indices as `usize`
    #[inline]
    pub fn indices(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// One block of the compressed matrix
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    width: BlockWidth,
    output_offset: u32,
    row_count: u16,
    max_lod: Lod,
    column_count: u32,
    coefficient_offset: usize,
    spans: Range<u32>,
    masks: Range<u32>,
}

impl Block {
    /// Lane count
    #[inline]
    pub fn width(&self) -> BlockWidth {
        self.width
    }

    /// First output row
    #[inline]
    pub fn output_offset(&self) -> usize {
        self.output_offset as usize
    }

    /// Real (unpadded) rows
    #[inline]
    pub fn row_count(&self) -> usize {
        self.row_count as usize
    }

    /// Output rows covered by real lanes
    #[inline]
    pub fn output_rows(&self) -> Range<usize> {
        self.output_offset()..self.output_offset() + self.row_count()
    }

    /// Coarsest LOD at which any row of the block is active
    #[inline]
    pub fn max_lod(&self) -> Lod {
        self.max_lod
    }

    /// Columns read across all spans
    #[inline]
    pub fn column_count(&self) -> usize {
        self.column_count as usize
    }

    /// Stored coefficients including padding lanes
    #[inline]
    pub fn coefficient_count(&self) -> usize {
        self.column_count() * self.width.lanes()
    }
}

/// First non-zero padding coefficient found by [`BlockStorage::verify_padding`]
#[derive(Clone, Copy, Debug, PartialEq, Error)]
#[error("padding lane {lane} of block {block} holds {value} at column {column}")]
pub struct PaddingViolation {
    /// Block index
    pub block: usize,
    /// Padding lane
    pub lane: usize,
    /// Input column
    pub column: u32,
    /// Offending value
    pub value: f32,
}

/// Block partitioning knobs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// A run of this many all-zero rows splits a row run; shorter runs are
    /// absorbed and computed as `0.0`
    pub row_gap: usize,
    /// A run of this many all-zero columns splits a column span; shorter
    /// runs are stored as zero coefficients
    pub column_gap: usize,
}

impl BuildOptions {
    /// Set the row gap
    pub fn with_row_gap(mut self, row_gap: usize) -> Self {
        self.row_gap = row_gap;
        self
    }

    /// Set the column gap
    pub fn with_column_gap(mut self, column_gap: usize) -> Self {
        self.column_gap = column_gap;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.row_gap == 0 {
            return Err(ConfigError::InvalidOption("row_gap must be at least 1"));
        }
        if self.column_gap == 0 {
            return Err(ConfigError::InvalidOption("column_gap must be at least 1"));
        }
        Ok(())
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { row_gap: 4, column_gap: 4 }
    }
}

/// Storage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of blocks
    pub block_count: usize,
    /// Blocks per width, indexed like [`BlockWidth::ALL`]
    pub blocks_per_width: [usize; 4],
    /// Coefficients stored, padding included
    pub stored_coefficients: usize,
    /// Coefficients in padding lanes
    pub padding_coefficients: usize,
    /// Non-zero coefficients
    pub nonzero_coefficients: usize,
}

impl StorageStats {
    /// Fraction of stored coefficients that are padding
    pub fn padding_ratio(&self) -> f32 {
        if self.stored_coefficients == 0 {
            0.0
        } else {
            self.padding_coefficients as f32 / self.stored_coefficients as f32
        }
    }

    /// Blocks of `width`
    pub fn blocks_of(&self, width: BlockWidth) -> usize {
        self.blocks_per_width[width.index()]
    }
}

// ============================================================================
// BlockStorage
// ============================================================================

/// Immutable block-compressed influence matrix
#[derive(Clone, Debug)]
pub struct BlockStorage {
    blocks: Vec<Block>,
    coefficients: Vec<f32>,
    spans: Vec<ColumnSpan>,
    /// `lod_count` lane masks per block
    lane_masks: Vec<u16>,
    row_lods: Vec<Lod>,
    control_count: u32,
    output_count: u32,
    padded_control_count: usize,
    padded_output_count: usize,
    lod_count: usize,
}

impl BlockStorage {
    /// Build from `(row, column, value)` triplets with default [`BuildOptions`]
    pub fn build(
        triplets: &[(u32, u32, f32)],
        control_count: u32,
        output_count: u32,
        lods: &LodSpec,
    ) -> Result<Self, ConfigError> {
        Self::build_with(triplets, control_count, output_count, lods, &BuildOptions::default())
    }

    /// Build from a row-major dense `output_count × control_count` matrix
    pub fn from_dense(
        values: &[f32],
        control_count: u32,
        output_count: u32,
        lods: &LodSpec,
        options: &BuildOptions,
    ) -> Result<Self, ConfigError> {
        let expected = control_count as usize * output_count as usize;
        if values.len() != expected {
            return Err(ConfigError::DenseShapeMismatch { expected, actual: values.len() });
        }

        let columns = control_count.max(1) as usize;
        let triplets: Vec<(u32, u32, f32)> = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| ((i / columns) as u32, (i % columns) as u32, v))
            .collect();

        Self::build_with(&triplets, control_count, output_count, lods, options)
    }

    /// Build from `(row, column, value)` triplets
    ///
    /// Zero-valued triplets are dropped. Fails on out-of-range indices,
    /// duplicate or non-finite coefficients, and malformed LODs.
    pub fn build_with(
        triplets: &[(u32, u32, f32)],
        control_count: u32,
        output_count: u32,
        lods: &LodSpec,
        options: &BuildOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let row_lods = lods.resolve(output_count)?;
        let lod_count = lods.lod_count();

        let entries = sorted_entries(triplets, control_count, output_count)?;

        // CSR row pointers over the sorted entries
        let mut row_ptr = vec![0usize; output_count as usize + 1];
        for &(row, _, _) in &entries {
            row_ptr[row as usize + 1] += 1;
        }
        for row in 0..output_count as usize {
            row_ptr[row + 1] += row_ptr[row];
        }

        let mut builder = Builder {
            entries: &entries,
            row_ptr: &row_ptr,
            row_lods: &row_lods,
            lod_count,
            column_gap: options.column_gap,
            blocks: Vec::new(),
            coefficients: Vec::new(),
            spans: Vec::new(),
            lane_masks: Vec::new(),
        };

        for run in row_runs(&row_ptr, options.row_gap) {
            let mut start = run.start;
            while start < run.end {
                let remaining = run.end - start;
                let width = BlockWidth::fit(remaining);
                let rows = remaining.min(width.lanes());
                builder.push_block(start, rows, width);
                start += rows;
            }
        }

        let padded_output_count = builder
            .blocks
            .iter()
            .map(|b| b.output_offset() + b.width.lanes())
            .fold(round_up(output_count as usize, LANE_UNIT), usize::max);

        let storage = Self {
            blocks: builder.blocks,
            coefficients: builder.coefficients,
            spans: builder.spans,
            lane_masks: builder.lane_masks,
            row_lods,
            control_count,
            output_count,
            padded_control_count: round_up(control_count as usize, LANE_UNIT),
            padded_output_count,
            lod_count,
        };

        let stats = storage.stats();
        debug!(
            blocks = stats.block_count,
            controls = control_count,
            outputs = output_count,
            padded_controls = storage.padded_control_count,
            padded_outputs = storage.padded_output_count,
            lods = lod_count,
            padding_ratio = stats.padding_ratio(),
            "built block storage"
        );

        Ok(storage)
    }

    /// Caller-visible control count
    #[inline]
    pub fn control_count(&self) -> usize {
        self.control_count as usize
    }

    /// Caller-visible output count
    #[inline]
    pub fn output_count(&self) -> usize {
        self.output_count as usize
    }

    /// Input buffer length required by `calculate`
    #[inline]
    pub fn padded_control_count(&self) -> usize {
        self.padded_control_count
    }

    /// Output buffer length required by `calculate`
    #[inline]
    pub fn padded_output_count(&self) -> usize {
        self.padded_output_count
    }

    /// Number of declared LODs
    #[inline]
    pub fn lod_count(&self) -> usize {
        self.lod_count
    }

    /// Coarsest valid LOD
    #[inline]
    pub fn max_lod(&self) -> Lod {
        (self.lod_count - 1) as Lod
    }

    /// Blocks in evaluation order
    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Coarsest LOD at which `row` is computed
    #[inline]
    pub fn row_lod(&self, row: usize) -> Lod {
        self.row_lods[row]
    }

    /// Rows computed when evaluating at `lod`
    pub fn active_rows(&self, lod: Lod) -> impl Iterator<Item = usize> + '_ {
        self.row_lods
            .iter()
            .enumerate()
            .filter(move |(_, &rank)| rank >= lod)
            .map(|(row, _)| row)
    }

    /// Stored coefficient at `(row, column)`, `0.0` if not stored
    pub fn coefficient(&self, row: usize, column: usize) -> f32 {
        let index = self.blocks.partition_point(|b| b.output_offset() <= row);
        let Some(block) = index.checked_sub(1).map(|i| &self.blocks[i]) else {
            return 0.0;
        };
        if !block.output_rows().contains(&row) {
            return 0.0;
        }

        let lane = row - block.output_offset();
        let lanes = block.width.lanes();
        let mut base = 0;
        for span in self.block_spans(block) {
            if span.indices().contains(&column) {
                let k = base + (column - span.start as usize);
                return self.block_coefficients(block)[k * lanes + lane];
            }
            base += span.len();
        }
        0.0
    }

    /// Check that every padding lane holds exact `+0.0`
    pub fn verify_padding(&self) -> Result<(), PaddingViolation> {
        for (index, block) in self.blocks.iter().enumerate() {
            let lanes = block.width.lanes();
            let columns = self.block_spans(block).iter().flat_map(ColumnSpan::indices);
            let rows = self.block_coefficients(block).chunks_exact(lanes);

            for (column, row_values) in columns.zip(rows) {
                for lane in block.row_count()..lanes {
                    let value = row_values[lane];
                    if value.to_bits() != 0 {
                        return Err(PaddingViolation {
                            block: index,
                            lane,
                            column: column as u32,
                            value,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Compute storage statistics
    pub fn stats(&self) -> StorageStats {
        let mut stats = StorageStats {
            block_count: self.blocks.len(),
            stored_coefficients: self.coefficients.len(),
            nonzero_coefficients: self.coefficients.iter().filter(|&&v| v != 0.0).count(),
            ..Default::default()
        };
        for block in &self.blocks {
            stats.blocks_per_width[block.width.index()] += 1;
            stats.padding_coefficients +=
                block.column_count() * (block.width.lanes() - block.row_count());
        }
        stats
    }

    // ------------------------------------------------------------------------
    // Layout accessors for the kernels
    // ------------------------------------------------------------------------

    /// Column-interleaved coefficients of `block` (`column_count × W`)
    #[inline(always)]
    pub(crate) fn block_coefficients(&self, block: &Block) -> &[f32] {
        &self.coefficients[block.coefficient_offset..block.coefficient_offset + block.coefficient_count()]
    }

    /// Column spans of `block`, ascending
    #[inline(always)]
    pub(crate) fn block_spans(&self, block: &Block) -> &[ColumnSpan] {
        &self.spans[block.spans.start as usize..block.spans.end as usize]
    }

    /// Lanes of `block` computed at `lod`; zero when `lod > max_lod`
    #[inline(always)]
    pub(crate) fn lane_mask(&self, block: &Block, lod: Lod) -> u16 {
        let masks = &self.lane_masks[block.masks.start as usize..block.masks.end as usize];
        masks.get(lod as usize).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn coefficients_mut(&mut self) -> &mut [f32] {
        &mut self.coefficients
    }
}

// ============================================================================
// Build helpers
// ============================================================================

#[inline]
fn round_up(value: usize, unit: usize) -> usize {
    value.div_ceil(unit) * unit
}

/// Validate triplets and sort them by (row, column), dropping zeros
fn sorted_entries(
    triplets: &[(u32, u32, f32)],
    control_count: u32,
    output_count: u32,
) -> Result<Vec<(u32, u32, f32)>, ConfigError> {
    for &(row, column, value) in triplets {
        if row >= output_count {
            return Err(ConfigError::RowOutOfRange { row, output_count });
        }
        if column >= control_count {
            return Err(ConfigError::ColumnOutOfRange { column, control_count });
        }
        if !value.is_finite() {
            return Err(ConfigError::NonFiniteCoefficient { row, column });
        }
    }

    let mut entries = triplets.to_vec();
    entries.sort_by_key(|&(row, column, _)| (row, column));
    if let Some(pair) = entries
        .windows(2)
        .find(|pair| (pair[0].0, pair[0].1) == (pair[1].0, pair[1].1))
    {
        return Err(ConfigError::DuplicateCoefficient { row: pair[0].0, column: pair[0].1 });
    }

    entries.retain(|&(_, _, value)| value != 0.0);
    Ok(entries)
}

/// Row ranges of non-empty rows; gaps shorter than `row_gap` are absorbed
fn row_runs(row_ptr: &[usize], row_gap: usize) -> Vec<Range<usize>> {
    let mut runs: Vec<Range<usize>> = Vec::new();
    let rows = row_ptr.len() - 1;

    for row in (0..rows).filter(|&r| row_ptr[r + 1] > row_ptr[r]) {
        match runs.last_mut() {
            Some(run) if row - run.end < row_gap => run.end = row + 1,
            _ => runs.push(row..row + 1),
        }
    }
    runs
}

struct Builder<'a> {
    entries: &'a [(u32, u32, f32)],
    row_ptr: &'a [usize],
    row_lods: &'a [Lod],
    lod_count: usize,
    column_gap: usize,
    blocks: Vec<Block>,
    coefficients: Vec<f32>,
    spans: Vec<ColumnSpan>,
    lane_masks: Vec<u16>,
}

impl<'a> Builder<'a> {
    fn row_entries(&self, row: usize) -> &'a [(u32, u32, f32)] {
        let entries = self.entries;
        &entries[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    fn push_block(&mut self, first_row: usize, rows: usize, width: BlockWidth) {
        let lanes = width.lanes();

        // Column spans over the union of the block's non-zero columns
        let mut columns: Vec<u32> = (first_row..first_row + rows)
            .flat_map(|row| self.row_entries(row).iter().map(|&(_, column, _)| column))
            .collect();
        columns.sort_unstable();
        columns.dedup();

        let span_start = self.spans.len();
        let mut current: Option<ColumnSpan> = None;
        for &column in &columns {
            if let Some(span) = current.as_mut() {
                if ((column - span.end) as usize) < self.column_gap {
                    span.end = column + 1;
                    continue;
                }
            }
            self.spans.extend(current.replace(ColumnSpan { start: column, end: column + 1 }));
        }
        self.spans.extend(current);
        let spans = span_start..self.spans.len();

        // Column-interleaved coefficients; lanes past `rows` stay 0.0
        let coefficient_offset = self.coefficients.len();
        let column_count: usize = self.spans[spans.clone()].iter().map(ColumnSpan::len).sum();
        self.coefficients.resize(coefficient_offset + column_count * lanes, 0.0);

        for lane in 0..rows {
            let mut cursor = self.row_entries(first_row + lane).iter().peekable();
            let mut k = 0;
            for span in &self.spans[spans.clone()] {
                for column in span.start..span.end {
                    if let Some(&(_, _, value)) = cursor.next_if(|&&(_, c, _)| c == column) {
                        self.coefficients[coefficient_offset + k * lanes + lane] = value;
                    }
                    k += 1;
                }
            }
        }

        // Lane masks per LOD
        let mask_start = self.lane_masks.len();
        let row_lods = self.row_lods;
        let row_lods = &row_lods[first_row..first_row + rows];
        for lod in 0..self.lod_count {
            let mask = row_lods
                .iter()
                .enumerate()
                .filter(|(_, &rank)| rank as usize >= lod)
                .fold(0u16, |mask, (lane, _)| mask | (1 << lane));
            self.lane_masks.push(mask);
        }
        let max_lod = row_lods.iter().copied().max().unwrap_or(0);

        self.blocks.push(Block {
            width,
            output_offset: first_row as u32,
            row_count: rows as u16,
            max_lod,
            column_count: column_count as u32,
            coefficient_offset,
            spans: span_start as u32..self.spans.len() as u32,
            masks: mask_start as u32..self.lane_masks.len() as u32,
        });
    }
}
