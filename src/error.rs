//! Error types for block storage construction and evaluation

use core::fmt;

use thiserror::Error;

use crate::kernels::StrategyKind;

/// Malformed build-time input. Fatal to construction; no partial storage is returned.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Coefficient row index is not below the declared output count
    #[error("coefficient row {row} out of range (output count {output_count})")]
    RowOutOfRange {
        /// Offending row
        row: u32,
        /// Declared output count
        output_count: u32,
    },

    /// Coefficient column index is not below the declared control count
    #[error("coefficient column {column} out of range (control count {control_count})")]
    ColumnOutOfRange {
        /// Offending column
        column: u32,
        /// Declared control count
        control_count: u32,
    },

    /// The same (row, column) pair appears twice in the triplet list
    #[error("duplicate coefficient at ({row}, {column})")]
    DuplicateCoefficient {
        /// Row of the duplicate
        row: u32,
        /// Column of the duplicate
        column: u32,
    },

    /// NaN or infinite coefficient
    #[error("non-finite coefficient at ({row}, {column})")]
    NonFiniteCoefficient {
        /// Row of the coefficient
        row: u32,
        /// Column of the coefficient
        column: u32,
    },

    /// Dense matrix length does not match `output_count * control_count`
    #[error("dense matrix has {actual} values, expected {expected}")]
    DenseShapeMismatch {
        /// `output_count * control_count`
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// No LOD was declared
    #[error("at least one LOD must be declared")]
    NoLods,

    /// More LODs than a LOD index can address
    #[error("{count} LODs declared, at most {max} supported")]
    TooManyLods {
        /// Declared LOD count
        count: usize,
        /// Supported maximum
        max: usize,
    },

    /// A LOD row range reaches past the output count
    #[error("LOD {lod} range {start}..{end} exceeds output count {output_count}")]
    LodRangeOutOfBounds {
        /// LOD the range belongs to
        lod: u16,
        /// Range start
        start: u32,
        /// Range end (exclusive)
        end: u32,
        /// Declared output count
        output_count: u32,
    },

    /// A LOD row range with `start > end`
    #[error("LOD {lod} range {start}..{end} is inverted")]
    InvertedLodRange {
        /// LOD the range belongs to
        lod: u16,
        /// Range start
        start: u32,
        /// Range end (exclusive)
        end: u32,
    },

    /// A coarser LOD activates a row the finer LOD before it does not
    #[error("LOD {lod} activates row {row} which the next finer LOD does not")]
    NonNestedLod {
        /// Coarser LOD
        lod: u16,
        /// Row only active at the coarser LOD
        row: u32,
    },

    /// A row is not active at LOD 0
    #[error("row {row} is not assigned to any LOD")]
    UnassignedRow {
        /// Unassigned row
        row: u32,
    },

    /// Invalid build option value
    #[error("invalid build option: {0}")]
    InvalidOption(&'static str),
}

/// Arena allocation failure
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// Not enough room left for the request
    #[error("arena exhausted: requested {requested} bytes, {remaining} remaining")]
    Exhausted {
        /// Requested bytes (including alignment slack)
        requested: usize,
        /// Bytes left in the arena
        remaining: usize,
    },

    /// Alignment is not a power of two or exceeds the arena's base alignment
    #[error("unsupported alignment {align} (max {max})")]
    UnsupportedAlignment {
        /// Requested alignment
        align: usize,
        /// Arena base alignment
        max: usize,
    },
}

/// Which evaluation buffer a size check failed on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// Control-value buffer
    Input,
    /// Output-channel buffer
    Output,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::Input => f.write_str("input"),
            BufferKind::Output => f.write_str("output"),
        }
    }
}

/// Main error type for alice-bpcm operations
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed build-time input
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Buffer length differs from the storage's padded extent
    #[error("{buffer} buffer has {actual} values, expected {expected}")]
    SizeMismatch {
        /// Buffer that failed the check
        buffer: BufferKind,
        /// Padded extent of the storage
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Requested LOD beyond the storage's maximum
    #[error("LOD {requested} out of range (max {max})")]
    LodOutOfRange {
        /// Requested LOD
        requested: u16,
        /// Coarsest LOD of the storage
        max: u16,
    },

    /// Instance allocation failed
    #[error("arena error: {0}")]
    Arena(#[from] ArenaError),

    /// Requested kernel is not compiled in or not supported by this CPU
    #[error("calculation strategy {0:?} unavailable")]
    StrategyUnavailable(StrategyKind),
}

/// Result type alias for alice-bpcm operations
pub type Result<T> = core::result::Result<T, Error>;
