//! ALICE-BPCM: Block-Processing Compressed-Matrix Joint Evaluator
//!
//! > "Pack once. Evaluate every frame."
//! > "Rows that sleep at this LOD are never touched."
//!
//! Evaluates `output = M · input` for a large, sparse, fixed control matrix
//! once per frame, the way facial-rig joint solvers do:
//! - **Blocked storage** → rows packed into 4/8/12/16-lane blocks, coefficients column-interleaved
//! - **Level of detail** → coarser LODs evaluate a nested subset of rows, others stay untouched
//! - **Runtime allocation** → arena-backed instances, DPS (Destination Passing Style)
//!
//! # Core Guarantee
//!
//! Every output row is accumulated the same way regardless of kernel:
//! ```text
//! acc = 0.0;  for each column c in ascending order:  acc += M[r][c] * x[c]
//! ```
//! One multiply and one add per term, no fused multiply-add. Scalar, vector
//! and AVX kernels are therefore bit-identical.
//!
//! # Features
//!
//! - **Block Widths**: 4, 8, 12 and 16 lanes, padded lanes are exact zeros
//! - **LOD Masks**: per-block lane masks, blocks with no active rows skipped
//! - **Zero Allocation**: instances from an [`Arena`], kernels write in place
//! - **Portable SIMD**: `wide::f32x4` lanes, AVX with the `simd` feature
//! - **Batch Evaluation**: many input vectors at once, rayon with `parallel`
//!
//! # Example
//!
//! ```rust
//! use alice_bpcm::prelude::*;
//!
//! // Row 0 stays active at LOD 1; rows 1 and 2 only at LOD 0
//! let lods = LodSpec::from_row_counts(&[3, 1]);
//! let triplets = [(0, 0, 2.0), (1, 1, -1.0), (2, 0, 0.5), (2, 2, 4.0)];
//! let storage = BlockStorage::build(&triplets, 3, 3, &lods)?;
//!
//! let joints = Evaluator::new(storage, CalculationStrategy::detect());
//! let arena = Arena::new(4096);
//!
//! let mut input = joints.create_input_instance(&arena)?;
//! input.set_controls(&[1.0, 2.0, 3.0])?;
//! let mut output = joints.create_instance(&arena)?;
//!
//! joints.calculate(&input, &mut output, 0)?;
//! assert_eq!(output.outputs(), &[2.0, -2.0, 12.5]);
//!
//! // LOD 1 rewrites row 0 only
//! input.set_controls(&[3.0, 0.0, 0.0])?;
//! joints.calculate(&input, &mut output, 1)?;
//! assert_eq!(output.outputs(), &[6.0, -2.0, 12.5]);
//! # Ok::<(), alice_bpcm::Error>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ALICE-BPCM                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  triplets + LodSpec                                             │
//! │        │                                                        │
//! │        ▼                                                        │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │        BlockStorage (immutable, shareable via Arc)       │   │
//! │  │  blocks │ column spans │ interleaved coeffs │ lane masks │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                          │                                      │
//! │                          ▼                                      │
//! │  ┌─────────┐    ┌──────────────────┐    ┌────────────────┐     │
//! │  │  Arena  │───▶│ InputInstance<'a>│───▶│ OutputInstance │     │
//! │  │ (alloc) │    │ (padded, zeroed) │    │ (padded, DPS)  │     │
//! │  └─────────┘    └──────────────────┘    └────────────────┘     │
//! │                          │                                      │
//! │                          ▼                                      │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │   Evaluator: CalculationStrategy + LodPolicy             │   │
//! │  │   Scalar │ Vector (wide::f32x4) │ Avx (__m256 + __m128)  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod arena;
pub mod error;
pub mod evaluator;
pub mod instance;
pub mod kernels;
pub mod lod;
pub mod storage;

#[cfg(test)]
mod fixtures;

// ============================================================================
// Core Re-exports
// ============================================================================

pub use error::{ArenaError, BufferKind, ConfigError, Error, Result};

// Memory
pub use arena::{Arena, ArenaBuffer, MemoryResource, MAX_ALIGN};
#[cfg(feature = "std")]
pub use arena::SyncArena;

// Storage
pub use lod::{Lod, LodSpec, MAX_LODS};
pub use storage::{
    Block,
    BlockStorage,
    BlockWidth,
    BuildOptions,
    ColumnSpan,
    PaddingViolation,
    StorageStats,
};

// Evaluation
pub use evaluator::{Evaluator, EvaluatorConfig, LodPolicy};
pub use instance::{InputInstance, OutputInstance};
pub use kernels::{CalculationStrategy, StrategyKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude
// ============================================================================

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::{Arena, MemoryResource};
    #[cfg(feature = "std")]
    pub use crate::arena::SyncArena;
    pub use crate::evaluator::{Evaluator, EvaluatorConfig, LodPolicy};
    pub use crate::instance::{InputInstance, OutputInstance};
    pub use crate::kernels::{CalculationStrategy, StrategyKind};
    pub use crate::lod::{Lod, LodSpec};
    pub use crate::storage::{BlockStorage, BuildOptions};
}

// ============================================================================
// Tests
// ============================================================================
