//! Calculation Strategies: the hot path
//!
//! Every kernel walks the blocks active at the requested LOD and overwrites
//! the output rows of their active lanes. All kernels use Destination Passing
//! Style: the output buffer is caller-owned and nothing is allocated.
//!
//! # Bit-exactness
//!
//! Each row is computed as
//!
//! ```text
//! acc = 0.0
//! for col in block columns (ascending):
//!     acc = acc + (coeff[row, col] * input[col])
//! ```
//!
//! with a separate multiply and add, never a fused one. The scalar kernel runs
//! this per row; the vector kernels run it for all `W` lanes at once. Because
//! every lane sees the same operations in the same order, all strategies
//! produce identical bits.
//!
//! Width dispatch happens once per block; the per-column loop is
//! monomorphized for `W ∈ {4, 8, 12, 16}`.

use wide::f32x4;

use crate::error::{BufferKind, Error, Result};
use crate::lod::Lod;
use crate::storage::{BlockStorage, BlockWidth, ColumnSpan};

/// Largest block width; sizes the per-block lane scratch
const MAX_LANES: usize = 16;

/// Kernel selector used in configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// One row at a time, plain `f32` arithmetic
    Scalar,
    /// Portable 4-lane SIMD (`wide::f32x4`)
    Vector,
    /// 8-lane AVX (x86_64, `simd` feature, runtime-detected)
    Avx,
    /// Best kernel available on this CPU
    #[default]
    Auto,
}

/// Bound computation kernel
///
/// Stateless: the same value can drive any number of concurrent evaluations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalculationStrategy {
    /// Row-at-a-time reference kernel
    Scalar,
    /// Portable 4-lane SIMD kernel
    Vector,
    /// AVX kernel; the token proves the CPU supports it
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    Avx(simd::AvxToken),
}

impl CalculationStrategy {
    /// Strategy for `kind`
    ///
    /// Fails with [`Error::StrategyUnavailable`] when `kind` is `Avx` and the
    /// kernel is not compiled in or the CPU lacks AVX.
    pub fn from_kind(kind: StrategyKind) -> Result<Self> {
        match kind {
            StrategyKind::Scalar => Ok(Self::Scalar),
            StrategyKind::Vector => Ok(Self::Vector),
            StrategyKind::Avx => Self::avx().ok_or(Error::StrategyUnavailable(kind)),
            StrategyKind::Auto => Ok(Self::detect()),
        }
    }

    /// Fastest strategy this CPU supports
    pub fn detect() -> Self {
        Self::avx().unwrap_or(Self::Vector)
    }

    /// AVX strategy, if compiled in and supported
    pub fn avx() -> Option<Self> {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        {
            simd::AvxToken::detect().map(Self::Avx)
        }
        #[cfg(not(all(target_arch = "x86_64", feature = "simd")))]
        {
            None
        }
    }

    /// Every strategy usable on this machine, scalar first
    pub fn available() -> impl Iterator<Item = Self> {
        [Some(Self::Scalar), Some(Self::Vector), Self::avx()].into_iter().flatten()
    }

    /// Selector this strategy corresponds to
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Scalar => StrategyKind::Scalar,
            Self::Vector => StrategyKind::Vector,
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            Self::Avx(_) => StrategyKind::Avx,
        }
    }

    /// Evaluate `storage` at `lod` into `output`
    ///
    /// `input` and `output` must have the storage's padded lengths and `lod`
    /// must not exceed `storage.max_lod()`. Nothing is written on failure.
    /// Only rows active at `lod` are written.
    pub fn calculate(&self, storage: &BlockStorage, input: &[f32], output: &mut [f32], lod: Lod) -> Result<()> {
        check_extents(storage, input.len(), output.len())?;
        if lod > storage.max_lod() {
            return Err(Error::LodOutOfRange { requested: lod, max: storage.max_lod() });
        }
        self.run(storage, input, output, lod);
        Ok(())
    }

    /// Evaluate without checks; extents and `lod` are already validated
    #[inline]
    pub(crate) fn run(&self, storage: &BlockStorage, input: &[f32], output: &mut [f32], lod: Lod) {
        match self {
            Self::Scalar => calculate_scalar(storage, input, output, lod),
            Self::Vector => calculate_vector(storage, input, output, lod),
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            Self::Avx(_) => unsafe { simd::calculate_avx(storage, input, output, lod) },
        }
    }
}

impl Default for CalculationStrategy {
    fn default() -> Self {
        Self::detect()
    }
}

/// Check buffer lengths against the storage's padded extents
pub(crate) fn check_extents(storage: &BlockStorage, input: usize, output: usize) -> Result<()> {
    if input != storage.padded_control_count() {
        return Err(Error::SizeMismatch {
            buffer: BufferKind::Input,
            expected: storage.padded_control_count(),
            actual: input,
        });
    }
    if output != storage.padded_output_count() {
        return Err(Error::SizeMismatch {
            buffer: BufferKind::Output,
            expected: storage.padded_output_count(),
            actual: output,
        });
    }
    Ok(())
}

/// Call `$kernel::<W>` for the block's width
macro_rules! dispatch_width {
    ($width:expr, $kernel:ident ( $($arg:expr),* $(,)? )) => {
        match $width {
            BlockWidth::W4 => $kernel::<4>($($arg),*),
            BlockWidth::W8 => $kernel::<8>($($arg),*),
            BlockWidth::W12 => $kernel::<12>($($arg),*),
            BlockWidth::W16 => $kernel::<16>($($arg),*),
        }
    };
}

/// Write the active lanes of a block result
///
/// Padding lanes are never written, so blocks never touch rows they do not own.
#[inline(always)]
fn store_lanes<const W: usize>(lanes: &[f32; MAX_LANES], mask: u16, output: &mut [f32]) {
    if u32::from(mask) == (1u32 << W) - 1 {
        output[..W].copy_from_slice(&lanes[..W]);
    } else {
        let mut bits = mask;
        while bits != 0 {
            let lane = bits.trailing_zeros() as usize;
            output[lane] = lanes[lane];
            bits &= bits - 1;
        }
    }
}

// ============================================================================
// Scalar
// ============================================================================

fn calculate_scalar(storage: &BlockStorage, input: &[f32], output: &mut [f32], lod: Lod) {
    for block in storage.blocks() {
        let mask = storage.lane_mask(block, lod);
        if mask == 0 {
            continue;
        }
        let coefficients = storage.block_coefficients(block);
        let spans = storage.block_spans(block);
        let out = &mut output[block.output_offset()..];
        dispatch_width!(block.width(), block_scalar(coefficients, spans, input, mask, out));
    }
}

#[inline]
fn block_scalar<const W: usize>(
    coefficients: &[f32],
    spans: &[ColumnSpan],
    input: &[f32],
    mask: u16,
    output: &mut [f32],
) {
    let mut bits = mask;
    while bits != 0 {
        let lane = bits.trailing_zeros() as usize;
        bits &= bits - 1;

        let mut acc = 0.0f32;
        let columns = spans.iter().flat_map(ColumnSpan::indices);
        for (column, row_values) in columns.zip(coefficients.chunks_exact(W)) {
            acc += row_values[lane] * input[column];
        }
        output[lane] = acc;
    }
}

// ============================================================================
// Vector (portable, 4 lanes)
// ============================================================================

fn calculate_vector(storage: &BlockStorage, input: &[f32], output: &mut [f32], lod: Lod) {
    for block in storage.blocks() {
        let mask = storage.lane_mask(block, lod);
        if mask == 0 {
            continue;
        }
        let coefficients = storage.block_coefficients(block);
        let spans = storage.block_spans(block);
        let out = &mut output[block.output_offset()..];
        dispatch_width!(block.width(), block_vector(coefficients, spans, input, mask, out));
    }
}

#[inline]
fn block_vector<const W: usize>(
    coefficients: &[f32],
    spans: &[ColumnSpan],
    input: &[f32],
    mask: u16,
    output: &mut [f32],
) {
    let chunks = W / 4;
    let mut acc = [f32x4::ZERO; MAX_LANES / 4];

    let columns = spans.iter().flat_map(ColumnSpan::indices);
    for (column, row_values) in columns.zip(coefficients.chunks_exact(W)) {
        let x = f32x4::splat(input[column]);
        for (chunk, acc) in acc[..chunks].iter_mut().enumerate() {
            let base = chunk * 4;
            let w = f32x4::from([
                row_values[base],
                row_values[base + 1],
                row_values[base + 2],
                row_values[base + 3],
            ]);
            *acc = *acc + w * x;
        }
    }

    let mut lanes = [0.0f32; MAX_LANES];
    for (chunk, acc) in acc[..chunks].iter().enumerate() {
        lanes[chunk * 4..chunk * 4 + 4].copy_from_slice(&acc.to_array());
    }
    store_lanes::<W>(&lanes, mask, output);
}

// ============================================================================
// AVX Kernel
// ============================================================================

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
pub mod simd {
    use super::*;
    use core::arch::x86_64::*;

    /// Proof that the running CPU supports AVX
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct AvxToken(());

    impl AvxToken {
        /// Token if AVX is available
        pub fn detect() -> Option<Self> {
            if is_x86_feature_detected!("avx") {
                Some(Self(()))
            } else {
                None
            }
        }
    }

    /// AVX evaluation of every active block
    ///
    /// # Safety
    /// The CPU must support AVX (guaranteed by holding an [`AvxToken`]).
    #[target_feature(enable = "avx")]
    pub(crate) unsafe fn calculate_avx(storage: &BlockStorage, input: &[f32], output: &mut [f32], lod: Lod) {
        for block in storage.blocks() {
            let mask = storage.lane_mask(block, lod);
            if mask == 0 {
                continue;
            }
            let coefficients = storage.block_coefficients(block);
            let spans = storage.block_spans(block);
            let out = &mut output[block.output_offset()..];
            dispatch_width!(block.width(), block_avx(coefficients, spans, input, mask, out));
        }
    }

    /// 8-lane registers, plus one 4-lane register when `W % 8 == 4`
    #[inline]
    #[target_feature(enable = "avx")]
    unsafe fn block_avx<const W: usize>(
        coefficients: &[f32],
        spans: &[ColumnSpan],
        input: &[f32],
        mask: u16,
        output: &mut [f32],
    ) {
        let wide = W / 8;
        let tail = W % 8 == 4;
        let mut acc8 = [_mm256_setzero_ps(); MAX_LANES / 8];
        let mut acc4 = _mm_setzero_ps();

        let columns = spans.iter().flat_map(ColumnSpan::indices);
        for (column, row_values) in columns.zip(coefficients.chunks_exact(W)) {
            let x = input[column];
            let ptr = row_values.as_ptr();

            let x8 = _mm256_set1_ps(x);
            for (chunk, acc) in acc8[..wide].iter_mut().enumerate() {
                let w = _mm256_loadu_ps(ptr.add(chunk * 8));
                *acc = _mm256_add_ps(*acc, _mm256_mul_ps(w, x8));
            }
            if tail {
                let w = _mm_loadu_ps(ptr.add(wide * 8));
                acc4 = _mm_add_ps(acc4, _mm_mul_ps(w, _mm_set1_ps(x)));
            }
        }

        let mut lanes = [0.0f32; MAX_LANES];
        for (chunk, acc) in acc8[..wide].iter().enumerate() {
            _mm256_storeu_ps(lanes.as_mut_ptr().add(chunk * 8), *acc);
        }
        if tail {
            _mm_storeu_ps(lanes.as_mut_ptr().add(wide * 8), acc4);
        }
        store_lanes::<W>(&lanes, mask, output);
    }
}

// ============================================================================
// Tests
// ============================================================================
