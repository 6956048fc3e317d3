//! Evaluator: one storage bound to one calculation strategy
//!
//! The evaluator is read-only after construction. Any number of threads may
//! call [`Evaluator::calculate`] at once as long as each uses its own output
//! buffer.

#[cfg(not(feature = "std"))]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Arc;

use tracing::{debug, trace};

use crate::arena::MemoryResource;
use crate::error::{BufferKind, Error, Result};
use crate::instance::{InputInstance, OutputInstance};
use crate::kernels::{check_extents, CalculationStrategy, StrategyKind};
use crate::lod::Lod;
use crate::storage::BlockStorage;

/// What to do with a LOD beyond the storage's coarsest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LodPolicy {
    /// Fail with [`Error::LodOutOfRange`]
    #[default]
    Reject,
    /// Evaluate at the coarsest LOD instead
    Clamp,
}

/// Evaluator construction settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Kernel to bind
    pub strategy: StrategyKind,
    /// Out-of-range LOD handling
    pub lod_policy: LodPolicy,
}

impl EvaluatorConfig {
    /// Set the kernel
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the LOD policy
    pub fn with_lod_policy(mut self, lod_policy: LodPolicy) -> Self {
        self.lod_policy = lod_policy;
        self
    }
}

/// Block storage bound to a calculation strategy
#[derive(Clone, Debug)]
pub struct Evaluator {
    storage: Arc<BlockStorage>,
    strategy: CalculationStrategy,
    lod_policy: LodPolicy,
}

impl Evaluator {
    /// Bind `storage` to `strategy`, rejecting out-of-range LODs
    pub fn new(storage: impl Into<Arc<BlockStorage>>, strategy: CalculationStrategy) -> Self {
        let storage = storage.into();
        debug!(
            strategy = ?strategy.kind(),
            blocks = storage.blocks().len(),
            lods = storage.lod_count(),
            "evaluator bound"
        );
        Self {
            storage,
            strategy,
            lod_policy: LodPolicy::Reject,
        }
    }

    /// Bind `storage` using `config`
    ///
    /// Fails if the configured strategy is unavailable on this machine.
    pub fn with_config(storage: impl Into<Arc<BlockStorage>>, config: &EvaluatorConfig) -> Result<Self> {
        let strategy = CalculationStrategy::from_kind(config.strategy)?;
        Ok(Self::new(storage, strategy).with_lod_policy(config.lod_policy))
    }

    /// Replace the LOD policy
    pub fn with_lod_policy(mut self, lod_policy: LodPolicy) -> Self {
        self.lod_policy = lod_policy;
        self
    }

    /// Bound storage
    #[inline]
    pub fn storage(&self) -> &BlockStorage {
        &self.storage
    }

    /// Bound strategy
    #[inline]
    pub fn strategy(&self) -> CalculationStrategy {
        self.strategy
    }

    /// Active LOD policy
    #[inline]
    pub fn lod_policy(&self) -> LodPolicy {
        self.lod_policy
    }

    /// Coarsest valid LOD
    #[inline]
    pub fn max_lod(&self) -> Lod {
        self.storage.max_lod()
    }

    /// Zeroed output instance sized for the bound storage
    pub fn create_instance<'a>(&self, arena: &'a dyn MemoryResource) -> Result<OutputInstance<'a>> {
        OutputInstance::new(&self.storage, arena)
    }

    /// Zeroed input instance sized for the bound storage
    pub fn create_input_instance<'a>(&self, arena: &'a dyn MemoryResource) -> Result<InputInstance<'a>> {
        InputInstance::new(&self.storage, arena)
    }

    /// Apply the LOD policy to `lod`
    pub fn resolve_lod(&self, lod: Lod) -> Result<Lod> {
        let max = self.storage.max_lod();
        if lod <= max {
            return Ok(lod);
        }
        match self.lod_policy {
            LodPolicy::Reject => Err(Error::LodOutOfRange { requested: lod, max }),
            LodPolicy::Clamp => {
                trace!(requested = lod, max, "clamping LOD");
                Ok(max)
            }
        }
    }

    /// Evaluate `input` at `lod` into `output`
    ///
    /// Overwrites the rows active at `lod` and leaves every other slot
    /// untouched. Nothing is written on failure.
    pub fn calculate(&self, input: &InputInstance<'_>, output: &mut OutputInstance<'_>, lod: Lod) -> Result<()> {
        self.calculate_slices(input.buffer(), output.buffer_mut(), lod)
    }

    /// [`Evaluator::calculate`] over caller-owned padded slices
    pub fn calculate_slices(&self, input: &[f32], output: &mut [f32], lod: Lod) -> Result<()> {
        check_extents(&self.storage, input.len(), output.len())?;
        let lod = self.resolve_lod(lod)?;
        self.strategy.run(&self.storage, input, output, lod);
        Ok(())
    }

    /// Evaluate `batch_size` input vectors laid out back to back
    ///
    /// `inputs` holds `batch_size × padded_control_count` values and
    /// `outputs` holds `batch_size × padded_output_count`. Runs in parallel
    /// with the `parallel` feature.
    pub fn calculate_batch(&self, inputs: &[f32], outputs: &mut [f32], batch_size: usize, lod: Lod) -> Result<()> {
        let controls = self.storage.padded_control_count();
        let channels = self.storage.padded_output_count();
        check_batch_extent(BufferKind::Input, batch_size, controls, inputs.len())?;
        check_batch_extent(BufferKind::Output, batch_size, channels, outputs.len())?;
        let lod = self.resolve_lod(lod)?;
        if channels == 0 {
            return Ok(());
        }

        let storage = &*self.storage;
        let strategy = self.strategy;
        let evaluate = |(b, y): (usize, &mut [f32])| {
            let x = &inputs[b * controls..(b + 1) * controls];
            strategy.run(storage, x, y, lod);
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            outputs.par_chunks_mut(channels).enumerate().for_each(evaluate);
        }

        #[cfg(not(feature = "parallel"))]
        {
            outputs.chunks_mut(channels).enumerate().for_each(evaluate);
        }

        Ok(())
    }
}

/// `actual` must equal `batch_size × stride`; an overflowing product never matches
fn check_batch_extent(buffer: BufferKind, batch_size: usize, stride: usize, actual: usize) -> Result<()> {
    match batch_size.checked_mul(stride) {
        Some(expected) if expected == actual => Ok(()),
        expected => Err(Error::SizeMismatch {
            buffer,
            expected: expected.unwrap_or(usize::MAX),
            actual,
        }),
    }
}
