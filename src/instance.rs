//! Input/Output Instances: arena-backed evaluation buffers
//!
//! Instances are shaped to a storage's padded extents and borrow their memory
//! from an arena. Lifetime `'a` ties them to the arena, and dropping an
//! instance returns its buffer.

use crate::arena::{ArenaBuffer, MemoryResource};
use crate::error::{BufferKind, Error, Result};
use crate::storage::BlockStorage;

/// Control-value buffer for one evaluation
#[derive(Debug)]
pub struct InputInstance<'a> {
    buffer: ArenaBuffer<'a>,
    control_count: usize,
}

impl<'a> InputInstance<'a> {
    /// Allocate a zeroed input buffer for `storage`
    pub fn new(storage: &BlockStorage, arena: &'a dyn MemoryResource) -> Result<Self> {
        Ok(Self {
            buffer: ArenaBuffer::zeroed(arena, storage.padded_control_count())?,
            control_count: storage.control_count(),
        })
    }

    /// Caller-visible control values
    #[inline]
    pub fn controls(&self) -> &[f32] {
        &self.buffer[..self.control_count]
    }

    /// Mutable caller-visible control values
    #[inline]
    pub fn controls_mut(&mut self) -> &mut [f32] {
        &mut self.buffer[..self.control_count]
    }

    /// Copy `values` into the control slots
    ///
    /// `values` must hold exactly `control_count` entries.
    pub fn set_controls(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.control_count {
            return Err(Error::SizeMismatch {
                buffer: BufferKind::Input,
                expected: self.control_count,
                actual: values.len(),
            });
        }
        self.controls_mut().copy_from_slice(values);
        Ok(())
    }

    /// Full padded buffer
    #[inline]
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    /// Mutable full padded buffer
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }

    /// Padded length
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Output-channel buffer for one evaluation
///
/// Starts zeroed. `calculate` overwrites only the rows active at the
/// requested LOD; everything else keeps its previous value.
#[derive(Debug)]
pub struct OutputInstance<'a> {
    buffer: ArenaBuffer<'a>,
    output_count: usize,
}

impl<'a> OutputInstance<'a> {
    /// Allocate a zeroed output buffer for `storage`
    pub fn new(storage: &BlockStorage, arena: &'a dyn MemoryResource) -> Result<Self> {
        Ok(Self {
            buffer: ArenaBuffer::zeroed(arena, storage.padded_output_count())?,
            output_count: storage.output_count(),
        })
    }

    /// Caller-visible output channels
    #[inline]
    pub fn outputs(&self) -> &[f32] {
        &self.buffer[..self.output_count]
    }

    /// Full padded buffer
    #[inline]
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }

    /// Mutable full padded buffer
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.buffer
    }

    /// Reset every channel to `0.0`
    #[inline]
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
    }

    /// Padded length
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
