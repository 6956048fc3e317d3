//! Arena Allocator for Evaluation Instances
//!
//! Instances borrow their buffers from an arena and hand them back on drop,
//! so a buffer is returned on every exit path: normal return, `?` early exit
//! or unwinding. The arena itself never grows.
//!
//! Two threading configurations are provided:
//!
//! | Arena | `allocate` from | Use |
//! |-------|-----------------|-----|
//! | [`Arena`] | one thread (`!Sync`) | one arena per worker thread |
//! | [`SyncArena`] | many threads (internally locked, `std` only) | one arena shared by a pool |

#[cfg(not(feature = "std"))]
use alloc::alloc::{alloc_zeroed, dealloc, handle_alloc_error};
#[cfg(feature = "std")]
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error};

use core::alloc::Layout;
use core::cell::Cell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use crate::error::ArenaError;

/// Base alignment of every arena (one cache line, enough for AVX-512 loads)
pub const MAX_ALIGN: usize = 64;

/// Source of aligned, scoped buffers
///
/// Implementors hand out disjoint byte ranges that stay valid until released.
pub trait MemoryResource {
    /// Allocate `size` zeroed bytes aligned to `align`
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>, ArenaError>;

    /// Return a range obtained from [`MemoryResource::allocate`]
    ///
    /// # Safety
    /// `ptr` and `size` must come from a single earlier `allocate` call on
    /// this resource, and the range must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

// ============================================================================
// Bump state shared by both arena flavours
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct BumpState {
    /// Next free byte
    offset: usize,
    /// Outstanding allocations
    live: usize,
    /// High-water mark in bytes
    peak: usize,
    /// Most recent allocation as (aligned start, offset before alignment)
    top: Option<(usize, usize)>,
}

impl BumpState {
    fn bump(&mut self, capacity: usize, size: usize, align: usize) -> Result<usize, ArenaError> {
        if !align.is_power_of_two() || align > MAX_ALIGN {
            return Err(ArenaError::UnsupportedAlignment { align, max: MAX_ALIGN });
        }

        // Base is MAX_ALIGN-aligned, so aligning the offset aligns the address
        let aligned = (self.offset + align - 1) & !(align - 1);
        let end = aligned.checked_add(size).filter(|&end| end <= capacity);

        match end {
            Some(end) => {
                self.top = Some((aligned, self.offset));
                self.offset = end;
                self.live += 1;
                self.peak = self.peak.max(end);
                Ok(aligned)
            }
            None => Err(ArenaError::Exhausted {
                requested: size.saturating_add(aligned - self.offset),
                remaining: capacity - self.offset,
            }),
        }
    }

    fn release(&mut self, offset: usize, size: usize) {
        debug_assert!(self.live > 0, "release without matching allocate");
        self.live -= 1;
        if self.live == 0 {
            self.offset = 0;
            self.top = None;
        } else if offset + size == self.offset {
            // Top of the stack: roll back, alignment padding included when known
            self.offset = match self.top.take() {
                Some((start, before)) if start == offset => before,
                _ => offset,
            };
        }
    }
}

/// Arena-owned backing memory
struct Backing {
    base: NonNull<u8>,
    capacity: usize,
}

impl Backing {
    fn new(capacity: usize) -> Self {
        let layout = Self::layout(capacity);
        let base = unsafe { alloc_zeroed(layout) };
        let Some(base) = NonNull::new(base) else {
            handle_alloc_error(layout);
        };
        Self { base, capacity }
    }

    fn layout(capacity: usize) -> Layout {
        // Zero-capacity arenas still own one line so `base` is a real allocation
        match Layout::from_size_align(capacity.max(MAX_ALIGN), MAX_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("arena capacity {capacity} overflows a Layout"),
        }
    }

    /// Zeroed pointer to `offset`
    fn hand_out(&self, offset: usize, size: usize) -> NonNull<u8> {
        unsafe {
            let ptr = self.base.as_ptr().add(offset);
            core::ptr::write_bytes(ptr, 0, size);
            NonNull::new_unchecked(ptr)
        }
    }

    fn offset_of(&self, ptr: NonNull<u8>) -> usize {
        ptr.as_ptr() as usize - self.base.as_ptr() as usize
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        unsafe { dealloc(self.base.as_ptr(), Self::layout(self.capacity)) }
    }
}

// ============================================================================
// Arena: single-threaded
// ============================================================================

/// Single-threaded bump arena
///
/// `allocate` takes `&self`, so several instances can be live at once, but the
/// arena is `!Sync`: use one per thread. Memory is reclaimed when the last
/// outstanding buffer is released, or immediately when the most recent one is.
pub struct Arena {
    backing: Backing,
    state: Cell<BumpState>,
}

// Moving the arena moves ownership of the block; no borrow can be live then.
unsafe impl Send for Arena {}

impl Arena {
    /// Create arena with specified capacity (bytes)
    pub fn new(capacity: usize) -> Self {
        Self {
            backing: Backing::new(capacity),
            state: Cell::new(BumpState::default()),
        }
    }

    /// Current usage in bytes
    #[inline]
    pub fn used(&self) -> usize {
        self.state.get().offset
    }

    /// Total capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.backing.capacity
    }

    /// Remaining capacity in bytes
    #[inline]
    pub fn remaining(&self) -> usize {
        self.backing.capacity - self.used()
    }

    /// Number of buffers not yet released
    #[inline]
    pub fn live_allocations(&self) -> usize {
        self.state.get().live
    }

    /// Highest offset ever reached
    #[inline]
    pub fn peak(&self) -> usize {
        self.state.get().peak
    }
}

impl MemoryResource for Arena {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>, ArenaError> {
        let mut state = self.state.get();
        let offset = state.bump(self.backing.capacity, size, align)?;
        self.state.set(state);
        Ok(self.backing.hand_out(offset, size))
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        let mut state = self.state.get();
        state.release(self.backing.offset_of(ptr), size);
        self.state.set(state);
    }
}

impl Default for Arena {
    fn default() -> Self {
        // Default 1MB arena
        Self::new(1024 * 1024)
    }
}

// ============================================================================
// SyncArena: internally synchronized
// ============================================================================

/// Bump arena safe to share between threads
///
/// Same reclamation rules as [`Arena`]; `allocate` and `release` take a lock.
/// Buffers handed out to one thread stay exclusive to it.
#[cfg(feature = "std")]
pub struct SyncArena {
    backing: Backing,
    state: std::sync::Mutex<BumpState>,
}

// The lock serializes every access to the bump state; handed-out ranges are disjoint.
#[cfg(feature = "std")]
unsafe impl Send for SyncArena {}
#[cfg(feature = "std")]
unsafe impl Sync for SyncArena {}

#[cfg(feature = "std")]
impl SyncArena {
    /// Create arena with specified capacity (bytes)
    pub fn new(capacity: usize) -> Self {
        Self {
            backing: Backing::new(capacity),
            state: std::sync::Mutex::new(BumpState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BumpState> {
        // BumpState is updated in one assignment, so a poisoned value is still consistent
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current usage in bytes
    pub fn used(&self) -> usize {
        self.state().offset
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.backing.capacity
    }

    /// Number of buffers not yet released
    pub fn live_allocations(&self) -> usize {
        self.state().live
    }

    /// Highest offset ever reached
    pub fn peak(&self) -> usize {
        self.state().peak
    }
}

#[cfg(feature = "std")]
impl MemoryResource for SyncArena {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>, ArenaError> {
        let offset = self.state().bump(self.backing.capacity, size, align)?;
        Ok(self.backing.hand_out(offset, size))
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        let offset = self.backing.offset_of(ptr);
        self.state().release(offset, size);
    }
}

#[cfg(feature = "std")]
impl Default for SyncArena {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

// ============================================================================
// ArenaBuffer: RAII f32 slice
// ============================================================================

/// Zero-initialized `f32` buffer borrowed from a [`MemoryResource`]
///
/// Released back to its arena when dropped.
pub struct ArenaBuffer<'a> {
    ptr: NonNull<f32>,
    len: usize,
    arena: &'a dyn MemoryResource,
    _marker: PhantomData<&'a mut [f32]>,
}

impl<'a> ArenaBuffer<'a> {
    /// Allocate `len` zeroed floats aligned to [`MAX_ALIGN`]
    pub fn zeroed(arena: &'a dyn MemoryResource, len: usize) -> Result<Self, ArenaError> {
        let size = len
            .checked_mul(core::mem::size_of::<f32>())
            .ok_or(ArenaError::Exhausted { requested: usize::MAX, remaining: 0 })?;
        let ptr = arena.allocate(size, MAX_ALIGN)?;
        Ok(Self {
            ptr: ptr.cast(),
            len,
            arena,
            _marker: PhantomData,
        })
    }

    /// Number of floats
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for ArenaBuffer<'_> {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &[f32] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for ArenaBuffer<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [f32] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for ArenaBuffer<'_> {
    fn drop(&mut self) {
        unsafe {
            self.arena
                .release(self.ptr.cast(), self.len * core::mem::size_of::<f32>())
        }
    }
}

impl core::fmt::Debug for ArenaBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
