//! # Conservative Incremental Mark–Sweep Collector
//!
//! A tri-colour, conservative, incremental, non-moving garbage collector
//! over the segregated-fit heap of [`gc_heap`]. The embedder gives no
//! layout metadata: live objects are scanned word-by-word and any bit
//! pattern resolving to an occupied block is treated as a pointer.
//!
//! ## Collection State Machine
//!
//! ```text
//!           allocate enough    ┌────────────┐ step drains
//!  IDLE ───────────────────→   │  MARKING   │  worklist
//!           triggers step      └────┬───────┘
//!                                   │ worklist empty OR full collect invoked
//!                                   ▼
//!                              ┌────────────┐
//!                              │  SWEEPING  │
//!                              └────┬───────┘
//!                                   │
//!                                   ▼
//!                                 IDLE   (cycle counter++, bytes := 0)
//! ```
//!
//! [`Gc::allocate`] interleaves the collector with the mutator: once enough
//! bytes have been allocated it performs one bounded mark step, and every
//! [`ALLOCATION_COLLECT_INTERVAL`](config::ALLOCATION_COLLECT_INTERVAL)
//! allocations it runs a full stop-the-world cycle: major every
//! [`FULL_COLLECTION_INTERVAL`](config::FULL_COLLECTION_INTERVAL)th cycle,
//! minor otherwise.
//!
//! ## Mutator Contract
//!
//! - Push every locally-held payload pointer with [`Gc::push_root`] before
//!   any call that might allocate, pop with [`Gc::pop_roots`] on return.
//! - Call [`Gc::write_barrier`] on a container object **after** storing a
//!   pointer into it.
//!
//! Violating either rule is a use-after-free waiting to happen in the
//! mutator, not in the collector.
//!
//! ## Example
//!
//! ```rust
//! use gc_collector::Gc;
//!
//! let mut gc = Gc::with_heap_size(1024 * 1024).expect("arena");
//! let obj = gc.allocate(64).expect("allocation");
//! unsafe { gc.push_root(obj) };
//!
//! gc.collect(true);
//! assert_eq!(gc.allocated_bytes(), 64);
//!
//! // Dropping the only root lets the next major cycle reclaim the object.
//! gc.pop_roots(1);
//! gc.collect(true);
//! assert_eq!(gc.allocated_bytes(), 0);
//! ```
//!
//! ## Scheduling Model
//!
//! Single-threaded and cooperative: the mutator thread is the collector
//! thread, all collector work happens synchronously inside [`Gc::allocate`]
//! or [`Gc::collect`], and the API is not re-entrant. Dropping the
//! collector releases the arena.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod config;
mod cycle;
mod roots;
mod stats;

use crate::config::{
    ALLOCATION_COLLECT_INTERVAL, FULL_COLLECTION_INTERVAL, INCREMENTAL_MARK_BYTES,
    MINOR_COLLECTION_INTERVAL,
};
use crate::roots::RootSet;
use alloc::vec::Vec;
use core::ptr::NonNull;
use gc_heap::config::DEFAULT_HEAP_SIZE;
use log::debug;

pub use gc_heap::{ArenaError, Color, Heap, SweepOutcome};
pub use stats::GcStats;

/// Error raised while constructing a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GcError {
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// The garbage collector: heap, shadow stack, gray worklist, and the
/// policy counters, owned as one value.
///
/// There is deliberately no global instance: embedders thread a `Gc`
/// through their code (or wrap one in their own cell), and tests run as
/// many independent arenas as they like.
pub struct Gc {
    heap: Heap,
    roots: RootSet,
    worklist: Vec<NonNull<u8>>,
    bytes_since_collection: u64,
    total_allocations: u64,
    cycle_count: u64,
    /// Scan cursor into the root set: roots below this index were shaded by
    /// the previous cycle.
    prev_root_size: usize,
    cycle_in_progress: bool,
}

// Safety: every pointer held by the collector points into the exclusively
// owned arena; nothing is shared.
unsafe impl Send for Gc {}

impl Gc {
    /// Collector over a default-sized arena
    /// ([`DEFAULT_HEAP_SIZE`](gc_heap::config::DEFAULT_HEAP_SIZE)).
    ///
    /// # Errors
    /// [`GcError::Arena`] if the arena cannot be reserved.
    pub fn new() -> Result<Self, GcError> {
        Self::with_heap_size(DEFAULT_HEAP_SIZE)
    }

    /// Collector over an arena of `heap_size` bytes.
    ///
    /// # Errors
    /// [`GcError::Arena`] if the arena cannot be reserved or partitioned.
    pub fn with_heap_size(heap_size: usize) -> Result<Self, GcError> {
        Ok(Self {
            heap: Heap::new(heap_size)?,
            roots: RootSet::default(),
            worklist: Vec::new(),
            bytes_since_collection: 0,
            total_allocations: 0,
            cycle_count: 0,
            prev_root_size: 0,
            cycle_in_progress: false,
        })
    }

    /// Allocate `size` payload bytes, interleaving collector work.
    ///
    /// Per the policy: one incremental mark step once
    /// [`INCREMENTAL_MARK_BYTES`](config::INCREMENTAL_MARK_BYTES) have been
    /// allocated since the last collection, and a full cycle every
    /// [`ALLOCATION_COLLECT_INTERVAL`](config::ALLOCATION_COLLECT_INTERVAL)
    /// allocations. Returns `None` on exhaustion.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if self.bytes_since_collection >= INCREMENTAL_MARK_BYTES {
            self.incremental_mark_step();
        }
        if self.total_allocations > 0
            && self.total_allocations.is_multiple_of(ALLOCATION_COLLECT_INTERVAL)
        {
            let force_major = self.cycle_count.is_multiple_of(FULL_COLLECTION_INTERVAL);
            self.collect(force_major);
        }

        let ptr = self.heap.alloc(size);
        if ptr.is_some() {
            self.bytes_since_collection += size as u64;
            self.total_allocations += 1;
        }
        ptr
    }

    /// Resize an object, preserving `min(old, new)` payload bytes.
    ///
    /// Tries the heap's realloc first (in place when the block already
    /// accommodates `new_size`); if the heap is exhausted, falls back to
    /// [`allocate`](Self::allocate), which may collect, and copies. The
    /// old block is left for the collector in the fallback case.
    ///
    /// # Safety
    /// `ptr` must be a live payload pointer of this collector's heap, and
    /// must be rooted if the caller still needs it across the potential
    /// collection.
    pub unsafe fn reallocate(&mut self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        unsafe {
            let old_size = self.heap.payload_size(ptr);
            if let Some(resized) = self.heap.realloc(ptr, new_size) {
                return Some(resized);
            }
            let fresh = self.allocate(new_size)?;
            core::ptr::copy_nonoverlapping(ptr.as_ptr(), fresh.as_ptr(), old_size.min(new_size));
            Some(fresh)
        }
    }

    /// Push a root onto the shadow stack.
    ///
    /// # Safety
    /// `root` must be a payload pointer of this collector's heap; it is
    /// appended unvalidated and will be traced from at the next mark phase.
    pub unsafe fn push_root(&mut self, root: NonNull<u8>) {
        self.roots.push(root);
    }

    /// Pop the last `count` roots, clamping at empty.
    pub fn pop_roots(&mut self, count: usize) {
        self.roots.pop_many(count);
        // Never let the minor-cycle cursor skip a root slot that may be
        // reused by a future push.
        self.prev_root_size = self.prev_root_size.min(self.roots.len());
    }

    /// Insertion write barrier: call after overwriting a pointer field of
    /// `obj`.
    ///
    /// A `WHITE` container is promoted to `GRAY` so it stays out of the
    /// current cycle's white set; a `BLACK` container re-enters the
    /// worklist as `DARK_GRAY` because it may now reference unvisited
    /// children. `GRAY` and `DARK_GRAY` containers are already pending.
    ///
    /// # Safety
    /// `obj` must be a live payload pointer of this collector's heap.
    pub unsafe fn write_barrier(&mut self, obj: NonNull<u8>) {
        match unsafe { self.heap.color_of(obj) } {
            Color::Gray | Color::DarkGray => {}
            Color::White => unsafe { self.heap.set_color(obj, Color::Gray) },
            Color::Black => {
                unsafe { self.heap.set_color(obj, Color::DarkGray) };
                self.worklist.push(obj);
            }
        }
    }

    /// Run one full stop-the-world collection cycle.
    ///
    /// The cycle is major when forced or when the cycle counter is a
    /// multiple of
    /// [`MINOR_COLLECTION_INTERVAL`](config::MINOR_COLLECTION_INTERVAL);
    /// otherwise minor. Marking starts from all roots (major) or the roots
    /// registered since the previous cycle (minor), the worklist is drained
    /// completely, unreached blocks are swept, and the large free list is
    /// coalesced.
    ///
    /// A major sweep resets surviving `BLACK` blocks to `WHITE`, so the
    /// cycle that follows re-marks from all roots: the root cursor is reset
    /// after a major cycle and advanced after a minor one. Garbage that was
    /// `BLACK` when a major cycle ran is therefore reclaimed one cycle
    /// later.
    pub fn collect(&mut self, force_major: bool) {
        let minor = !force_major && !self.cycle_count.is_multiple_of(MINOR_COLLECTION_INTERVAL);
        self.start_mark_phase(minor);
        let marked = self.drain_worklist(0);
        let swept = self.heap.sweep(!minor);
        self.cycle_in_progress = false;
        self.bytes_since_collection = 0;
        self.cycle_count += 1;
        self.prev_root_size = if minor { self.roots.len() } else { 0 };
        self.heap.coalesce();
        self.heap.debug_validate();
        debug!(
            "{} collection: {marked} objects marked, {} blocks swept ({} bytes)",
            if minor { "minor" } else { "major" },
            swept.freed_blocks,
            swept.freed_bytes
        );
    }

    /// Live payload bytes currently allocated.
    #[inline]
    #[must_use]
    pub const fn allocated_bytes(&self) -> usize {
        self.heap.allocated_bytes()
    }

    /// Arena bytes not currently allocated to payloads.
    #[inline]
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.heap.free_bytes()
    }

    /// Whether a mark phase has started and not yet been completed by a
    /// full collection.
    #[inline]
    #[must_use]
    pub const fn is_marking(&self) -> bool {
        self.cycle_in_progress
    }

    /// Current shadow-stack depth.
    #[inline]
    #[must_use]
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> GcStats {
        GcStats {
            cycles: self.cycle_count,
            total_allocations: self.total_allocations,
            bytes_since_collection: self.bytes_since_collection,
            allocated_bytes: self.heap.allocated_bytes(),
            free_bytes: self.heap.free_bytes(),
        }
    }

    /// Colour of a live object.
    ///
    /// # Safety
    /// `ptr` must be a live payload pointer of this collector's heap.
    #[inline]
    pub unsafe fn color_of(&self, ptr: NonNull<u8>) -> Color {
        unsafe { self.heap.color_of(ptr) }
    }

    /// Read-only view of the underlying heap.
    #[inline]
    #[must_use]
    pub const fn heap(&self) -> &Heap {
        &self.heap
    }
}
