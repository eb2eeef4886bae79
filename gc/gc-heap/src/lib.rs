//! # Segregated-Fit Heap Allocator
//!
//! This crate provides the allocation substrate for the garbage collector:
//! one contiguous arena carved into fixed-size small-block regions plus a
//! coalescing large-object zone, with a tri-colour mark state bit-packed into
//! every block header.
//!
//! ## Architecture Overview
//!
//! The arena is partitioned front-to-back at initialization:
//!
//! ```text
//! ┌──────────┬──────────┬─────┬──────────┬───────────────────────────────┐
//! │ class 16 │ class 32 │ ... │ class 512│          large zone           │
//! │  region  │  region  │     │  region  │  (one initial free block)     │
//! └──────────┴──────────┴─────┴──────────┴───────────────────────────────┘
//! ^ base                                                                 ^ end
//! ```
//!
//! * **Size-class regions** each own an equal slice of the front half of
//!   the arena and serve fixed-size blocks: a LIFO free list of reclaimed
//!   blocks first, then a bump cursor. Classes never borrow from each
//!   other.
//! * **The large zone** services requests above the largest class
//!   with an early-exit best-fit search over an **address-sorted** free
//!   list, splitting oversized blocks and coalescing adjacent free
//!   neighbours in a single pass.
//! * **Block headers** ([`BlockHeader`]) precede every payload. The header
//!   packs the tri-colour mark state, the size class, and the occupied flag
//!   into one flag word and carries an intrusive `next` link that serves the
//!   per-class free lists, the large live list, and the large free list
//!   (never more than one at a time).
//!
//! ## Sweep
//!
//! The collector determines reachability; reclamation happens here. A sweep
//! walks the large live list and every region, frees each occupied block
//! still coloured `WHITE` or `GRAY`, and on major cycles resets surviving
//! `BLACK` blocks to `WHITE`.
//!
//! ## Safety Model
//!
//! The arena is one exclusively-owned, zero-initialised allocation. All
//! intrusive-list pointers point into it, and every raw-pointer operation is
//! confined to this crate behind documented `# Safety` contracts. Payload
//! pointers handed out by [`Heap::alloc`] remain valid until the block is
//! freed or swept; validating that the *mutator* upholds that lifetime is
//! the embedder's contract, not the allocator's.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod arena;
pub mod config;
mod header;
mod heap;
mod large;
mod region;

pub use arena::{Arena, ArenaError};
pub use header::{BlockHeader, Color, HEADER_SIZE};
pub use heap::{Heap, SweepOutcome};
pub use large::FreeBlocks;
