use crate::arena::{Arena, ArenaError};
use crate::config::{ALIGNMENT, MIN_HEAP_SIZE, NUM_CLASSES, SIZE_CLASSES, size_class_for};
use crate::header::{BlockHeader, Color, HEADER_SIZE};
use crate::large::{FreeBlocks, LargeZone};
use crate::region::Region;
use core::ptr::NonNull;
use gc_addresses::{HeapAddress, align_down, align_up};
use log::debug;

/// Tally of one sweep pass over the whole heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub freed_blocks: usize,
    pub freed_bytes: usize,
}

/// The segregated-fit heap: one arena, one region per size class, one
/// large-object zone, and the running payload-byte tally.
///
/// All blocks handed out carry a [`BlockHeader`] immediately before the
/// payload; the header accessors ([`Heap::color_of`] and friends) and the
/// conservative candidate probe ([`Heap::resolve_candidate`]) are what the
/// collector builds its tracing on.
pub struct Heap {
    arena: Arena,
    regions: [Region; NUM_CLASSES],
    large: LargeZone,
    allocated: usize,
}

// Safety: all intrusive-list pointers point into the exclusively-owned
// arena; the heap is never aliased across threads by the collector.
unsafe impl Send for Heap {}

impl Heap {
    /// Partition a fresh arena of `size` bytes.
    ///
    /// The front half is split into [`NUM_CLASSES`] equal regions, one per
    /// size class; the remainder becomes the large zone's single initial
    /// free block.
    ///
    /// # Errors
    /// [`ArenaError::TooSmall`] below [`MIN_HEAP_SIZE`];
    /// [`ArenaError::ReserveFailed`] if the reservation itself fails.
    pub fn new(size: usize) -> Result<Self, ArenaError> {
        if size < MIN_HEAP_SIZE {
            return Err(ArenaError::TooSmall {
                got: size,
                min: MIN_HEAP_SIZE,
            });
        }
        let arena = Arena::new(size)?;
        let region_size = align_up(size / 2 / NUM_CLASSES, ALIGNMENT);
        let mut cur = arena.base();
        let regions = core::array::from_fn(|class| {
            let region = Region::new(cur, region_size, class as u8);
            cur += region_size;
            region
        });
        let large = LargeZone::new(cur, arena.end());
        debug!(
            "heap: {size} bytes at {}, {NUM_CLASSES} regions of {region_size} bytes, large zone {} bytes",
            arena.base(),
            arena.end().offset_from(cur)
        );
        Ok(Self {
            arena,
            regions,
            large,
            allocated: 0,
        })
    }

    /// Allocate `size` payload bytes, rounded up to [`ALIGNMENT`].
    ///
    /// Requests up to the largest size class go to that class's region (and
    /// only that region); anything bigger goes to the large zone. Returns
    /// `None` on exhaustion; it never panics and never aborts.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let size = align_up(size, ALIGNMENT);

        if let Some(class) = size_class_for(size) {
            let ptr = self.regions[class].alloc()?;
            self.allocated += SIZE_CLASSES[class];
            Some(ptr)
        } else {
            let ptr = self.large.alloc(size)?;
            // The carved block may be larger than the request when the
            // remainder was not worth splitting off.
            self.allocated += unsafe { (*BlockHeader::of_payload(ptr)).size() };
            Some(ptr)
        }
    }

    /// Return a block to its free protocol: class free list for small
    /// blocks, address-sorted large free list for large ones.
    ///
    /// Freeing an already-free block is a no-op.
    ///
    /// # Safety
    /// `ptr` must be a payload pointer previously returned by
    /// [`alloc`](Self::alloc) or [`realloc`](Self::realloc) on this heap.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        unsafe {
            let hdr = BlockHeader::of_payload(ptr);
            if !(*hdr).occupied() {
                return;
            }
            self.allocated -= (*hdr).size();
            if (*hdr).is_large() {
                self.large.free(hdr);
            } else {
                self.regions[(*hdr).size_class() as usize].push_free(hdr);
            }
        }
    }

    /// Resize a block.
    ///
    /// If the block already accommodates `new_size` the same pointer comes
    /// straight back; otherwise a new block is allocated, the old payload is
    /// copied, and the old block is freed. Returns `None` (old block
    /// untouched) when the grow allocation fails.
    ///
    /// # Safety
    /// `ptr` must be a live payload pointer of this heap.
    pub unsafe fn realloc(&mut self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        unsafe {
            let hdr = BlockHeader::of_payload(ptr);
            let old_size = (*hdr).size();
            if align_up(new_size, ALIGNMENT) <= old_size {
                return Some(ptr);
            }
            let new = self.alloc(new_size)?;
            core::ptr::copy_nonoverlapping(ptr.as_ptr(), new.as_ptr(), old_size);
            self.free(ptr);
            Some(new)
        }
    }

    /// Sweep the whole heap per the tri-colour protocol: the large live
    /// list first, then every region. `major` also resets surviving
    /// `BLACK` blocks to `WHITE`.
    pub fn sweep(&mut self, major: bool) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let (blocks, bytes) = self.large.sweep(major);
        outcome.freed_blocks += blocks;
        outcome.freed_bytes += bytes;
        for region in &mut self.regions {
            let (blocks, bytes) = region.sweep(major);
            outcome.freed_blocks += blocks;
            outcome.freed_bytes += bytes;
        }
        self.allocated -= outcome.freed_bytes;
        outcome
    }

    /// Merge adjacent free large blocks in one pass.
    pub fn coalesce(&mut self) {
        self.large.coalesce();
    }

    /// Validate a conservatively-found candidate word.
    ///
    /// `word` is a potential payload address: it must point into the arena,
    /// the header it implies (after aligning the word down) must also lie in
    /// the arena, and that header must be occupied. Anything else is a
    /// non-pointer. False positives merely retain a block for a cycle;
    /// false negatives cannot occur for payload addresses this heap handed
    /// out.
    #[must_use]
    pub fn resolve_candidate(&self, word: usize) -> Option<NonNull<u8>> {
        let base = self.arena.base().as_usize();
        let end = self.arena.end().as_usize();
        if word < base || word >= end {
            return None;
        }
        let payload = align_down(word, ALIGNMENT);
        if payload < base + HEADER_SIZE {
            return None;
        }
        let hdr = (payload - HEADER_SIZE) as *const BlockHeader;
        // In-bounds read of arena memory; an all-zero bit pattern reads as
        // a free block and is rejected by the occupied check.
        if unsafe { (*hdr).occupied() } {
            NonNull::new(payload as *mut u8)
        } else {
            None
        }
    }

    /// Colour of a live block.
    ///
    /// # Safety
    /// `ptr` must be a live payload pointer of this heap.
    #[inline]
    pub unsafe fn color_of(&self, ptr: NonNull<u8>) -> Color {
        unsafe { (*BlockHeader::of_payload(ptr)).color() }
    }

    /// Recolour a live block.
    ///
    /// # Safety
    /// `ptr` must be a live payload pointer of this heap.
    #[inline]
    pub unsafe fn set_color(&mut self, ptr: NonNull<u8>, color: Color) {
        unsafe { (*BlockHeader::of_payload(ptr)).set_color(color) }
    }

    /// Payload size of a live block in bytes.
    ///
    /// # Safety
    /// `ptr` must be a live payload pointer of this heap.
    #[inline]
    #[must_use]
    pub unsafe fn payload_size(&self, ptr: NonNull<u8>) -> usize {
        unsafe { (*BlockHeader::of_payload(ptr)).size() }
    }

    /// Live payload bytes currently allocated.
    #[inline]
    #[must_use]
    pub const fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Arena bytes not currently allocated to payloads.
    #[inline]
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.arena.size() - self.allocated
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.arena.size()
    }

    #[inline]
    #[must_use]
    pub fn base(&self) -> HeapAddress {
        self.arena.base()
    }

    #[inline]
    #[must_use]
    pub fn end(&self) -> HeapAddress {
        self.arena.end()
    }

    /// Iterate the large-zone free list in address order.
    pub fn large_free_blocks(&self) -> FreeBlocks<'_> {
        self.large.free_blocks()
    }

    /// Assert the large free list invariants: nodes in-bounds, free,
    /// strictly address-ordered, sizes within the arena.
    ///
    /// Debug builds assert; release builds assume the invariants hold and
    /// make this a no-op.
    pub fn debug_validate(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let mut prev: Option<HeapAddress> = None;
        for (addr, size) in self.large_free_blocks() {
            assert!(
                self.arena.contains(addr),
                "free-list node {addr} outside the arena"
            );
            assert!(
                addr + HEADER_SIZE + size <= self.end(),
                "free-list node {addr} overruns the arena"
            );
            let hdr = addr.as_ptr::<BlockHeader>();
            assert!(
                !unsafe { (*hdr).occupied() },
                "occupied block {addr} on the free list"
            );
            if let Some(prev) = prev {
                assert!(prev < addr, "free list not address-sorted at {addr}");
            }
            prev = Some(addr);
        }
    }
}
