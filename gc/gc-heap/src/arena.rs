use crate::config::ALIGNMENT;
use crate::header::HEADER_SIZE;
use core::alloc::Layout;
use core::ptr::NonNull;
use gc_addresses::HeapAddress;

/// Alignment of the arena base. Keeping the base header-aligned keeps every
/// region start and therefore every payload word-aligned.
const ARENA_ALIGN: usize = if HEADER_SIZE > ALIGNMENT {
    HEADER_SIZE
} else {
    ALIGNMENT
};

/// Error raised while setting up the managed arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    /// The process allocator refused the reservation.
    #[error("failed to reserve {0} bytes for the heap arena")]
    ReserveFailed(usize),

    /// The requested arena cannot be partitioned into size-class regions
    /// plus a non-empty large zone.
    #[error("arena of {got} bytes is below the {min}-byte minimum")]
    TooSmall { got: usize, min: usize },
}

/// The single contiguous memory range managed by the allocator.
///
/// Reserved zero-initialised from the global allocator and released on drop.
/// Zeroing matters: the conservative tracer and the header probe read arena
/// bytes that the mutator may never have written, and an all-zero header
/// reads as a free white block.
pub struct Arena {
    base: NonNull<u8>,
    size: usize,
}

// Safety: the arena exclusively owns its allocation; the pointer is never
// shared outside the owning heap.
unsafe impl Send for Arena {}

impl Arena {
    /// Reserve a zero-initialised arena of `size` bytes.
    ///
    /// # Errors
    /// [`ArenaError::ReserveFailed`] if the process allocator cannot satisfy
    /// the reservation.
    pub fn new(size: usize) -> Result<Self, ArenaError> {
        let layout = Layout::from_size_align(size.max(1), ARENA_ALIGN)
            .map_err(|_| ArenaError::ReserveFailed(size))?;
        let ptr = unsafe { alloc::alloc::alloc_zeroed(layout) };
        NonNull::new(ptr)
            .map(|base| Self { base, size })
            .ok_or(ArenaError::ReserveFailed(size))
    }

    /// First byte of the arena.
    #[inline]
    #[must_use]
    pub fn base(&self) -> HeapAddress {
        HeapAddress::from_nonnull(self.base)
    }

    /// One past the last byte of the arena.
    #[inline]
    #[must_use]
    pub fn end(&self) -> HeapAddress {
        self.base() + self.size
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Whether `addr` lies inside the arena.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: HeapAddress) -> bool {
        self.base() <= addr && addr < self.end()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // Layout construction mirrors `new`, which already validated it.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.size.max(1), ARENA_ALIGN);
            alloc::alloc::dealloc(self.base.as_ptr(), layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_aligned_zeroed_memory() {
        let arena = Arena::new(4096).expect("reservation");
        assert!(arena.base().is_aligned(ARENA_ALIGN));
        assert_eq!(arena.end().offset_from(arena.base()), 4096);
        let bytes = unsafe { core::slice::from_raw_parts(arena.base().as_ptr::<u8>(), 4096) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn bounds_check() {
        let arena = Arena::new(1024).expect("reservation");
        assert!(arena.contains(arena.base()));
        assert!(arena.contains(arena.end() - 1));
        assert!(!arena.contains(arena.end()));
    }
}
