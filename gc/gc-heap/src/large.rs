use crate::config::{GOOD_ENOUGH_SLACK, LARGE_CLASS, MIN_SPLIT_REMAINDER, SEARCH_LIMIT};
use crate::header::{BlockHeader, Color, HEADER_SIZE};
use core::marker::PhantomData;
use core::ptr::{NonNull, null_mut};
use gc_addresses::HeapAddress;

/// The large-object zone: everything past the size-class regions.
///
/// Two intrusive lists thread through the block headers:
///
/// - `free`: free blocks, kept **strictly address-sorted** so coalescing
///   works in a single forward pass. Insertion on free and insertion of a
///   split tail go through the same position search.
/// - `live`: currently occupied blocks, unsorted, head-inserted. The sweep
///   walks this list to find garbage.
pub(crate) struct LargeZone {
    free: *mut BlockHeader,
    live: *mut BlockHeader,
}

impl LargeZone {
    /// Turn `[start, end)` into one initial free block.
    pub(crate) fn new(start: HeapAddress, end: HeapAddress) -> Self {
        let first = start.as_mut_ptr::<BlockHeader>();
        unsafe {
            (*first).set_size(end.offset_from(start) - HEADER_SIZE);
            (*first).set_size_class(LARGE_CLASS);
            (*first).set_occupied(false);
            (*first).set_color(Color::White);
            (*first).next = null_mut();
        }
        Self {
            free: first,
            live: null_mut(),
        }
    }

    /// Early-exit best-fit allocation of `size` payload bytes (`size` is
    /// already aligned).
    ///
    /// Walks the free list tracking the candidate with the least slack,
    /// stopping after [`SEARCH_LIMIT`] candidates or as soon as one fits
    /// within [`GOOD_ENOUGH_SLACK`]. The chosen block is split when the
    /// tail is worth keeping ([`MIN_SPLIT_REMAINDER`]); otherwise the slack
    /// stays inside the block.
    pub(crate) fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        let mut prev: *mut BlockHeader = null_mut();
        let mut best: *mut BlockHeader = null_mut();
        let mut best_prev: *mut BlockHeader = null_mut();
        let mut best_slack = usize::MAX;

        unsafe {
            let mut cur = self.free;
            let mut checked = 0;
            while !cur.is_null() && checked < SEARCH_LIMIT {
                let cur_size = (*cur).size();
                if cur_size >= size {
                    let slack = cur_size - size;
                    if slack < best_slack {
                        best = cur;
                        best_prev = prev;
                        best_slack = slack;
                        if slack < GOOD_ENOUGH_SLACK {
                            break;
                        }
                    }
                }
                prev = cur;
                cur = (*cur).next;
                checked += 1;
            }

            if best.is_null() {
                return None;
            }

            if best_prev.is_null() {
                self.free = (*best).next;
            } else {
                (*best_prev).next = (*best).next;
            }

            let remainder = (*best).size() - size;
            if remainder >= MIN_SPLIT_REMAINDER {
                let tail = (HeapAddress::from_ptr(best) + HEADER_SIZE + size).as_mut_ptr::<BlockHeader>();
                (*tail).set_size(remainder - HEADER_SIZE);
                (*tail).set_size_class(LARGE_CLASS);
                (*tail).set_occupied(false);
                (*tail).set_color(Color::White);
                (*tail).next = null_mut();
                self.insert_free_sorted(tail);
                (*best).set_size(size);
            }

            (*best).set_size_class(LARGE_CLASS);
            (*best).set_occupied(true);
            (*best).set_color(Color::Gray);
            (*best).next = self.live;
            self.live = best;
            Some(BlockHeader::payload(best))
        }
    }

    /// Unlink `hdr` from the live list and return it to the free list.
    ///
    /// # Safety
    /// `hdr` must head an occupied large block of this zone.
    pub(crate) unsafe fn free(&mut self, hdr: *mut BlockHeader) {
        unsafe {
            let mut pp: *mut *mut BlockHeader = &raw mut self.live;
            while !(*pp).is_null() && *pp != hdr {
                pp = &raw mut (**pp).next;
            }
            if !(*pp).is_null() {
                *pp = (*hdr).next;
            }
            (*hdr).set_occupied(false);
            (*hdr).next = null_mut();
            self.insert_free_sorted(hdr);
        }
    }

    /// Insert a free block at its address-ordered position.
    ///
    /// # Safety
    /// `hdr` must head a free large block that is on no list.
    unsafe fn insert_free_sorted(&mut self, hdr: *mut BlockHeader) {
        unsafe {
            let mut pp: *mut *mut BlockHeader = &raw mut self.free;
            while !(*pp).is_null() && *pp < hdr {
                pp = &raw mut (**pp).next;
            }
            (*hdr).next = *pp;
            *pp = hdr;
        }
    }

    /// Sweep the live list: free every block still coloured `WHITE` or
    /// `GRAY`; on major cycles reset surviving `BLACK` blocks to `WHITE`.
    /// Returns freed block and payload-byte counts.
    pub(crate) fn sweep(&mut self, major: bool) -> (usize, usize) {
        let mut freed_blocks = 0;
        let mut freed_bytes = 0;
        unsafe {
            let mut pp: *mut *mut BlockHeader = &raw mut self.live;
            while !(*pp).is_null() {
                let cur = *pp;
                match (*cur).color() {
                    Color::White | Color::Gray => {
                        *pp = (*cur).next;
                        freed_bytes += (*cur).size();
                        freed_blocks += 1;
                        (*cur).set_occupied(false);
                        (*cur).next = null_mut();
                        self.insert_free_sorted(cur);
                    }
                    Color::Black if major => {
                        (*cur).set_color(Color::White);
                        pp = &raw mut (*cur).next;
                    }
                    _ => pp = &raw mut (*cur).next,
                }
            }
        }
        (freed_blocks, freed_bytes)
    }

    /// Merge physically adjacent free neighbours in one forward pass.
    ///
    /// Relies on the free list being address-sorted: a block's successor in
    /// the list is the only candidate that can border it.
    pub(crate) fn coalesce(&mut self) {
        unsafe {
            let mut cur = self.free;
            while !cur.is_null() && !(*cur).next.is_null() {
                let next = (*cur).next;
                let cur_end = cur.add(1) as usize + (*cur).size();
                if cur_end == next as usize {
                    (*cur).set_size((*cur).size() + HEADER_SIZE + (*next).size());
                    (*cur).next = (*next).next;
                } else {
                    cur = next;
                }
            }
        }
    }

    /// Iterate the free list front to back.
    pub(crate) fn free_blocks(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            cur: self.free,
            _zone: PhantomData,
        }
    }
}

/// Iterator over the large-zone free list, yielding each node's header
/// address and payload size in list (i.e. address) order.
pub struct FreeBlocks<'a> {
    cur: *const BlockHeader,
    _zone: PhantomData<&'a LargeZone>,
}

impl Iterator for FreeBlocks<'_> {
    type Item = (HeapAddress, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur.is_null() {
            return None;
        }
        unsafe {
            let item = (HeapAddress::from_ptr(self.cur), (*self.cur).size());
            self.cur = (*self.cur).next;
            Some(item)
        }
    }
}
