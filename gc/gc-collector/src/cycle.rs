//! Mark-phase machinery: root shading, worklist draining, and the
//! conservative payload tracer.

use crate::Gc;
use crate::config::{INCREMENTAL_DRAIN_MIN, MINOR_COLLECTION_INTERVAL};
use core::ptr::NonNull;
use gc_heap::Color;
use log::trace;

impl Gc {
    /// Begin (or re-enter) the mark phase by shading the root set.
    ///
    /// A minor cycle shades only roots past the previous cycle's cursor:
    /// older roots were already scanned and their closures are still
    /// coloured from that scan. A major cycle shades everything.
    pub(crate) fn start_mark_phase(&mut self, minor: bool) {
        self.cycle_in_progress = true;
        let start = if minor {
            self.prev_root_size.min(self.roots.len())
        } else {
            0
        };
        for index in start..self.roots.len() {
            let root = self.roots.get(index);
            self.shade(root);
        }
        self.prev_root_size = self.roots.len();
    }

    /// Shade one object: anything not already queued or scanned turns
    /// `DARK_GRAY` and enters the worklist.
    pub(crate) fn shade(&mut self, obj: NonNull<u8>) {
        let color = unsafe { self.heap.color_of(obj) };
        if matches!(color, Color::Black | Color::DarkGray) {
            return;
        }
        unsafe { self.heap.set_color(obj, Color::DarkGray) };
        self.worklist.push(obj);
    }

    /// Pop and scan worklist objects, blackening each.
    ///
    /// `limit == 0` drains completely; otherwise at most `limit` objects are
    /// processed. Returns the number processed.
    pub(crate) fn drain_worklist(&mut self, limit: usize) -> usize {
        let mut processed = 0;
        while let Some(obj) = self.worklist.pop() {
            unsafe { self.heap.set_color(obj, Color::Black) };
            self.trace_conservative(obj);
            processed += 1;
            if limit != 0 && processed >= limit {
                break;
            }
        }
        processed
    }

    /// Conservatively scan an object's payload.
    ///
    /// Every word-aligned value in `[payload, payload + size)` is treated as
    /// a candidate payload address; the heap validates it (in-arena, header
    /// in-arena, occupied) and anything that passes is shaded. False
    /// positives retain a block for one cycle; true heap pointers are never
    /// missed because every payload the heap hands out is word-aligned.
    pub(crate) fn trace_conservative(&mut self, obj: NonNull<u8>) {
        let size = unsafe { self.heap.payload_size(obj) };
        let words = obj.as_ptr().cast::<usize>();
        for index in 0..size / size_of::<usize>() {
            let word = unsafe { words.add(index).read() };
            if let Some(candidate) = self.heap.resolve_candidate(word) {
                self.shade(candidate);
            }
        }
    }

    /// One bounded mark step: shade the (new) roots, then drain at most
    /// `max(worklist / 2, INCREMENTAL_DRAIN_MIN)` objects.
    pub(crate) fn incremental_mark_step(&mut self) {
        let minor = !self.cycle_count.is_multiple_of(MINOR_COLLECTION_INTERVAL);
        self.start_mark_phase(minor);
        let limit = (self.worklist.len() / 2).max(INCREMENTAL_DRAIN_MIN);
        let processed = self.drain_worklist(limit);
        trace!(
            "incremental mark step: {processed} objects scanned, {} queued",
            self.worklist.len()
        );
    }
}
