use crate::config::{ALIGNMENT, LARGE_CLASS};
use bitfield_struct::bitfield;
use core::ptr::NonNull;

/// Size of the header preceding every payload. The payload address of a
/// block is its header address plus this.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Tri-colour mark state of a block.
///
/// | Colour | Meaning |
/// |--------|---------|
/// | `White` | Unreachable, or not yet visited this cycle. |
/// | `Gray` | Freshly allocated; not yet subject to the mark phase. Swept as garbage if nothing shaded it before the cycle ended. |
/// | `DarkGray` | Discovered reachable and queued on the gray worklist; payload not yet scanned. |
/// | `Black` | Reached and fully scanned; survives the cycle. |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    White = 0,
    Gray = 1,
    Black = 2,
    DarkGray = 3,
}

impl Color {
    pub const fn into_bits(self) -> u8 {
        self as _
    }

    pub const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::White,
            1 => Self::Gray,
            2 => Self::Black,
            _ => Self::DarkGray,
        }
    }
}

/// Packed flag word at the start of every block header.
#[bitfield(u32)]
pub(crate) struct BlockBits {
    /// Tri-colour mark state.
    #[bits(2)]
    pub color: Color,

    /// Size-class index, or [`LARGE_CLASS`] for a large-zone block.
    #[bits(5)]
    pub size_class: u8,

    /// Whether the block is currently allocated.
    pub occupied: bool,

    #[bits(24)]
    __: u32,
}

/// Header stored immediately before every payload, small or large.
///
/// A block in memory has the following layout:
///
/// ```text
/// +----------------------+-------------------------+
/// | BlockHeader          |      payload (size)     |
/// +----------------------+-------------------------+
/// ^ header_addr          ^ header_addr + HEADER_SIZE
/// ```
///
/// - `size` is the number of payload bytes **after** the header.
/// - `next` is the intrusive link used for the per-class free lists, the
///   large live list, and the large free list (never more than one of
///   those at a time).
///
/// An all-zero bit pattern is a valid header (white, class 0, free, no
/// link), which is what makes conservative header probing over the
/// zero-initialised arena well defined.
#[repr(C)]
pub struct BlockHeader {
    bits: BlockBits,
    size: u32,
    /// Intrusive list link (or null).
    pub(crate) next: *mut BlockHeader,
}

impl BlockHeader {
    #[inline]
    pub(crate) fn color(&self) -> Color {
        self.bits.color()
    }

    #[inline]
    pub(crate) fn set_color(&mut self, color: Color) {
        self.bits.set_color(color);
    }

    #[inline]
    pub(crate) fn size_class(&self) -> u8 {
        self.bits.size_class()
    }

    #[inline]
    pub(crate) fn set_size_class(&mut self, class: u8) {
        self.bits.set_size_class(class);
    }

    #[inline]
    pub(crate) fn occupied(&self) -> bool {
        self.bits.occupied()
    }

    #[inline]
    pub(crate) fn set_occupied(&mut self, occupied: bool) {
        self.bits.set_occupied(occupied);
    }

    /// Payload size in bytes.
    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size as usize
    }

    #[inline]
    pub(crate) fn set_size(&mut self, size: usize) {
        debug_assert!(size <= u32::MAX as usize);
        self.size = size as u32;
    }

    #[inline]
    pub(crate) fn is_large(&self) -> bool {
        self.size_class() == LARGE_CLASS
    }

    /// Payload address of the block headed by `this`.
    ///
    /// # Safety
    /// `this` must be non-null.
    #[inline]
    pub(crate) unsafe fn payload(this: *mut Self) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(this.add(1)).cast() }
    }

    /// Header implied by a payload pointer.
    ///
    /// # Safety
    /// `payload` must lie [`HEADER_SIZE`] bytes past a block header within
    /// the arena.
    #[inline]
    pub(crate) unsafe fn of_payload(payload: NonNull<u8>) -> *mut Self {
        unsafe { payload.as_ptr().cast::<Self>().sub(1) }
    }
}

const _: () = {
    assert!(HEADER_SIZE % ALIGNMENT == 0);
    assert!(align_of::<BlockHeader>() <= ALIGNMENT);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_header_is_free_and_white() {
        let bits = BlockBits::new();
        assert_eq!(bits.color(), Color::White);
        assert_eq!(bits.size_class(), 0);
        assert!(!bits.occupied());
        assert_eq!(bits.into_bits(), 0);
    }

    #[test]
    fn flag_round_trip() {
        let mut bits = BlockBits::new();
        bits.set_color(Color::DarkGray);
        bits.set_size_class(LARGE_CLASS);
        bits.set_occupied(true);
        assert_eq!(bits.color(), Color::DarkGray);
        assert_eq!(bits.size_class(), LARGE_CLASS);
        assert!(bits.occupied());

        bits.set_color(Color::Black);
        assert_eq!(bits.color(), Color::Black);
        assert_eq!(bits.size_class(), LARGE_CLASS);
    }

    #[test]
    fn payload_header_inverse() {
        let mut backing = [0u8; 2 * HEADER_SIZE];
        let hdr = backing.as_mut_ptr().cast::<BlockHeader>();
        let payload = unsafe { BlockHeader::payload(hdr) };
        assert_eq!(
            payload.as_ptr() as usize,
            backing.as_ptr() as usize + HEADER_SIZE
        );
        assert_eq!(unsafe { BlockHeader::of_payload(payload) }, hdr);
    }
}
