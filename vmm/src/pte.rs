//! The bit-packed page table entry.
//!
//! A [`PageTableEntry`] is an opaque 64-bit word, exactly as the teacher
//! kernel's `arch::x86_64::mmu::PageTableEntry` is: a `#[repr(transparent)]`
//! newtype over `u64` manipulated only through free accessor functions, never
//! as a polymorphic object. The two low bits are the format discriminators;
//! everything else is payload (a frame number or a disk slot, depending on
//! format).
//!
//! | bit 0 (`valid`) | bit 1 (`transition`) | payload | format |
//! |---|---|---|---|
//! | 1 | - | frame number | Valid |
//! | 0 | 1 | frame number | Transition |
//! | 0 | 0 | 0 | Zero |
//! | 0 | 0 | nonzero disk slot | Disk |

use crate::types::{DiskSlot, FrameNumber};

const VALID_BIT: u64 = 1 << 0;
const TRANSITION_BIT: u64 = 1 << 1;
const PAYLOAD_SHIFT: u32 = 2;
const PAYLOAD_MASK: u64 = ((1u64 << (PAYLOAD_SHIFT + crate::config::FRAME_NUMBER_BITS)) - 1)
    & !(VALID_BIT | TRANSITION_BIT);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

/// A decoded view of a [`PageTableEntry`], used by callers that want to
/// `match` on the format instead of re-deriving it from the raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PteView {
    /// Never touched; first access maps a zeroed frame.
    Zero,
    /// Mapped; host translation installed.
    Valid(FrameNumber),
    /// Frame still holds the content, but unmapped.
    Transition(FrameNumber),
    /// Content evicted to the pagefile.
    Disk(DiskSlot),
}

/// Creates the all-zero PTE: never touched.
pub const fn make_zero_pte() -> PageTableEntry {
    PageTableEntry(0)
}

/// Creates a Valid PTE mapping `frame`.
pub fn make_valid_pte(frame: FrameNumber) -> PageTableEntry {
    PageTableEntry(((frame.as_u64() << PAYLOAD_SHIFT) & PAYLOAD_MASK) | VALID_BIT)
}

/// Creates a Transition PTE still referencing `frame`'s content.
pub fn make_transition_pte(frame: FrameNumber) -> PageTableEntry {
    PageTableEntry(((frame.as_u64() << PAYLOAD_SHIFT) & PAYLOAD_MASK) | TRANSITION_BIT)
}

/// Creates a Disk PTE referencing `slot`. `slot` must be nonzero: slot `0`
/// is reserved to mean "none", which is exactly the Zero format.
pub fn make_disk_pte(slot: DiskSlot) -> PageTableEntry {
    debug_assert!(!slot.is_none(), "disk slot 0 is reserved for the Zero format");
    PageTableEntry((slot.as_usize() as u64) << PAYLOAD_SHIFT)
}

/// Decodes `pte` into a [`PteView`] for convenient matching.
pub fn decode(pte: PageTableEntry) -> PteView {
    let valid = pte.0 & VALID_BIT != 0;
    let transition = pte.0 & TRANSITION_BIT != 0;
    let payload = (pte.0 & PAYLOAD_MASK) >> PAYLOAD_SHIFT;

    if valid {
        PteView::Valid(FrameNumber::new(payload))
    } else if transition {
        PteView::Transition(FrameNumber::new(payload))
    } else if payload == 0 {
        PteView::Zero
    } else {
        PteView::Disk(DiskSlot::new(payload))
    }
}

/// Quick check for the Valid format without fully decoding.
pub fn is_valid(pte: PageTableEntry) -> bool {
    pte.0 & VALID_BIT != 0
}

/// Quick check for the Transition format without fully decoding.
pub fn is_transition(pte: PageTableEntry) -> bool {
    pte.0 & VALID_BIT == 0 && pte.0 & TRANSITION_BIT != 0
}
