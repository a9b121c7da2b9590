//! The pagefile backing store and its slot bitmap allocator.
//!
//! The bitmap here is grounded on the teacher workspace's own `bitmap` crate
//! (`lib/bitmap`): a byte-backed bitmap with `get`/`set`/`unset` and a
//! linear `first_zero` scan. That crate is `no_std` and lives at a fixed
//! workspace path, which no longer exists once this manager is a standalone
//! `std` crate, so the same small bit-twiddling API is reproduced locally
//! rather than kept as a path dependency (see `DESIGN.md`).

use std::sync::Mutex;

use crate::types::DiskSlot;

struct Bitmap {
    bytes: Vec<u8>,
}

impl Bitmap {
    fn new(bits: usize) -> Self {
        Self {
            bytes: vec![0u8; bits.div_ceil(8)],
        }
    }

    fn get(&self, index: usize) -> bool {
        let (byte, bit) = (index / 8, index % 8);
        (self.bytes[byte] >> bit) & 1 != 0
    }

    fn set(&mut self, index: usize) {
        let (byte, bit) = (index / 8, index % 8);
        self.bytes[byte] |= 1 << bit;
    }

    fn unset(&mut self, index: usize) {
        let (byte, bit) = (index / 8, index % 8);
        self.bytes[byte] &= !(1u8 << bit);
    }
}

struct AllocatorState {
    occupied: Bitmap,
    next_cursor: usize,
}

/// The pagefile: a byte buffer of `D` pages plus the `occupied` bitmap and
/// rotating `next_cursor` that track slot allocation. Slot `0` is reserved
/// ("none") and is permanently marked occupied.
pub struct Pagefile {
    slots: usize,
    page_size: usize,
    buf: Mutex<Vec<u8>>,
    state: Mutex<AllocatorState>,
}

impl Pagefile {
    pub fn new(slots: usize, page_size: usize) -> Self {
        assert!(slots >= 2, "pagefile must have at least one usable slot");
        let mut occupied = Bitmap::new(slots);
        occupied.set(0);
        Self {
            slots,
            page_size,
            buf: Mutex::new(vec![0u8; slots * page_size]),
            state: Mutex::new(AllocatorState {
                occupied,
                next_cursor: 1,
            }),
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Scans `occupied` starting at `next_cursor`, wrapping at `slots`, and
    /// terminating when a free slot is found or the scan returns to its
    /// start. Returns [`DiskSlot::NONE`] if the pagefile is full.
    pub fn allocate_slot(&self) -> DiskSlot {
        let mut state = self.state.lock().unwrap();
        let start = state.next_cursor;
        let mut candidate = start;

        loop {
            if !state.occupied.get(candidate) {
                state.occupied.set(candidate);
                let mut advanced = candidate + 1;
                if advanced >= self.slots {
                    advanced = 1;
                }
                state.next_cursor = advanced;
                return DiskSlot::new(candidate as u64);
            }

            candidate += 1;
            if candidate >= self.slots {
                candidate = 0;
            }
            if candidate == start {
                return DiskSlot::NONE;
            }
        }
    }

    pub fn free_slot(&self, slot: DiskSlot) {
        if slot.is_none() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.occupied.get(slot.as_usize()), "double free of {slot}");
        state.occupied.unset(slot.as_usize());
    }

    /// Copies `page_size` bytes from `src` into `slot`'s region.
    pub fn write_slot(&self, slot: DiskSlot, src: &[u8]) {
        assert!(!slot.is_none());
        let mut buf = self.buf.lock().unwrap();
        let base = slot.as_usize() * self.page_size;
        buf[base..base + self.page_size].copy_from_slice(src);
    }

    /// Copies `slot`'s region into `dst`.
    pub fn read_slot(&self, slot: DiskSlot, dst: &mut [u8]) {
        assert!(!slot.is_none());
        let buf = self.buf.lock().unwrap();
        let base = slot.as_usize() * self.page_size;
        dst.copy_from_slice(&buf[base..base + self.page_size]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_zero_is_never_allocated() {
        let pf = Pagefile::new(4, 4096);
        for _ in 0..3 {
            let slot = pf.allocate_slot();
            assert_ne!(slot, DiskSlot::NONE);
            assert!(!slot.is_none());
        }
        // pagefile now full (slots 1,2,3 all taken, 0 reserved)
        assert_eq!(pf.allocate_slot(), DiskSlot::NONE);
    }

    #[test]
    fn cursor_wraps_and_reuses_freed_slots() {
        let pf = Pagefile::new(4, 4096);
        let a = pf.allocate_slot();
        let b = pf.allocate_slot();
        let c = pf.allocate_slot();
        assert_eq!(pf.allocate_slot(), DiskSlot::NONE);

        pf.free_slot(b);
        let reused = pf.allocate_slot();
        assert_eq!(reused, b);

        pf.free_slot(a);
        pf.free_slot(c);
        pf.free_slot(reused);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let pf = Pagefile::new(4, 8);
        let slot = pf.allocate_slot();
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        pf.write_slot(slot, &data);
        let mut out = [0u8; 8];
        pf.read_slot(slot, &mut out);
        assert_eq!(out, data);
    }
}
