//! The shared array of [`Pfn`] descriptors.
//!
//! A single `Pfn` is, over its lifetime, owned by whichever lock the
//! manager's locking discipline currently assigns to it: the PT-lock while
//! `Active` (and fleetingly during rescue/repurpose before its list
//! membership changes), or one of the three list locks while `Free`,
//! `Modified` or `Standby`. Because ownership moves between locks at
//! runtime, no single `Mutex` can own the backing storage outright without
//! either introducing one giant lock (defeating the point of separate list
//! locks) or cloning data. `FrameTable` instead holds the array behind an
//! `UnsafeCell`, exactly as the teacher kernel's `sync::SpinLock<T>` does for
//! its own guarded data, and exposes `unsafe` accessors whose safety
//! contract is "the caller currently holds the lock that owns this frame".
//! [`PageList`](crate::page_list::PageList) and
//! [`crate::manager::VmManager`] are the only callers, and each upholds
//! that contract by construction (see their doc comments).

use std::cell::UnsafeCell;

use crate::pfn::{Pfn, PfnIndex};

pub struct FrameTable {
    frames: UnsafeCell<Vec<Pfn>>,
}

// Safety: access to the contained frames is serialized externally by the
// manager's lock discipline (PT-lock or one of the three list locks,
// depending on each frame's current state). `FrameTable` itself performs no
// synchronization.
unsafe impl Sync for FrameTable {}
unsafe impl Send for FrameTable {}

impl FrameTable {
    pub fn new(frames: Vec<Pfn>) -> Self {
        Self {
            frames: UnsafeCell::new(frames),
        }
    }

    pub fn len(&self) -> usize {
        // Safety: length never changes after construction, and reading its
        // length (not the elements) is safe without external locking.
        unsafe { (*self.frames.get()).len() }
    }

    /// # Safety
    /// The caller must hold the lock that currently owns `idx`'s frame.
    pub unsafe fn get(&self, idx: PfnIndex) -> &Pfn {
        unsafe { &(*self.frames.get())[idx.as_usize()] }
    }

    /// # Safety
    /// The caller must hold the lock that currently owns `idx`'s frame.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, idx: PfnIndex) -> &mut Pfn {
        unsafe { &mut (*self.frames.get())[idx.as_usize()] }
    }
}
