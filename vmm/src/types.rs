//! Address and index newtypes used throughout the manager.
//!
//! These mirror the teacher kernel's `mm::types` module: thin, `Copy`
//! wrappers around a `usize`/`u64` with const constructors and accessors, so
//! arithmetic on addresses, frame numbers and page indices never gets
//! confused with arithmetic on plain integers.

use std::fmt;
use std::ops::{Add, Sub};

/// A byte offset into the simulated virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    pub const fn new(val: usize) -> Self {
        Self(val)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The index of a virtual page within the managed address space, i.e.
/// `(va - va_base) / PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtPageNum(usize);

impl VirtPageNum {
    pub const fn new(val: usize) -> Self {
        Self(val)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for VirtPageNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vpn#{}", self.0)
    }
}

impl Add<usize> for VirtPageNum {
    type Output = VirtPageNum;

    fn add(self, rhs: usize) -> VirtPageNum {
        VirtPageNum(self.0 + rhs)
    }
}

impl Sub for VirtPageNum {
    type Output = usize;

    fn sub(self, rhs: VirtPageNum) -> usize {
        self.0 - rhs.0
    }
}

/// An opaque physical frame number, as reported by the host's physical page
/// allocator. Frame numbers are sparse within `[0, F_max]`; the manager maps
/// them to a dense `Pfn` index via
/// [`VmManager::frame_of`](crate::manager::VmManager::frame_of) /
/// [`VmManager::pfn_of`](crate::manager::VmManager::pfn_of).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FrameNumber(u64);

impl FrameNumber {
    pub const fn new(val: u64) -> Self {
        Self(val)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{:#x}", self.0)
    }
}

/// The index of a pagefile slot. Slot `0` is the reserved "none" sentinel;
/// see [`crate::pagefile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DiskSlot(u64);

impl DiskSlot {
    pub const NONE: DiskSlot = DiskSlot(0);

    pub const fn new(val: u64) -> Self {
        Self(val)
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DiskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}
