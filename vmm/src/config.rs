//! Compile-time constants from the original design, made runtime-configurable
//! so tests can exercise tiny pools without recompiling.

use crate::error::{Result, VmError};

/// Default page size. The original design fixes this at 4096; we keep it as
/// an associated constant rather than a generic parameter since no test or
/// caller needs a different page size, only different *counts* of pages.
pub const PAGE_SIZE: usize = 4096;

/// Width, in bits, of a frame number within a PTE payload.
pub const FRAME_NUMBER_BITS: u32 = 40;

/// Default trim/write batch size (`BATCH_SIZE` in the original design).
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Runtime configuration for [`crate::manager::VmManager::initialize`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Number of virtual pages in the managed address space (`N_v`).
    pub virtual_pages: usize,
    /// Number of physical frames to request from the host (`N_p`).
    pub physical_pages: usize,
    /// Number of pagefile slots, including the reserved slot `0` (`D`).
    pub pagefile_slots: usize,
    /// Number of entries processed per trimmer/writer wake.
    pub batch_size: usize,
}

impl ManagerConfig {
    /// A configuration sized the way the original design sizes itself: the
    /// physical pool is about 1/64th of the virtual address space, and the
    /// pagefile covers the rest.
    pub fn with_overcommit_ratio(virtual_pages: usize, ratio: usize) -> Self {
        let physical_pages = (virtual_pages / ratio).max(1);
        let pagefile_slots = virtual_pages.saturating_sub(physical_pages).max(1) + 1;
        Self {
            virtual_pages,
            physical_pages,
            pagefile_slots,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.virtual_pages == 0 {
            return Err(VmError::InvalidConfig {
                reason: "virtual_pages must be nonzero".into(),
            });
        }
        if self.physical_pages == 0 {
            return Err(VmError::InvalidConfig {
                reason: "physical_pages must be nonzero".into(),
            });
        }
        if self.pagefile_slots < 2 {
            return Err(VmError::InvalidConfig {
                reason: "pagefile_slots must allow at least one usable slot beyond the reserved \
                         sentinel slot 0"
                    .into(),
            });
        }
        if self.batch_size == 0 {
            return Err(VmError::InvalidConfig {
                reason: "batch_size must be nonzero".into(),
            });
        }
        Ok(())
    }
}
