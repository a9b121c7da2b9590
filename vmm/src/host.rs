//! Host abstraction and its in-repo simulation backend.
//!
//! `PhysicalPageSource` and `VirtualMemoryHost` stand in for the collaborators
//! spec §1 places out of scope: privilege acquisition, the `map`/`unmap`
//! primitive, and frame allocation. `SimHost` is the only implementation in
//! this crate, playing the role the teacher workspace's `hosttools` crate
//! plays for its own firmware boundary: a process-local stand-in for
//! something a real deployment gets from the OS or silicon, used by both
//! tests and the `vm_demo` binary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Result, VmError};
use crate::types::{FrameNumber, VirtAddr};

/// One-shot physical frame allocation (§6's `get_physical_pages`).
pub trait PhysicalPageSource {
    /// Requests `n` frames. May deliver fewer than `n` on partial success;
    /// the caller is expected to continue with whatever count was returned.
    /// Fails only when the source has nothing at all left to give.
    fn get_physical_pages(&self, n: usize) -> Result<Vec<FrameNumber>>;
}

/// A thread's private transfer-VA window (§4.3.2): map a frame in, copy
/// bytes, unmap. Never holds a mapping across unrelated operations.
pub trait TransferWindow {
    /// Maps `frame` into this window, replacing any prior mapping.
    fn map(&mut self, frame: FrameNumber);

    /// Copies the window's full page into `dst`.
    ///
    /// # Panics
    /// Panics if the window is not currently mapped.
    fn copy_out(&self, dst: &mut [u8]);

    /// Copies `src` into the window's full page.
    ///
    /// # Panics
    /// Panics if the window is not currently mapped.
    fn copy_in(&mut self, src: &[u8]);

    /// Zero-fills the window's mapped page.
    ///
    /// # Panics
    /// Panics if the window is not currently mapped.
    fn zero(&mut self);

    /// Unmaps the window. A no-op if already unmapped.
    fn unmap(&mut self);

    /// Maps every frame in `frames` into this window in a single host call,
    /// one page per index, mirroring the original design's single
    /// `MapUserPhysicalPages` call over a whole write-back batch instead of
    /// one host call per page (spec §4.5 steps 4/7). Replaces any prior
    /// mapping, batched or single.
    fn map_batch(&mut self, frames: &[FrameNumber]);

    /// Copies the page mapped at batch index `i` (see [`Self::map_batch`])
    /// into `dst`.
    ///
    /// # Panics
    /// Panics if `i` is out of range for the last [`Self::map_batch`] call.
    fn copy_out_at(&self, i: usize, dst: &mut [u8]);
}

/// Host-level virtual memory operations: VA reservation and `map`/`unmap`,
/// singular and scatter, plus acquisition of a private transfer window.
pub trait VirtualMemoryHost {
    type Window: TransferWindow;

    fn reserve_va_region(&self, pages: usize) -> Result<VirtAddr>;
    fn map(&self, va: VirtAddr, frame: FrameNumber);
    fn unmap(&self, va: VirtAddr);

    fn map_scatter(&self, vas: &[VirtAddr], frames: &[FrameNumber]) {
        for (&va, &frame) in vas.iter().zip(frames) {
            self.map(va, frame);
        }
    }

    fn unmap_scatter(&self, vas: &[VirtAddr]) {
        for &va in vas {
            self.unmap(va);
        }
    }

    /// Acquires a fresh transfer window. Cheap: callers acquire one per use
    /// rather than holding one for a thread's whole lifetime, since
    /// `SimHost`'s window is just a handle onto its shared physical arena.
    fn transfer_window(&self) -> Self::Window;
}

struct SimHostState {
    page_size: usize,
    total_frames: usize,
    physical: Mutex<Vec<u8>>,
    mappings: Mutex<HashMap<VirtAddr, FrameNumber>>,
    frames_issued: Mutex<usize>,
    va_base: VirtAddr,
    reserved_pages: Mutex<Option<usize>>,
}

/// An in-process stand-in for the host: a flat `Vec<u8>` arena plays the
/// role of physical memory, and a `HashMap` plays the role of the host's
/// translation tables. Frame numbers are dense, `0..total_frames`, which is
/// the common case spec §3 assumes (`frame_number -> pfn` is `base +
/// frame_number`).
#[derive(Clone)]
pub struct SimHost {
    state: Arc<SimHostState>,
}

impl SimHost {
    pub fn new(total_frames: usize, page_size: usize) -> Self {
        Self {
            state: Arc::new(SimHostState {
                page_size,
                total_frames,
                physical: Mutex::new(vec![0u8; total_frames * page_size]),
                mappings: Mutex::new(HashMap::new()),
                frames_issued: Mutex::new(0),
                va_base: VirtAddr::new(0x1000_0000),
                reserved_pages: Mutex::new(None),
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.state.page_size
    }

    /// Simulates a user-mode store through a mapped VA: `*va = data`.
    ///
    /// # Panics
    /// Panics if `va` has no current mapping (a fault should have been
    /// serviced first).
    pub fn user_write(&self, va: VirtAddr, data: &[u8]) {
        let mappings = self.state.mappings.lock().unwrap();
        let frame = *mappings
            .get(&va)
            .unwrap_or_else(|| panic!("user_write to unmapped {va}"));
        let mut physical = self.state.physical.lock().unwrap();
        let base = frame.as_usize() * self.state.page_size;
        physical[base..base + data.len()].copy_from_slice(data);
    }

    /// Simulates a user-mode load through a mapped VA: `dst = *va`.
    ///
    /// # Panics
    /// Panics if `va` has no current mapping.
    pub fn user_read(&self, va: VirtAddr, dst: &mut [u8]) {
        let mappings = self.state.mappings.lock().unwrap();
        let frame = *mappings
            .get(&va)
            .unwrap_or_else(|| panic!("user_read from unmapped {va}"));
        let physical = self.state.physical.lock().unwrap();
        let base = frame.as_usize() * self.state.page_size;
        dst.copy_from_slice(&physical[base..base + dst.len()]);
    }
}

impl PhysicalPageSource for SimHost {
    fn get_physical_pages(&self, n: usize) -> Result<Vec<FrameNumber>> {
        let mut issued = self.state.frames_issued.lock().unwrap();
        if *issued >= self.state.total_frames {
            return Err(VmError::FrameAllocationFailed {
                reason: "physical pool exhausted".into(),
            });
        }
        let delivered = n.min(self.state.total_frames - *issued);
        let frames = (*issued..*issued + delivered)
            .map(|f| FrameNumber::new(f as u64))
            .collect();
        *issued += delivered;
        Ok(frames)
    }
}

impl VirtualMemoryHost for SimHost {
    type Window = SimTransferWindow;

    fn reserve_va_region(&self, pages: usize) -> Result<VirtAddr> {
        let mut reserved = self.state.reserved_pages.lock().unwrap();
        if reserved.is_some() {
            return Err(VmError::InvalidConfig {
                reason: "reserve_va_region called twice on the same host".into(),
            });
        }
        *reserved = Some(pages);
        Ok(self.state.va_base)
    }

    fn map(&self, va: VirtAddr, frame: FrameNumber) {
        self.state.mappings.lock().unwrap().insert(va, frame);
    }

    fn unmap(&self, va: VirtAddr) {
        self.state.mappings.lock().unwrap().remove(&va);
    }

    fn transfer_window(&self) -> SimTransferWindow {
        SimTransferWindow {
            state: Arc::clone(&self.state),
            mapped: Vec::new(),
        }
    }
}

/// `SimHost`'s transfer window: a handle onto the shared physical arena plus
/// whichever frame(s) are currently mapped into it, if any. A single `map`
/// call populates one entry; `map_batch` populates one entry per gathered
/// frame, addressed by index, the way the original design maps a whole
/// write-back batch into its transfer VA range with one host call.
pub struct SimTransferWindow {
    state: Arc<SimHostState>,
    mapped: Vec<FrameNumber>,
}

impl SimTransferWindow {
    fn mapped_frame(&self) -> FrameNumber {
        *self
            .mapped
            .first()
            .expect("transfer window used while unmapped")
    }

    fn mapped_frame_at(&self, i: usize) -> FrameNumber {
        *self
            .mapped
            .get(i)
            .unwrap_or_else(|| panic!("transfer window has no frame mapped at batch index {i}"))
    }
}

impl TransferWindow for SimTransferWindow {
    fn map(&mut self, frame: FrameNumber) {
        self.mapped = vec![frame];
    }

    fn copy_out(&self, dst: &mut [u8]) {
        let frame = self.mapped_frame();
        let physical = self.state.physical.lock().unwrap();
        let base = frame.as_usize() * self.state.page_size;
        dst.copy_from_slice(&physical[base..base + self.state.page_size]);
    }

    fn copy_in(&mut self, src: &[u8]) {
        let frame = self.mapped_frame();
        let mut physical = self.state.physical.lock().unwrap();
        let base = frame.as_usize() * self.state.page_size;
        physical[base..base + self.state.page_size].copy_from_slice(src);
    }

    fn zero(&mut self) {
        let frame = self.mapped_frame();
        let mut physical = self.state.physical.lock().unwrap();
        let base = frame.as_usize() * self.state.page_size;
        physical[base..base + self.state.page_size].fill(0);
    }

    fn unmap(&mut self) {
        self.mapped.clear();
    }

    fn map_batch(&mut self, frames: &[FrameNumber]) {
        self.mapped = frames.to_vec();
    }

    fn copy_out_at(&self, i: usize, dst: &mut [u8]) {
        let frame = self.mapped_frame_at(i);
        let physical = self.state.physical.lock().unwrap();
        let base = frame.as_usize() * self.state.page_size;
        dst.copy_from_slice(&physical[base..base + self.state.page_size]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_physical_pages_delivers_partial_on_exhaustion() {
        let host = SimHost::new(3, 64);
        let first = host.get_physical_pages(2).unwrap();
        assert_eq!(first.len(), 2);
        let second = host.get_physical_pages(5).unwrap();
        assert_eq!(second.len(), 1);
        assert!(host.get_physical_pages(1).is_err());
    }

    #[test]
    fn transfer_window_roundtrips_bytes() {
        let host = SimHost::new(1, 8);
        let frame = host.get_physical_pages(1).unwrap()[0];
        let mut window = host.transfer_window();
        window.map(frame);
        window.copy_in(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut out = [0u8; 8];
        window.copy_out(&mut out);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
        window.unmap();
    }

    #[test]
    fn user_write_then_read_through_mapping() {
        let host = SimHost::new(1, 8);
        let frame = host.get_physical_pages(1).unwrap()[0];
        let va = VirtAddr::new(0x2000);
        host.map(va, frame);
        host.user_write(va, &[9, 9, 9, 9, 9, 9, 9, 9]);
        let mut out = [0u8; 8];
        host.user_read(va, &mut out);
        assert_eq!(out, [9; 8]);
    }
}
