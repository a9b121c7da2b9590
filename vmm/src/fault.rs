//! The fault handler (§4.3): services a miss on a virtual address.

use std::sync::atomic::Ordering;
use std::sync::MutexGuard;

use crate::host::{PhysicalPageSource, TransferWindow, VirtualMemoryHost};
use crate::manager::{FaultOutcome, VmManager};
use crate::pfn::{PfnIndex, PfnState};
use crate::pte::{self, PageTableEntry, PteView};
use crate::types::VirtAddr;

enum Fill {
    Zero,
    FromDisk(crate::types::DiskSlot),
}

impl<H: VirtualMemoryHost + PhysicalPageSource + Send + Sync + 'static> VmManager<H> {
    /// Services a fault on `va`. Returns [`FaultOutcome::Success`] once the
    /// PTE is Valid and the host mapping is installed, or
    /// [`FaultOutcome::Redo`] if no frame could be obtained — the caller
    /// must wait on `redo_fault` and call this again from the top.
    pub fn page_fault_handler(&self, va: VirtAddr) -> FaultOutcome {
        let vpn = self.vpn_of(va);
        let mut pt = self.pt.lock().unwrap();

        let current = pt[vpn.as_usize()];
        if pte::is_valid(current) {
            return FaultOutcome::Success;
        }

        let (idx, frame, fill) = match pte::decode(current) {
            PteView::Transition(frame) => {
                let idx = self.pfn_of(frame);
                // Safety: the PT-lock is held, and every mutator of this
                // frame's list membership acquires the PT-lock before its
                // own list lock (§5's lock ordering), so no concurrent
                // change to this frame's state can be in flight.
                let state = unsafe { self.frames.get(idx).state };
                match state {
                    PfnState::Standby => {
                        let slot = unsafe { self.frames.get(idx).disk_slot };
                        self.pagefile.free_slot(slot);
                        self.standby_list.remove(&self.frames, idx);
                    }
                    PfnState::Modified => self.modified_list.remove(&self.frames, idx),
                    other => panic!(
                        "invariant violation: Transition PTE for {va} names a PFN in state \
                         {other:?}, expected Modified or Standby"
                    ),
                }
                (idx, frame, None)
            }
            PteView::Valid(_) => unreachable!("is_valid already handled this case"),
            PteView::Zero => match self.obtain_frame(&mut pt) {
                Some(idx) => (idx, self.frame_of(idx), Some(Fill::Zero)),
                None => return self.wait_for_redo(pt),
            },
            PteView::Disk(slot) => match self.obtain_frame(&mut pt) {
                Some(idx) => (idx, self.frame_of(idx), Some(Fill::FromDisk(slot))),
                None => return self.wait_for_redo(pt),
            },
        };

        if let Some(fill) = fill {
            let mut window = self.host.transfer_window();
            window.map(frame);
            match fill {
                Fill::Zero => window.zero(),
                Fill::FromDisk(slot) => {
                    let mut buf = vec![0u8; crate::config::PAGE_SIZE];
                    self.pagefile.read_slot(slot, &mut buf);
                    window.copy_in(&buf);
                    self.pagefile.free_slot(slot);
                }
            }
            window.unmap();
        }

        // Activate: these four writes happen together, under the PT-lock,
        // per §4.3 step 6.
        self.host.map(va, frame);
        // Safety: PT-lock held; see the rescue-path comment above.
        unsafe {
            let pfn = self.frames.get_mut(idx);
            pfn.state = PfnState::Active;
            pfn.pte_back = Some(vpn);
        }
        pt[vpn.as_usize()] = pte::make_valid_pte(frame);
        self.active_count.fetch_add(1, Ordering::SeqCst);

        FaultOutcome::Success
    }

    /// Pops Free, falling back to [`Self::repurpose`] when Free is empty.
    fn obtain_frame(&self, pt: &mut [PageTableEntry]) -> Option<PfnIndex> {
        self.free_list
            .pop_front(&self.frames)
            .or_else(|| self.repurpose(pt))
    }

    /// §4.3.1: harvests the head of Standby. Flips its old PTE to Disk
    /// format using the saved slot before the frame is reused, then
    /// zero-fills it via the transfer VA. `None` if Standby is also empty.
    fn repurpose(&self, pt: &mut [PageTableEntry]) -> Option<PfnIndex> {
        let idx = self.standby_list.pop_front(&self.frames)?;
        // Safety: PT-lock held by the caller.
        let (old_vpn, slot) = unsafe {
            let pfn = self.frames.get(idx);
            (
                pfn.pte_back.expect("standby pfn missing its PTE back-reference"),
                pfn.disk_slot,
            )
        };
        pt[old_vpn.as_usize()] = pte::make_disk_pte(slot);

        let frame = self.frame_of(idx);
        let mut window = self.host.transfer_window();
        window.map(frame);
        window.zero();
        window.unmap();

        Some(idx)
    }

    fn wait_for_redo(&self, pt: MutexGuard<'_, Vec<PageTableEntry>>) -> FaultOutcome {
        // Reset before releasing the PT-lock and signalling, mirroring the
        // original design's "ResetEvent before SetEvent(trimEvent)" order,
        // so a stale signal from a previous redo cycle can't let this wait
        // return immediately.
        self.redo_fault.reset();
        drop(pt);
        self.start_trim.set();
        self.redo_fault.wait();
        FaultOutcome::Redo
    }
}
