//! The trimmer worker (§4.4): Active -> Modified sweeper.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::host::{PhysicalPageSource, VirtualMemoryHost};
use crate::manager::VmManager;
use crate::pfn::PfnState;
use crate::pte::{self, PteView};
use crate::types::VirtPageNum;

/// How long each wait-for-event poll blocks before re-checking
/// `system_shutdown`. There is no portable `WaitForMultipleObjects`
/// equivalent in `std`, so the event pair from spec §4.4 is modeled as a
/// short poll loop instead of a single blocking multi-wait.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Thread entry point for the trimmer. Runs until `system_shutdown` is set.
pub fn trimmer_worker<H>(manager: Arc<VmManager<H>>)
where
    H: VirtualMemoryHost + PhysicalPageSource + Send + Sync + 'static,
{
    let mut scan_cursor = VirtPageNum::new(0);
    loop {
        if manager.system_shutdown.wait_timeout(Duration::from_millis(0)) {
            return;
        }
        if !manager.start_trim.wait_timeout(POLL_INTERVAL) {
            continue;
        }
        if manager.system_shutdown.wait_timeout(Duration::from_millis(0)) {
            return;
        }
        scan_cursor = trim_pass(&manager, scan_cursor);
    }
}

/// One wake's worth of work: gather up to `batch_size` Active PTEs starting
/// at `scan_cursor`, unmap them, and move their frames to Modified. Returns
/// the cursor position to resume from next wake.
fn trim_pass<H>(manager: &VmManager<H>, scan_cursor: VirtPageNum) -> VirtPageNum
where
    H: VirtualMemoryHost + PhysicalPageSource + Send + Sync + 'static,
{
    let n_v = manager.config().virtual_pages;
    let batch = manager.config().batch_size;

    let mut pt = manager.pt.lock().unwrap();

    let mut gathered = Vec::with_capacity(batch);
    let mut cursor = scan_cursor.as_usize();
    let mut examined = 0;

    while examined < n_v && gathered.len() < batch {
        let vpn = VirtPageNum::new(cursor);
        if let PteView::Valid(frame) = pte::decode(pt[cursor]) {
            let idx = manager.pfn_of(frame);
            // Safety: PT-lock held; every mutator of this frame's state
            // also holds the PT-lock (§5 lock ordering), so nothing
            // concurrent can change it out from under this read.
            let (state, back) = unsafe {
                let pfn = manager.frames.get(idx);
                (pfn.state, pfn.pte_back)
            };
            assert_eq!(
                state,
                PfnState::Active,
                "trimmer found a non-Active PFN behind a Valid PTE at {vpn}"
            );
            assert_eq!(
                back,
                Some(vpn),
                "trimmer found a PFN whose back-reference disagrees with its own PTE"
            );
            gathered.push((vpn, idx, frame));
        }
        cursor = (cursor + 1) % n_v;
        examined += 1;
    }

    if !gathered.is_empty() {
        let vas: Vec<_> = gathered.iter().map(|&(vpn, ..)| manager.va_of(vpn)).collect();
        manager.host.unmap_scatter(&vas);

        for &(vpn, idx, frame) in &gathered {
            pt[vpn.as_usize()] = pte::make_transition_pte(frame);
            // Safety: PT-lock held for the PTE rewrite; `push_back` takes
            // the Modified-list's own lock for the link/state write below.
            unsafe {
                manager.frames.get_mut(idx).state = PfnState::Modified;
            }
            manager.modified_list.push_back(&manager.frames, idx);
        }
    }

    drop(pt);

    // Signalled unconditionally, even on an empty pass, matching the
    // original design (property 11: workers make progress on idle wakes).
    manager.start_write.set();
    manager.active_count.fetch_sub(gathered.len(), Ordering::SeqCst);

    VirtPageNum::new(cursor)
}
