//! The writer worker (§4.5): Modified -> Standby batcher.

use std::sync::Arc;
use std::time::Duration;

use crate::host::{PhysicalPageSource, TransferWindow, VirtualMemoryHost};
use crate::manager::VmManager;
use crate::pfn::PfnState;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Thread entry point for the writer. Runs until `system_shutdown` is set.
pub fn writer_worker<H>(manager: Arc<VmManager<H>>)
where
    H: VirtualMemoryHost + PhysicalPageSource + Send + Sync + 'static,
{
    loop {
        if manager.system_shutdown.wait_timeout(Duration::from_millis(0)) {
            return;
        }
        if !manager.start_write.wait_timeout(POLL_INTERVAL) {
            continue;
        }
        if manager.system_shutdown.wait_timeout(Duration::from_millis(0)) {
            return;
        }
        write_pass(&manager);
    }
}

/// One wake's worth of work: drain up to `batch_size` entries from Modified,
/// write their content out to freshly-allocated pagefile slots, and move
/// them to Standby.
fn write_pass<H>(manager: &VmManager<H>)
where
    H: VirtualMemoryHost + PhysicalPageSource + Send + Sync + 'static,
{
    let batch = manager.config().batch_size;
    let pt = manager.pt.lock().unwrap();

    let mut gathered = Vec::with_capacity(batch);
    for _ in 0..batch {
        let idx = match manager.modified_list.pop_front(&manager.frames) {
            Some(idx) => idx,
            None => break,
        };
        let slot = manager.pagefile.allocate_slot();
        if slot.is_none() {
            // Pagefile full: this entry stays logically Modified; put it
            // back (at the tail is fine, order here is not meaningful) and
            // stop, exactly as spec §4.5 describes for partial batches.
            manager.modified_list.push_back(&manager.frames, idx);
            break;
        }
        let frame = manager.frame_of(idx);
        // Safety: PT-lock held; this frame was just unlinked from Modified
        // above, so nothing else can be touching it concurrently.
        unsafe {
            manager.frames.get_mut(idx).disk_slot = slot;
        }
        gathered.push((idx, frame, slot));
    }

    if !gathered.is_empty() {
        // Batch-map the gathered frames into one transfer window with a
        // single host call, mirroring the trimmer's `unmap_scatter` usage
        // and spec §4.5 steps 4/7.
        let frames: Vec<_> = gathered.iter().map(|&(_, frame, _)| frame).collect();
        let mut window = manager.host.transfer_window();
        window.map_batch(&frames);

        let mut buf = vec![0u8; crate::config::PAGE_SIZE];
        for (i, &(idx, _, slot)) in gathered.iter().enumerate() {
            window.copy_out_at(i, &mut buf);
            manager.pagefile.write_slot(slot, &buf);
            // Safety: PT-lock held; `push_back` takes the Standby-list's own
            // lock for the link/state write below.
            unsafe {
                manager.frames.get_mut(idx).state = PfnState::Standby;
            }
            manager.standby_list.push_back(&manager.frames, idx);
        }

        window.unmap();
    }

    drop(pt);

    // Signalled unconditionally, even on an empty pass, matching the
    // original design: redo_fault wakes every thread currently parked on
    // it regardless of whether this particular wake made progress.
    manager.redo_fault.set();
}
