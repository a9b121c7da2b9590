//! Black-box integration tests driving a real `VmManager<SimHost>` through
//! the literal-input seeds from spec §8.

use std::time::Duration;

use vmm::host::SimHost;
use vmm::types::VirtPageNum;
use vmm::{FaultOutcome, ManagerConfig, VmManager};

const WORKER_TIMEOUT: Duration = Duration::from_secs(2);

fn tiny_config(virtual_pages: usize, physical_pages: usize, batch_size: usize) -> ManagerConfig {
    ManagerConfig {
        virtual_pages,
        physical_pages,
        pagefile_slots: virtual_pages.max(2),
        batch_size,
    }
}

fn fault_until_success(manager: &VmManager<SimHost>, vpn: VirtPageNum) -> usize {
    let va = manager.va_of(vpn);
    let mut redos = 0;
    loop {
        match manager.page_fault_handler(va) {
            FaultOutcome::Success => return redos,
            FaultOutcome::Redo => redos += 1,
        }
    }
}

/// Cold fault then re-access: `N_p = 2`, `N_v = 4`, zero initial state. Fault
/// on `va[0]`; expect success; write a marker; read it back.
#[test]
fn cold_fault_then_reaccess() {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let manager = VmManager::initialize(tiny_config(4, 2, 2), host.clone()).unwrap();

    fault_until_success(&manager, VirtPageNum::new(0));
    let va0 = manager.va_of(VirtPageNum::new(0));

    let marker = vec![0xABu8; vmm::config::PAGE_SIZE];
    host.user_write(va0, &marker);

    let mut back = vec![0u8; vmm::config::PAGE_SIZE];
    host.user_read(va0, &mut back);
    assert_eq!(back, marker);
    assert_eq!(manager.active_count(), 1);
}

/// Overcommit trim: with `N_p = 2`, fault on `va[0]`, `va[1]`, `va[2]`.
/// Expect at least one `Redo` on the third fault; after the trim + write
/// cycle the third fault returns `Success`; afterwards `va[0]` or `va[1]`
/// is in Standby.
#[test]
fn overcommit_trim_resolves_via_redo() {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let manager = VmManager::initialize(tiny_config(4, 2, 2), host).unwrap();

    fault_until_success(&manager, VirtPageNum::new(0));
    fault_until_success(&manager, VirtPageNum::new(1));
    assert_eq!(manager.free_len(), 0);

    let redos = fault_until_success(&manager, VirtPageNum::new(2));
    assert!(redos >= 1, "third fault under overcommit should have seen at least one Redo");

    assert_eq!(manager.active_count(), 2);
    assert!(
        manager.standby_len() >= 1,
        "one of va[0]/va[1] should have been written out to Standby"
    );
}

/// Rescue from Modified: with `N_p = 2`, fault `va[0]`, `va[1]`; force a
/// trim so both move to Modified; fault again on `va[0]` before the writer
/// runs. Expect `Success` without drawing a new frame from Free and without
/// a pagefile read.
#[test]
fn rescue_from_modified_reuses_the_same_frame() {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let manager = VmManager::initialize(tiny_config(4, 2, 2), host.clone()).unwrap();

    fault_until_success(&manager, VirtPageNum::new(0));
    fault_until_success(&manager, VirtPageNum::new(1));

    let va0 = manager.va_of(VirtPageNum::new(0));
    let marker = vec![0x11u8; vmm::config::PAGE_SIZE];
    host.user_write(va0, &marker);

    // Drive the trimmer directly (batch size covers both pages) so
    // va[0]/va[1] land on Modified without racing a third fault — there is
    // no third frame to draw one with anyway. We don't request a write, so
    // both stay Modified.
    manager.request_trim();
    assert!(
        manager.wait_until_modified_len_at_least(2, WORKER_TIMEOUT),
        "trimmer did not make progress in time"
    );
    assert_eq!(manager.active_count(), 0);
    assert_eq!(manager.modified_len(), 2);

    // Rescue: fault va[0] again before the writer has touched it.
    let outcome = manager.page_fault_handler(va0);
    assert_eq!(outcome, FaultOutcome::Success);
    assert_eq!(manager.active_count(), 1);
    assert_eq!(manager.modified_len(), 1);

    let mut back = vec![0u8; vmm::config::PAGE_SIZE];
    host.user_read(va0, &mut back);
    assert_eq!(back, marker, "rescue from Modified must preserve the page's content");
}

/// Rescue from Standby: same setup, but the writer has already written
/// `va[0]`'s content out to a slot. On the next fault, expect `Success`,
/// the PFN returning to Active, and the slot being freed.
#[test]
fn rescue_from_standby_frees_its_slot() {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let manager = VmManager::initialize(tiny_config(4, 2, 2), host.clone()).unwrap();

    fault_until_success(&manager, VirtPageNum::new(0));
    fault_until_success(&manager, VirtPageNum::new(1));

    let va0 = manager.va_of(VirtPageNum::new(0));
    let marker = vec![0x22u8; vmm::config::PAGE_SIZE];
    host.user_write(va0, &marker);

    manager.request_trim();
    assert!(manager.wait_until_modified_len_at_least(2, WORKER_TIMEOUT));

    manager.request_write();
    assert!(manager.wait_until_standby_len_at_least(2, WORKER_TIMEOUT));
    assert_eq!(manager.modified_len(), 0);

    let slot_before = {
        // The content round-trips through the pagefile; we only assert on
        // observable manager state (list membership) plus the data itself.
        manager.standby_len()
    };
    assert_eq!(slot_before, 2);

    let outcome = manager.page_fault_handler(va0);
    assert_eq!(outcome, FaultOutcome::Success);
    assert_eq!(manager.active_count(), 1);
    assert_eq!(manager.standby_len(), 1, "rescuing va[0] must remove it from Standby");

    let mut back = vec![0u8; vmm::config::PAGE_SIZE];
    host.user_read(va0, &mut back);
    assert_eq!(back, marker, "rescue from Standby must preserve the page's content");
}

/// Repurpose: with Free empty and Standby non-empty, fault on an unseen
/// `va[2]`. Expect the head of Standby to be repurposed: its prior PTE
/// flips to Disk with the saved slot, the frame is zeroed, and the faulting
/// PTE becomes Valid.
#[test]
fn repurpose_converts_standby_frame_to_new_va() {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let manager = VmManager::initialize(tiny_config(4, 2, 2), host.clone()).unwrap();

    fault_until_success(&manager, VirtPageNum::new(0));
    fault_until_success(&manager, VirtPageNum::new(1));
    manager.request_trim();
    assert!(manager.wait_until_modified_len_at_least(2, WORKER_TIMEOUT));
    manager.request_write();
    assert!(manager.wait_until_standby_len_at_least(2, WORKER_TIMEOUT));

    fault_until_success(&manager, VirtPageNum::new(2));
    assert_eq!(manager.standby_len(), 1, "repurposing one Standby frame must leave the other");

    let va2 = manager.va_of(VirtPageNum::new(2));
    let mut content = vec![0xFFu8; vmm::config::PAGE_SIZE];
    host.user_read(va2, &mut content);
    assert!(
        content.iter().all(|&b| b == 0),
        "repurposed frame must be zero-filled for an unseen VA"
    );
}

/// Pagefile read: force eviction of `va[0]` all the way through to Standby,
/// then repurpose its frame via an unrelated fault so `va[0]`'s PTE flips to
/// Disk. Fault on `va[0]` again (which now must itself wait out a further
/// trim+write cycle to get a frame back, since Free and Standby are both
/// empty at that point); expect the content read back from the pagefile to
/// equal the last marker written.
#[test]
fn pagefile_read_restores_evicted_content() {
    let host = SimHost::new(2, vmm::config::PAGE_SIZE);
    let manager = VmManager::initialize(tiny_config(4, 2, 1), host.clone()).unwrap();

    fault_until_success(&manager, VirtPageNum::new(0));
    fault_until_success(&manager, VirtPageNum::new(1));
    let va0 = manager.va_of(VirtPageNum::new(0));
    let marker = vec![0x77u8; vmm::config::PAGE_SIZE];
    host.user_write(va0, &marker);

    // Batch size 1: the trimmer's cursor reaches va[0] first, so a single
    // trim pass moves only va[0] to Modified; va[1] stays Active.
    manager.request_trim();
    assert!(manager.wait_until_modified_len_at_least(1, WORKER_TIMEOUT));
    assert_eq!(manager.modified_len(), 1);

    manager.request_write();
    assert!(manager.wait_until_standby_len_at_least(1, WORKER_TIMEOUT));
    assert_eq!(manager.standby_len(), 1);

    // Faulting an unseen va[2] repurposes va[0]'s Standby frame, flipping
    // va[0] to Disk format.
    fault_until_success(&manager, VirtPageNum::new(2));
    assert_eq!(manager.standby_len(), 0);

    // Faulting va[0] again now requires both a further trim+write cycle (to
    // reclaim va[1]'s frame, since Free and Standby are both empty) and a
    // pagefile read. The fault handler's own Redo path wakes the trimmer
    // automatically, but the call blocks the calling thread until that
    // happens, so drive it from its own thread.
    let waiter = {
        let manager = std::sync::Arc::clone(&manager);
        std::thread::spawn(move || fault_until_success(&manager, VirtPageNum::new(0)))
    };
    let redos = waiter.join().expect("fault thread panicked");
    assert!(redos >= 1, "reclaiming va[1]'s frame for va[0] should have required at least one Redo");

    let mut back = vec![0u8; vmm::config::PAGE_SIZE];
    host.user_read(va0, &mut back);
    assert_eq!(back, marker, "pagefile read-back must restore the last written content");
}
