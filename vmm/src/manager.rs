//! The manager: owns every piece of shared state named in §9's "group them
//! into a single manager value" note, and the bring-up sequence of §4.7.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::ManagerConfig;
use crate::error::{Result, VmError};
use crate::event::{AutoResetEvent, ManualResetEvent};
use crate::frame_table::FrameTable;
use crate::host::{PhysicalPageSource, VirtualMemoryHost};
use crate::page_list::PageList;
use crate::pfn::{Pfn, PfnIndex};
use crate::pte::{self, PageTableEntry};
use crate::types::{FrameNumber, VirtAddr, VirtPageNum};
use crate::{trimmer, writer};

/// The live manager. Generic over the host backend so tests can run many
/// independent instances side by side, per §9's "avoid true global
/// singletons" note.
pub struct VmManager<H: VirtualMemoryHost + PhysicalPageSource> {
    pub(crate) host: H,
    pub(crate) config: ManagerConfig,
    pub(crate) va_base: VirtAddr,

    /// The PT-lock: guards every PTE mutation, and is also acquired for the
    /// reads spec §4.3/§4.4 require to happen under it.
    pub(crate) pt: Mutex<Vec<PageTableEntry>>,
    pub(crate) frames: FrameTable,
    pub(crate) frame_of: Vec<FrameNumber>,
    pub(crate) pfn_of: HashMap<FrameNumber, PfnIndex>,

    pub(crate) free_list: PageList,
    pub(crate) modified_list: PageList,
    pub(crate) standby_list: PageList,
    pub(crate) pagefile: crate::pagefile::Pagefile,

    pub(crate) active_count: AtomicUsize,

    pub(crate) redo_fault: ManualResetEvent,
    pub(crate) start_trim: AutoResetEvent,
    pub(crate) start_write: AutoResetEvent,
    pub(crate) system_shutdown: ManualResetEvent,

    workers: Mutex<Option<WorkerHandles>>,
}

struct WorkerHandles {
    trimmer: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Result of [`VmManager::page_fault_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The PTE is now Valid; the caller may retry its access.
    Success,
    /// No frame could be obtained. The caller must wait on `redo_fault` and
    /// restart the fault from the top.
    Redo,
}

impl<H: VirtualMemoryHost + PhysicalPageSource + Send + Sync + 'static> VmManager<H> {
    /// Bring-up per §4.7: acquire frames, reserve VA, build the PTE/PFN
    /// arrays and pagefile, construct events, spawn the trimmer and writer.
    pub fn initialize(config: ManagerConfig, host: H) -> Result<Arc<Self>> {
        config.validate()?;

        let frames = host.get_physical_pages(config.physical_pages)?;
        if frames.is_empty() {
            return Err(VmError::FrameAllocationFailed {
                reason: "host delivered zero physical frames".into(),
            });
        }
        if frames.len() < config.physical_pages {
            log::warn!(
                "host delivered {} of {} requested physical frames; continuing with fewer",
                frames.len(),
                config.physical_pages
            );
        }

        let va_base = host.reserve_va_region(config.virtual_pages)?;

        let pt = vec![pte::make_zero_pte(); config.virtual_pages];

        let pfn_of: HashMap<FrameNumber, PfnIndex> = frames
            .iter()
            .enumerate()
            .map(|(i, &frame)| (frame, PfnIndex::new(i)))
            .collect();
        let pfns: Vec<Pfn> = frames.iter().map(|_| Pfn::free()).collect();
        let frame_table = FrameTable::new(pfns);

        let free_list = PageList::new();
        for i in 0..frames.len() {
            free_list.push_back(&frame_table, PfnIndex::new(i));
        }

        let pagefile = crate::pagefile::Pagefile::new(config.pagefile_slots, crate::config::PAGE_SIZE);

        let manager = Arc::new(Self {
            host,
            config,
            va_base,
            pt: Mutex::new(pt),
            frames: frame_table,
            frame_of: frames,
            pfn_of,
            free_list,
            modified_list: PageList::new(),
            standby_list: PageList::new(),
            pagefile,
            active_count: AtomicUsize::new(0),
            redo_fault: ManualResetEvent::new(),
            start_trim: AutoResetEvent::new(),
            start_write: AutoResetEvent::new(),
            system_shutdown: ManualResetEvent::new(),
            workers: Mutex::new(None),
        });

        let trimmer_manager = Arc::clone(&manager);
        let trimmer_handle = std::thread::Builder::new()
            .name("trimmer".into())
            .spawn(move || trimmer::trimmer_worker(trimmer_manager))
            .expect("failed to spawn trimmer thread");

        let writer_manager = Arc::clone(&manager);
        let writer_handle = std::thread::Builder::new()
            .name("writer".into())
            .spawn(move || writer::writer_worker(writer_manager))
            .expect("failed to spawn writer thread");

        *manager.workers.lock().unwrap() = Some(WorkerHandles {
            trimmer: trimmer_handle,
            writer: writer_handle,
        });

        Ok(manager)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn active_count(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    pub fn free_len(&self) -> usize {
        self.free_list.len()
    }

    pub fn modified_len(&self) -> usize {
        self.modified_list.len()
    }

    pub fn standby_len(&self) -> usize {
        self.standby_list.len()
    }

    pub fn va_base(&self) -> VirtAddr {
        self.va_base
    }

    /// Wakes the trimmer for one pass without waiting for natural pressure
    /// (Free exhaustion during a fault) to trigger it. Exposed so tests can
    /// deterministically exercise the rescue-from-Modified and
    /// rescue-from-Standby scenarios from spec §8 without racing a
    /// concurrent fault.
    pub fn request_trim(&self) {
        self.start_trim.set();
    }

    /// Wakes the writer for one pass. See [`Self::request_trim`].
    pub fn request_write(&self) {
        self.start_write.set();
    }

    /// Blocks the calling thread until `modified_len() >= n`, or `timeout`
    /// elapses. A small polling helper for tests that need to observe the
    /// trimmer's pass complete without racing a concurrent fault.
    pub fn wait_until_modified_len_at_least(&self, n: usize, timeout: std::time::Duration) -> bool {
        self.poll_until(timeout, || self.modified_len() >= n)
    }

    /// Blocks the calling thread until `standby_len() >= n`, or `timeout`
    /// elapses. See [`Self::wait_until_modified_len_at_least`].
    pub fn wait_until_standby_len_at_least(&self, n: usize, timeout: std::time::Duration) -> bool {
        self.poll_until(timeout, || self.standby_len() >= n)
    }

    fn poll_until(&self, timeout: std::time::Duration, mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if predicate() {
                return true;
            }
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
    }

    pub fn va_of(&self, vpn: VirtPageNum) -> VirtAddr {
        VirtAddr::new(self.va_base.as_usize() + vpn.as_usize() * crate::config::PAGE_SIZE)
    }

    pub fn vpn_of(&self, va: VirtAddr) -> VirtPageNum {
        VirtPageNum::new((va.as_usize() - self.va_base.as_usize()) / crate::config::PAGE_SIZE)
    }

    pub(crate) fn frame_of(&self, idx: PfnIndex) -> FrameNumber {
        self.frame_of[idx.as_usize()]
    }

    pub(crate) fn pfn_of(&self, frame: FrameNumber) -> PfnIndex {
        self.pfn_of[&frame]
    }
}

impl<H: VirtualMemoryHost + PhysicalPageSource> Drop for VmManager<H> {
    /// Signals shutdown and joins both worker threads, mirroring the design
    /// note's `system_shutdown` event, so tests never leak running threads.
    fn drop(&mut self) {
        self.system_shutdown.set();
        self.start_trim.set();
        self.start_write.set();
        if let Some(handles) = self.workers.lock().unwrap().take() {
            let _ = handles.trimmer.join();
            let _ = handles.writer.join();
        }
    }
}
