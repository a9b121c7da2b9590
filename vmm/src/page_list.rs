//! Intrusive doubly-linked page lists over the shared [`FrameTable`].
//!
//! This plays the role of the teacher kernel's `intrusive_collections`-based
//! run queue (see `sched.rs`'s `ThreadRunQueueAdapter`), but links frames by
//! [`PfnIndex`] rather than by pointer: the PFN array is a single flat
//! allocation owned by the manager, not a collection of individually boxed
//! nodes, so there is no node to take a pointer into, and an index-based
//! link also rules out the PFN/PTE aliasing cycle called out in the design
//! notes. `add`/`remove` touch only link fields; callers are responsible for
//! setting `state` under the same lock, per spec.

use std::sync::Mutex;

use crate::frame_table::FrameTable;
use crate::pfn::PfnIndex;

#[derive(Debug, Default)]
struct ListMeta {
    head: Option<PfnIndex>,
    tail: Option<PfnIndex>,
    len: usize,
}

/// One of the three explicit page lists (Free, Modified, Standby). Active
/// frames are not tracked by any `PageList`; they are reachable through the
/// PTE array instead.
pub struct PageList {
    meta: Mutex<ListMeta>,
}

impl PageList {
    pub fn new() -> Self {
        Self {
            meta: Mutex::new(ListMeta::default()),
        }
    }

    /// Appends `idx` to the tail of this list.
    ///
    /// The caller must have already set `frames[idx].state` to the state
    /// this list represents, under this same lock acquisition (the mutex
    /// guard returned in the previous call on this thread, or equivalently,
    /// interleaved calls to [`PageList::push_back`] and direct
    /// `FrameTable` state writes within one critical section guarded by
    /// code that holds this list conceptually "locked" for the duration).
    pub fn push_back(&self, frames: &FrameTable, idx: PfnIndex) {
        let mut meta = self.meta.lock().unwrap();
        // Safety: this list's mutex is held for the duration of this call,
        // and `idx` is being inserted fresh (not currently linked into any
        // other list), per caller discipline.
        unsafe {
            frames.get_mut(idx).set_links(meta.tail, None);
        }
        if let Some(tail) = meta.tail {
            unsafe {
                let (prev, _) = frames.get(tail).links();
                frames.get_mut(tail).set_links(prev, Some(idx));
            }
        } else {
            meta.head = Some(idx);
        }
        meta.tail = Some(idx);
        meta.len += 1;
    }

    /// Removes and returns the head of this list, if any.
    pub fn pop_front(&self, frames: &FrameTable) -> Option<PfnIndex> {
        let mut meta = self.meta.lock().unwrap();
        let head = meta.head?;
        // Safety: this list's mutex is held for the duration of this call.
        let next = unsafe { frames.get(head).links().1 };
        meta.head = next;
        match next {
            Some(next) => unsafe {
                let (_, nn) = frames.get(next).links();
                frames.get_mut(next).set_links(None, nn);
            },
            None => meta.tail = None,
        }
        meta.len -= 1;
        unsafe {
            frames.get_mut(head).set_links(None, None);
        }
        Some(head)
    }

    /// Unlinks `idx` from this list. The caller must know `idx` is
    /// currently a member of this list (e.g. because it was looked up via
    /// `pte_back` on a frame whose state matches this list).
    pub fn remove(&self, frames: &FrameTable, idx: PfnIndex) {
        let mut meta = self.meta.lock().unwrap();
        // Safety: this list's mutex is held for the duration of this call.
        let (prev, next) = unsafe { frames.get(idx).links() };

        match prev {
            Some(prev) => unsafe {
                let (pp, _) = frames.get(prev).links();
                frames.get_mut(prev).set_links(pp, next);
            },
            None => meta.head = next,
        }
        match next {
            Some(next) => unsafe {
                let (_, nn) = frames.get(next).links();
                frames.get_mut(next).set_links(prev, nn);
            },
            None => meta.tail = prev,
        }

        meta.len -= 1;
        unsafe {
            frames.get_mut(idx).set_links(None, None);
        }
    }

    pub fn len(&self) -> usize {
        self.meta.lock().unwrap().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PageList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pfn::Pfn;

    fn make_table(n: usize) -> FrameTable {
        FrameTable::new((0..n).map(|_| Pfn::free()).collect())
    }

    #[test]
    fn push_pop_preserves_fifo_order() {
        let frames = make_table(4);
        let list = PageList::new();
        for i in 0..4 {
            list.push_back(&frames, PfnIndex::new(i));
        }
        assert_eq!(list.len(), 4);
        for i in 0..4 {
            assert_eq!(list.pop_front(&frames), Some(PfnIndex::new(i)));
        }
        assert!(list.is_empty());
        assert_eq!(list.pop_front(&frames), None);
    }

    #[test]
    fn remove_middle_element_relinks_neighbors() {
        let frames = make_table(3);
        let list = PageList::new();
        for i in 0..3 {
            list.push_back(&frames, PfnIndex::new(i));
        }
        list.remove(&frames, PfnIndex::new(1));
        assert_eq!(list.len(), 2);
        assert_eq!(list.pop_front(&frames), Some(PfnIndex::new(0)));
        assert_eq!(list.pop_front(&frames), Some(PfnIndex::new(2)));
    }

    #[test]
    fn remove_head_and_tail() {
        let frames = make_table(3);
        let list = PageList::new();
        for i in 0..3 {
            list.push_back(&frames, PfnIndex::new(i));
        }
        list.remove(&frames, PfnIndex::new(0));
        list.remove(&frames, PfnIndex::new(2));
        assert_eq!(list.pop_front(&frames), Some(PfnIndex::new(1)));
        assert!(list.is_empty());
    }
}
