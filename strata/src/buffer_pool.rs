//! The buffer pool: a bounded page cache with clock replacement,
//! no-steal/force transaction semantics, and the lock manager in front
//! of every page access.

use crate::catalog::Catalog;
use crate::error::{StorageError, StorageResult};
use crate::lock_manager::{LockManager, LockMode};
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::PageId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// The default number of pages a pool caches.
pub const DEFAULT_PAGES: usize = 50;

/// A shared handle to a cached page. The page is borrowed under the
/// lock the transaction holds on it; callers must not retain a handle
/// past `transaction_complete`.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Cache and clock state, guarded by one mutex that is held only
/// around lookups, eviction and installation, never across disk I/O.
#[derive(Default)]
struct PoolState {
    cache: HashMap<PageId, PageRef>,
    ref_bits: HashMap<PageId, u8>,
    /// Cached page ids in access order; the hand walks this ring.
    clock_ring: Vec<PageId>,
    clock_hand: usize,
}

/// The single gate for page access. Operators ask it for pages; it
/// acquires the right lock, serves from cache or disk, evicts clean
/// pages when full, and settles each transaction's pages at commit or
/// abort.
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    state: Mutex<PoolState>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, capacity: usize) -> Self {
        Self {
            capacity,
            catalog,
            lock_manager: LockManager::new(),
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Retrieves a page under the requested lock mode, blocking until
    /// the lock manager grants it. A miss reads the page from the
    /// owning table's file, evicting a clean page first when the cache
    /// is full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
    ) -> StorageResult<PageRef> {
        self.lock_manager.acquire_lock(pid, tid, mode)?;

        {
            let mut state = self.state.lock().unwrap();
            if let Some(page) = state.cache.get(&pid).cloned() {
                state.ref_bits.insert(pid, 1);
                // A hit refreshes the page's position in the ring, so
                // the hand meets recently used pages last.
                if let Some(at) = state.clock_ring.iter().position(|&p| p == pid) {
                    state.clock_ring.remove(at);
                    if state.clock_hand > at {
                        state.clock_hand -= 1;
                    }
                }
                state.clock_ring.push(pid);
                return Ok(page);
            }
        }

        // Miss: do the disk read without holding the pool mutex.
        let file = self.catalog.file(pid.table_id)?;
        let page = match file.read_page(pid) {
            Err(StorageError::PageDoesNotExist(pid)) => {
                return Err(StorageError::Db(format!(
                    "page {pid:?} does not exist in its table file"
                )))
            }
            other => other?,
        };

        let mut state = self.state.lock().unwrap();
        // Another reader may have installed the page meanwhile.
        if let Some(existing) = state.cache.get(&pid).cloned() {
            state.ref_bits.insert(pid, 1);
            return Ok(existing);
        }
        if state.cache.len() >= self.capacity {
            Self::evict_page(&mut state)?;
        }
        let handle: PageRef = Arc::new(RwLock::new(page));
        state.cache.insert(pid, Arc::clone(&handle));
        state.ref_bits.insert(pid, 1);
        state.clock_ring.push(pid);
        Ok(handle)
    }

    /// Inserts `tuple` into `table_id` on behalf of `tid`, write-locking
    /// whatever pages the heap file touches and marking them dirty.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u64,
        tuple: crate::tuple::Tuple,
    ) -> StorageResult<()> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(tid, tuple, self)?;
        self.install_dirty_pages(tid, pages)
    }

    /// Deletes `tuple` from its home page on behalf of `tid`. The table
    /// is recovered from the tuple's record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &crate::tuple::Tuple) -> StorageResult<()> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::Db("tuple has no record id".to_string()))?;
        let file = self.catalog.file(rid.page_id.table_id)?;
        let pages = file.delete_tuple(tid, tuple, self)?;
        self.install_dirty_pages(tid, pages)
    }

    /// Marks every modified page dirty-by `tid` and makes sure the
    /// cache holds the up-to-date version.
    fn install_dirty_pages(&self, tid: TransactionId, pages: Vec<PageRef>) -> StorageResult<()> {
        for page in pages {
            let pid = {
                let mut guard = page.write().unwrap();
                guard.mark_dirty(Some(tid));
                guard.id()
            };
            let mut state = self.state.lock().unwrap();
            if !state.cache.contains_key(&pid) {
                if state.cache.len() >= self.capacity {
                    Self::evict_page(&mut state)?;
                }
                state.cache.insert(pid, Arc::clone(&page));
            }
            state.ref_bits.insert(pid, 1);
            if !state.clock_ring.contains(&pid) {
                state.clock_ring.push(pid);
            }
        }
        Ok(())
    }

    /// Completes `tid` with `commit = true`.
    pub fn commit(&self, tid: TransactionId) {
        self.transaction_complete(tid, true);
    }

    pub fn abort(&self, tid: TransactionId) {
        self.transaction_complete(tid, false);
    }

    /// Settles every page `tid` holds a lock on, then releases the
    /// locks. On commit the dirty pages are forced to disk; on abort
    /// each page is replaced with its on-disk image. I/O failures are
    /// recorded and never keep a lock held.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) {
        crate::strata_debug_log!(
            "[BufferPool::transaction_complete] tx {:?} commit={}",
            tid,
            commit
        );
        for pid in self.lock_manager.pages_locked_by(tid) {
            let settled = if commit {
                self.flush_page(pid)
            } else {
                self.revert_page(pid)
            };
            if let Err(e) = settled {
                crate::strata_debug_log!(
                    "[BufferPool::transaction_complete] i/o failure on {:?}: {:?}",
                    pid,
                    e
                );
            }
            self.lock_manager.release_lock(pid, tid);
        }
    }

    /// Releases a single lock with no flushing. Callers take on the
    /// consistency risk; the cached page may hold writes that are now
    /// unprotected.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release_lock(pid, tid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(pid, tid)
    }

    /// Writes one cached page through to disk if dirty, then marks it
    /// clean. Absent pages are ignored.
    pub fn flush_page(&self, pid: PageId) -> StorageResult<()> {
        let handle = { self.state.lock().unwrap().cache.get(&pid).cloned() };
        let Some(handle) = handle else {
            return Ok(());
        };
        if handle.read().unwrap().dirty_by().is_none() {
            return Ok(());
        }
        let file = self.catalog.file(pid.table_id)?;
        {
            let guard = handle.read().unwrap();
            file.write_page(&guard)?;
        }
        handle.write().unwrap().mark_dirty(None);
        Ok(())
    }

    /// Writes every dirty cached page to disk. Breaks the no-steal
    /// discipline when transactions are in flight; meant for tests and
    /// shutdown.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let pids: Vec<PageId> = {
            let state = self.state.lock().unwrap();
            state.cache.keys().copied().collect()
        };
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Writes every page `tid` holds a lock on.
    pub fn flush_pages(&self, tid: TransactionId) -> StorageResult<()> {
        for pid in self.lock_manager.pages_locked_by(tid) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without flushing.
    pub fn discard_page(&self, pid: PageId) {
        let mut state = self.state.lock().unwrap();
        state.cache.remove(&pid);
        state.ref_bits.remove(&pid);
        if let Some(at) = state.clock_ring.iter().position(|&p| p == pid) {
            state.clock_ring.remove(at);
        }
        if state.clock_hand >= state.clock_ring.len() {
            state.clock_hand = 0;
        }
    }

    /// Replaces a cached page with its on-disk image and marks it
    /// clean. Used on abort; the disk copy predates the aborting
    /// transaction's writes because dirty pages are never stolen.
    fn revert_page(&self, pid: PageId) -> StorageResult<()> {
        let file = self.catalog.file(pid.table_id)?;
        let fresh = file.read_page(pid)?;
        let mut state = self.state.lock().unwrap();
        state.cache.insert(pid, Arc::new(RwLock::new(fresh)));
        state.ref_bits.insert(pid, 1);
        if !state.clock_ring.contains(&pid) {
            state.clock_ring.push(pid);
        }
        Ok(())
    }

    /// Clock (second-chance) eviction. Walks the ring at most twice:
    /// reference bit 1 buys a page one more lap, a clean page at bit 0
    /// is discarded, and a dirty page is never evicted. Stale ring
    /// entries for already-discarded pages are pruned in passing.
    fn evict_page(state: &mut PoolState) -> StorageResult<()> {
        if state.clock_ring.is_empty() {
            return Err(StorageError::Db(
                "no pages in buffer pool to evict".to_string(),
            ));
        }

        let mut attempts = 0;
        let max_attempts = state.clock_ring.len() * 2;
        while attempts < max_attempts {
            if state.clock_hand >= state.clock_ring.len() {
                state.clock_hand = 0;
            }
            let pid = state.clock_ring[state.clock_hand];

            let Some(page) = state.cache.get(&pid) else {
                state.clock_ring.remove(state.clock_hand);
                state.ref_bits.remove(&pid);
                continue;
            };

            let ref_bit = *state
                .ref_bits
                .get(&pid)
                .ok_or_else(|| StorageError::Db(format!("no reference bit for page {pid:?}")))?;

            if ref_bit == 0 {
                if page.read().unwrap().dirty_by().is_none() {
                    crate::strata_debug_log!("[BufferPool::evict_page] evicting {:?}", pid);
                    state.cache.remove(&pid);
                    state.ref_bits.remove(&pid);
                    state.clock_ring.remove(state.clock_hand);
                    if state.clock_hand >= state.clock_ring.len() {
                        state.clock_hand = 0;
                    }
                    return Ok(());
                }
                // Dirty at bit 0: not stealable, move on.
            } else {
                state.ref_bits.insert(pid, 0);
            }
            state.clock_hand += 1;
            attempts += 1;
        }

        Err(StorageError::Db(
            "all pages dirty, cannot evict any page".to_string(),
        ))
    }
}
