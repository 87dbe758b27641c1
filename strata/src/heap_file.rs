//! Heap files: one backing file of fixed-size pages per table.

use crate::buffer_pool::{BufferPool, PageRef};
use crate::error::{StorageError, StorageResult};
use crate::lock_manager::LockMode;
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::{Schema, Tuple};
use crate::PageId;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::fs::{create_dir_all, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A table's pages, stored contiguously in a single file: page k
/// occupies bytes `[k * page_size, (k + 1) * page_size)`.
///
/// The file identifies itself by the hash of its absolute path, which
/// doubles as the table id in every `PageId`.
pub struct HeapFile {
    file: Mutex<std::fs::File>,
    path: PathBuf,
    table_id: u64,
    schema: Schema,
}

impl HeapFile {
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema) -> io::Result<Self> {
        let path_ref = path.as_ref();
        crate::strata_debug_log!("[HeapFile::open] Opening table file at: {path_ref:?}");
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;

        let path = path_ref.canonicalize()?;
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let table_id = hasher.finish();

        Ok(Self {
            file: Mutex::new(file),
            path,
            table_id,
            schema,
        })
    }

    pub fn table_id(&self) -> u64 {
        self.table_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pages currently in the file, counting a trailing partial page as
    /// whole. A file that cannot be stat'ed reads as empty.
    pub fn num_pages(&self) -> usize {
        let len = self
            .file
            .lock()
            .unwrap()
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0);
        len.div_ceil(crate::page_size() as u64) as usize
    }

    /// Reads one page image from disk. The page must already exist in
    /// the file.
    pub fn read_page(&self, pid: PageId) -> StorageResult<HeapPage> {
        let page_size = crate::page_size();
        let offset = pid.page_no as u64 * page_size as u64;
        let mut buf = vec![0u8; page_size];
        {
            let mut file = self.file.lock().unwrap();
            if offset >= file.metadata()?.len() {
                return Err(StorageError::PageDoesNotExist(pid));
            }
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        crate::strata_debug_log!("[HeapFile::read_page] Read page {:?}", pid);
        HeapPage::parse(pid, &buf, self.schema.clone())
    }

    /// Writes one page image, extending the file when the page lies at
    /// or past the current end.
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let offset = page.id().page_no as u64 * crate::page_size() as u64;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.to_bytes())?;
        file.sync_all()?;
        crate::strata_debug_log!("[HeapFile::write_page] Wrote page {:?}", page.id());
        Ok(())
    }

    /// Finds a page with room and inserts `tuple` there, appending a
    /// fresh page when every existing one is full. Returns the pages the
    /// operation modified.
    ///
    /// The search takes only read locks; the chosen page is then
    /// re-requested exclusively, which the lock manager treats as an
    /// upgrade. Releasing the read lock in between would forfeit the
    /// free slot to a concurrent writer.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: Tuple,
        pool: &BufferPool,
    ) -> StorageResult<Vec<PageRef>> {
        for page_no in 0..self.num_pages() {
            let pid = PageId::new(self.table_id, page_no);
            let page = pool.get_page(tid, pid, LockMode::Shared)?;
            let has_room = page.read().unwrap().empty_slot_count() > 0;
            if !has_room {
                continue;
            }
            let page = pool.get_page(tid, pid, LockMode::Exclusive)?;
            page.write().unwrap().insert_tuple(tuple)?;
            return Ok(vec![page]);
        }

        // Every existing page is full: append an empty page, then fetch
        // it through the buffer pool under an exclusive lock.
        let pid = PageId::new(self.table_id, self.num_pages());
        crate::strata_debug_log!("[HeapFile::insert_tuple] Appending page {:?}", pid);
        self.write_page(&HeapPage::empty(pid, self.schema.clone()))?;
        let page = pool.get_page(tid, pid, LockMode::Exclusive)?;
        page.write().unwrap().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Deletes `tuple` from the page its record id names. Returns the
    /// modified pages.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> StorageResult<Vec<PageRef>> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::Db("tuple has no record id".to_string()))?;
        if rid.page_id.table_id != self.table_id {
            return Err(StorageError::Db(
                "tuple does not belong to this table".to_string(),
            ));
        }
        let page = pool.get_page(tid, rid.page_id, LockMode::Exclusive)?;
        page.write().unwrap().delete_tuple(tuple)?;
        Ok(vec![page])
    }
}

/// A lazy scan over every tuple in a heap file, page by page through
/// the buffer pool under read locks.
///
/// The iterator prefetches one tuple so `has_next` is idempotent. It is
/// restartable (`rewind` is close followed by open) and not thread-safe.
pub struct HeapFileIterator<'a> {
    file: Arc<HeapFile>,
    pool: &'a BufferPool,
    tid: TransactionId,
    opened: bool,
    next_page: usize,
    pending: VecDeque<Tuple>,
    next_tuple: Option<Tuple>,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(file: Arc<HeapFile>, pool: &'a BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            opened: false,
            next_page: 0,
            pending: VecDeque::new(),
            next_tuple: None,
        }
    }

    pub fn open(&mut self) {
        self.opened = true;
        self.next_page = 0;
        self.pending.clear();
        self.next_tuple = None;
    }

    /// After close, `has_next` reports false until the iterator is
    /// reopened.
    pub fn close(&mut self) {
        self.opened = false;
        self.next_page = 0;
        self.pending.clear();
        self.next_tuple = None;
    }

    pub fn rewind(&mut self) {
        self.close();
        self.open();
    }

    pub fn has_next(&mut self) -> StorageResult<bool> {
        if !self.opened {
            return Ok(false);
        }
        self.prefetch()?;
        Ok(self.next_tuple.is_some())
    }

    pub fn next(&mut self) -> StorageResult<Option<Tuple>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.next_tuple.take())
    }

    fn prefetch(&mut self) -> StorageResult<()> {
        if self.next_tuple.is_some() {
            return Ok(());
        }
        loop {
            if let Some(tuple) = self.pending.pop_front() {
                self.next_tuple = Some(tuple);
                return Ok(());
            }
            if self.next_page >= self.file.num_pages() {
                return Ok(());
            }
            let pid = PageId::new(self.file.table_id(), self.next_page);
            self.next_page += 1;
            let page = self.pool.get_page(self.tid, pid, LockMode::Shared)?;
            let guard = page.read().unwrap();
            self.pending.extend(guard.iter().cloned());
        }
    }
}
