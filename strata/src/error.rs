use crate::lock_manager::LockError;
use crate::PageId;
use std::io;

/// The failures the storage layer exposes to its callers.
///
/// `Aborted` is kept apart from everything else on purpose: it is the one
/// error whose recovery is fixed (roll the transaction back), and callers
/// must be able to match on it without string inspection.
#[derive(Debug)]
pub enum StorageError {
    /// The transaction was chosen as a deadlock victim and must roll back.
    Aborted,
    /// A semantic failure: no evictable page, a full page, a tuple without
    /// a record id, an unknown table.
    Db(String),
    /// The requested page lies beyond the end of the backing file.
    PageDoesNotExist(PageId),
    /// An I/O failure while reading or writing a page.
    Io(io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<LockError> for StorageError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Aborted => StorageError::Aborted,
        }
    }
}
