use strata::error::StorageError;

#[derive(Debug)]
pub enum ExecutionError {
    /// The transaction was chosen as a deadlock victim. Terminal for
    /// the transaction: the caller must run
    /// `transaction_complete(tid, false)` and may retry from scratch.
    Aborted,
    IoError(String),
    TableNotFound(String),
    FieldNotFound(String),
    GenericError(String),
}

impl From<StorageError> for ExecutionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Aborted => ExecutionError::Aborted,
            StorageError::Db(msg) => ExecutionError::GenericError(msg),
            StorageError::PageDoesNotExist(pid) => {
                ExecutionError::GenericError(format!("page {pid:?} does not exist"))
            }
            StorageError::Io(e) => ExecutionError::IoError(e.to_string()),
        }
    }
}
