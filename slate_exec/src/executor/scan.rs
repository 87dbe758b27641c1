use super::Executor;
use crate::errors::ExecutionError;
use strata::buffer_pool::BufferPool;
use strata::catalog::Catalog;
use strata::heap_file::HeapFileIterator;
use strata::transaction::TransactionId;
use strata::tuple::{Schema, Tuple};

/// Scans a whole table in page order under read locks.
pub struct SeqScanExecutor<'a> {
    schema: Schema,
    iter: HeapFileIterator<'a>,
}

impl<'a> SeqScanExecutor<'a> {
    pub fn new(
        pool: &'a BufferPool,
        catalog: &Catalog,
        table_id: u64,
        tid: TransactionId,
    ) -> Result<Self, ExecutionError> {
        let file = catalog
            .file(table_id)
            .map_err(|_| ExecutionError::TableNotFound(format!("no table with id {table_id}")))?;
        let schema = file.schema().clone();
        let mut iter = HeapFileIterator::new(file, pool, tid);
        iter.open();
        Ok(Self { schema, iter })
    }
}

impl Executor for SeqScanExecutor<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        Ok(self.iter.next()?)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.iter.rewind();
        Ok(())
    }
}
