use super::Executor;
use crate::errors::ExecutionError;
use strata::buffer_pool::BufferPool;
use strata::transaction::TransactionId;
use strata::tuple::{Field, FieldType, Schema, Tuple};

fn count_schema(column: &str) -> Schema {
    Schema::with_names(vec![(FieldType::Int, column)])
}

fn count_tuple(schema: &Schema, count: i32) -> Result<Tuple, ExecutionError> {
    Ok(Tuple::new(schema.clone(), vec![Field::Int(count)])?)
}

/// Drains its child into a table through the buffer pool. The first
/// `next` does all the work and yields a one-field tuple with the
/// number of inserted rows; further calls yield nothing.
pub struct InsertExecutor<'a> {
    pool: &'a BufferPool,
    child: Box<dyn Executor + 'a>,
    table_id: u64,
    tid: TransactionId,
    schema: Schema,
    done: bool,
}

impl<'a> InsertExecutor<'a> {
    pub fn new(
        pool: &'a BufferPool,
        child: Box<dyn Executor + 'a>,
        table_id: u64,
        tid: TransactionId,
    ) -> Self {
        Self {
            pool,
            child,
            table_id,
            tid,
            schema: count_schema("inserted"),
            done: false,
        }
    }
}

impl Executor for InsertExecutor<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if self.done {
            return Ok(None);
        }
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.pool.insert_tuple(self.tid, self.table_id, tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(count_tuple(&self.schema, count)?))
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }
}

/// Deletes every tuple its child produces. The child must yield stored
/// tuples, i.e. tuples carrying their record ids.
pub struct DeleteExecutor<'a> {
    pool: &'a BufferPool,
    child: Box<dyn Executor + 'a>,
    tid: TransactionId,
    schema: Schema,
    done: bool,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(pool: &'a BufferPool, child: Box<dyn Executor + 'a>, tid: TransactionId) -> Self {
        Self {
            pool,
            child,
            tid,
            schema: count_schema("deleted"),
            done: false,
        }
    }
}

impl Executor for DeleteExecutor<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if self.done {
            return Ok(None);
        }
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.pool.delete_tuple(self.tid, &tuple)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(count_tuple(&self.schema, count)?))
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }
}
