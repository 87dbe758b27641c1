#![allow(dead_code)]

use slate_exec::errors::ExecutionError;
use slate_exec::executor::Executor;
use std::sync::Arc;
use strata::buffer_pool::BufferPool;
use strata::catalog::Catalog;
use strata::heap_file::HeapFile;
use strata::tuple::{Field, FieldType, Schema, Tuple};
use tempfile::{tempdir, TempDir};

/// A catalog and buffer pool over a temp directory; tables are created
/// on demand and cleaned up with the directory.
pub struct TestDb {
    pub catalog: Arc<Catalog>,
    pub pool: Arc<BufferPool>,
    pub dir: TempDir,
}

pub fn setup(capacity: usize) -> TestDb {
    let dir = tempdir().unwrap();
    let catalog = Arc::new(Catalog::new());
    let pool = Arc::new(BufferPool::new(Arc::clone(&catalog), capacity));
    TestDb { catalog, pool, dir }
}

impl TestDb {
    pub fn create_table(&self, name: &str, schema: Schema) -> u64 {
        let file = Arc::new(
            HeapFile::open(self.dir.path().join(format!("{name}.tab")), schema).unwrap(),
        );
        self.catalog.add_table(file, name)
    }
}

pub fn int_schema() -> Schema {
    Schema::with_names(vec![(FieldType::Int, "a")])
}

pub fn int_tuple(v: i32) -> Tuple {
    Tuple::new(int_schema(), vec![Field::Int(v)]).unwrap()
}

// Four slots per 4096-byte page, for tests that want small tables to
// span pages.
pub fn wide_schema() -> Schema {
    Schema::with_names(vec![(FieldType::Int, "id"), (FieldType::Str(996), "pad")])
}

pub fn wide_tuple(v: i32) -> Tuple {
    Tuple::new(
        wide_schema(),
        vec![Field::Int(v), Field::Str(format!("row-{v}"))],
    )
    .unwrap()
}

/// An in-memory operator for feeding fixed rows into a pipeline.
pub struct RowSource {
    schema: Schema,
    rows: Vec<Tuple>,
    cursor: usize,
}

impl RowSource {
    pub fn new(schema: Schema, rows: Vec<Tuple>) -> Self {
        Self {
            schema,
            rows,
            cursor: 0,
        }
    }
}

impl Executor for RowSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        let row = self.rows.get(self.cursor).cloned();
        self.cursor += 1;
        Ok(row)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.cursor = 0;
        Ok(())
    }
}

/// Runs an executor to exhaustion and returns the produced field rows.
pub fn drain(exec: &mut dyn Executor) -> Vec<Vec<Field>> {
    let mut rows = Vec::new();
    while let Some(tuple) = exec.next().unwrap() {
        rows.push(tuple.fields().to_vec());
    }
    rows
}
