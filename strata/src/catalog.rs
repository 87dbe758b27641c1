//! The table catalog: table ids to heap files.

use crate::error::{StorageError, StorageResult};
use crate::heap_file::HeapFile;
use crate::tuple::Schema;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
}

/// Maps table ids to their backing heap files. Registration happens at
/// setup; afterwards the buffer pool and the operators only read.
#[derive(Default)]
pub struct Catalog {
    tables: Mutex<HashMap<u64, TableEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under `name` and returns its id (the heap
    /// file's path hash). A table with the same id is replaced.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) -> u64 {
        let table_id = file.table_id();
        crate::strata_debug_log!(
            "[Catalog::add_table] table '{}' registered with id {}",
            name,
            table_id
        );
        self.tables.lock().unwrap().insert(
            table_id,
            TableEntry {
                file,
                name: name.to_string(),
            },
        );
        table_id
    }

    /// The heap file backing `table_id`.
    pub fn file(&self, table_id: u64) -> StorageResult<Arc<HeapFile>> {
        self.tables
            .lock()
            .unwrap()
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or_else(|| StorageError::Db(format!("no table with id {table_id}")))
    }

    pub fn schema(&self, table_id: u64) -> StorageResult<Schema> {
        Ok(self.file(table_id)?.schema().clone())
    }

    pub fn table_id(&self, name: &str) -> Option<u64> {
        self.tables
            .lock()
            .unwrap()
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(&id, _)| id)
    }

    pub fn table_ids(&self) -> Vec<u64> {
        self.tables.lock().unwrap().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::FieldType;
    use tempfile::tempdir;

    #[test]
    fn registered_tables_are_found_by_id_and_name() {
        let dir = tempdir().unwrap();
        let schema = Schema::with_names(vec![(FieldType::Int, "a")]);
        let file =
            Arc::new(HeapFile::open(dir.path().join("users.tab"), schema.clone()).unwrap());

        let catalog = Catalog::new();
        let table_id = catalog.add_table(Arc::clone(&file), "users");

        assert_eq!(catalog.table_id("users"), Some(table_id));
        assert_eq!(catalog.table_id("ghosts"), None);
        assert_eq!(catalog.file(table_id).unwrap().table_id(), table_id);
        assert_eq!(catalog.schema(table_id).unwrap(), schema);
        assert_eq!(catalog.table_ids(), vec![table_id]);
    }

    #[test]
    fn unknown_table_id_is_an_error() {
        let catalog = Catalog::new();
        assert!(matches!(catalog.file(42), Err(StorageError::Db(_))));
    }
}
