use common::{LoadResult, RecordMap};

/// Destination for validated, ordered records.
///
/// Field keys arrive lower-cased; implementations map them to the physical
/// column convention of the store. Write failures are surfaced verbatim;
/// the engine performs no retries and no transaction management.
pub trait RecordStore {
    /// Write one record as a new row.
    fn insert(&mut self, table: &str, record: &RecordMap) -> LoadResult<()>;
    /// Rewrite an existing row identified by its primary-key field(s).
    fn update(&mut self, table: &str, record: &RecordMap) -> LoadResult<()>;
}

/// In-memory store that keeps operations in arrival order. Serves as a
/// test double and as a reference implementation of the trait.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inserted: Vec<(String, RecordMap)>,
    updated: Vec<(String, RecordMap)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inserted(&self) -> &[(String, RecordMap)] {
        &self.inserted
    }

    pub fn updated(&self) -> &[(String, RecordMap)] {
        &self.updated
    }
}

impl RecordStore for MemoryStore {
    fn insert(&mut self, table: &str, record: &RecordMap) -> LoadResult<()> {
        self.inserted.push((table.to_string(), record.clone()));
        Ok(())
    }

    fn update(&mut self, table: &str, record: &RecordMap) -> LoadResult<()> {
        self.updated.push((table.to_string(), record.clone()));
        Ok(())
    }
}
