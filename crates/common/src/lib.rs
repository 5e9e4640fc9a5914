use std::{collections::HashMap, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Value;

/// Canonical error type shared across the loader subsystems.
///
/// Every variant carries a message that names the offending table and
/// column(s), and where applicable the value tuple, so a failed load is
/// diagnosable from the message alone.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("ddl: {0}")]
    Ddl(String),
    #[error("schema: {0}")]
    Schema(String),
    #[error("data: {0}")]
    Data(String),
    #[error("referential integrity: {0}")]
    Referential(String),
    #[error("dependency cycle: {0}")]
    Cycle(String),
    #[error("store: {0}")]
    Store(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `LoadError`.
pub type LoadResult<T> = Result<T, LoadError>;

/// Positional record aligned to its table's column order.
/// Examples:
/// - `let r = Record::new(vec![Value::Int(1), Value::Text("ada".into())]);`
/// - `let r = Record::new(vec![Value::Int(10), Value::Null]);`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, ordinal: usize) -> Option<&Value> {
        self.values.get(ordinal)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Record::new(values)
    }
}

/// Named projection of a record keyed by lower-cased column name.
pub type RecordMap = HashMap<String, Value>;

/// Options for reading and writing the delimited data format.
///
/// # Example
/// ```
/// use common::LoadOptions;
///
/// let options = LoadOptions::builder().delimiter(';').build();
/// assert_eq!(options.escape, '\\');
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct LoadOptions {
    /// Field separator in header and data rows.
    #[builder(default = '|')]
    pub delimiter: char,
    /// Character that escapes a literal delimiter or itself.
    #[builder(default = '\\')]
    pub escape: char,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: '|',
            escape: '\\',
        }
    }
}

/// Outcome of a completed batch load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Tables in the order their records were written to the store.
    pub table_order: Vec<String>,
    /// Total records handed to the store.
    pub records_written: u64,
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{LoadError, LoadOptions, LoadResult, LoadSummary, Record, RecordMap};
    pub use types::{ColumnType, Key, Value};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_pipe_and_backslash() {
        let options = LoadOptions::default();
        assert_eq!(options.delimiter, '|');
        assert_eq!(options.escape, '\\');

        let built = LoadOptions::builder().build();
        assert_eq!(built.delimiter, options.delimiter);
        assert_eq!(built.escape, options.escape);
    }

    #[test]
    fn record_accessors() {
        let record = Record::new(vec![Value::Int(1), Value::Null]);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get(0), Some(&Value::Int(1)));
        assert_eq!(record.get(2), None);
        assert_eq!(record.into_values().len(), 2);
    }
}
