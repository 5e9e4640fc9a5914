//! Batch load pipeline: DDL parse, data parse, referential validation,
//! dependency ordering, store writes.
//!
//! The phases are hard barriers. `Dataset` encodes them as a typestate:
//! data cannot be validated before it is loaded, and cannot be written
//! before it is validated, so call-order mistakes fail to compile instead
//! of corrupting a load.

mod order;
mod referential;
mod store;
#[cfg(test)]
mod tests;

pub use order::insertion_order;
pub use referential::check_references;
pub use store::{MemoryStore, RecordStore};

use std::marker::PhantomData;
use std::path::Path;

use common::{LoadOptions, LoadResult, LoadSummary, Record, RecordMap};
use schema::{Schema, Table};
use types::Value;

/// Phase marker: schema parsed and structurally checked.
#[derive(Debug)]
pub struct Built;
/// Phase marker: tables populated from data files.
#[derive(Debug)]
pub struct Populated;
/// Phase marker: referential integrity confirmed.
#[derive(Debug)]
pub struct Validated;

/// A schema moving through the load phases. Each transition consumes the
/// previous phase.
#[derive(Debug)]
pub struct Dataset<P> {
    schema: Schema,
    options: LoadOptions,
    _phase: PhantomData<P>,
}

impl<P> Dataset<P> {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn advance<Q>(self) -> Dataset<Q> {
        Dataset {
            schema: self.schema,
            options: self.options,
            _phase: PhantomData,
        }
    }
}

impl Dataset<Built> {
    /// Parse DDL source into a ready-to-populate dataset.
    pub fn from_ddl(source: &str) -> LoadResult<Self> {
        Ok(Self::wrap(ddl::parse_ddl(source)?))
    }

    /// Parse a DDL file into a ready-to-populate dataset.
    pub fn from_ddl_file(path: &Path) -> LoadResult<Self> {
        Ok(Self::wrap(ddl::parse_ddl_file(path)?))
    }

    fn wrap(schema: Schema) -> Self {
        Self {
            schema,
            options: LoadOptions::default(),
            _phase: PhantomData,
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Populate the tables from data file text.
    pub fn load_str(mut self, data: &str) -> LoadResult<Dataset<Populated>> {
        datafile::parse_data(&mut self.schema, data, &self.options)?;
        Ok(self.advance())
    }

    /// Populate the tables from a data file on disk.
    pub fn load_file(mut self, path: &Path) -> LoadResult<Dataset<Populated>> {
        datafile::parse_data_file(&mut self.schema, path, &self.options)?;
        Ok(self.advance())
    }
}

impl Dataset<Populated> {
    /// Run the whole-dataset referential integrity pass.
    pub fn validate(self) -> LoadResult<Dataset<Validated>> {
        referential::check_references(&self.schema)?;
        Ok(self.advance())
    }
}

impl Dataset<Validated> {
    /// The dependency-respecting table order records will be written in.
    pub fn table_order(&self) -> LoadResult<Vec<String>> {
        order::insertion_order(&self.schema)
    }

    /// Write every record to the store: tables in dependency order, records
    /// within a table in primary-key order.
    pub fn write_to<S: RecordStore>(&self, store: &mut S) -> LoadResult<LoadSummary> {
        let table_order = self.table_order()?;
        let mut records_written = 0u64;
        for name in &table_order {
            let table = self.schema.table(name)?;
            for (_, record) in table.records() {
                store.insert(name, &record_map(table, record))?;
                records_written += 1;
            }
        }
        Ok(LoadSummary {
            table_order,
            records_written,
        })
    }
}

/// Run a complete batch: parse the DDL, load the data, validate, and write
/// in dependency order. Any failure aborts the load.
pub fn load<S: RecordStore>(
    ddl_source: &str,
    data: &str,
    store: &mut S,
    options: LoadOptions,
) -> LoadResult<LoadSummary> {
    Dataset::from_ddl(ddl_source)?
        .with_options(options)
        .load_str(data)?
        .validate()?
        .write_to(store)
}

fn record_map(table: &Table, record: &Record) -> RecordMap {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, column)| {
            (
                column.name.clone(),
                record.get(ordinal).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}
