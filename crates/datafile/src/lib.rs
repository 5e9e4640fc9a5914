//! Reader and writer for the sectioned, delimited data format.
//!
//! A data file is a sequence of sections. A section opens with a line
//! holding only the upper-cased table name, followed by a delimited column
//! header, followed by data rows until the next section or end of file.
//! Fields are separated by the configured delimiter (`|` by default); the
//! escape character turns a following delimiter or escape into a literal.


use std::collections::HashSet;
use std::{fs, path::Path};

use common::{LoadError, LoadOptions, LoadResult, Record};
use schema::{Schema, Table};
use types::{ColumnType, Value};

/// Parse data file text and populate the schema's tables.
pub fn parse_data(schema: &mut Schema, input: &str, options: &LoadOptions) -> LoadResult<()> {
    let mut section: Option<Section> = None;
    for raw in input.lines() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        // The line right after a section header is always the column
        // header, even when it would itself pass for a section name.
        let awaiting_header = matches!(&section, Some(Section::AwaitingHeader { .. }));
        if !awaiting_header {
            if let Some(name) = section_name(line) {
                if schema.find_table(&name).is_none() {
                    return Err(LoadError::Data(format!(
                        "data section '{}' names an undeclared table",
                        line.trim()
                    )));
                }
                section = Some(Section::AwaitingHeader { table: name });
                continue;
            }
        }
        section = Some(match section.take() {
            None => {
                return Err(LoadError::Data(format!(
                    "data line appears before any section header: '{line}'"
                )));
            }
            Some(Section::AwaitingHeader { table }) => {
                Section::Rows(RowReader::open(schema, &table, line, options)?)
            }
            Some(Section::Rows(reader)) => {
                reader.read_row(schema, line, options)?;
                Section::Rows(reader)
            }
        });
    }
    Ok(())
}

/// Read a UTF-8 data file and parse it.
pub fn parse_data_file(schema: &mut Schema, path: &Path, options: &LoadOptions) -> LoadResult<()> {
    let input = fs::read_to_string(path)?;
    parse_data(schema, &input, options)
}

/// Serialize one table back to the sectioned format: section header,
/// declared-column header, one row per record in key order. Re-parsing the
/// output reproduces the records field for field.
pub fn write_table(table: &Table, options: &LoadOptions) -> String {
    let delimiter = options.delimiter.to_string();
    let mut out = String::new();
    out.push_str(&table.name().to_uppercase());
    out.push('\n');
    let header: Vec<String> = table
        .columns()
        .iter()
        .map(|column| escape_field(&column.name, options))
        .collect();
    out.push_str(&header.join(&delimiter));
    out.push('\n');
    for (_, record) in table.records() {
        let row: Vec<String> = record
            .values
            .iter()
            .map(|value| escape_field(&render(value), options))
            .collect();
        out.push_str(&row.join(&delimiter));
        out.push('\n');
    }
    out
}

/// Serialize every populated table, in declaration order.
pub fn write_data(schema: &Schema, options: &LoadOptions) -> String {
    let mut out = String::new();
    for table in schema.tables() {
        if table.record_count() == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&write_table(table, options));
    }
    out
}

/// Parser state for the section being read.
enum Section {
    AwaitingHeader { table: String },
    Rows(RowReader),
}

/// Field placement for one section, fixed by its header line.
struct RowReader {
    table: String,
    /// Header position to table ordinal; `None` for header columns the
    /// schema does not declare.
    mapping: Vec<Option<usize>>,
    column_types: Vec<ColumnType>,
}

impl RowReader {
    fn open(
        schema: &Schema,
        table_name: &str,
        line: &str,
        options: &LoadOptions,
    ) -> LoadResult<Self> {
        let table = schema.table(table_name)?;
        let header: Vec<String> = split_fields(line, options)
            .into_iter()
            .map(|field| field.trim().to_lowercase())
            .collect();
        check_header(table, &header)?;
        Ok(Self {
            table: table_name.to_string(),
            mapping: header
                .iter()
                .map(|name| table.column_index(name))
                .collect(),
            column_types: table.columns().iter().map(|c| c.ty.clone()).collect(),
        })
    }

    /// Fields are positioned by the table's column order, not the header's.
    /// Missing trailing fields stay `Null`; fields beyond the header are
    /// dropped.
    fn read_row(&self, schema: &mut Schema, line: &str, options: &LoadOptions) -> LoadResult<()> {
        let fields = split_fields(line, options);
        let mut values = vec![Value::Null; self.column_types.len()];
        for (position, field) in fields.iter().enumerate() {
            let Some(slot) = self.mapping.get(position) else {
                break;
            };
            if let Some(ordinal) = slot {
                values[*ordinal] = Value::from_field(field, &self.column_types[*ordinal]);
            }
        }
        schema.table_mut(&self.table)?.insert_record(Record::new(values));
        Ok(())
    }
}

/// A section header is a whole line holding an upper-case identifier:
/// `A-Z`, digits, and underscores, starting with a letter.
fn section_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if !first.is_ascii_uppercase() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// The header must be a subset or a superset of the declared columns; both
/// directions are accepted and exact equality is not required. Anything
/// else is a mismatch.
fn check_header(table: &Table, header: &[String]) -> LoadResult<()> {
    let declared: HashSet<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    let provided: HashSet<&str> = header.iter().map(String::as_str).collect();
    let covers_declared = declared.iter().all(|name| provided.contains(name));
    let covers_provided = provided.iter().all(|name| declared.contains(name));
    if !covers_declared && !covers_provided {
        return Err(LoadError::Data(format!(
            "header for table '{}' is neither a subset nor a superset of its columns: [{}]",
            table.name(),
            header.join(", ")
        )));
    }
    Ok(())
}

/// Split one line into fields. The escape character makes a following
/// delimiter or escape literal; before any other character it is kept
/// verbatim. Empty fields are preserved.
fn split_fields(line: &str, options: &LoadOptions) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == options.escape {
            match chars.next() {
                Some(next) if next == options.delimiter || next == options.escape => {
                    current.push(next);
                }
                Some(next) => {
                    current.push(c);
                    current.push(next);
                }
                None => current.push(c),
            }
        } else if c == options.delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

fn escape_field(raw: &str, options: &LoadOptions) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == options.delimiter || c == options.escape {
            out.push(options.escape);
        }
        out.push(c);
    }
    out
}

fn render(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Text(s) => s.clone(),
        Value::Null => String::new(),
    }
}
