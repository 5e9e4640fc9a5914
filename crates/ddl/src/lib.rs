//! Line-oriented parser for the schema definition dialect.
//!
//! The dialect declares tables, columns, primary keys, unique constraints,
//! and foreign keys; nothing else. After comment stripping, each line is
//! classified into a closed set of shapes and applied to the table under
//! assembly. A `CREATE TABLE` line finalizes the previous table; the last
//! table is finalized at end of input, after which the schema-wide
//! structure check runs.

mod line;

pub use line::{ColumnLine, LineShape};

use std::{fs, path::Path};

use common::{LoadError, LoadResult};
use schema::{Column, ForeignKey, Schema, Table};

/// Parse DDL source text into a structurally checked schema.
pub fn parse_ddl(source: &str) -> LoadResult<Schema> {
    let mut schema = Schema::new();
    let mut open: Option<Table> = None;
    let mut in_block_comment = false;

    for raw in source.lines() {
        let stripped = strip_comments(raw, &mut in_block_comment);
        let line = stripped.trim().trim_end_matches(',').trim_end();
        if line.is_empty() || line == "(" || line == ")" {
            continue;
        }
        match line::classify(line)? {
            LineShape::CreateTable { name } => {
                if let Some(table) = open.take() {
                    schema.add_table(table)?;
                }
                open = Some(Table::new(&name));
            }
            LineShape::PrimaryKey { columns, sort } => {
                let table = open_table(&mut open, line)?;
                for column in &columns {
                    table.mark_primary_key(column, sort)?;
                }
            }
            LineShape::Unique { columns } => {
                open_table(&mut open, line)?.add_unique(columns)?;
            }
            LineShape::ForeignKey {
                columns,
                referenced_table,
                referenced_columns,
            } => {
                open_table(&mut open, line)?.add_foreign_key(ForeignKey {
                    columns,
                    referenced_table,
                    referenced_columns,
                })?;
            }
            LineShape::ColumnDef(def) => {
                let table = open_table(&mut open, line)?;
                let name = def.name.clone();
                let mut column = Column::new(&def.name, def.ty);
                column.nullable = def.nullable;
                table.add_column(column)?;
                if def.unique {
                    table.add_unique(vec![name.clone()])?;
                }
                if let Some(sort) = def.primary_key {
                    table.mark_primary_key(&name, sort)?;
                }
                if let Some((referenced_table, referenced_column)) = def.references {
                    table.add_foreign_key(ForeignKey {
                        columns: vec![name],
                        referenced_table,
                        referenced_columns: vec![referenced_column],
                    })?;
                }
            }
        }
    }
    if let Some(table) = open.take() {
        schema.add_table(table)?;
    }
    schema.check_structure()?;
    Ok(schema)
}

/// Read a UTF-8 DDL file and parse it.
pub fn parse_ddl_file(path: &Path) -> LoadResult<Schema> {
    let source = fs::read_to_string(path)?;
    parse_ddl(&source)
}

fn open_table<'a>(open: &'a mut Option<Table>, line: &str) -> LoadResult<&'a mut Table> {
    open.as_mut().ok_or_else(|| {
        LoadError::Ddl(format!("'{line}' appears before any CREATE TABLE"))
    })
}

/// Remove `/* ... */` and `-- ...` comments from one raw line, carrying the
/// inside-block-comment flag across lines. Partial-line residues around the
/// comment delimiters are preserved.
fn strip_comments(raw: &str, in_block_comment: &mut bool) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        if *in_block_comment {
            match rest.find("*/") {
                Some(idx) => {
                    rest = &rest[idx + 2..];
                    *in_block_comment = false;
                }
                None => return out,
            }
        } else {
            let block = rest.find("/*");
            let dash = rest.find("--");
            match (block, dash) {
                (Some(b), Some(d)) if d < b => {
                    out.push_str(&rest[..d]);
                    return out;
                }
                (Some(b), _) => {
                    out.push_str(&rest[..b]);
                    rest = &rest[b + 2..];
                    *in_block_comment = true;
                }
                (None, Some(d)) => {
                    out.push_str(&rest[..d]);
                    return out;
                }
                (None, None) => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}
