use common::{LoadError, LoadResult};
use schema::Schema;
use types::Value;

/// Confirm that every non-null foreign key tuple of every record resolves
/// to an existing record in the referenced table.
///
/// This is a whole-dataset invariant: a record may be loaded before the
/// record it references, so the pass runs only once every table is
/// populated. A tuple whose values are all null counts as "not set" and is
/// skipped; anything else must match.
pub fn check_references(schema: &Schema) -> LoadResult<()> {
    for table in schema.tables() {
        for fk in table.foreign_keys() {
            let Some(referenced) = schema.find_table(&fk.referenced_table) else {
                return Err(LoadError::Referential(format!(
                    "table '{}' references unknown table '{}'",
                    table.name(),
                    fk.referenced_table
                )));
            };
            let ordinals: Vec<Option<usize>> = fk
                .columns
                .iter()
                .map(|column| table.column_index(column))
                .collect();
            for (_, record) in table.records() {
                let values: Vec<Value> = ordinals
                    .iter()
                    .map(|ordinal| {
                        ordinal
                            .and_then(|idx| record.get(idx).cloned())
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                if values.iter().all(Value::is_null) {
                    continue;
                }
                let key = referenced.key_from_pairs(&fk.referenced_columns, &values);
                if key.is_none() || referenced.record(&key).is_none() {
                    return Err(LoadError::Referential(format!(
                        "table '{}' ({}) = [{}] has no matching record in table '{}'",
                        table.name(),
                        fk.columns.join(", "),
                        format_values(&values),
                        fk.referenced_table
                    )));
                }
            }
        }
    }
    Ok(())
}

fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
