use std::collections::BTreeMap;

use ahash::RandomState;
use common::{LoadError, LoadResult, Record};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use types::{ColumnType, Key, Value};

type Map<K, V> = HashMap<K, V, RandomState>;

/// Sort direction tag carried by a primary-key column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Per-column stamp pointing at the referenced table/column. For composite
/// foreign keys each local column carries its own paired referenced column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

/// Describes one column of a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    /// Defaults to true; forced false when the column joins the primary key.
    pub nullable: bool,
    /// Present iff the column participates in the table's primary key.
    pub pk_sort: Option<SortOrder>,
    pub references: Option<ColumnRef>,
}

impl Column {
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_lowercase(),
            ty,
            nullable: true,
            pk_sort: None,
            references: None,
        }
    }
}

/// Ordered tuple of local columns required to match a primary-key tuple in
/// the referenced table. Local and referenced lists have equal length.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// A table declaration together with its loaded records.
///
/// Structure (columns, keys, constraints) is fixed once DDL parsing
/// finishes; only the record collection mutates afterwards. Records are
/// keyed by their extracted primary-key tuple, so inserting a record with
/// an existing key overwrites it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    #[serde(skip)]
    #[serde(default)]
    name_to_ordinal: Map<String, usize>,
    primary_key: Vec<String>,
    uniques: Vec<Vec<String>>,
    foreign_keys: Vec<ForeignKey>,
    records: BTreeMap<Key, Record>,
}

impl Table {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            columns: Vec::new(),
            name_to_ordinal: Map::default(),
            primary_key: Vec::new(),
            uniques: Vec::new(),
            foreign_keys: Vec::new(),
            records: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|idx| &self.columns[idx])
    }

    /// Returns the ordinal for a column name (case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_ordinal.get(&name.to_lowercase()).copied()
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn uniques(&self) -> &[Vec<String>] {
        &self.uniques
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Append a column declaration.
    pub fn add_column(&mut self, column: Column) -> LoadResult<()> {
        if self.name_to_ordinal.contains_key(&column.name) {
            return Err(LoadError::Ddl(format!(
                "duplicate column '{}' on table '{}'",
                column.name, self.name
            )));
        }
        self.name_to_ordinal
            .insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    /// Add the named column to the primary key, in call order. The column
    /// becomes not-nullable.
    pub fn mark_primary_key(&mut self, name: &str, sort: SortOrder) -> LoadResult<()> {
        let name = name.to_lowercase();
        let Some(idx) = self.column_index(&name) else {
            return Err(LoadError::Ddl(format!(
                "primary key names unknown column '{name}' on table '{}'",
                self.name
            )));
        };
        let column = &mut self.columns[idx];
        column.pk_sort = Some(sort);
        column.nullable = false;
        if !self.primary_key.contains(&name) {
            self.primary_key.push(name);
        }
        Ok(())
    }

    /// Register a unique column tuple. Uniqueness itself is enforced by the
    /// destination store; only column existence is checked here.
    pub fn add_unique(&mut self, columns: Vec<String>) -> LoadResult<()> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();
        for column in &columns {
            if self.column_index(column).is_none() {
                return Err(LoadError::Ddl(format!(
                    "unique constraint names unknown column '{column}' on table '{}'",
                    self.name
                )));
            }
        }
        self.uniques.push(columns);
        Ok(())
    }

    /// Register a foreign key and stamp each resolvable local column with
    /// its paired referenced column. Unresolvable locals are caught by the
    /// schema-wide structure check.
    pub fn add_foreign_key(&mut self, fk: ForeignKey) -> LoadResult<()> {
        for (local, referenced) in fk.columns.iter().zip(&fk.referenced_columns) {
            if let Some(idx) = self.column_index(local) {
                self.columns[idx].references = Some(ColumnRef {
                    table: fk.referenced_table.clone(),
                    column: referenced.clone(),
                });
            }
        }
        self.foreign_keys.push(fk);
        Ok(())
    }

    /// Extract the record's key: the values at the primary-key column
    /// positions, in primary-key declaration order. `Key::NONE` when a
    /// primary-key column name does not resolve.
    pub fn key_of(&self, record: &Record) -> Key {
        let mut values = Vec::with_capacity(self.primary_key.len());
        for name in &self.primary_key {
            let Some(ordinal) = self.column_index(name) else {
                return Key::NONE;
            };
            values.push(record.get(ordinal).cloned().unwrap_or(Value::Null));
        }
        Key::new(values)
    }

    /// Arrange `(column, value)` pairs into this table's primary-key
    /// declaration order. `Key::NONE` when the pairs do not cover the
    /// primary key, which never matches a stored record.
    pub fn key_from_pairs(&self, columns: &[String], values: &[Value]) -> Key {
        if self.primary_key.is_empty() {
            return Key::NONE;
        }
        let mut arranged = Vec::with_capacity(self.primary_key.len());
        for pk in &self.primary_key {
            match columns.iter().position(|c| c == pk) {
                Some(idx) => match values.get(idx) {
                    Some(value) => arranged.push(value.clone()),
                    None => return Key::NONE,
                },
                None => return Key::NONE,
            }
        }
        Key::new(arranged)
    }

    /// Insert a record under its extracted key, overwriting any record with
    /// an equal key. Returns the key it was stored under.
    pub fn insert_record(&mut self, record: Record) -> Key {
        let key = self.key_of(&record);
        self.records.insert(key.clone(), record);
        key
    }

    pub fn record(&self, key: &Key) -> Option<&Record> {
        self.records.get(key)
    }

    /// Records in primary-key order.
    pub fn records(&self) -> impl Iterator<Item = (&Key, &Record)> {
        self.records.iter()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// The parsed schema: tables in declaration order plus a name index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    tables: Vec<Table>,
    #[serde(skip)]
    #[serde(default)]
    name_index: Map<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a finalized table. Table names are unique schema-wide.
    pub fn add_table(&mut self, table: Table) -> LoadResult<()> {
        if self.name_index.contains_key(table.name()) {
            return Err(LoadError::Schema(format!(
                "table '{}' is declared twice",
                table.name()
            )));
        }
        self.name_index
            .insert(table.name().to_string(), self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    /// Returns an immutable reference to a table by name.
    pub fn table(&self, name: &str) -> LoadResult<&Table> {
        self.find_table(name)
            .ok_or_else(|| LoadError::Schema(format!("unknown table '{name}'")))
    }

    pub fn find_table(&self, name: &str) -> Option<&Table> {
        let idx = self.name_index.get(&name.to_lowercase()).copied()?;
        self.tables.get(idx)
    }

    pub fn table_mut(&mut self, name: &str) -> LoadResult<&mut Table> {
        let idx = self
            .name_index
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| LoadError::Schema(format!("unknown table '{name}'")))?;
        self.tables
            .get_mut(idx)
            .ok_or_else(|| LoadError::Schema(format!("unknown table '{name}'")))
    }

    /// Tables in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Schema-wide consistency check, run once DDL parsing completes.
    ///
    /// Confirms that every table has a primary key whose columns resolve,
    /// and that every foreign key points at primary-key columns of an
    /// existing table with matching type and size.
    pub fn check_structure(&self) -> LoadResult<()> {
        for table in &self.tables {
            if table.primary_key().is_empty() {
                return Err(LoadError::Schema(format!(
                    "table '{}' has no primary key",
                    table.name()
                )));
            }
            for name in table.primary_key() {
                if table.column(name).is_none() {
                    return Err(LoadError::Schema(format!(
                        "primary key of table '{}' names unknown column '{name}'",
                        table.name()
                    )));
                }
            }
            for fk in table.foreign_keys() {
                self.check_foreign_key(table, fk)?;
            }
        }
        Ok(())
    }

    fn check_foreign_key(&self, table: &Table, fk: &ForeignKey) -> LoadResult<()> {
        if fk.columns.len() != fk.referenced_columns.len() {
            return Err(LoadError::Schema(format!(
                "foreign key on table '{}' lists {} local but {} referenced columns",
                table.name(),
                fk.columns.len(),
                fk.referenced_columns.len()
            )));
        }
        let Some(referenced) = self.find_table(&fk.referenced_table) else {
            return Err(LoadError::Schema(format!(
                "foreign key on table '{}' references unknown table '{}'",
                table.name(),
                fk.referenced_table
            )));
        };
        for (local_name, referenced_name) in fk.columns.iter().zip(&fk.referenced_columns) {
            let Some(local) = table.column(local_name) else {
                return Err(LoadError::Schema(format!(
                    "foreign key on table '{}' names unknown column '{local_name}'",
                    table.name()
                )));
            };
            let Some(target) = referenced.column(referenced_name) else {
                return Err(LoadError::Schema(format!(
                    "foreign key '{}.{local_name}' references unknown column '{}.{referenced_name}'",
                    table.name(),
                    referenced.name()
                )));
            };
            if target.pk_sort.is_none() {
                return Err(LoadError::Schema(format!(
                    "foreign key '{}.{local_name}' references '{}.{referenced_name}', \
                     which is not a primary-key column",
                    table.name(),
                    referenced.name()
                )));
            }
            if local.ty != target.ty {
                return Err(LoadError::Schema(format!(
                    "foreign key '{}.{local_name}' has type {} but '{}.{referenced_name}' has type {}",
                    table.name(),
                    local.ty,
                    referenced.name(),
                    target.ty
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn person() -> Table {
        let mut table = Table::new("Person");
        table
            .add_column(Column::new("ID", ColumnType::new("int", None)))
            .unwrap();
        table
            .add_column(Column::new("name", ColumnType::new("varchar", Some(40))))
            .unwrap();
        table.mark_primary_key("id", SortOrder::Asc).unwrap();
        table
    }

    #[test]
    fn identifiers_are_case_normalized() {
        let table = person();
        assert_eq!(table.name(), "person");
        assert_eq!(table.column_index("Id"), Some(0));
        assert_eq!(table.column_index("NAME"), Some(1));
        assert_eq!(table.primary_key(), ["id"]);
    }

    #[test]
    fn primary_key_columns_become_not_nullable() {
        let table = person();
        let id = table.column("id").unwrap();
        assert!(!id.nullable);
        assert_eq!(id.pk_sort, Some(SortOrder::Asc));
        assert!(table.column("name").unwrap().nullable);
    }

    #[test]
    fn rejects_duplicate_columns() {
        let mut table = Table::new("t");
        table
            .add_column(Column::new("id", ColumnType::new("int", None)))
            .unwrap();
        let err = table
            .add_column(Column::new("ID", ColumnType::new("int", None)))
            .unwrap_err();
        assert!(format!("{err}").contains("duplicate column 'id'"));
    }

    #[test]
    fn insert_with_equal_key_overwrites() {
        let mut table = person();
        let first = Record::new(vec![Value::Int(1), Value::Text("ada".into())]);
        let second = Record::new(vec![Value::Int(1), Value::Text("grace".into())]);

        let key = table.insert_record(first);
        table.insert_record(second);

        assert_eq!(table.record_count(), 1);
        assert_eq!(
            table.record(&key).unwrap().get(1),
            Some(&Value::Text("grace".into()))
        );
    }

    #[test]
    fn key_extraction_follows_declaration_order() {
        let mut table = Table::new("t");
        table
            .add_column(Column::new("a", ColumnType::new("int", None)))
            .unwrap();
        table
            .add_column(Column::new("b", ColumnType::new("int", None)))
            .unwrap();
        table.mark_primary_key("b", SortOrder::Asc).unwrap();
        table.mark_primary_key("a", SortOrder::Asc).unwrap();

        let record = Record::new(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            table.key_of(&record),
            Key::new(vec![Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn key_from_pairs_rearranges_and_short_circuits() {
        let mut table = Table::new("t");
        table
            .add_column(Column::new("a", ColumnType::new("int", None)))
            .unwrap();
        table
            .add_column(Column::new("b", ColumnType::new("int", None)))
            .unwrap();
        table.mark_primary_key("a", SortOrder::Asc).unwrap();
        table.mark_primary_key("b", SortOrder::Asc).unwrap();

        let key = table.key_from_pairs(
            &["b".to_string(), "a".to_string()],
            &[Value::Int(2), Value::Int(1)],
        );
        assert_eq!(key, Key::new(vec![Value::Int(1), Value::Int(2)]));

        let missing = table.key_from_pairs(&["a".to_string()], &[Value::Int(1)]);
        assert!(missing.is_none());
    }

    #[test]
    fn structure_check_requires_primary_key() {
        let mut schema = Schema::new();
        let mut table = Table::new("t");
        table
            .add_column(Column::new("id", ColumnType::new("int", None)))
            .unwrap();
        schema.add_table(table).unwrap();

        let err = schema.check_structure().unwrap_err();
        assert!(format!("{err}").contains("has no primary key"));
    }

    #[test]
    fn structure_check_validates_foreign_keys() {
        let mut schema = Schema::new();
        schema.add_table(person()).unwrap();

        let mut pet = Table::new("pet");
        pet.add_column(Column::new("id", ColumnType::new("int", None)))
            .unwrap();
        pet.add_column(Column::new("owner_name", ColumnType::new("varchar", Some(40))))
            .unwrap();
        pet.mark_primary_key("id", SortOrder::Asc).unwrap();
        pet.add_foreign_key(ForeignKey {
            columns: vec!["owner_name".into()],
            referenced_table: "person".into(),
            referenced_columns: vec!["name".into()],
        })
        .unwrap();
        schema.add_table(pet).unwrap();

        // person.name exists but is not part of person's primary key.
        let err = schema.check_structure().unwrap_err();
        assert!(format!("{err}").contains("not a primary-key column"));
    }

    #[test]
    fn structure_check_matches_type_and_size() {
        let mut schema = Schema::new();
        schema.add_table(person()).unwrap();

        let mut pet = Table::new("pet");
        pet.add_column(Column::new("id", ColumnType::new("int", None)))
            .unwrap();
        pet.add_column(Column::new("owner_id", ColumnType::new("bigint", None)))
            .unwrap();
        pet.mark_primary_key("id", SortOrder::Asc).unwrap();
        pet.add_foreign_key(ForeignKey {
            columns: vec!["owner_id".into()],
            referenced_table: "person".into(),
            referenced_columns: vec!["id".into()],
        })
        .unwrap();
        schema.add_table(pet).unwrap();

        let err = schema.check_structure().unwrap_err();
        assert!(format!("{err}").contains("has type bigint"));
    }

    #[test]
    fn rejects_duplicate_tables() {
        let mut schema = Schema::new();
        schema.add_table(person()).unwrap();
        let err = schema.add_table(person()).unwrap_err();
        assert!(format!("{err}").contains("declared twice"));
    }

    #[test]
    fn foreign_key_stamps_local_columns() {
        let mut table = Table::new("pet");
        table
            .add_column(Column::new("owner_id", ColumnType::new("int", None)))
            .unwrap();
        table
            .add_foreign_key(ForeignKey {
                columns: vec!["owner_id".into()],
                referenced_table: "person".into(),
                referenced_columns: vec!["id".into()],
            })
            .unwrap();

        let stamp = table.column("owner_id").unwrap().references.clone().unwrap();
        assert_eq!(stamp.table, "person");
        assert_eq!(stamp.column, "id");
    }
}
