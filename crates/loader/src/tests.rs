use common::{LoadError, LoadOptions};
use pretty_assertions::assert_eq;
use types::Value;

use super::*;

const PERSON_PET_DDL: &str = r#"
CREATE TABLE pet
id INT PRIMARY KEY
owner_id INT FOREIGN KEY REFERENCES person (id)

CREATE TABLE person
id INT PRIMARY KEY
name VARCHAR(40)
"#;

fn populated(data: &str) -> Dataset<Populated> {
    Dataset::from_ddl(PERSON_PET_DDL)
        .expect("ddl parses")
        .load_str(data)
        .expect("data parses")
}

#[test]
fn resolving_references_pass_validation() {
    let dataset = populated("PERSON\nid|name\n1|ada\nPET\nid|owner_id\n10|1\n");
    assert!(dataset.validate().is_ok());
}

#[test]
fn dangling_reference_names_the_violation() {
    let dataset = populated("PERSON\nid|name\n1|ada\nPET\nid|owner_id\n11|99\n");
    let err = dataset.validate().unwrap_err();
    assert!(matches!(err, LoadError::Referential(_)));
    let message = format!("{err}");
    assert!(message.contains("'pet'"));
    assert!(message.contains("owner_id"));
    assert!(message.contains("[99]"));
    assert!(message.contains("'person'"));
}

#[test]
fn all_null_foreign_keys_are_skipped() {
    let dataset = populated("PET\nid|owner_id\n10|\n");
    assert!(dataset.validate().is_ok());
}

#[test]
fn partially_null_composite_foreign_key_fails() {
    let ddl_source = r#"
CREATE TABLE order_item
order_id INT
line_no INT
CONSTRAINT pk_item PRIMARY KEY ( order_id, line_no )

CREATE TABLE shipment_line
id INT PRIMARY KEY
order_ref INT
line_ref INT
FOREIGN KEY ( order_ref, line_ref ) REFERENCES order_item ( order_id, line_no )
"#;
    let data = "ORDER_ITEM\norder_id|line_no\n7|1\nSHIPMENT_LINE\nid|order_ref|line_ref\n1|7|\n";
    let err = Dataset::from_ddl(ddl_source)
        .unwrap()
        .load_str(data)
        .unwrap()
        .validate()
        .unwrap_err();
    assert!(matches!(err, LoadError::Referential(_)));
    assert!(format!("{err}").contains("[7, NULL]"));
}

#[test]
fn referenced_tables_come_first() {
    // pet is declared before person, yet person must be inserted first
    let order = populated("PERSON\nid|name\n1|ada\nPET\nid|owner_id\n10|1\n")
        .validate()
        .unwrap()
        .table_order()
        .unwrap();
    assert_eq!(order, ["person", "pet"]);
}

#[test]
fn independent_tables_follow_declaration_order() {
    let schema = ddl::parse_ddl(
        r#"
CREATE TABLE b
id INT PRIMARY KEY

CREATE TABLE a
id INT PRIMARY KEY

CREATE TABLE c
id INT PRIMARY KEY
"#,
    )
    .unwrap();
    let order = insertion_order(&schema).unwrap();
    assert_eq!(order, ["b", "a", "c"]);
    // stable across repeated runs
    assert_eq!(order, insertion_order(&schema).unwrap());
}

#[test]
fn mutual_references_are_rejected_as_cyclic() {
    let schema = ddl::parse_ddl(
        r#"
CREATE TABLE a
id INT PRIMARY KEY
b_id INT FOREIGN KEY REFERENCES b (id)

CREATE TABLE b
id INT PRIMARY KEY
a_id INT FOREIGN KEY REFERENCES a (id)
"#,
    )
    .unwrap();
    let err = insertion_order(&schema).unwrap_err();
    assert!(matches!(err, LoadError::Cycle(_)));
    let message = format!("{err}");
    assert!(message.contains('a') && message.contains('b'));
}

#[test]
fn self_reference_is_not_a_cycle() {
    let schema = ddl::parse_ddl(
        r#"
CREATE TABLE employee
id INT PRIMARY KEY
manager_id INT FOREIGN KEY REFERENCES employee (id)
"#,
    )
    .unwrap();
    assert_eq!(insertion_order(&schema).unwrap(), ["employee"]);
}

#[test]
fn self_reference_validates_against_own_records() {
    let ddl_source = r#"
CREATE TABLE employee
id INT PRIMARY KEY
manager_id INT FOREIGN KEY REFERENCES employee (id)
"#;
    let ok = Dataset::from_ddl(ddl_source)
        .unwrap()
        .load_str("EMPLOYEE\nid|manager_id\n1|\n2|1\n")
        .unwrap()
        .validate();
    assert!(ok.is_ok());

    let err = Dataset::from_ddl(ddl_source)
        .unwrap()
        .load_str("EMPLOYEE\nid|manager_id\n2|3\n")
        .unwrap()
        .validate()
        .unwrap_err();
    assert!(matches!(err, LoadError::Referential(_)));
}

#[test]
fn load_writes_tables_in_dependency_order() {
    let mut store = MemoryStore::new();
    let summary = load(
        PERSON_PET_DDL,
        "PET\nid|owner_id\n10|1\n11|2\nPERSON\nid|name\n2|grace\n1|ada\n",
        &mut store,
        LoadOptions::default(),
    )
    .unwrap();

    assert_eq!(summary.table_order, ["person", "pet"]);
    assert_eq!(summary.records_written, 4);

    let tables: Vec<&str> = store
        .inserted()
        .iter()
        .map(|(table, _)| table.as_str())
        .collect();
    // referenced table first; records within a table in primary-key order
    assert_eq!(tables, ["person", "person", "pet", "pet"]);
    let (_, first_person) = &store.inserted()[0];
    assert_eq!(first_person.get("id"), Some(&Value::Int(1)));
    assert_eq!(first_person.get("name"), Some(&Value::Text("ada".into())));

    let (_, first_pet) = &store.inserted()[2];
    assert_eq!(first_pet.get("owner_id"), Some(&Value::Int(1)));
}

#[test]
fn load_aborts_before_any_write_on_validation_failure() {
    let mut store = MemoryStore::new();
    let err = load(
        PERSON_PET_DDL,
        "PET\nid|owner_id\n10|99\n",
        &mut store,
        LoadOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Referential(_)));
    assert!(store.inserted().is_empty());
}

#[test]
fn store_failures_surface_verbatim() {
    struct FailingStore;
    impl RecordStore for FailingStore {
        fn insert(&mut self, table: &str, _record: &RecordMap) -> LoadResult<()> {
            Err(LoadError::Store(format!("unique violation on '{table}'")))
        }
        fn update(&mut self, _table: &str, _record: &RecordMap) -> LoadResult<()> {
            Ok(())
        }
    }

    let err = load(
        PERSON_PET_DDL,
        "PERSON\nid|name\n1|ada\n",
        &mut FailingStore,
        LoadOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Store(_)));
    assert!(format!("{err}").contains("unique violation on 'person'"));
}

#[test]
fn memory_store_records_updates() {
    let mut store = MemoryStore::new();
    let record: RecordMap = [("id".to_string(), Value::Int(1))].into();
    store.update("person", &record).unwrap();
    assert_eq!(store.updated().len(), 1);
    assert!(store.inserted().is_empty());
}

#[test]
fn loads_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let ddl_path = dir.path().join("schema.sql");
    let data_path = dir.path().join("data.txt");
    std::fs::write(&ddl_path, PERSON_PET_DDL).unwrap();
    std::fs::write(&data_path, "PERSON\nid|name\n1|ada\n").unwrap();

    let mut store = MemoryStore::new();
    let summary = Dataset::from_ddl_file(&ddl_path)
        .unwrap()
        .load_file(&data_path)
        .unwrap()
        .validate()
        .unwrap()
        .write_to(&mut store)
        .unwrap();
    assert_eq!(summary.records_written, 1);
}
