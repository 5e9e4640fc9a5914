use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive field value. Data files carry text; fields of integer-typed
/// columns are narrowed to `Int` and empty fields become `Null`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a raw data-file field according to the column's declared type.
    ///
    /// An empty field is `Null`. Fields of integer-family columns parse to
    /// `Int`, falling back to `Text` when the field is not a valid integer.
    pub fn from_field(raw: &str, ty: &ColumnType) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        if ty.is_integer() {
            if let Ok(n) = raw.parse::<i64>() {
                return Value::Int(n);
            }
        }
        Value::Text(raw.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Null => f.write_str("NULL"),
        }
    }
}

const INTEGER_TYPES: &[&str] = &["int", "integer", "smallint", "bigint", "tinyint"];

/// Declared column type: a lower-cased free-form token plus an optional
/// size, e.g. `varchar(40)`. Foreign keys require both parts to match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    pub name: String,
    pub size: Option<u32>,
}

impl ColumnType {
    pub fn new(name: &str, size: Option<u32>) -> Self {
        Self {
            name: name.to_lowercase(),
            size,
        }
    }

    pub fn is_integer(&self) -> bool {
        INTEGER_TYPES.contains(&self.name.as_str())
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "{}({size})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Ordered tuple of values extracted from a record's primary-key columns.
///
/// Equality, hashing, and ordering are structural over the tuple elements,
/// so keys behave as plain values inside ordered maps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(Vec<Value>);

impl Key {
    /// Sentinel returned when a key cannot be built because a column name
    /// does not resolve for the table at hand.
    pub const NONE: Key = Key(Vec::new());

    pub fn new(values: Vec<Value>) -> Self {
        Key(values)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, value) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}
