//! Classification of stripped definition lines into a closed set of shapes.

use common::{LoadError, LoadResult};
use schema::SortOrder;
use types::ColumnType;

/// One recognized definition line.
#[derive(Clone, Debug, PartialEq)]
pub enum LineShape {
    CreateTable {
        name: String,
    },
    PrimaryKey {
        columns: Vec<String>,
        sort: SortOrder,
    },
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        referenced_table: String,
        referenced_columns: Vec<String>,
    },
    ColumnDef(ColumnLine),
}

/// A parsed column definition line.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnLine {
    pub name: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: Option<SortOrder>,
    pub references: Option<(String, String)>,
}

/// Classify one stripped, non-empty line. Shapes are tried in priority
/// order and the first match wins; anything unmatched is read as a column
/// definition.
pub fn classify(line: &str) -> LoadResult<LineShape> {
    let words = words_of(line);
    if keyword(&words, 0, "CREATE") && keyword(&words, 1, "TABLE") {
        let Some(name) = words.get(2) else {
            return Err(LoadError::Ddl(format!(
                "CREATE TABLE without a table name: '{line}'"
            )));
        };
        return Ok(LineShape::CreateTable {
            name: name.to_lowercase(),
        });
    }
    if keyword(&words, 0, "CONSTRAINT") {
        if has_sequence(&words, "PRIMARY", "KEY") {
            return Ok(LineShape::PrimaryKey {
                columns: paren_list(line)?,
                sort: trailing_sort(&words),
            });
        }
        if has_word(&words, "UNIQUE") {
            return Ok(LineShape::Unique {
                columns: paren_list(line)?,
            });
        }
        return Err(LoadError::Ddl(format!("unrecognized constraint: '{line}'")));
    }
    if keyword(&words, 0, "FOREIGN") && keyword(&words, 1, "KEY") && has_word(&words, "REFERENCES")
    {
        return foreign_key_shape(line);
    }
    if keyword(&words, 0, "UNIQUE") {
        return Ok(LineShape::Unique {
            columns: paren_list(line)?,
        });
    }
    column_line(line).map(LineShape::ColumnDef)
}

/// `FOREIGN KEY ( <col>... ) REFERENCES <table> ( <col>... )`
fn foreign_key_shape(line: &str) -> LoadResult<LineShape> {
    let upper = line.to_ascii_uppercase();
    let Some(refs_at) = upper.find("REFERENCES") else {
        return Err(LoadError::Ddl(format!(
            "foreign key without REFERENCES: '{line}'"
        )));
    };
    let local_part = &line[..refs_at];
    let referenced_part = &line[refs_at + "REFERENCES".len()..];

    let columns = paren_list(local_part)?;
    let Some(table_end) = referenced_part.find('(') else {
        return Err(LoadError::Ddl(format!(
            "foreign key without a referenced column list: '{line}'"
        )));
    };
    let referenced_table = referenced_part[..table_end].trim().to_lowercase();
    if referenced_table.is_empty() || referenced_table.contains(char::is_whitespace) {
        return Err(LoadError::Ddl(format!(
            "foreign key without a referenced table name: '{line}'"
        )));
    }
    let referenced_columns = paren_list(referenced_part)?;
    if columns.len() != referenced_columns.len() {
        return Err(LoadError::Ddl(format!(
            "foreign key on ({}) lists {} local but {} referenced columns",
            columns.join(", "),
            columns.len(),
            referenced_columns.len()
        )));
    }
    Ok(LineShape::ForeignKey {
        columns,
        referenced_table,
        referenced_columns,
    })
}

/// `<name> <type>[(<size>)] [clauses...]`, clauses in any subset.
fn column_line(line: &str) -> LoadResult<ColumnLine> {
    let (name, after_name) = next_token(line);
    let (ty_token, after_ty) = next_token(after_name);
    if ty_token.is_empty() {
        return Err(LoadError::Ddl(format!(
            "column definition '{line}' is missing a type"
        )));
    }
    let mut rest = after_ty;

    let (ty_name, mut size_text) = match ty_token.find('(') {
        Some(idx) => (&ty_token[..idx], Some(ty_token[idx..].to_string())),
        None => (ty_token, None),
    };
    if size_text.is_none() {
        let trimmed = rest.trim_start();
        if let Some(body) = trimmed.strip_prefix('(') {
            let Some(end) = body.find(')') else {
                return Err(LoadError::Ddl(format!("unterminated size in '{line}'")));
            };
            size_text = Some(body[..end].to_string());
            rest = &body[end + 1..];
        }
    }
    let size = match &size_text {
        Some(text) => Some(parse_size(text, line)?),
        None => None,
    };

    let words = words_of(rest);
    // A nullability clause without NOT marks the column required; NOT NULL
    // leaves it optional. Existing schema files rely on this reading.
    let nullable = if has_word(&words, "NULL") {
        has_word(&words, "NOT")
    } else {
        true
    };
    let unique = has_word(&words, "UNIQUE");
    let primary_key = if has_sequence(&words, "PRIMARY", "KEY") {
        Some(trailing_sort(&words))
    } else {
        None
    };
    let references = match words.iter().position(|w| w.eq_ignore_ascii_case("REFERENCES")) {
        Some(idx) => {
            let (Some(table), Some(column)) = (words.get(idx + 1), words.get(idx + 2)) else {
                return Err(LoadError::Ddl(format!(
                    "incomplete REFERENCES clause in '{line}'"
                )));
            };
            Some((table.to_lowercase(), column.to_lowercase()))
        }
        None => None,
    };

    Ok(ColumnLine {
        name: name.to_lowercase(),
        ty: ColumnType::new(ty_name, size),
        nullable,
        unique,
        primary_key,
        references,
    })
}

fn parse_size(text: &str, line: &str) -> LoadResult<u32> {
    let digits = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();
    digits
        .parse::<u32>()
        .map_err(|_| LoadError::Ddl(format!("invalid size '{digits}' in '{line}'")))
}

/// The comma-separated identifier list between the first `(` and `)`.
fn paren_list(text: &str) -> LoadResult<Vec<String>> {
    let Some(start) = text.find('(') else {
        return Err(LoadError::Ddl(format!("expected a column list in '{text}'")));
    };
    let Some(end) = text[start..].find(')').map(|idx| start + idx) else {
        return Err(LoadError::Ddl(format!(
            "unterminated column list in '{text}'"
        )));
    };
    let columns: Vec<String> = text[start + 1..end]
        .split(',')
        .map(|column| column.trim().to_lowercase())
        .filter(|column| !column.is_empty())
        .collect();
    if columns.is_empty() {
        return Err(LoadError::Ddl(format!("empty column list in '{text}'")));
    }
    Ok(columns)
}

fn words_of(text: &str) -> Vec<&str> {
    text.split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',')
        .filter(|word| !word.is_empty())
        .collect()
}

fn next_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    }
}

fn keyword(words: &[&str], index: usize, expected: &str) -> bool {
    words
        .get(index)
        .is_some_and(|word| word.eq_ignore_ascii_case(expected))
}

fn has_word(words: &[&str], expected: &str) -> bool {
    words.iter().any(|word| word.eq_ignore_ascii_case(expected))
}

fn has_sequence(words: &[&str], first: &str, second: &str) -> bool {
    words.windows(2).any(|pair| {
        pair[0].eq_ignore_ascii_case(first) && pair[1].eq_ignore_ascii_case(second)
    })
}

fn trailing_sort(words: &[&str]) -> SortOrder {
    if has_word(words, "DESC") {
        SortOrder::Desc
    } else {
        SortOrder::Asc
    }
}
