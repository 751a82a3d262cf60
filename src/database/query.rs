//! Statement parsing for inspection queries.
//!
//! Only the read-only statements an operator needs to look around a node's
//! database are understood:
//!
//! - `SHOW TABLES`
//! - `SELECT * FROM <table>`
//! - `SELECT <column>[, <column>...] FROM <table>`
//!
//! Keywords are case-insensitive. A trailing `;` is allowed.

use crate::database::DatabaseError;

/// A parsed inspection statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    ShowTables,
    Select { projection: Projection, table: String },
}

/// Columns requested by a `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

/// Splits a query string into its `;`-separated statements, skipping blanks.
pub fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}

/// Parses a single statement.
///
/// Returns `Ok(None)` for an empty statement.
pub fn parse(sql: &str) -> Result<Option<Statement>, DatabaseError> {
    let sql = sql.trim().trim_end_matches(';').trim();
    if sql.is_empty() {
        return Ok(None);
    }

    let words: Vec<&str> = sql.split_whitespace().collect();
    let keyword = |i: usize, kw: &str| words.get(i).is_some_and(|w| w.eq_ignore_ascii_case(kw));

    if keyword(0, "show") && keyword(1, "tables") && words.len() == 2 {
        return Ok(Some(Statement::ShowTables));
    }

    if keyword(0, "select") {
        return parse_select(sql, &words).map(Some);
    }

    Err(DatabaseError::Unsupported {
        statement: sql.to_string(),
    })
}

fn parse_select(sql: &str, words: &[&str]) -> Result<Statement, DatabaseError> {
    let Some(from) = words.iter().position(|w| w.eq_ignore_ascii_case("from")) else {
        return Err(DatabaseError::Unsupported {
            statement: sql.to_string(),
        });
    };

    let projection = words[1..from].join(" ");
    let projection = projection.trim();
    if projection.is_empty() {
        return Err(DatabaseError::Syntax {
            message: "expected column list after SELECT".to_string(),
        });
    }

    let table = match &words[from + 1..] {
        [table] => table.to_string(),
        [] => {
            return Err(DatabaseError::Syntax {
                message: "expected table name after FROM".to_string(),
            });
        }
        _ => {
            return Err(DatabaseError::Unsupported {
                statement: sql.to_string(),
            });
        }
    };

    let projection = if projection == "*" {
        Projection::All
    } else {
        let mut columns = Vec::new();
        for column in projection.split(',') {
            let column = column.trim();
            if column.is_empty() || column.contains(char::is_whitespace) {
                return Err(DatabaseError::Syntax {
                    message: format!("invalid column list \"{}\"", projection),
                });
            }
            columns.push(column.to_string());
        }
        Projection::Columns(columns)
    };

    Ok(Statement::Select { projection, table })
}
