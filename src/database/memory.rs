//! A single named in-memory database.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::database::query::{self, Projection, Statement};
use crate::database::DatabaseError;

/// A table of text values. `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Result of executing one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryOutput {
    /// Command completion tag, e.g. `SELECT 3`.
    pub fn tag(&self) -> String {
        format!("SELECT {}", self.rows.len())
    }
}

/// An in-memory database owned by a simulated node.
///
/// Tables are keyed by lowercased name, so lookups are case-insensitive
/// while the original spelling is kept for display.
///
/// Uses `parking_lot::RwLock` because every operation is a short map access
/// with no awaits inside the lock.
pub struct MemoryDatabase {
    name: String,
    tables: RwLock<BTreeMap<String, Table>>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates an empty table.
    pub fn create_table(&self, name: &str, columns: &[&str]) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write();
        let key = name.to_ascii_lowercase();
        if tables.contains_key(&key) {
            return Err(DatabaseError::DuplicateTable {
                name: name.to_string(),
            });
        }
        tables.insert(
            key,
            Table {
                name: name.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Appends a row to a table.
    pub fn insert(&self, table: &str, row: Vec<Option<String>>) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write();
        let table = lookup_mut(&mut tables, table)?;
        if row.len() != table.columns.len() {
            return Err(DatabaseError::ColumnCount {
                expected: table.columns.len(),
                actual: row.len(),
            });
        }
        table.rows.push(row);
        Ok(())
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().values().map(|t| t.name.clone()).collect()
    }

    /// Returns a copy of a table.
    pub fn table(&self, name: &str) -> Option<Table> {
        self.tables.read().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Runs every statement in `sql`, stopping at the first error.
    ///
    /// Returns one output per non-empty statement; an empty query string
    /// yields an empty vector.
    pub fn execute(&self, sql: &str) -> Result<Vec<QueryOutput>, DatabaseError> {
        let mut outputs = Vec::new();
        for stmt in query::split_statements(sql) {
            if let Some(stmt) = query::parse(stmt)? {
                outputs.push(self.run(&stmt)?);
            }
        }
        Ok(outputs)
    }

    fn run(&self, stmt: &Statement) -> Result<QueryOutput, DatabaseError> {
        match stmt {
            Statement::ShowTables => Ok(QueryOutput {
                columns: vec!["table_name".to_string()],
                rows: self
                    .table_names()
                    .into_iter()
                    .map(|name| vec![Some(name)])
                    .collect(),
            }),
            Statement::Select { projection, table } => {
                let tables = self.tables.read();
                let table = lookup(&tables, table)?;
                match projection {
                    Projection::All => Ok(QueryOutput {
                        columns: table.columns.clone(),
                        rows: table.rows.clone(),
                    }),
                    Projection::Columns(columns) => project(table, columns),
                }
            }
        }
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("name", &self.name)
            .field("tables", &self.table_names())
            .finish()
    }
}

fn lookup<'a>(tables: &'a BTreeMap<String, Table>, name: &str) -> Result<&'a Table, DatabaseError> {
    tables
        .get(&name.to_ascii_lowercase())
        .ok_or_else(|| DatabaseError::TableNotFound {
            name: name.to_string(),
        })
}

fn lookup_mut<'a>(
    tables: &'a mut BTreeMap<String, Table>,
    name: &str,
) -> Result<&'a mut Table, DatabaseError> {
    tables
        .get_mut(&name.to_ascii_lowercase())
        .ok_or_else(|| DatabaseError::TableNotFound {
            name: name.to_string(),
        })
}

fn project(table: &Table, columns: &[String]) -> Result<QueryOutput, DatabaseError> {
    let indexes = columns
        .iter()
        .map(|column| {
            table
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(column))
                .ok_or_else(|| DatabaseError::ColumnNotFound {
                    table: table.name.clone(),
                    column: column.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryOutput {
        columns: indexes.iter().map(|&i| table.columns[i].clone()).collect(),
        rows: table
            .rows
            .iter()
            .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
            .collect(),
    })
}
