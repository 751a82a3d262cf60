//! In-memory database errors.

use crate::protocol::sql_state;

/// Errors raised by [`Databases`](super::Databases) and
/// [`MemoryDatabase`](super::MemoryDatabase).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// No database with this name is registered.
    DatabaseNotFound { name: String },
    /// A database with this name is already registered.
    DuplicateDatabase { name: String },
    /// Table already exists.
    DuplicateTable { name: String },
    /// Table does not exist.
    TableNotFound { name: String },
    /// Column does not exist in the table.
    ColumnNotFound { table: String, column: String },
    /// Row width does not match the table's column count.
    ColumnCount { expected: usize, actual: usize },
    /// Statement is malformed.
    Syntax { message: String },
    /// Statement is well-formed but not something this database can run.
    Unsupported { statement: String },
}

impl DatabaseError {
    /// SQLSTATE code reported to clients.
    pub fn sql_state(&self) -> &'static str {
        match self {
            DatabaseError::DatabaseNotFound { .. } => sql_state::INVALID_CATALOG_NAME,
            DatabaseError::DuplicateDatabase { .. } => sql_state::DUPLICATE_DATABASE,
            DatabaseError::DuplicateTable { .. } => sql_state::DUPLICATE_TABLE,
            DatabaseError::TableNotFound { .. } => sql_state::UNDEFINED_TABLE,
            DatabaseError::ColumnNotFound { .. } => sql_state::UNDEFINED_COLUMN,
            DatabaseError::ColumnCount { .. } => sql_state::INVALID_PARAMETER_VALUE,
            DatabaseError::Syntax { .. } => sql_state::SYNTAX_ERROR,
            DatabaseError::Unsupported { .. } => sql_state::FEATURE_NOT_SUPPORTED,
        }
    }
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseError::DatabaseNotFound { name } => {
                write!(f, "database \"{}\" does not exist", name)
            }
            DatabaseError::DuplicateDatabase { name } => {
                write!(f, "database \"{}\" already exists", name)
            }
            DatabaseError::DuplicateTable { name } => {
                write!(f, "relation \"{}\" already exists", name)
            }
            DatabaseError::TableNotFound { name } => {
                write!(f, "relation \"{}\" does not exist", name)
            }
            DatabaseError::ColumnNotFound { table, column } => {
                write!(f, "column \"{}\" of relation \"{}\" does not exist", column, table)
            }
            DatabaseError::ColumnCount { expected, actual } => {
                write!(f, "expected {} values per row, got {}", expected, actual)
            }
            DatabaseError::Syntax { message } => write!(f, "syntax error: {}", message),
            DatabaseError::Unsupported { statement } => {
                write!(f, "statement not supported: {}", statement)
            }
        }
    }
}

impl std::error::Error for DatabaseError {}
