//! Error types for schema comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::risk::DependencyError;

/// Structural validation errors.
///
/// Validation stops at the first violation found. Errors raised while
/// validating a table's children are wrapped in [`SchemaError::InTable`]
/// so the offending table is always named; use
/// [`SchemaError::root_cause`] to get at the underlying violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// An entity has an empty name.
    #[error("{entity} name must not be empty")]
    EmptyName {
        /// Kind of entity (schema, table, column, index, constraint).
        entity: &'static str,
    },

    /// A table has no columns.
    #[error("table '{table}' has no columns")]
    NoColumns {
        /// Table name.
        table: String,
    },

    /// A column's data type is not part of the MySQL vocabulary.
    #[error("column '{column}' has invalid data type '{data_type}'")]
    InvalidDataType {
        /// Column name.
        column: String,
        /// The offending data type.
        data_type: String,
    },

    /// A column has a negative ordinal position.
    #[error("column '{column}' has negative position {position}")]
    NegativePosition {
        /// Column name.
        column: String,
        /// The offending position.
        position: i32,
    },

    /// An index or constraint belongs to a different table than the one
    /// holding it.
    #[error("{entity} '{name}' belongs to table '{found}' but is declared on '{expected}'")]
    TableMismatch {
        /// Kind of entity (index, constraint).
        entity: &'static str,
        /// Entity name.
        name: String,
        /// Name of the owning table.
        expected: String,
        /// Table name carried by the entity.
        found: String,
    },

    /// A name-keyed map holds an entity under a different name.
    #[error("{entity} '{name}' is stored under key '{key}'")]
    KeyMismatch {
        /// Kind of entity.
        entity: &'static str,
        /// Map key.
        key: String,
        /// Entity name.
        name: String,
    },

    /// An index or constraint has no columns.
    #[error("{entity} '{name}' has no columns")]
    EmptyColumnList {
        /// Kind of entity (index, constraint).
        entity: &'static str,
        /// Entity name.
        name: String,
    },

    /// A foreign key's local and referenced column counts differ.
    #[error(
        "foreign key '{constraint}' has {local} column(s) but references {referenced} column(s)"
    )]
    ForeignKeyColumnCount {
        /// Constraint name.
        constraint: String,
        /// Number of local columns.
        local: usize,
        /// Number of referenced columns.
        referenced: usize,
    },

    /// A foreign key does not name the table it references.
    #[error("foreign key '{constraint}' has no referenced table")]
    MissingReferencedTable {
        /// Constraint name.
        constraint: String,
    },

    /// A check constraint has an empty expression.
    #[error("check constraint '{constraint}' has an empty expression")]
    EmptyCheckExpression {
        /// Constraint name.
        constraint: String,
    },

    /// Two indexes of one table share a name.
    #[error("index '{index}' is declared more than once")]
    DuplicateIndex {
        /// Index name.
        index: String,
    },

    /// A table declares more than one primary index.
    #[error("table '{table}' has more than one primary key")]
    MultiplePrimaryKeys {
        /// Table name.
        table: String,
    },

    /// A violation found inside a table.
    #[error("table '{table}': {source}")]
    InTable {
        /// Table name.
        table: String,
        /// The underlying violation.
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    /// Wraps this error with the name of the table it was found in.
    #[must_use]
    pub(crate) fn in_table(self, table: &str) -> Self {
        Self::InTable {
            table: table.to_string(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost violation, skipping table context.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::InTable { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Which side of a comparison a schema sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The desired end state.
    Source,
    /// The current state being migrated away from.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Errors returned by the comparison pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One of the input schemas failed structural validation.
    #[error("{side} schema is invalid: {source}")]
    InvalidSchema {
        /// Which input was rejected.
        side: Side,
        /// The first violation found.
        #[source]
        source: SchemaError,
    },

    /// SQL is withheld because the change set has dependency errors.
    #[error(
        "SQL generation blocked by {} dependency error(s):\n{}",
        .errors.len(),
        .errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n")
    )]
    Blocked {
        /// Every dependency error found.
        errors: Vec<DependencyError>,
    },

    /// An entity could not be rendered as SQL.
    #[error("failed to generate SQL: {0}")]
    Sql(#[source] SchemaError),
}

/// Result type for comparison operations.
pub type Result<T> = std::result::Result<T, Error>;
