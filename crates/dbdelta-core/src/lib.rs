//! Schema comparison for MySQL-compatible databases.
//!
//! `dbdelta-core` takes two schema snapshots, a `source` (the desired end
//! state) and a `target` (the current state), and works out what changed,
//! how risky the change is and which DDL reconciles them:
//!
//! - **Schema** - Plain value types for tables, columns, indexes and
//!   constraints, with recursive validation
//! - **Diff** - Name-based structural comparison into a [`SchemaDiff`]
//! - **Rename** - Column-similarity heuristic pairing removed and added
//!   tables
//! - **Risk** - Warnings for data loss and compatibility risks, hard
//!   errors for dangling references
//! - **Dialect** - Per-entity DDL generation ([`MySqlDialect`])
//! - **Plan** - Orders the DDL into a sequence MySQL accepts
//!
//! Nothing here talks to a database. Snapshots come from the caller, and
//! the generated statements are handed back as strings.
//!
//! # Example
//!
//! ```rust
//! use dbdelta_core::prelude::*;
//!
//! let users = Table::new("users")
//!     .column(Column::new("id", "int").not_null().auto_increment())
//!     .primary_key(["id"]);
//!
//! let target = Schema::new("app").table(users.clone());
//! let source = Schema::new("app")
//!     .table(users.column(Column::new("email", "varchar(255)").position(1)));
//!
//! let comparison = Comparator::new(CompareOptions::default()).compare(&source, &target)?;
//! assert!(comparison.is_valid());
//!
//! let sql = comparison.sql()?;
//! assert_eq!(sql.len(), 1);
//! assert_eq!(sql[0], "ALTER TABLE `users` ADD COLUMN `email` varchar(255) NULL");
//! # Ok::<(), dbdelta_core::Error>(())
//! ```

pub mod dialect;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod rename;
pub mod risk;
pub mod schema;

pub use dialect::{MigrationDialect, MySqlDialect};
pub use diff::{ColumnDiff, SchemaDiff, TableDiff, diff_schemas, diff_table};
pub use error::{Error, Result, SchemaError, Side};
pub use pipeline::{Comparator, CompareOptions, Comparison, compare};
pub use plan::plan_statements;
pub use rename::{RENAME_THRESHOLD, RenameDetector, detect_renames, table_similarity};
pub use risk::{
    DependencyError, DependencyErrorKind, RiskValidator, Severity, ValidationResult, Warning,
    WarningCategory,
};
pub use schema::{
    Column, Constraint, ConstraintKind, ForeignKeyAction, Index, IndexAlgorithm, Schema, Table,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{MigrationDialect, MySqlDialect};
    pub use crate::diff::{SchemaDiff, diff_schemas};
    pub use crate::error::{Error, Result, SchemaError};
    pub use crate::pipeline::{Comparator, CompareOptions, Comparison, compare};
    pub use crate::rename::RenameDetector;
    pub use crate::risk::{RiskValidator, Severity, ValidationResult};
    pub use crate::schema::{
        Column, Constraint, ForeignKeyAction, Index, IndexAlgorithm, Schema, Table,
    };
}
