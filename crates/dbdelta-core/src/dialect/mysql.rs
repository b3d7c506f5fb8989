//! MySQL dialect.

use super::{MigrationDialect, require_table_name};
use crate::diff::ColumnDiff;
use crate::error::SchemaError;
use crate::schema::{Constraint, ConstraintKind, Index};

/// MySQL dialect for DDL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn modify_column(&self, table: &str, change: &ColumnDiff) -> Result<String, SchemaError> {
        require_table_name(table)?;
        change.new.validate()?;
        Ok(format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(&change.new)
        ))
    }

    fn drop_index(&self, index: &Index) -> Result<String, SchemaError> {
        index.validate()?;
        let table = self.quote_identifier(&index.table_name);
        if index.primary {
            return Ok(format!("ALTER TABLE {table} DROP PRIMARY KEY"));
        }
        Ok(format!(
            "DROP INDEX {} ON {table}",
            self.quote_identifier(&index.name)
        ))
    }

    fn drop_constraint(&self, constraint: &Constraint) -> Result<String, SchemaError> {
        constraint.validate()?;
        let keyword = match constraint.kind {
            ConstraintKind::ForeignKey { .. } => "FOREIGN KEY",
            ConstraintKind::Unique { .. } => "INDEX",
            ConstraintKind::Check { .. } => "CHECK",
        };
        Ok(format!(
            "ALTER TABLE {} DROP {keyword} {}",
            self.quote_identifier(&constraint.table_name),
            self.quote_identifier(&constraint.name)
        ))
    }
}
