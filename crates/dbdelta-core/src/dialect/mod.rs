//! Dialect-specific DDL generation.
//!
//! Every operation takes one entity, validates it, and returns a single
//! DDL statement. Ordering statements into a migration is done by
//! [`crate::plan`].

mod mysql;

pub use mysql::MySqlDialect;

use crate::diff::ColumnDiff;
use crate::error::SchemaError;
use crate::schema::{Column, Constraint, ConstraintKind, Index, IndexAlgorithm, Table};

/// Keywords accepted as column defaults without quoting.
const DEFAULT_KEYWORDS: &[&str] = &[
    "NULL",
    "TRUE",
    "FALSE",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIME",
    "LOCALTIMESTAMP",
];

/// Functions accepted as column defaults without quoting.
const DEFAULT_FUNCTIONS: &[&str] = &[
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "NOW",
    "SYSDATE",
    "CURDATE",
    "CURTIME",
    "UTC_TIMESTAMP",
    "UTC_DATE",
    "UTC_TIME",
    "UNIX_TIMESTAMP",
    "UUID",
    "UUID_TO_BIN",
];

/// Trait for dialect-specific DDL generation.
pub trait MigrationDialect {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quotes an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Generates SQL for MODIFY COLUMN, using the new definition.
    fn modify_column(&self, table: &str, change: &ColumnDiff) -> Result<String, SchemaError>;

    /// Generates SQL for DROP INDEX.
    fn drop_index(&self, index: &Index) -> Result<String, SchemaError>;

    /// Generates SQL for dropping a constraint. The syntax depends on the
    /// constraint kind.
    fn drop_constraint(&self, constraint: &Constraint) -> Result<String, SchemaError>;

    /// Generates SQL for CREATE TABLE: columns by position, then the
    /// primary key, then one UNIQUE KEY per unique constraint.
    ///
    /// Foreign keys, checks and secondary indexes are not included.
    fn create_table(&self, table: &Table) -> Result<String, SchemaError> {
        table.validate()?;

        let mut defs: Vec<String> = table
            .columns_by_position()
            .into_iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();

        if let Some(primary) = table.primary_index() {
            defs.push(format!(
                "    PRIMARY KEY ({})",
                self.column_list(&primary.columns)
            ));
        }

        for constraint in table.constraints.values() {
            if let ConstraintKind::Unique { columns } = &constraint.kind {
                defs.push(format!(
                    "    UNIQUE KEY {} ({})",
                    self.quote_identifier(&constraint.name),
                    self.column_list(columns)
                ));
            }
        }

        Ok(format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_identifier(&table.name),
            defs.join(",\n")
        ))
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &Table) -> Result<String, SchemaError> {
        table.validate()?;
        Ok(format!("DROP TABLE {}", self.quote_identifier(&table.name)))
    }

    /// Generates SQL for RENAME TABLE.
    fn rename_table(&self, old_name: &str, new_name: &str) -> Result<String, SchemaError> {
        require_table_name(old_name)?;
        require_table_name(new_name)?;
        Ok(format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        ))
    }

    /// Generates SQL for ADD COLUMN.
    fn add_column(&self, table: &str, column: &Column) -> Result<String, SchemaError> {
        require_table_name(table)?;
        column.validate()?;
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        ))
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, table: &str, column: &Column) -> Result<String, SchemaError> {
        require_table_name(table)?;
        column.validate()?;
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(&column.name)
        ))
    }

    /// Generates SQL for CREATE INDEX.
    ///
    /// A primary index becomes `ALTER TABLE .. ADD PRIMARY KEY`. Full-text
    /// indexes use `CREATE FULLTEXT INDEX`; other non-default algorithms
    /// get a `USING` clause.
    fn create_index(&self, index: &Index) -> Result<String, SchemaError> {
        index.validate()?;
        let table = self.quote_identifier(&index.table_name);
        let columns = self.column_list(&index.columns);

        if index.primary {
            return Ok(format!("ALTER TABLE {table} ADD PRIMARY KEY ({columns})"));
        }

        let mut sql = String::from("CREATE ");
        if index.algorithm == IndexAlgorithm::FullText {
            sql.push_str("FULLTEXT ");
        } else if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&table);
        sql.push_str(" (");
        sql.push_str(&columns);
        sql.push(')');

        if matches!(index.algorithm, IndexAlgorithm::Hash | IndexAlgorithm::RTree) {
            sql.push_str(" USING ");
            sql.push_str(index.algorithm.as_sql());
        }

        Ok(sql)
    }

    /// Generates SQL for ADD CONSTRAINT.
    fn add_constraint(&self, constraint: &Constraint) -> Result<String, SchemaError> {
        constraint.validate()?;
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} ",
            self.quote_identifier(&constraint.table_name),
            self.quote_identifier(&constraint.name)
        );

        match &constraint.kind {
            ConstraintKind::ForeignKey {
                columns,
                referenced_table,
                referenced_columns,
                on_update,
                on_delete,
            } => {
                sql.push_str("FOREIGN KEY (");
                sql.push_str(&self.column_list(columns));
                sql.push_str(") REFERENCES ");
                sql.push_str(&self.quote_identifier(referenced_table));
                sql.push_str(" (");
                sql.push_str(&self.column_list(referenced_columns));
                sql.push(')');

                if let Some(action) = on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.as_sql());
                }
                if let Some(action) = on_update {
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(action.as_sql());
                }
            }
            ConstraintKind::Unique { columns } => {
                sql.push_str("UNIQUE (");
                sql.push_str(&self.column_list(columns));
                sql.push(')');
            }
            ConstraintKind::Check { expression } => {
                sql.push_str("CHECK (");
                sql.push_str(expression.trim());
                sql.push(')');
            }
        }

        Ok(sql)
    }

    /// Generates SQL for a column definition.
    fn column_definition(&self, column: &Column) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            column.data_type.trim()
        );

        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });

        if let Some(ref default) = column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }

        let extra = render_extra(&column.extra);
        if !extra.is_empty() {
            sql.push(' ');
            sql.push_str(&extra);
        }

        sql
    }

    /// Renders a default value. Keywords, known functions, numbers and
    /// parenthesized expressions are kept as-is; anything else becomes a
    /// string literal with `\` and `'` escaped.
    fn render_default(&self, value: &str) -> String {
        let trimmed = value.trim();
        if is_unquoted_default(trimmed) {
            trimmed.to_string()
        } else {
            format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
        }
    }

    /// Quotes and joins a column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn require_table_name(name: &str) -> Result<(), SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::EmptyName { entity: "table" });
    }
    Ok(())
}

/// Upper-cases the extra modifiers, dropping the catalog-only
/// `DEFAULT_GENERATED` marker.
fn render_extra(extra: &str) -> String {
    extra
        .split_whitespace()
        .filter(|word| !word.eq_ignore_ascii_case("DEFAULT_GENERATED"))
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_unquoted_default(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    let upper = value.to_ascii_uppercase();
    if DEFAULT_KEYWORDS.contains(&upper.as_str()) {
        return true;
    }
    if value.starts_with('(') && value.ends_with(')') {
        return true;
    }
    if let Some((name, _)) = upper.split_once('(') {
        if upper.ends_with(')') && DEFAULT_FUNCTIONS.contains(&name.trim()) {
            return true;
        }
    }
    is_numeric_literal(value)
}

fn is_numeric_literal(value: &str) -> bool {
    let digits = value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value);
    digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}
