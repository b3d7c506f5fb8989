//! Change-risk validation.
//!
//! The [`RiskValidator`] makes a single pass over a [`SchemaDiff`] and
//! sorts what it finds into two buckets:
//!
//! - **warnings**: changes that may lose data, slow queries down or fail
//!   against existing rows. They are reported in full and never block.
//! - **dependency errors**: changes that would leave a dangling reference
//!   or a table without primary key. SQL must not be handed out while any
//!   of these exist.
//!
//! The validator itself never fails.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::{ColumnDiff, SchemaDiff, TableDiff};
use crate::schema::{Column, Constraint, ConstraintKind, Schema, Table, base_type, type_size};

/// Type transitions (by base type, old to new) that never lose data.
const SAFE_WIDENINGS: &[(&str, &str)] = &[
    ("varchar", "text"),
    ("varchar", "mediumtext"),
    ("varchar", "longtext"),
    ("char", "varchar"),
    ("char", "text"),
    ("tinytext", "text"),
    ("text", "mediumtext"),
    ("text", "longtext"),
    ("mediumtext", "longtext"),
    ("tinyint", "smallint"),
    ("tinyint", "mediumint"),
    ("tinyint", "int"),
    ("tinyint", "bigint"),
    ("smallint", "mediumint"),
    ("smallint", "int"),
    ("smallint", "bigint"),
    ("mediumint", "int"),
    ("mediumint", "bigint"),
    ("int", "bigint"),
    ("integer", "bigint"),
    ("float", "double"),
    ("date", "datetime"),
    ("date", "timestamp"),
    ("tinyblob", "blob"),
    ("blob", "mediumblob"),
    ("blob", "longblob"),
    ("mediumblob", "longblob"),
    ("binary", "varbinary"),
];

/// Returns true if changing from `old` to `new` data type is a known safe
/// widening. Only base types are compared.
#[must_use]
pub fn is_safe_widening(old: &str, new: &str) -> bool {
    let (old, new) = (base_type(old), base_type(new));
    SAFE_WIDENINGS
        .iter()
        .any(|&(from, to)| from == old && to == new)
}

/// How bad a warning is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Every severity, lowest first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Upper-case label, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of risk a warning describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    /// Rows or values may be lost or truncated.
    DataLoss,
    /// Queries may get slower.
    Performance,
    /// The statement may fail against existing data or break clients.
    Compatibility,
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DataLoss => "data loss",
            Self::Performance => "performance",
            Self::Compatibility => "compatibility",
        })
    }
}

/// A non-fatal risk attached to one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// How bad the change is.
    pub severity: Severity,
    /// Kind of risk.
    pub category: WarningCategory,
    /// Table the change applies to.
    pub table: String,
    /// Column the change applies to, for column-level changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Warning {
    fn new(
        severity: Severity,
        category: WarningCategory,
        table: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            table: table.to_string(),
            column: None,
            message: message.into(),
        }
    }

    fn on_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }
}

/// Kind of dependency violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyErrorKind {
    /// A table loses its primary key without getting a new one.
    MissingPrimaryKey,
    /// A foreign key points at a table that is being removed.
    ReferencesRemovedTable,
    /// An index or constraint uses a column that is being removed.
    ReferencesRemovedColumn,
}

/// A change that would leave the schema in a broken state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct DependencyError {
    /// Kind of violation.
    pub kind: DependencyErrorKind,
    /// Table holding the offending reference.
    pub table: String,
    /// Removed column still in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Offending index or constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Table a foreign key points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_table: Option<String>,
    /// Human-readable description.
    pub message: String,
}

/// Outcome of a risk validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Every warning, in detection order.
    pub warnings: Vec<Warning>,
    /// Dependency errors. Any entry blocks SQL generation.
    pub errors: Vec<DependencyError>,
}

impl ValidationResult {
    /// Returns true if there are no dependency errors. Warnings do not
    /// count.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of warnings with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.severity == severity)
            .count()
    }

    /// Highest warning severity, if any warning was raised.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.warnings.iter().map(|w| w.severity).max()
    }

    /// Returns true if any change drops data outright or converts it
    /// lossily (a HIGH or CRITICAL data-loss warning).
    #[must_use]
    pub fn has_destructive_changes(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.category == WarningCategory::DataLoss && w.severity >= Severity::High)
    }
}

/// Classifies the changes of a [`SchemaDiff`].
///
/// Without an end state, foreign keys are only checked if the diff adds
/// them. With one, every foreign key of the end state is checked, which
/// also catches unchanged foreign keys pointing at a removed table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskValidator<'a> {
    end_state: Option<&'a Schema>,
}

impl<'a> RiskValidator<'a> {
    /// Creates a validator that looks at the diff only.
    #[must_use]
    pub const fn new() -> Self {
        Self { end_state: None }
    }

    /// Creates a validator that also checks the schema the diff leads to.
    #[must_use]
    pub const fn with_end_state(schema: &'a Schema) -> Self {
        Self {
            end_state: Some(schema),
        }
    }

    /// Validates a diff.
    #[must_use]
    pub fn validate(&self, diff: &SchemaDiff) -> ValidationResult {
        let mut result = ValidationResult::default();

        for table in &diff.removed_tables {
            result.warnings.push(Warning::new(
                Severity::Critical,
                WarningCategory::DataLoss,
                &table.name,
                format!(
                    "table '{}' will be dropped with all its data",
                    table.name
                ),
            ));
        }
        for table in &diff.modified_tables {
            check_table(table, &mut result.warnings);
        }
        check_indexes(diff, &mut result.warnings);
        check_constraints(diff, &mut result.warnings);

        check_primary_keys(diff, &mut result.errors);
        check_removed_columns(diff, &mut result.errors);
        self.check_foreign_keys(diff, &mut result.errors);

        debug!(
            warnings = result.warnings.len(),
            errors = result.errors.len(),
            "Risk validation done"
        );
        result
    }

    fn check_foreign_keys(&self, diff: &SchemaDiff, errors: &mut Vec<DependencyError>) {
        let foreign_keys: Vec<&Constraint> = match self.end_state {
            Some(schema) => schema
                .tables
                .values()
                .flat_map(Table::foreign_keys)
                .collect(),
            None => diff
                .added_constraints
                .iter()
                .filter(|c| c.is_foreign_key())
                .chain(diff.added_tables.iter().flat_map(Table::foreign_keys))
                .collect(),
        };
        let removed_tables: BTreeSet<&str> =
            diff.removed_tables.iter().map(|t| t.name.as_str()).collect();

        for fk in foreign_keys {
            let ConstraintKind::ForeignKey {
                referenced_table,
                referenced_columns,
                ..
            } = &fk.kind
            else {
                continue;
            };

            if removed_tables.contains(referenced_table.as_str()) {
                errors.push(DependencyError {
                    kind: DependencyErrorKind::ReferencesRemovedTable,
                    table: fk.table_name.clone(),
                    column: None,
                    constraint: Some(fk.name.clone()),
                    referenced_table: Some(referenced_table.clone()),
                    message: format!(
                        "foreign key '{}' on table '{}' references removed table '{}'",
                        fk.name, fk.table_name, referenced_table
                    ),
                });
                continue;
            }

            let Some(target) = diff.table_diff(referenced_table) else {
                continue;
            };
            for column in referenced_columns {
                if target.removes_column(column) {
                    errors.push(DependencyError {
                        kind: DependencyErrorKind::ReferencesRemovedColumn,
                        table: fk.table_name.clone(),
                        column: Some(column.clone()),
                        constraint: Some(fk.name.clone()),
                        referenced_table: Some(referenced_table.clone()),
                        message: format!(
                            "foreign key '{}' on table '{}' references column '{}' removed from table '{}'",
                            fk.name, fk.table_name, column, referenced_table
                        ),
                    });
                }
            }
        }
    }
}

fn check_table(table: &TableDiff, warnings: &mut Vec<Warning>) {
    let name = &table.table_name;

    for column in &table.removed_columns {
        warnings.push(
            Warning::new(
                Severity::High,
                WarningCategory::DataLoss,
                name,
                format!("column '{name}.{}' will be dropped with all its data", column.name),
            )
            .on_column(&column.name),
        );
    }

    for change in &table.modified_columns {
        check_column_change(name, change, warnings);
    }

    for column in &table.added_columns {
        if needs_default(column) {
            warnings.push(
                Warning::new(
                    Severity::Medium,
                    WarningCategory::Compatibility,
                    name,
                    format!(
                        "column '{name}.{}' is NOT NULL without default; adding it fails if the table has rows",
                        column.name
                    ),
                )
                .on_column(&column.name),
            );
        }
    }
}

fn needs_default(column: &Column) -> bool {
    !column.nullable && column.default.is_none() && !column.is_auto_increment()
}

fn check_column_change(table: &str, change: &ColumnDiff, warnings: &mut Vec<Warning>) {
    let (old, new) = (&change.old, &change.new);
    let warn = |severity, category, message: String| {
        Warning::new(severity, category, table, message).on_column(&change.name)
    };

    if change.type_changed() {
        let shrunk = old.base_type() == new.base_type()
            && shrinks(&old.type_size(), &new.type_size());
        let grown = !shrunk && differs_only_in_size(&old.data_type, &new.data_type);
        if !grown && !is_safe_widening(&old.data_type, &new.data_type) {
            warnings.push(warn(
                Severity::High,
                WarningCategory::DataLoss,
                format!(
                    "column '{table}.{}' changes type from {} to {}; existing values may be lost",
                    change.name, old.data_type, new.data_type
                ),
            ));
        }
        if shrunk {
            warnings.push(warn(
                Severity::Medium,
                WarningCategory::DataLoss,
                format!(
                    "column '{table}.{}' shrinks from {} to {}; values may be truncated",
                    change.name, old.data_type, new.data_type
                ),
            ));
        }
    }

    if old.nullable && !new.nullable {
        warnings.push(warn(
            Severity::Medium,
            WarningCategory::DataLoss,
            format!(
                "column '{table}.{}' becomes NOT NULL; existing NULL values must be fixed first",
                change.name
            ),
        ));
    } else if !old.nullable && new.nullable {
        warnings.push(warn(
            Severity::Low,
            WarningCategory::Compatibility,
            format!(
                "column '{table}.{}' becomes nullable; readers may not expect NULL",
                change.name
            ),
        ));
    }

    if old.default.is_some() && new.default.is_none() {
        warnings.push(warn(
            Severity::Low,
            WarningCategory::Compatibility,
            format!(
                "column '{table}.{}' loses its default value",
                change.name
            ),
        ));
    }
}

/// Returns true if any size parameter gets smaller.
fn shrinks(old: &[u32], new: &[u32]) -> bool {
    old.iter().zip(new).any(|(old, new)| new < old)
}

/// Returns true if two data types differ at most in their numeric size
/// parameters. `int` vs `int unsigned` and two `enum` member lists do not
/// qualify.
fn differs_only_in_size(old: &str, new: &str) -> bool {
    has_numeric_params(old)
        && has_numeric_params(new)
        && without_params(old) == without_params(new)
}

fn has_numeric_params(data_type: &str) -> bool {
    !data_type.contains('(') || !type_size(data_type).is_empty()
}

/// Lower-cased type words with the parameter list removed:
/// `"INT(10)  Unsigned"` gives `"int unsigned"`.
fn without_params(data_type: &str) -> String {
    let words = match (data_type.find('('), data_type.find(')')) {
        (Some(open), Some(close)) if open < close => {
            format!("{} {}", &data_type[..open], &data_type[close + 1..])
        }
        _ => data_type.to_string(),
    };
    words
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_indexes(diff: &SchemaDiff, warnings: &mut Vec<Warning>) {
    for index in diff.removed_indexes.iter().filter(|i| !i.primary) {
        let warning = if index.unique {
            Warning::new(
                Severity::Medium,
                WarningCategory::Compatibility,
                &index.table_name,
                format!(
                    "unique index '{}' on table '{}' is dropped; duplicates will be accepted",
                    index.name, index.table_name
                ),
            )
        } else {
            Warning::new(
                Severity::Low,
                WarningCategory::Performance,
                &index.table_name,
                format!(
                    "index '{}' on table '{}' is dropped; queries using it may slow down",
                    index.name, index.table_name
                ),
            )
        };
        warnings.push(warning);
    }
}

fn check_constraints(diff: &SchemaDiff, warnings: &mut Vec<Warning>) {
    for constraint in diff.removed_constraints.iter().filter(|c| c.is_unique()) {
        warnings.push(Warning::new(
            Severity::Medium,
            WarningCategory::Compatibility,
            &constraint.table_name,
            format!(
                "unique constraint '{}' on table '{}' is dropped; duplicates will be accepted",
                constraint.name, constraint.table_name
            ),
        ));
    }
    for constraint in &diff.added_constraints {
        let message = match &constraint.kind {
            ConstraintKind::Unique { .. } => format!(
                "unique constraint '{}' on table '{}' fails if existing rows hold duplicates",
                constraint.name, constraint.table_name
            ),
            ConstraintKind::ForeignKey {
                referenced_table, ..
            } => format!(
                "foreign key '{}' on table '{}' fails if existing rows have no match in '{}'",
                constraint.name, constraint.table_name, referenced_table
            ),
            ConstraintKind::Check { .. } => continue,
        };
        warnings.push(Warning::new(
            Severity::Medium,
            WarningCategory::Compatibility,
            &constraint.table_name,
            message,
        ));
    }
}

fn check_primary_keys(diff: &SchemaDiff, errors: &mut Vec<DependencyError>) {
    for index in diff.removed_indexes.iter().filter(|i| i.primary) {
        let replaced = diff
            .added_indexes
            .iter()
            .any(|i| i.primary && i.table_name == index.table_name);
        if !replaced {
            errors.push(DependencyError {
                kind: DependencyErrorKind::MissingPrimaryKey,
                table: index.table_name.clone(),
                column: None,
                constraint: Some(index.name.clone()),
                referenced_table: None,
                message: format!(
                    "table '{}' loses its primary key without a replacement",
                    index.table_name
                ),
            });
        }
    }
}

/// Removed columns that an added index or constraint of the same table
/// still uses.
fn check_removed_columns(diff: &SchemaDiff, errors: &mut Vec<DependencyError>) {
    for table in &diff.modified_tables {
        for column in &table.removed_columns {
            let indexes = diff
                .added_indexes
                .iter()
                .filter(|i| i.table_name == table.table_name && i.columns.contains(&column.name))
                .map(|i| ("index", i.name.as_str()));
            let constraints = table
                .added_constraints
                .iter()
                .filter(|c| c.columns().contains(&column.name))
                .map(|c| ("constraint", c.name.as_str()));

            for (entity, name) in indexes.chain(constraints) {
                errors.push(DependencyError {
                    kind: DependencyErrorKind::ReferencesRemovedColumn,
                    table: table.table_name.clone(),
                    column: Some(column.name.clone()),
                    constraint: Some(name.to_string()),
                    referenced_table: None,
                    message: format!(
                        "{entity} '{name}' on table '{}' uses removed column '{}'",
                        table.table_name, column.name
                    ),
                });
            }
        }
    }
}
