//! The comparison pipeline: validate, diff, detect renames, assess risk,
//! plan SQL.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dialect::{MigrationDialect, MySqlDialect};
use crate::diff::{SchemaDiff, diff_validated};
use crate::error::{Error, Result, Side};
use crate::plan::plan_statements;
use crate::rename::{RENAME_THRESHOLD, RenameDetector};
use crate::risk::{RiskValidator, ValidationResult};
use crate::schema::Schema;

/// Options for the comparison pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Whether to suggest table renames.
    pub detect_renames: bool,
    /// Whether suggested renames replace DROP + CREATE in the SQL.
    pub apply_renames: bool,
    /// Similarity a rename candidate must exceed (0.0 to 1.0).
    pub rename_threshold: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            detect_renames: true,
            apply_renames: false,
            rename_threshold: RENAME_THRESHOLD,
        }
    }
}

impl CompareOptions {
    /// Creates default options: renames detected but not applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns rename detection off. Also stops renames from being applied.
    #[must_use]
    pub const fn without_rename_detection(mut self) -> Self {
        self.detect_renames = false;
        self
    }

    /// Emits `RENAME TABLE` for detected renames.
    #[must_use]
    pub const fn with_applied_renames(mut self) -> Self {
        self.apply_renames = true;
        self
    }

    /// Sets the rename similarity threshold.
    #[must_use]
    pub const fn with_rename_threshold(mut self, threshold: f64) -> Self {
        self.rename_threshold = threshold;
        self
    }
}

/// Everything a comparison produced.
///
/// The diff, the rename suggestions and the full risk report are always
/// available. Statements are only generated when the risk report has no
/// dependency errors; use [`Comparison::sql`] to get them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub diff: SchemaDiff,
    /// Suggested renames, removed table name to added table name.
    pub renames: BTreeMap<String, String>,
    pub validation: ValidationResult,
    /// Ordered DDL. Empty while dependency errors exist.
    pub statements: Vec<String>,
}

impl Comparison {
    /// Returns true if there are no dependency errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid()
    }

    /// Returns true if the schemas differ.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.diff.is_empty()
    }

    /// Returns the DDL to run, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Blocked`] with every dependency error while the
    /// change set is invalid.
    pub fn sql(&self) -> Result<&[String]> {
        if self.validation.is_valid() {
            Ok(&self.statements)
        } else {
            Err(Error::Blocked {
                errors: self.validation.errors.clone(),
            })
        }
    }
}

/// Compares schema snapshots and generates the DDL between them.
#[derive(Debug, Clone, Default)]
pub struct Comparator<D = MySqlDialect> {
    options: CompareOptions,
    dialect: D,
}

impl Comparator<MySqlDialect> {
    /// Creates a comparator generating MySQL DDL.
    #[must_use]
    pub const fn new(options: CompareOptions) -> Self {
        Self {
            options,
            dialect: MySqlDialect::new(),
        }
    }
}

impl<D: MigrationDialect> Comparator<D> {
    /// Creates a comparator for another dialect.
    #[must_use]
    pub const fn with_dialect(options: CompareOptions, dialect: D) -> Self {
        Self { options, dialect }
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Compares `source` (desired end state) against `target` (current
    /// state).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchema`] if either schema fails validation
    /// (the source is checked first) and [`Error::Sql`] if an entity
    /// cannot be rendered. Dependency errors are not an `Err`: they are
    /// reported in [`Comparison::validation`].
    pub fn compare(&self, source: &Schema, target: &Schema) -> Result<Comparison> {
        info!(
            source = %source.name,
            target = %target.name,
            dialect = self.dialect.name(),
            "Comparing schemas"
        );

        source.validate().map_err(|e| Error::InvalidSchema {
            side: Side::Source,
            source: e,
        })?;
        target.validate().map_err(|e| Error::InvalidSchema {
            side: Side::Target,
            source: e,
        })?;

        let diff = diff_validated(source, target);

        let renames = if self.options.detect_renames {
            RenameDetector::new()
                .with_threshold(self.options.rename_threshold)
                .detect(&diff)
        } else {
            BTreeMap::new()
        };

        let validation = RiskValidator::with_end_state(source).validate(&diff);

        let statements = if validation.is_valid() {
            let none = BTreeMap::new();
            let applied = if self.options.apply_renames {
                &renames
            } else {
                &none
            };
            plan_statements(&diff, applied, &self.dialect).map_err(Error::Sql)?
        } else {
            warn!(
                errors = validation.errors.len(),
                "SQL generation blocked by dependency errors"
            );
            Vec::new()
        };

        info!(
            changes = diff.change_count(),
            renames = renames.len(),
            warnings = validation.warnings.len(),
            errors = validation.errors.len(),
            statements = statements.len(),
            "Comparison finished"
        );

        Ok(Comparison {
            diff,
            renames,
            validation,
            statements,
        })
    }
}

/// Compares two schemas with default options and the MySQL dialect.
///
/// # Errors
///
/// See [`Comparator::compare`].
pub fn compare(source: &Schema, target: &Schema) -> Result<Comparison> {
    Comparator::new(CompareOptions::default()).compare(source, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::schema::{Column, Table};

    fn users(name: &str) -> Table {
        Table::new(name)
            .column(Column::new("id", "int").not_null().auto_increment())
            .column(Column::new("email", "varchar(255)").not_null().position(1))
            .primary_key(["id"])
    }

    #[test]
    fn test_options_default() {
        let options = CompareOptions::default();
        assert!(options.detect_renames);
        assert!(!options.apply_renames);
        assert!((options.rename_threshold - RENAME_THRESHOLD).abs() < f64::EPSILON);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CompareOptions = serde_json::from_str(r#"{"apply_renames": true}"#).unwrap();
        assert!(options.detect_renames);
        assert!(options.apply_renames);
    }

    #[test]
    fn test_invalid_source_reported_first() {
        let bad = Schema::new("app").table(Table::new("empty"));
        let err = compare(&bad, &bad).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSchema {
                side: Side::Source,
                source: SchemaError::NoColumns { .. }
            }
        ));

        let good = Schema::new("app").table(users("users"));
        let err = compare(&good, &bad).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSchema {
                side: Side::Target,
                ..
            }
        ));
    }

    #[test]
    fn test_no_changes() {
        let schema = Schema::new("app").table(users("users"));
        let comparison = compare(&schema, &schema).unwrap();
        assert!(!comparison.has_changes());
        assert!(comparison.is_valid());
        assert!(comparison.sql().unwrap().is_empty());
    }

    #[test]
    fn test_renames_suggested_but_not_applied_by_default() {
        let source = Schema::new("app").table(users("accounts"));
        let target = Schema::new("app").table(users("users"));

        let comparison = compare(&source, &target).unwrap();
        assert_eq!(comparison.renames["users"], "accounts");
        let sql = comparison.sql().unwrap();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("CREATE TABLE `accounts`"));
        assert_eq!(sql[1], "DROP TABLE `users`");
    }

    #[test]
    fn test_applied_rename() {
        let source = Schema::new("app").table(users("accounts"));
        let target = Schema::new("app").table(users("users"));

        let comparator = Comparator::new(CompareOptions::new().with_applied_renames());
        let comparison = comparator.compare(&source, &target).unwrap();
        assert_eq!(
            comparison.sql().unwrap(),
            ["RENAME TABLE `users` TO `accounts`".to_string()]
        );
    }

    #[test]
    fn test_rename_detection_disabled() {
        let source = Schema::new("app").table(users("accounts"));
        let target = Schema::new("app").table(users("users"));

        let options = CompareOptions::new()
            .without_rename_detection()
            .with_applied_renames();
        let comparison = Comparator::new(options).compare(&source, &target).unwrap();
        assert!(comparison.renames.is_empty());
        assert_eq!(comparison.sql().unwrap().len(), 2);
    }

    #[test]
    fn test_blocked_comparison_keeps_report() {
        let source = Schema::new("app").table(
            Table::new("users")
                .column(Column::new("id", "int").not_null())
                .column(Column::new("email", "varchar(255)").not_null().position(1)),
        );
        let target = Schema::new("app").table(users("users"));

        let comparison = compare(&source, &target).unwrap();
        assert!(!comparison.is_valid());
        assert!(comparison.statements.is_empty());
        assert_eq!(comparison.diff.removed_indexes.len(), 1);

        let err = comparison.sql().unwrap_err();
        let Error::Blocked { errors } = &err else {
            panic!("expected Blocked, got {err:?}");
        };
        assert_eq!(errors.len(), 1);
        assert!(err.to_string().contains("1 dependency error(s)"));
    }

    #[test]
    fn test_comparison_serializes() {
        let source = Schema::new("app").table(users("users"));
        let target = Schema::new("app");
        let comparison = compare(&source, &target).unwrap();

        let json = serde_json::to_value(&comparison).unwrap();
        assert_eq!(json["diff"]["added_tables"][0]["name"], "users");
        assert_eq!(json["statements"].as_array().map(Vec::len), Some(1));

        let back: Comparison = serde_json::from_value(json).unwrap();
        assert_eq!(back, comparison);
    }
}
