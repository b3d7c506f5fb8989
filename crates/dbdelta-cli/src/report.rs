//! Human-readable comparison report.

use std::cmp::Reverse;
use std::fmt;

use dbdelta_core::{Comparison, TableDiff};

/// Renders a [`Comparison`] as plain text.
///
/// Sections: changes, suggested renames, warnings (most severe first),
/// dependency errors, and the SQL when it was generated.
pub struct TextReport<'a> {
    comparison: &'a Comparison,
}

impl<'a> TextReport<'a> {
    pub const fn new(comparison: &'a Comparison) -> Self {
        Self { comparison }
    }

    fn write_changes(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diff = &self.comparison.diff;
        writeln!(f, "Changes ({}):", diff.change_count())?;

        for table in &diff.added_tables {
            writeln!(f, "  + table {}", table.name)?;
        }
        for table in &diff.removed_tables {
            writeln!(f, "  - table {}", table.name)?;
        }
        for table in &diff.modified_tables {
            write_table_diff(f, table)?;
        }
        for index in &diff.added_indexes {
            writeln!(f, "  + index {} on {}", index.name, index.table_name)?;
        }
        for index in &diff.removed_indexes {
            writeln!(f, "  - index {} on {}", index.name, index.table_name)?;
        }
        for constraint in &diff.added_constraints {
            writeln!(
                f,
                "  + constraint {} on {}",
                constraint.name, constraint.table_name
            )?;
        }
        for constraint in &diff.removed_constraints {
            writeln!(
                f,
                "  - constraint {} on {}",
                constraint.name, constraint.table_name
            )?;
        }
        Ok(())
    }

    fn write_validation(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let validation = &self.comparison.validation;

        if !validation.warnings.is_empty() {
            let mut warnings: Vec<_> = validation.warnings.iter().collect();
            warnings.sort_by_key(|w| Reverse(w.severity));

            writeln!(f)?;
            writeln!(f, "Warnings ({}):", warnings.len())?;
            for warning in warnings {
                writeln!(
                    f,
                    "  [{}] {}: {}",
                    warning.severity, warning.category, warning.message
                )?;
            }
        }

        if !validation.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "Errors ({}):", validation.errors.len())?;
            for error in &validation.errors {
                writeln!(f, "  {error}")?;
            }
        }
        Ok(())
    }
}

fn write_table_diff(f: &mut fmt::Formatter<'_>, table: &TableDiff) -> fmt::Result {
    writeln!(f, "  ~ table {}", table.table_name)?;
    for column in &table.added_columns {
        writeln!(f, "      + column {} {}", column.name, column.data_type)?;
    }
    for column in &table.removed_columns {
        writeln!(f, "      - column {}", column.name)?;
    }
    for change in &table.modified_columns {
        if change.type_changed() {
            writeln!(
                f,
                "      ~ column {}: {} -> {}",
                change.name, change.old.data_type, change.new.data_type
            )?;
        } else {
            writeln!(f, "      ~ column {}", change.name)?;
        }
    }
    for constraint in &table.added_constraints {
        writeln!(f, "      + constraint {}", constraint.name)?;
    }
    for constraint in &table.removed_constraints {
        writeln!(f, "      - constraint {}", constraint.name)?;
    }
    Ok(())
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let comparison = self.comparison;

        if !comparison.has_changes() {
            return writeln!(f, "Schemas are identical.");
        }

        self.write_changes(f)?;

        if !comparison.renames.is_empty() {
            writeln!(f)?;
            writeln!(f, "Suggested renames:")?;
            for (from, to) in &comparison.renames {
                writeln!(f, "  {from} -> {to}")?;
            }
        }

        self.write_validation(f)?;

        writeln!(f)?;
        if comparison.is_valid() {
            writeln!(f, "SQL:")?;
            for statement in &comparison.statements {
                writeln!(f, "{statement};")?;
            }
        } else {
            writeln!(f, "SQL generation blocked.")?;
        }
        Ok(())
    }
}
