//! Structural schema diff.
//!
//! Compares a `source` schema (the desired end state) against a `target`
//! schema (the current state). Entities present only in the source are
//! *added*, entities present only in the target are *removed*. Tables,
//! columns, indexes and constraints are matched by name.
//!
//! An index or constraint whose name exists on both sides but whose
//! structure changed is reported as a remove of the old definition plus an
//! add of the new one; there is no "modified index" category.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::{Column, Constraint, Index, Schema, Table};

/// A column present on both sides with a different definition.
///
/// `old` is the target (current) column and `new` the source (desired)
/// column, so transitions read old to new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// Column name.
    pub name: String,
    /// Definition in the target schema.
    pub old: Column,
    /// Definition in the source schema.
    pub new: Column,
}

impl ColumnDiff {
    /// Returns true if the data type changed.
    #[must_use]
    pub fn type_changed(&self) -> bool {
        !self
            .old
            .data_type
            .trim()
            .eq_ignore_ascii_case(self.new.data_type.trim())
    }
}

/// Differences within a table present in both schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    /// Table name.
    pub table_name: String,
    /// Columns only in the source table.
    pub added_columns: Vec<Column>,
    /// Columns only in the target table.
    pub removed_columns: Vec<Column>,
    /// Columns in both tables with different definitions.
    pub modified_columns: Vec<ColumnDiff>,
    /// Constraints to add, including new definitions of changed ones.
    pub added_constraints: Vec<Constraint>,
    /// Constraints to remove, including old definitions of changed ones.
    pub removed_constraints: Vec<Constraint>,
}

impl TableDiff {
    /// Creates an empty diff for a table.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Returns true if nothing differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.removed_columns.is_empty()
            && self.modified_columns.is_empty()
            && self.added_constraints.is_empty()
            && self.removed_constraints.is_empty()
    }

    /// Returns true if the named column is removed by this diff.
    #[must_use]
    pub fn removes_column(&self, name: &str) -> bool {
        self.removed_columns.iter().any(|c| c.name == name)
    }
}

/// Result of comparing two schemas.
///
/// Built fresh for each comparison and not modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Tables only in the source schema.
    pub added_tables: Vec<Table>,
    /// Tables only in the target schema.
    pub removed_tables: Vec<Table>,
    /// Tables in both schemas with at least one column or constraint
    /// difference.
    pub modified_tables: Vec<TableDiff>,
    /// Indexes to create: schema-level plus table-level of common tables.
    pub added_indexes: Vec<Index>,
    /// Indexes to drop: schema-level plus table-level of common tables.
    pub removed_indexes: Vec<Index>,
    /// Constraints to add, flattened from every table diff.
    pub added_constraints: Vec<Constraint>,
    /// Constraints to remove, flattened from every table diff.
    pub removed_constraints: Vec<Constraint>,
}

impl SchemaDiff {
    /// Returns true if the schemas are structurally identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_tables.is_empty()
            && self.removed_tables.is_empty()
            && self.modified_tables.is_empty()
            && self.added_indexes.is_empty()
            && self.removed_indexes.is_empty()
            && self.added_constraints.is_empty()
            && self.removed_constraints.is_empty()
    }

    /// Gets an added table by name.
    #[must_use]
    pub fn added_table(&self, name: &str) -> Option<&Table> {
        self.added_tables.iter().find(|t| t.name == name)
    }

    /// Gets a removed table by name.
    #[must_use]
    pub fn removed_table(&self, name: &str) -> Option<&Table> {
        self.removed_tables.iter().find(|t| t.name == name)
    }

    /// Gets the diff of a modified table by name.
    #[must_use]
    pub fn table_diff(&self, name: &str) -> Option<&TableDiff> {
        self.modified_tables.iter().find(|t| t.table_name == name)
    }

    /// Total number of individual changes, for reporting.
    #[must_use]
    pub fn change_count(&self) -> usize {
        let column_changes: usize = self
            .modified_tables
            .iter()
            .map(|t| t.added_columns.len() + t.removed_columns.len() + t.modified_columns.len())
            .sum();
        self.added_tables.len()
            + self.removed_tables.len()
            + column_changes
            + self.added_indexes.len()
            + self.removed_indexes.len()
            + self.added_constraints.len()
            + self.removed_constraints.len()
    }
}

/// Outcome of comparing one pair of tables: the table diff plus the index
/// changes, which the schema diff keeps in flattened lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TableComparison {
    pub(crate) diff: TableDiff,
    pub(crate) added_indexes: Vec<Index>,
    pub(crate) removed_indexes: Vec<Index>,
}

/// Compares two schemas after validating both.
///
/// Fails on the first structural violation in either schema; no partial
/// diff is produced.
pub fn diff_schemas(source: &Schema, target: &Schema) -> Result<SchemaDiff, SchemaError> {
    source.validate()?;
    target.validate()?;
    Ok(diff_validated(source, target))
}

/// Compares two tables with the same name after validating both.
///
/// Index changes are not part of a [`TableDiff`]; use [`diff_schemas`] to
/// get them.
pub fn diff_table(source: &Table, target: &Table) -> Result<TableDiff, SchemaError> {
    source.validate()?;
    target.validate()?;
    Ok(compare_tables(source, target).diff)
}

/// Compares two validated schemas.
pub(crate) fn diff_validated(source: &Schema, target: &Schema) -> SchemaDiff {
    let mut diff = SchemaDiff::default();

    for (name, table) in &source.tables {
        if !target.tables.contains_key(name) {
            diff.added_tables.push(table.clone());
        }
    }
    for (name, table) in &target.tables {
        if !source.tables.contains_key(name) {
            diff.removed_tables.push(table.clone());
        }
    }

    let (added, removed) = diff_indexes(
        source.indexes.values().collect(),
        target.indexes.values().collect(),
    );
    diff.added_indexes.extend(added);
    diff.removed_indexes.extend(removed);

    for (name, new_table) in &source.tables {
        let Some(old_table) = target.tables.get(name) else {
            continue;
        };
        let comparison = compare_tables(new_table, old_table);
        debug!(
            table = %name,
            added_columns = comparison.diff.added_columns.len(),
            removed_columns = comparison.diff.removed_columns.len(),
            modified_columns = comparison.diff.modified_columns.len(),
            "Compared table"
        );
        diff.added_indexes.extend(comparison.added_indexes);
        diff.removed_indexes.extend(comparison.removed_indexes);
        if !comparison.diff.is_empty() {
            diff.added_constraints
                .extend(comparison.diff.added_constraints.iter().cloned());
            diff.removed_constraints
                .extend(comparison.diff.removed_constraints.iter().cloned());
            diff.modified_tables.push(comparison.diff);
        }
    }

    debug!(
        added_tables = diff.added_tables.len(),
        removed_tables = diff.removed_tables.len(),
        modified_tables = diff.modified_tables.len(),
        added_indexes = diff.added_indexes.len(),
        removed_indexes = diff.removed_indexes.len(),
        "Schema diff computed"
    );
    diff
}

/// Compares a source table against a target table of the same name.
pub(crate) fn compare_tables(new: &Table, old: &Table) -> TableComparison {
    let mut diff = TableDiff::new(&new.name);

    for (name, column) in &new.columns {
        match old.columns.get(name) {
            None => diff.added_columns.push(column.clone()),
            Some(old_column) if !old_column.same_definition(column) => {
                diff.modified_columns.push(ColumnDiff {
                    name: name.clone(),
                    old: old_column.clone(),
                    new: column.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for (name, column) in &old.columns {
        if !new.columns.contains_key(name) {
            diff.removed_columns.push(column.clone());
        }
    }

    let (added, removed) = diff_constraints(&new.constraints, &old.constraints);
    diff.added_constraints = added;
    diff.removed_constraints = removed;

    let (added_indexes, removed_indexes) =
        diff_indexes(new.indexes.iter().collect(), old.indexes.iter().collect());

    TableComparison {
        diff,
        added_indexes,
        removed_indexes,
    }
}

/// Diffs two index lists by name. Returns `(added, removed)`, each sorted
/// by name.
fn diff_indexes(new: Vec<&Index>, old: Vec<&Index>) -> (Vec<Index>, Vec<Index>) {
    let new: BTreeMap<&str, &Index> = new.into_iter().map(|i| (i.name.as_str(), i)).collect();
    let old: BTreeMap<&str, &Index> = old.into_iter().map(|i| (i.name.as_str(), i)).collect();
    diff_named(&new, &old)
}

/// Diffs two constraint maps by name. Returns `(added, removed)`.
fn diff_constraints(
    new: &BTreeMap<String, Constraint>,
    old: &BTreeMap<String, Constraint>,
) -> (Vec<Constraint>, Vec<Constraint>) {
    let new: BTreeMap<&str, &Constraint> = new.iter().map(|(k, v)| (k.as_str(), v)).collect();
    let old: BTreeMap<&str, &Constraint> = old.iter().map(|(k, v)| (k.as_str(), v)).collect();
    diff_named(&new, &old)
}

/// Diffs two name-keyed collections. Same-name entries that differ show
/// up in both lists.
fn diff_named<V>(new: &BTreeMap<&str, &V>, old: &BTreeMap<&str, &V>) -> (Vec<V>, Vec<V>)
where
    V: Clone + PartialEq,
{
    let names: BTreeSet<&str> = new.keys().chain(old.keys()).copied().collect();
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for name in names {
        match (new.get(name), old.get(name)) {
            (Some(&n), None) => added.push(n.clone()),
            (None, Some(&o)) => removed.push(o.clone()),
            (Some(&n), Some(&o)) if n != o => {
                removed.push(o.clone());
                added.push(n.clone());
            }
            _ => {}
        }
    }
    (added, removed)
}
