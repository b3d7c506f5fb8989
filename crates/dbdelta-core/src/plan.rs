//! Statement planning.
//!
//! Turns a [`SchemaDiff`] into an ordered list of DDL statements. The
//! order keeps every intermediate state valid for MySQL:
//!
//! 1. drop removed constraints, foreign keys first
//! 2. drop removed indexes
//! 3. rename tables
//! 4. create added tables
//! 5. add columns
//! 6. modify columns
//! 7. create added indexes, including secondary indexes of new tables
//! 8. add constraints, foreign keys last, including those of new tables
//! 9. drop removed columns
//! 10. drop removed tables, referencing tables first
//!
//! A rename pair replaces the DROP + CREATE of its two tables by a
//! `RENAME TABLE` plus whatever structural changes remain between them.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::dialect::MigrationDialect;
use crate::diff::{SchemaDiff, TableDiff, compare_tables};
use crate::error::SchemaError;
use crate::schema::{Column, Constraint, Index, Table};

/// Generates the ordered DDL for a diff.
///
/// `renames` maps removed table names to added table names, as returned
/// by [`crate::rename::RenameDetector`]. Pairs that do not name a removed
/// and an added table of `diff` are ignored.
///
/// # Errors
///
/// Returns the first [`SchemaError`] raised while rendering an entity.
pub fn plan_statements<D>(
    diff: &SchemaDiff,
    renames: &BTreeMap<String, String>,
    dialect: &D,
) -> Result<Vec<String>, SchemaError>
where
    D: MigrationDialect + ?Sized,
{
    let plan = Plan::new(diff, renames);
    let statements = plan.render(dialect)?;
    debug!(
        dialect = dialect.name(),
        statements = statements.len(),
        renames = plan.renames.len(),
        "Planned migration statements"
    );
    Ok(statements)
}

/// Every change of a diff, with rename pairs folded in.
#[derive(Debug, Default)]
struct Plan<'a> {
    removed_constraints: Vec<Constraint>,
    removed_indexes: Vec<Index>,
    renames: Vec<(&'a str, &'a str)>,
    created_tables: Vec<&'a Table>,
    table_diffs: Vec<TableDiff>,
    added_indexes: Vec<Index>,
    added_constraints: Vec<Constraint>,
    dropped_tables: Vec<&'a Table>,
}

impl<'a> Plan<'a> {
    fn new(diff: &'a SchemaDiff, renames: &'a BTreeMap<String, String>) -> Self {
        let mut plan = Self {
            removed_constraints: diff.removed_constraints.clone(),
            removed_indexes: diff.removed_indexes.clone(),
            table_diffs: diff.modified_tables.clone(),
            added_indexes: diff.added_indexes.clone(),
            added_constraints: diff.added_constraints.clone(),
            ..Self::default()
        };

        let mut renamed_from = BTreeSet::new();
        let mut renamed_to = BTreeSet::new();
        for (from, to) in renames {
            let (Some(old), Some(new)) = (diff.removed_table(from), diff.added_table(to)) else {
                debug!(from = %from, to = %to, "Ignoring rename of unknown tables");
                continue;
            };
            if renamed_to.contains(to.as_str()) {
                continue;
            }
            plan.add_rename(old, new);
            renamed_from.insert(from.as_str());
            renamed_to.insert(to.as_str());
        }

        for table in &diff.added_tables {
            if renamed_to.contains(table.name.as_str()) {
                continue;
            }
            plan.created_tables.push(table);
            let indexes = table.indexes.iter().filter(|i| {
                !i.primary && !backs_unique_constraint(i, table.constraints.values())
            });
            plan.added_indexes.extend(indexes.cloned());
            plan.added_constraints
                .extend(table.constraints.values().filter(|c| !c.is_unique()).cloned());
        }

        plan.dropped_tables = diff
            .removed_tables
            .iter()
            .filter(|t| !renamed_from.contains(t.name.as_str()))
            .collect();

        // The constraint statements already create and drop these keys.
        plan.added_indexes
            .retain(|i| !backs_unique_constraint(i, plan.added_constraints.iter()));
        plan.removed_indexes
            .retain(|i| !backs_unique_constraint(i, plan.removed_constraints.iter()));

        plan
    }

    /// Folds a rename pair in. Removals run before the rename and use the
    /// old name; everything else uses the new one.
    fn add_rename(&mut self, old: &'a Table, new: &'a Table) {
        self.renames.push((old.name.as_str(), new.name.as_str()));

        let before = compare_tables(&new.renamed(&old.name), old);
        self.removed_constraints
            .extend(before.diff.removed_constraints);
        self.removed_indexes.extend(before.removed_indexes);

        let after = compare_tables(new, &old.renamed(&new.name));
        self.added_indexes.extend(after.added_indexes);
        self.added_constraints
            .extend(after.diff.added_constraints.iter().cloned());
        let mut table_diff = after.diff;
        table_diff.added_constraints.clear();
        table_diff.removed_constraints.clear();
        if !table_diff.is_empty() {
            self.table_diffs.push(table_diff);
        }
    }

    fn render<D>(&self, dialect: &D) -> Result<Vec<String>, SchemaError>
    where
        D: MigrationDialect + ?Sized,
    {
        let mut out = Vec::new();

        let (foreign_keys, others): (Vec<&Constraint>, Vec<&Constraint>) = self
            .removed_constraints
            .iter()
            .partition(|c| c.is_foreign_key());
        for constraint in foreign_keys.into_iter().chain(others) {
            out.push(dialect.drop_constraint(constraint)?);
        }

        for index in &self.removed_indexes {
            out.push(dialect.drop_index(index)?);
        }

        for (from, to) in &self.renames {
            out.push(dialect.rename_table(from, to)?);
        }

        for table in &self.created_tables {
            out.push(dialect.create_table(table)?);
        }

        for table in &self.table_diffs {
            for column in by_position(&table.added_columns) {
                out.push(dialect.add_column(&table.table_name, column)?);
            }
        }

        for table in &self.table_diffs {
            for change in &table.modified_columns {
                out.push(dialect.modify_column(&table.table_name, change)?);
            }
        }

        for index in &self.added_indexes {
            out.push(dialect.create_index(index)?);
        }

        let (foreign_keys, others): (Vec<&Constraint>, Vec<&Constraint>) = self
            .added_constraints
            .iter()
            .partition(|c| c.is_foreign_key());
        for constraint in others.into_iter().chain(foreign_keys) {
            out.push(dialect.add_constraint(constraint)?);
        }

        for table in &self.table_diffs {
            for column in &table.removed_columns {
                out.push(dialect.drop_column(&table.table_name, column)?);
            }
        }

        drop_tables(&self.dropped_tables, dialect, &mut out)?;

        Ok(out)
    }
}

fn by_position(columns: &[Column]) -> Vec<&Column> {
    let mut columns: Vec<&Column> = columns.iter().collect();
    columns.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
    columns
}

/// Returns true if `index` is the key of one of the unique `constraints`:
/// same table, name and columns. MySQL catalogs report such a key twice.
fn backs_unique_constraint<'c>(
    index: &Index,
    mut constraints: impl Iterator<Item = &'c Constraint>,
) -> bool {
    index.unique
        && !index.primary
        && constraints.any(|c| {
            c.is_unique()
                && c.table_name == index.table_name
                && c.name == index.name
                && c.columns() == index.columns.as_slice()
        })
}

/// Returns true if `table` has a foreign key to `other`.
fn references(table: &Table, other: &str) -> bool {
    table
        .foreign_keys()
        .any(|fk| fk.referenced_table() == Some(other))
}

/// Drops tables so that a table goes before the tables it references.
/// On a reference cycle the foreign keys between the remaining tables
/// are dropped first.
fn drop_tables<D>(tables: &[&Table], dialect: &D, out: &mut Vec<String>) -> Result<(), SchemaError>
where
    D: MigrationDialect + ?Sized,
{
    let mut remaining: Vec<&Table> = tables.to_vec();
    remaining.sort_by(|a, b| a.name.cmp(&b.name));

    while !remaining.is_empty() {
        let next = remaining.iter().position(|table| {
            !remaining
                .iter()
                .any(|other| other.name != table.name && references(other, &table.name))
        });

        if let Some(i) = next {
            let table = remaining.remove(i);
            out.push(dialect.drop_table(table)?);
            continue;
        }

        debug!(tables = remaining.len(), "Breaking foreign key cycle between dropped tables");
        for table in &remaining {
            for fk in table.foreign_keys() {
                let cyclic = fk.referenced_table().is_some_and(|target| {
                    target != table.name && remaining.iter().any(|t| t.name == target)
                });
                if cyclic {
                    out.push(dialect.drop_constraint(fk)?);
                }
            }
        }
        for table in remaining.drain(..) {
            out.push(dialect.drop_table(table)?);
        }
    }
    Ok(())
}
