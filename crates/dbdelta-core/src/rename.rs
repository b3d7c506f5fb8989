//! Table rename detection.
//!
//! A table that disappears from one name and appears under another shows
//! up in a [`SchemaDiff`] as one removed and one added table. This module
//! pairs such tables up by column similarity so a caller can emit a
//! `RENAME TABLE` instead of a DROP + CREATE. The diff itself is never
//! rewritten.

use std::collections::BTreeMap;

use tracing::debug;

use crate::diff::SchemaDiff;
use crate::schema::Table;

/// A pair must score strictly above this to count as a rename.
pub const RENAME_THRESHOLD: f64 = 0.8;

/// Column similarity of two tables in `[0.0, 1.0]`.
///
/// Counts columns present in both tables with the same definition and
/// divides by the larger column count. Two tables without columns are
/// identical (1.0); a table compared against an empty one scores 0.0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn table_similarity(a: &Table, b: &Table) -> f64 {
    let max = a.columns.len().max(b.columns.len());
    if max == 0 {
        return 1.0;
    }
    let matching = a
        .columns
        .values()
        .filter(|column| {
            b.columns
                .get(&column.name)
                .is_some_and(|other| column.same_definition(other))
        })
        .count();
    matching as f64 / max as f64
}

/// Pairs added tables with removed tables by column similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenameDetector {
    threshold: f64,
}

impl Default for RenameDetector {
    fn default() -> Self {
        Self {
            threshold: RENAME_THRESHOLD,
        }
    }
}

impl RenameDetector {
    /// Creates a detector using [`RENAME_THRESHOLD`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the similarity a pair must exceed.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Suggests `removed name -> added name` pairs for a diff.
    ///
    /// Added tables are visited in name order. Each one is matched against
    /// the removed tables not matched yet; the best candidate is accepted
    /// if it scores above the threshold and no other candidate ties with
    /// it. A matched removed table is not offered again.
    #[must_use]
    pub fn detect(&self, diff: &SchemaDiff) -> BTreeMap<String, String> {
        self.detect_tables(&diff.added_tables, &diff.removed_tables)
    }

    /// Same as [`RenameDetector::detect`], on explicit table sets.
    #[must_use]
    pub fn detect_tables(&self, added: &[Table], removed: &[Table]) -> BTreeMap<String, String> {
        let mut added: Vec<&Table> = added.iter().collect();
        added.sort_by(|a, b| a.name.cmp(&b.name));
        let mut candidates: Vec<&Table> = removed.iter().collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        let mut renames = BTreeMap::new();
        for table in added {
            let mut best: Option<(usize, f64)> = None;
            let mut tied = false;
            for (i, candidate) in candidates.iter().enumerate() {
                let score = table_similarity(table, candidate);
                match best {
                    Some((_, top)) if (score - top).abs() < f64::EPSILON => tied = true,
                    Some((_, top)) if score < top => {}
                    _ => {
                        best = Some((i, score));
                        tied = false;
                    }
                }
            }

            let Some((i, score)) = best else {
                continue;
            };
            if tied || score <= self.threshold {
                continue;
            }
            let matched = candidates.remove(i);
            debug!(
                from = %matched.name,
                to = %table.name,
                similarity = score,
                "Possible table rename"
            );
            renames.insert(matched.name.clone(), table.name.clone());
        }
        renames
    }
}

/// Shorthand for `RenameDetector::new().detect(diff)`.
#[must_use]
pub fn detect_renames(diff: &SchemaDiff) -> BTreeMap<String, String> {
    RenameDetector::new().detect(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn table(name: &str, columns: &[&str]) -> Table {
        columns.iter().fold(Table::new(name), |t, c| {
            t.column(Column::new(*c, "int").not_null())
        })
    }

    #[test]
    fn test_similarity_bounds() {
        assert!((table_similarity(&Table::new("a"), &Table::new("b")) - 1.0).abs() < f64::EPSILON);
        assert!(table_similarity(&table("a", &["id"]), &Table::new("b")).abs() < f64::EPSILON);
        assert!(
            (table_similarity(&table("a", &["id", "x"]), &table("b", &["x", "id"])) - 1.0).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_similarity_requires_same_definition() {
        let a = table("a", &["id", "name"]);
        let b = Table::new("b")
            .column(Column::new("id", "int").not_null())
            .column(Column::new("name", "bigint").not_null());
        assert!((table_similarity(&a, &b) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_full_match_is_rename() {
        let renames = RenameDetector::new().detect_tables(
            &[table("accounts", &["a", "b", "c", "d"])],
            &[table("users", &["a", "b", "c", "d"])],
        );
        assert_eq!(renames.get("users").map(String::as_str), Some("accounts"));
    }

    #[test]
    fn test_threshold_is_strict() {
        // 4 of 5 columns shared: exactly 0.8, not enough.
        let renames = RenameDetector::new().detect_tables(
            &[table("accounts", &["a", "b", "c", "d", "e"])],
            &[table("users", &["a", "b", "c", "d"])],
        );
        assert!(renames.is_empty());
    }

    #[test]
    fn test_tied_candidates_are_not_matched() {
        let renames = RenameDetector::new().detect_tables(
            &[table("accounts", &["a", "b"])],
            &[table("users", &["a", "b"]), table("people", &["a", "b"])],
        );
        assert!(renames.is_empty());
    }

    #[test]
    fn test_best_candidate_wins() {
        let renames = RenameDetector::new().detect_tables(
            &[table("accounts", &["a", "b", "c", "d", "e", "f"])],
            &[
                table("near", &["a", "b", "c", "d", "e"]),
                table("exact", &["a", "b", "c", "d", "e", "f"]),
            ],
        );
        assert_eq!(renames.len(), 1);
        assert_eq!(renames.get("exact").map(String::as_str), Some("accounts"));
    }

    #[test]
    fn test_custom_threshold() {
        let renames = RenameDetector::new().with_threshold(0.7).detect_tables(
            &[table("accounts", &["a", "b", "c", "d", "e"])],
            &[table("users", &["a", "b", "c", "d"])],
        );
        assert_eq!(renames.get("users").map(String::as_str), Some("accounts"));
    }

    #[test]
    fn test_detect_reads_diff_tables() {
        let diff = SchemaDiff {
            added_tables: vec![table("accounts", &["id", "email"])],
            removed_tables: vec![table("users", &["id", "email"])],
            ..SchemaDiff::default()
        };
        let renames = detect_renames(&diff);
        assert_eq!(renames.len(), 1);
        assert_eq!(renames["users"], "accounts");
    }

    #[test]
    fn test_matched_table_is_withdrawn() {
        // Both added tables match "users" perfectly; only the first in name
        // order gets it.
        let renames = RenameDetector::new().detect_tables(
            &[table("members", &["a", "b"]), table("accounts", &["a", "b"])],
            &[table("users", &["a", "b"])],
        );
        assert_eq!(renames.len(), 1);
        assert_eq!(renames.get("users").map(String::as_str), Some("accounts"));
    }
}
