//! Integration tests for the comparison pipeline.
//!
//! These tests build source and target snapshots, run them through
//! `Comparator::compare()`, and check the diff, the risk report and the
//! generated SQL together.

use std::collections::BTreeSet;

use dbdelta_core::{
    Column, Comparator, CompareOptions, Constraint, DependencyErrorKind, Error, ForeignKeyAction,
    Index, Schema, Severity, Table, WarningCategory, compare, diff_schemas,
};

// =============================================================================
// Fixtures
// =============================================================================

fn users() -> Table {
    Table::new("users")
        .column(Column::new("id", "int").not_null().auto_increment())
        .column(Column::new("email", "varchar(255)").not_null().position(1))
        .column(Column::new("name", "varchar(100)").position(2))
        .primary_key(["id"])
        .index(Index::new("idx_email", "users", ["email"]).unique())
}

fn posts() -> Table {
    Table::new("posts")
        .column(Column::new("id", "int").not_null().auto_increment())
        .column(Column::new("user_id", "int").not_null().position(1))
        .column(Column::new("title", "varchar(200)").not_null().position(2))
        .column(Column::new("body", "text").position(3))
        .primary_key(["id"])
        .index(Index::new("idx_user", "posts", ["user_id"]))
        .constraint(
            Constraint::foreign_key("fk_user", "posts", ["user_id"], "users", ["id"])
                .on_delete(ForeignKeyAction::Cascade),
        )
}

fn blog() -> Schema {
    Schema::new("blog").table(users()).table(posts())
}

fn blog_v2() -> Schema {
    Schema::new("blog")
        .table(
            users()
                .column(Column::new("name", "varchar(50)").position(2))
                .column(Column::new("bio", "text").position(3)),
        )
        .table(
            posts()
                .column(Column::new("title", "varchar(200)").position(2))
                .constraint(Constraint::unique("uq_title", "posts", ["title"])),
        )
        .table(
            Table::new("tags")
                .column(Column::new("id", "int").not_null().auto_increment())
                .column(Column::new("label", "varchar(64)").not_null().position(1))
                .primary_key(["id"]),
        )
}

fn table_names(tables: &[Table]) -> BTreeSet<&str> {
    tables.iter().map(|t| t.name.as_str()).collect()
}

fn index_names(indexes: &[Index]) -> BTreeSet<&str> {
    indexes.iter().map(|i| i.name.as_str()).collect()
}

fn constraint_names(constraints: &[Constraint]) -> BTreeSet<&str> {
    constraints.iter().map(|c| c.name.as_str()).collect()
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn identical_schemas_produce_empty_diff() {
    for schema in [blog(), blog_v2(), Schema::new("empty")] {
        let diff = diff_schemas(&schema, &schema).unwrap();
        assert!(diff.is_empty());

        let comparison = compare(&schema, &schema).unwrap();
        assert!(!comparison.has_changes());
        assert!(comparison.validation.warnings.is_empty());
        assert!(comparison.sql().unwrap().is_empty());
    }
}

#[test]
fn diff_is_symmetric() {
    let (a, b) = (blog_v2(), blog());
    let forward = diff_schemas(&a, &b).unwrap();
    let backward = diff_schemas(&b, &a).unwrap();

    assert_eq!(
        table_names(&forward.added_tables),
        table_names(&backward.removed_tables)
    );
    assert_eq!(
        table_names(&forward.removed_tables),
        table_names(&backward.added_tables)
    );
    assert_eq!(
        index_names(&forward.added_indexes),
        index_names(&backward.removed_indexes)
    );
    assert_eq!(
        index_names(&forward.removed_indexes),
        index_names(&backward.added_indexes)
    );
    assert_eq!(
        constraint_names(&forward.added_constraints),
        constraint_names(&backward.removed_constraints)
    );
    assert_eq!(
        constraint_names(&forward.removed_constraints),
        constraint_names(&backward.added_constraints)
    );
    assert!(!forward.added_tables.is_empty());
    assert!(!forward.added_constraints.is_empty());

    for table in &forward.modified_tables {
        let other = backward.table_diff(&table.table_name).unwrap();
        assert_eq!(table.added_columns, other.removed_columns);
        assert_eq!(table.removed_columns, other.added_columns);
        for (change, reverse) in table.modified_columns.iter().zip(&other.modified_columns) {
            assert_eq!(change.old, reverse.new);
            assert_eq!(change.new, reverse.old);
        }
    }
}

#[test]
fn columns_of_common_tables_are_partitioned() {
    let (source, target) = (blog_v2(), blog());
    let diff = diff_schemas(&source, &target).unwrap();

    for (name, new_table) in &source.tables {
        let Some(old_table) = target.get_table(name) else {
            continue;
        };
        let all: BTreeSet<&str> = new_table
            .columns
            .keys()
            .chain(old_table.columns.keys())
            .map(String::as_str)
            .collect();

        let mut seen: Vec<&str> = Vec::new();
        if let Some(table) = diff.table_diff(name) {
            seen.extend(table.added_columns.iter().map(|c| c.name.as_str()));
            seen.extend(table.removed_columns.iter().map(|c| c.name.as_str()));
            seen.extend(table.modified_columns.iter().map(|c| c.name.as_str()));
        }
        let changed: BTreeSet<&str> = seen.iter().copied().collect();
        assert_eq!(seen.len(), changed.len(), "column counted twice in {name}");

        let unchanged: Vec<&str> = all
            .iter()
            .copied()
            .filter(|c| !changed.contains(c))
            .collect();
        for column in &unchanged {
            assert!(new_table.columns[*column].same_definition(&old_table.columns[*column]));
        }
        assert_eq!(unchanged.len() + changed.len(), all.len());
    }
}

#[test]
fn output_is_deterministic() {
    let (source, target) = (blog_v2(), blog());
    let first = compare(&source, &target).unwrap();
    let second = compare(&source.clone(), &target.clone()).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn rename_threshold_is_strict() {
    let columns = ["a", "b", "c", "d"];
    let table = |name: &str, extra: Option<&str>| {
        let table = columns
            .iter()
            .fold(Table::new(name), |t, c| t.column(Column::new(*c, "int")));
        match extra {
            Some(c) => table.column(Column::new(c, "int")),
            None => table,
        }
    };

    // 4 of 5 columns shared: similarity 0.8, no rename.
    let source = Schema::new("app").table(table("accounts", Some("e")));
    let target = Schema::new("app").table(table("users", None));
    assert!(compare(&source, &target).unwrap().renames.is_empty());

    // 4 of 4 columns shared: similarity 1.0, rename.
    let source = Schema::new("app").table(table("accounts", None));
    let comparison = compare(&source, &target).unwrap();
    assert_eq!(comparison.renames.len(), 1);
    assert_eq!(comparison.renames["users"], "accounts");
}

#[test]
fn removed_primary_key_is_always_an_error() {
    let source = Schema::new("blog")
        .table(
            Table::new("users")
                .column(Column::new("id", "int").not_null())
                .column(Column::new("email", "text").position(1)),
        )
        .table(posts());
    let target = blog().table(Table::new("logs").column(Column::new("line", "text")));

    let comparison = compare(&source, &target).unwrap();
    assert!(comparison.validation.warnings.len() > 1);
    assert!(!comparison.is_valid());
    assert!(comparison
        .validation
        .errors
        .iter()
        .any(|e| e.kind == DependencyErrorKind::MissingPrimaryKey && e.table == "users"));
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn added_column_with_unique_index() {
    let target = Schema::new("app").table(
        Table::new("users")
            .column(Column::new("id", "int").not_null())
            .primary_key(["id"]),
    );
    let source_with = |email: Column| {
        Schema::new("app").table(
            Table::new("users")
                .column(Column::new("id", "int").not_null())
                .column(email.position(1))
                .primary_key(["id"])
                .index(Index::new("idx_email", "users", ["email"]).unique()),
        )
    };

    let nullable = source_with(Column::new("email", "varchar(255)"));
    let comparison = compare(&nullable, &target).unwrap();
    let table = comparison.diff.table_diff("users").unwrap();
    assert_eq!(table.added_columns.len(), 1);
    assert_eq!(table.added_columns[0].name, "email");
    assert!(table.removed_columns.is_empty());
    assert_eq!(comparison.diff.added_indexes.len(), 1);
    assert_eq!(comparison.diff.added_indexes[0].columns, vec!["email"]);
    assert!(comparison.validation.errors.is_empty());
    assert!(comparison.validation.warnings.is_empty());
    assert_eq!(
        comparison.sql().unwrap(),
        [
            "ALTER TABLE `users` ADD COLUMN `email` varchar(255) NULL".to_string(),
            "CREATE UNIQUE INDEX `idx_email` ON `users` (`email`)".to_string(),
        ]
    );

    let not_null = source_with(Column::new("email", "varchar(255)").not_null());
    let comparison = compare(&not_null, &target).unwrap();
    assert!(comparison.validation.errors.is_empty());
    assert_eq!(comparison.validation.warnings.len(), 1);
    let warning = &comparison.validation.warnings[0];
    assert_eq!(warning.severity, Severity::Medium);
    assert_eq!(warning.category, WarningCategory::Compatibility);
    assert_eq!(warning.column.as_deref(), Some("email"));
}

#[test]
fn text_to_varchar_is_lossy_without_size_warning() {
    let comments = |body: &str| {
        Schema::new("app").table(
            Table::new("comments")
                .column(Column::new("id", "int").not_null())
                .column(Column::new("body", body).position(1))
                .primary_key(["id"]),
        )
    };

    // The current body is TEXT and the desired one VARCHAR(100).
    let comparison = compare(&comments("varchar(100)"), &comments("text")).unwrap();
    let table = comparison.diff.table_diff("comments").unwrap();
    assert_eq!(table.modified_columns.len(), 1);
    let change = &table.modified_columns[0];
    assert_eq!(change.name, "body");
    assert_eq!(change.old.data_type, "text");
    assert_eq!(change.new.data_type, "varchar(100)");

    let warnings = &comparison.validation.warnings;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::High);
    assert_eq!(warnings[0].category, WarningCategory::DataLoss);
    assert_eq!(comparison.validation.count(Severity::Medium), 0);
    assert!(comparison.validation.has_destructive_changes());
    assert_eq!(
        comparison.sql().unwrap(),
        ["ALTER TABLE `comments` MODIFY COLUMN `body` varchar(100) NULL".to_string()]
    );

    // The other way round is a safe widening.
    let comparison = compare(&comments("text"), &comments("varchar(100)")).unwrap();
    assert!(comparison.validation.warnings.is_empty());
}

#[test]
fn foreign_key_to_removed_table_blocks_sql() {
    let source = Schema::new("blog").table(posts());
    let target = blog();

    let comparison = compare(&source, &target).unwrap();
    assert_eq!(comparison.diff.removed_tables.len(), 1);
    assert_eq!(comparison.validation.count(Severity::Critical), 1);
    assert!(!comparison.is_valid());

    let errors = &comparison.validation.errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DependencyErrorKind::ReferencesRemovedTable);
    assert_eq!(errors[0].constraint.as_deref(), Some("fk_user"));
    assert_eq!(errors[0].referenced_table.as_deref(), Some("users"));

    let Err(Error::Blocked { errors }) = comparison.sql() else {
        panic!("SQL must be withheld while dependency errors exist");
    };
    assert_eq!(errors.len(), 1);
    assert!(comparison.statements.is_empty());
}

#[test]
fn dropping_the_foreign_key_unblocks_sql() {
    let source = Schema::new("blog").table(Table {
        constraints: Default::default(),
        ..posts()
    });
    let target = blog();

    let comparison = compare(&source, &target).unwrap();
    assert!(comparison.is_valid());
    assert_eq!(
        comparison.sql().unwrap(),
        [
            "ALTER TABLE `posts` DROP FOREIGN KEY `fk_user`".to_string(),
            "DROP TABLE `users`".to_string(),
        ]
    );
}

#[test]
fn full_migration_plan() {
    let comparison = compare(&blog_v2(), &blog()).unwrap();
    assert!(comparison.is_valid());
    assert!(comparison.renames.is_empty());

    let sql = comparison.sql().unwrap();
    assert_eq!(
        sql,
        [
            "CREATE TABLE `tags` (\n    `id` int NOT NULL AUTO_INCREMENT,\n    `label` varchar(64) NOT NULL,\n    PRIMARY KEY (`id`)\n)".to_string(),
            "ALTER TABLE `users` ADD COLUMN `bio` text NULL".to_string(),
            "ALTER TABLE `posts` MODIFY COLUMN `title` varchar(200) NULL".to_string(),
            "ALTER TABLE `users` MODIFY COLUMN `name` varchar(50) NULL".to_string(),
            "ALTER TABLE `posts` ADD CONSTRAINT `uq_title` UNIQUE (`title`)".to_string(),
        ]
    );

    let validation = &comparison.validation;
    // name shrinks, title becomes nullable, uq_title may hit duplicates.
    assert_eq!(validation.count(Severity::High), 1);
    assert_eq!(validation.count(Severity::Medium), 2);
    assert_eq!(validation.count(Severity::Low), 1);
}

#[test]
fn applied_rename_keeps_remaining_changes() {
    let target = blog();
    let members = Table::new("members")
        .column(Column::new("id", "int").not_null().auto_increment())
        .column(Column::new("email", "varchar(255)").not_null().position(1))
        .column(Column::new("name", "varchar(100)").position(2))
        .primary_key(["id"])
        .index(Index::new("idx_email", "members", ["email"]).unique());
    let source = Schema::new("blog").table(members).table(Table {
        constraints: Default::default(),
        ..posts()
    });

    let options = CompareOptions::new().with_applied_renames();
    let comparison = Comparator::new(options).compare(&source, &target).unwrap();
    assert_eq!(comparison.renames["users"], "members");
    assert_eq!(
        comparison.sql().unwrap(),
        [
            "ALTER TABLE `posts` DROP FOREIGN KEY `fk_user`".to_string(),
            "RENAME TABLE `users` TO `members`".to_string(),
        ]
    );
}
