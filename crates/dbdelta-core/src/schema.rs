//! Schema representation types.
//!
//! A [`Schema`] is a snapshot of one MySQL-compatible database as handed
//! over by catalog introspection. Snapshots are plain values: a schema
//! owns its tables and a table owns its columns, indexes and constraints.
//! Indexes and constraints keep a denormalized `table_name` that must
//! match the table holding them.
//!
//! Name-keyed collections are [`BTreeMap`]s, so every iteration over
//! tables, columns or constraints is sorted by name.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Base type names accepted in a column's data type.
const DATA_TYPES: &[&str] = &[
    "tinyint",
    "smallint",
    "mediumint",
    "int",
    "integer",
    "bigint",
    "decimal",
    "dec",
    "numeric",
    "fixed",
    "float",
    "double",
    "real",
    "bit",
    "bool",
    "boolean",
    "serial",
    "date",
    "datetime",
    "timestamp",
    "time",
    "year",
    "char",
    "varchar",
    "binary",
    "varbinary",
    "tinyblob",
    "blob",
    "mediumblob",
    "longblob",
    "tinytext",
    "text",
    "mediumtext",
    "longtext",
    "enum",
    "set",
    "json",
    "geometry",
    "point",
    "linestring",
    "polygon",
    "multipoint",
    "multilinestring",
    "multipolygon",
    "geometrycollection",
];

/// Returns the lower-cased base type of a data type string:
/// `"VARCHAR(255)"` gives `"varchar"`, `"int(10) unsigned"` gives `"int"`.
#[must_use]
pub fn base_type(data_type: &str) -> String {
    let head = data_type.split('(').next().unwrap_or_default();
    head.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Returns the numeric parameters of a data type: `"decimal(10,2)"` gives
/// `[10, 2]`. Types without parameters, or with non-numeric ones such as
/// `enum('a','b')`, give an empty list.
#[must_use]
pub fn type_size(data_type: &str) -> Vec<u32> {
    let Some(open) = data_type.find('(') else {
        return Vec::new();
    };
    let Some(len) = data_type[open..].find(')') else {
        return Vec::new();
    };
    data_type[open + 1..open + len]
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_default()
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Data type including size or precision, e.g. `varchar(255)`.
    pub data_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Default value as reported by the catalog, unquoted.
    #[serde(default)]
    pub default: Option<String>,
    /// Extra modifiers, e.g. `auto_increment`.
    #[serde(default)]
    pub extra: String,
    /// Ordinal position. Only used for display ordering.
    #[serde(default)]
    pub position: i32,
}

impl Column {
    /// Creates a new nullable column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            extra: String::new(),
            position: 0,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the extra modifier string.
    #[must_use]
    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    /// Marks the column as auto-incrementing.
    #[must_use]
    pub fn auto_increment(self) -> Self {
        self.extra("auto_increment")
    }

    /// Sets the ordinal position.
    #[must_use]
    pub fn position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Returns the lower-cased base type, e.g. `varchar`.
    #[must_use]
    pub fn base_type(&self) -> String {
        base_type(&self.data_type)
    }

    /// Returns the numeric size parameters of the data type.
    #[must_use]
    pub fn type_size(&self) -> Vec<u32> {
        type_size(&self.data_type)
    }

    /// Returns true if the extra modifiers contain `auto_increment`.
    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.extra.to_ascii_lowercase().contains("auto_increment")
    }

    /// Compares everything that matters for a migration: data type,
    /// nullability, default and extra modifiers. Position is ignored and
    /// type and extra are compared case-insensitively.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.data_type.trim().eq_ignore_ascii_case(other.data_type.trim())
            && self.nullable == other.nullable
            && self.default == other.default
            && self.extra.trim().eq_ignore_ascii_case(other.extra.trim())
    }

    /// Checks name, data-type vocabulary and position.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName { entity: "column" });
        }
        let base = self.base_type();
        if !DATA_TYPES.contains(&base.as_str()) {
            return Err(SchemaError::InvalidDataType {
                column: self.name.clone(),
                data_type: self.data_type.clone(),
            });
        }
        if self.position < 0 {
            return Err(SchemaError::NegativePosition {
                column: self.name.clone(),
                position: self.position,
            });
        }
        Ok(())
    }
}

/// Index algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexAlgorithm {
    /// B-tree, the default.
    #[default]
    BTree,
    /// Hash index.
    Hash,
    /// R-tree (spatial) index.
    RTree,
    /// Full-text index.
    FullText,
}

impl IndexAlgorithm {
    /// Returns the SQL keyword for this algorithm.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::BTree => "BTREE",
            Self::Hash => "HASH",
            Self::RTree => "RTREE",
            Self::FullText => "FULLTEXT",
        }
    }
}

impl fmt::Display for IndexAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Schema definition for an index.
///
/// Two indexes are equal only if every field matches, with the column
/// list compared as an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Owning table.
    pub table_name: String,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
    /// Whether this is the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Index algorithm.
    #[serde(default)]
    pub algorithm: IndexAlgorithm,
}

impl Index {
    /// Creates a non-unique B-tree index.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, table_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            primary: false,
            algorithm: IndexAlgorithm::BTree,
        }
    }

    /// Creates the primary index of a table, named `PRIMARY` as MySQL
    /// reports it.
    #[must_use]
    pub fn primary<I, S>(table_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::new("PRIMARY", table_name, columns);
        index.unique = true;
        index.primary = true;
        index
    }

    /// Marks the index as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: IndexAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Checks name, owning table and column list.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName { entity: "index" });
        }
        if self.table_name.trim().is_empty() {
            return Err(SchemaError::EmptyName { entity: "table" });
        }
        if self.columns.is_empty() || self.columns.iter().any(|c| c.trim().is_empty()) {
            return Err(SchemaError::EmptyColumnList {
                entity: "index",
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[serde(rename = "NO ACTION")]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    #[serde(rename = "RESTRICT")]
    Restrict,
    /// Cascade the delete/update to referencing rows.
    #[serde(rename = "CASCADE")]
    Cascade,
    /// Set the foreign key column to NULL.
    #[serde(rename = "SET NULL")]
    SetNull,
    /// Set the foreign key column to its default value.
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// Kind-specific part of a [`Constraint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// FOREIGN KEY (columns) REFERENCES referenced_table (referenced_columns).
    ForeignKey {
        /// Columns in the owning table.
        columns: Vec<String>,
        /// Referenced table.
        referenced_table: String,
        /// Referenced columns, one per local column.
        referenced_columns: Vec<String>,
        /// ON UPDATE action, rendered only when set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_update: Option<ForeignKeyAction>,
        /// ON DELETE action, rendered only when set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_delete: Option<ForeignKeyAction>,
    },
    /// UNIQUE (columns).
    Unique {
        /// Columns that must be unique together.
        columns: Vec<String>,
    },
    /// CHECK (expression).
    Check {
        /// The check expression, without surrounding parentheses.
        expression: String,
    },
}

/// Schema definition for a table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint name.
    pub name: String,
    /// Owning table.
    pub table_name: String,
    /// Kind and kind-specific payload.
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Creates a foreign key without ON UPDATE/ON DELETE actions.
    #[must_use]
    pub fn foreign_key<I, S, R, T>(
        name: impl Into<String>,
        table_name: impl Into<String>,
        columns: I,
        referenced_table: impl Into<String>,
        referenced_columns: R,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            kind: ConstraintKind::ForeignKey {
                columns: columns.into_iter().map(Into::into).collect(),
                referenced_table: referenced_table.into(),
                referenced_columns: referenced_columns.into_iter().map(Into::into).collect(),
                on_update: None,
                on_delete: None,
            },
        }
    }

    /// Creates a unique constraint.
    #[must_use]
    pub fn unique<I, S>(name: impl Into<String>, table_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            kind: ConstraintKind::Unique {
                columns: columns.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Creates a check constraint.
    #[must_use]
    pub fn check(
        name: impl Into<String>,
        table_name: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            kind: ConstraintKind::Check {
                expression: expression.into(),
            },
        }
    }

    /// Sets the ON DELETE action. No effect on non foreign keys.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        if let ConstraintKind::ForeignKey { on_delete, .. } = &mut self.kind {
            *on_delete = Some(action);
        }
        self
    }

    /// Sets the ON UPDATE action. No effect on non foreign keys.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        if let ConstraintKind::ForeignKey { on_update, .. } = &mut self.kind {
            *on_update = Some(action);
        }
        self
    }

    /// Local columns covered by the constraint. Check constraints have none.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match &self.kind {
            ConstraintKind::ForeignKey { columns, .. } | ConstraintKind::Unique { columns } => {
                columns
            }
            ConstraintKind::Check { .. } => &[],
        }
    }

    /// The referenced table, for foreign keys.
    #[must_use]
    pub fn referenced_table(&self) -> Option<&str> {
        match &self.kind {
            ConstraintKind::ForeignKey {
                referenced_table, ..
            } => Some(referenced_table),
            _ => None,
        }
    }

    /// Returns true for foreign keys.
    #[must_use]
    pub const fn is_foreign_key(&self) -> bool {
        matches!(self.kind, ConstraintKind::ForeignKey { .. })
    }

    /// Returns true for unique constraints.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        matches!(self.kind, ConstraintKind::Unique { .. })
    }

    /// Checks name, owning table and the kind-specific payload.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName {
                entity: "constraint",
            });
        }
        if self.table_name.trim().is_empty() {
            return Err(SchemaError::EmptyName { entity: "table" });
        }
        match &self.kind {
            ConstraintKind::ForeignKey {
                columns,
                referenced_table,
                referenced_columns,
                ..
            } => {
                if columns.is_empty() {
                    return Err(SchemaError::EmptyColumnList {
                        entity: "constraint",
                        name: self.name.clone(),
                    });
                }
                if referenced_table.trim().is_empty() {
                    return Err(SchemaError::MissingReferencedTable {
                        constraint: self.name.clone(),
                    });
                }
                if columns.len() != referenced_columns.len() {
                    return Err(SchemaError::ForeignKeyColumnCount {
                        constraint: self.name.clone(),
                        local: columns.len(),
                        referenced: referenced_columns.len(),
                    });
                }
            }
            ConstraintKind::Unique { columns } => {
                if columns.is_empty() {
                    return Err(SchemaError::EmptyColumnList {
                        entity: "constraint",
                        name: self.name.clone(),
                    });
                }
            }
            ConstraintKind::Check { expression } => {
                if expression.trim().is_empty() {
                    return Err(SchemaError::EmptyCheckExpression {
                        constraint: self.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Columns keyed by name.
    pub columns: BTreeMap<String, Column>,
    /// Indexes, including the primary index.
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Constraints keyed by name.
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
}

impl Table {
    /// Creates a new table without columns.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeMap::new(),
            indexes: Vec::new(),
            constraints: BTreeMap::new(),
        }
    }

    /// Adds a column, keyed by its name.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a primary index over the given columns.
    #[must_use]
    pub fn primary_key<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = Index::primary(self.name.clone(), columns);
        self.index(index)
    }

    /// Adds a constraint, keyed by its name.
    #[must_use]
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.insert(constraint.name.clone(), constraint);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Gets an index by name.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Returns the primary index, if any.
    #[must_use]
    pub fn primary_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.primary)
    }

    /// Columns in display order: by position, then by name.
    #[must_use]
    pub fn columns_by_position(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.values().collect();
        columns.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
        columns
    }

    /// Foreign keys declared on this table, sorted by name.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.values().filter(|c| c.is_foreign_key())
    }

    /// Returns a copy of this table under a new name, with every index and
    /// constraint moved along.
    #[must_use]
    pub fn renamed(&self, name: &str) -> Self {
        let mut table = self.clone();
        table.name = name.to_string();
        for index in &mut table.indexes {
            index.table_name = name.to_string();
        }
        for constraint in table.constraints.values_mut() {
            constraint.table_name = name.to_string();
        }
        table
    }

    /// Validates the table and everything it owns.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName { entity: "table" });
        }
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns {
                table: self.name.clone(),
            });
        }

        for (key, column) in &self.columns {
            column.validate().map_err(|e| e.in_table(&self.name))?;
            if key != &column.name {
                return Err(SchemaError::KeyMismatch {
                    entity: "column",
                    key: key.clone(),
                    name: column.name.clone(),
                }
                .in_table(&self.name));
            }
        }

        let mut seen = BTreeSet::new();
        for index in &self.indexes {
            index.validate().map_err(|e| e.in_table(&self.name))?;
            if index.table_name != self.name {
                return Err(SchemaError::TableMismatch {
                    entity: "index",
                    name: index.name.clone(),
                    expected: self.name.clone(),
                    found: index.table_name.clone(),
                });
            }
            if !seen.insert(index.name.as_str()) {
                return Err(SchemaError::DuplicateIndex {
                    index: index.name.clone(),
                }
                .in_table(&self.name));
            }
        }
        if self.indexes.iter().filter(|i| i.primary).count() > 1 {
            return Err(SchemaError::MultiplePrimaryKeys {
                table: self.name.clone(),
            });
        }

        for (key, constraint) in &self.constraints {
            constraint.validate().map_err(|e| e.in_table(&self.name))?;
            if key != &constraint.name {
                return Err(SchemaError::KeyMismatch {
                    entity: "constraint",
                    key: key.clone(),
                    name: constraint.name.clone(),
                }
                .in_table(&self.name));
            }
            if constraint.table_name != self.name {
                return Err(SchemaError::TableMismatch {
                    entity: "constraint",
                    name: constraint.name.clone(),
                    expected: self.name.clone(),
                    found: constraint.table_name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A complete database schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema (database) name.
    pub name: String,
    /// Tables keyed by name.
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
    /// Schema-level indexes keyed by name. Always empty for MySQL.
    #[serde(default)]
    pub indexes: BTreeMap<String, Index>,
}

impl Schema {
    /// Creates a new empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Adds a table, keyed by its name.
    #[must_use]
    pub fn table(mut self, table: Table) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Adds a schema-level index, keyed by its name.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Returns table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Validates the schema and, recursively, every table and index.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName { entity: "schema" });
        }
        for (key, table) in &self.tables {
            table.validate()?;
            if key != &table.name {
                return Err(SchemaError::KeyMismatch {
                    entity: "table",
                    key: key.clone(),
                    name: table.name.clone(),
                });
            }
        }
        for (key, index) in &self.indexes {
            index.validate()?;
            if key != &index.name {
                return Err(SchemaError::KeyMismatch {
                    entity: "index",
                    key: key.clone(),
                    name: index.name.clone(),
                });
            }
        }
        Ok(())
    }
}
