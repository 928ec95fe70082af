//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::ValidationRule;
use std::collections::HashMap;

/// Direction of a related-include: to_one (we have FK to them) or to_many (they have FK to us).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// Related records embeddable in read responses. To-one includes are named after the foreign key
/// without `_id`; to-many includes after the referencing entity's path segment.
#[derive(Clone, Debug)]
pub struct IncludeSpec {
    pub name: String,
    pub direction: IncludeDirection,
    pub related_path_segment: String,
    /// Our column used in the join (our FK for to_one; our PK for to_many).
    pub our_key_column: String,
    /// Their column used in the join (their PK for to_one; their FK for to_many).
    pub their_key_column: String,
}

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub pk_type: Option<PkType>,
    pub nullable: bool,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()).
    pub has_default: bool,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding string values.
    pub pg_type: Option<String>,
    /// Lowercased catalog type name without modifiers (e.g. "integer", "boolean").
    pub base_type: String,
    /// Maintained by the store (created_at / updated_at); never written from a request body.
    pub managed: bool,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub table_id: String,
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub pk_column: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub operations: Vec<String>,
    pub label_column: Option<String>,
    pub includes: Vec<IncludeSpec>,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedEntity {
    pub fn allows(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns a request body may write: everything except the primary key and store-managed timestamps.
    pub fn is_writable(&self, name: &str) -> bool {
        self.column(name)
            .map(|c| c.pk_type.is_none() && !c.managed)
            .unwrap_or(false)
    }

    pub fn include(&self, name: &str) -> Option<&IncludeSpec> {
        self.includes.iter().find(|i| i.name == name)
    }

    /// To-one relations (foreign keys held by this entity).
    pub fn references(&self) -> impl Iterator<Item = &IncludeSpec> {
        self.includes.iter().filter(|i| i.direction == IncludeDirection::ToOne)
    }

    /// To-many relations (foreign keys other entities hold against this one).
    pub fn referenced_by(&self) -> impl Iterator<Item = &IncludeSpec> {
        self.includes.iter().filter(|i| i.direction == IncludeDirection::ToMany)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}
