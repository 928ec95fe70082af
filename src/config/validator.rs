//! Catalog validation: referential integrity and API consistency.

use crate::config::{FullConfig, PrimaryKeyConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Default schema id when tables omit schema_id.
pub fn default_schema_id(config: &FullConfig) -> Result<&str, ConfigError> {
    config
        .schemas
        .first()
        .map(|s| s.id.as_str())
        .ok_or_else(|| ConfigError::Validation("at least one schema required".into()))
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let default_sid = default_schema_id(config)?;
    let schema_ids: HashSet<&str> = config.schemas.iter().map(|s| s.id.as_str()).collect();
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    let column_ids: HashSet<&str> = config.columns.iter().map(|c| c.id.as_str()).collect();

    for t in &config.tables {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            });
        }
        let pk = match &t.primary_key {
            PrimaryKeyConfig::Single(s) => s.as_str(),
            PrimaryKeyConfig::Composite(v) if v.len() == 1 => v[0].as_str(),
            PrimaryKeyConfig::Composite(_) => {
                return Err(ConfigError::Validation(format!(
                    "table {}: composite primary keys are not supported",
                    t.id
                )))
            }
        };
        let has_pk = config.columns.iter().any(|c| c.table_id == t.id && c.name == pk);
        if !has_pk {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: pk.to_string(),
            });
        }
    }

    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
    }

    for r in &config.relationships {
        if !schema_ids.contains(r.from_schema_id.as_str())
            || !schema_ids.contains(r.to_schema_id.as_str())
            || !table_ids.contains(r.from_table_id.as_str())
            || !table_ids.contains(r.to_table_id.as_str())
            || !column_ids.contains(r.from_column_id.as_str())
            || !column_ids.contains(r.to_column_id.as_str())
        {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
    }

    let mut path_segments = HashSet::new();
    for api in &config.api_entities {
        if !table_ids.contains(api.entity_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        }
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        let table_columns: HashSet<&str> = config
            .columns
            .iter()
            .filter(|c| c.table_id == api.entity_id)
            .map(|c| c.name.as_str())
            .collect();
        let referenced = api
            .validation
            .keys()
            .map(String::as_str)
            .chain(api.label_column.as_deref());
        for col in referenced {
            if !table_columns.contains(col) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", api.entity_id, col),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_config;

    #[test]
    fn builtin_catalog_is_valid() {
        let config = builtin_config().unwrap();
        validate(&config).unwrap();
    }

    #[test]
    fn duplicate_path_segment_is_rejected() {
        let mut config = builtin_config().unwrap();
        let dup = config.api_entities[0].clone();
        config.api_entities.push(dup);
        assert!(matches!(validate(&config), Err(ConfigError::DuplicatePathSegment(_))));
    }

    #[test]
    fn validation_rule_for_unknown_column_is_rejected() {
        let mut config = builtin_config().unwrap();
        config.api_entities[0]
            .validation
            .insert("no_such_column".into(), Default::default());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "column", .. })
        ));
    }
}
