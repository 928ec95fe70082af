//! Load the catalog (built-in or from a directory of JSON files) and resolve it into a runtime model.

use crate::config::resolved::{ColumnInfo, IncludeDirection, IncludeSpec, PkType, ResolvedEntity, ResolvedModel};
use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_SCHEMAS: &str = include_str!("../../catalog/schemas.json");
const BUILTIN_TABLES: &str = include_str!("../../catalog/tables.json");
const BUILTIN_COLUMNS: &str = include_str!("../../catalog/columns.json");
const BUILTIN_RELATIONSHIPS: &str = include_str!("../../catalog/relationships.json");
const BUILTIN_API_ENTITIES: &str = include_str!("../../catalog/api_entities.json");

/// Store-managed timestamp columns added to every table that does not declare them.
pub const MANAGED_COLUMNS: &[&str] = &["created_at", "updated_at"];

/// The rental catalog compiled into the binary.
pub fn builtin_config() -> Result<FullConfig, ConfigError> {
    Ok(FullConfig {
        schemas: parse_catalog_file("schemas.json", BUILTIN_SCHEMAS)?,
        tables: parse_catalog_file("tables.json", BUILTIN_TABLES)?,
        columns: parse_catalog_file("columns.json", BUILTIN_COLUMNS)?,
        relationships: parse_catalog_file("relationships.json", BUILTIN_RELATIONSHIPS)?,
        api_entities: parse_catalog_file("api_entities.json", BUILTIN_API_ENTITIES)?,
    })
}

/// Read a catalog from `dir`. `relationships.json` is optional.
pub async fn load_from_dir(dir: &Path) -> Result<FullConfig, ConfigError> {
    Ok(FullConfig {
        schemas: read_catalog_file(dir, "schemas.json", None).await?,
        tables: read_catalog_file(dir, "tables.json", None).await?,
        columns: read_catalog_file(dir, "columns.json", None).await?,
        relationships: read_catalog_file(dir, "relationships.json", Some("[]")).await?,
        api_entities: read_catalog_file(dir, "api_entities.json", None).await?,
    })
}

async fn read_catalog_file<T>(dir: &Path, name: &str, fallback: Option<&str>) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let path = dir.join(name);
    tracing::debug!(path = %path.display(), "reading catalog file");
    let raw = match (tokio::fs::read_to_string(&path).await, fallback) {
        (Ok(s), _) => s,
        (Err(_), Some(f)) => f.to_string(),
        (Err(e), None) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    parse_catalog_file(name, &raw)
}

fn parse_catalog_file<T>(name: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(format!("{}: {}", name, e)))
}

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config
        .columns
        .iter()
        .fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let column_id_to_name: HashMap<&str, &str> = config.columns.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();
    let table_id_to_path: HashMap<&str, &str> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api.path_segment.as_str()))
        .collect();

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();

    for api in &config.api_entities {
        let table = tables_by_id
            .get(api.entity_id.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            })?;
        let table_sid = table.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id
            .get(table_sid)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "schema",
                id: table_sid.to_string(),
            })?;
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let pk_name = primary_key_column(table)?;
        let pk_col = table_columns
            .iter()
            .find(|c| c.name == pk_name)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                table_id: table.id.clone(),
                column: pk_name.clone(),
            })?;
        let pk_type = infer_pk_type(pk_col);

        let mut columns: Vec<ColumnInfo> = table_columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                pk_type: if c.name == pk_name { Some(pk_type.clone()) } else { None },
                nullable: c.nullable,
                has_default: c.default.is_some(),
                pg_type: column_pg_type_name(&c.type_),
                base_type: c.type_.base_name().to_lowercase(),
                managed: MANAGED_COLUMNS.contains(&c.name.as_str()),
            })
            .collect();

        let config_col_names: HashSet<String> = columns.iter().map(|c| c.name.clone()).collect();
        for name in MANAGED_COLUMNS {
            if !config_col_names.contains(*name) {
                columns.push(ColumnInfo {
                    name: name.to_string(),
                    pk_type: None,
                    nullable: false,
                    has_default: true,
                    pg_type: Some("timestamptz".into()),
                    base_type: "timestamptz".into(),
                    managed: true,
                });
            }
        }

        let includes = build_includes_for_table(
            &table.id,
            &config.relationships,
            &column_id_to_name,
            &table_id_to_path,
        );
        let entity = ResolvedEntity {
            table_id: table.id.clone(),
            name: api.name.clone(),
            schema_name: schema.name.clone(),
            table_name: table.name.clone(),
            path_segment: api.path_segment.clone(),
            pk_column: pk_name,
            pk_type,
            columns,
            operations: api.operations.clone(),
            label_column: api.label_column.clone(),
            includes,
            validation: api.validation.clone(),
        };
        entity_by_path.insert(api.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_path,
    })
}

pub(crate) fn primary_key_column(table: &TableConfig) -> Result<String, ConfigError> {
    match &table.primary_key {
        PrimaryKeyConfig::Single(s) => Ok(s.clone()),
        PrimaryKeyConfig::Composite(v) if v.len() == 1 => Ok(v[0].clone()),
        PrimaryKeyConfig::Composite(_) => Err(ConfigError::Validation(format!(
            "table {}: composite primary keys are not supported",
            table.id
        ))),
    }
}

fn build_includes_for_table(
    our_table_id: &str,
    relationships: &[RelationshipConfig],
    column_id_to_name: &HashMap<&str, &str>,
    table_id_to_path: &HashMap<&str, &str>,
) -> Vec<IncludeSpec> {
    let mut includes = Vec::new();
    for rel in relationships {
        let from_col = column_id_to_name.get(rel.from_column_id.as_str()).map(|s| s.to_string());
        let to_col = column_id_to_name.get(rel.to_column_id.as_str()).map(|s| s.to_string());
        let from_path = table_id_to_path.get(rel.from_table_id.as_str()).map(|s| s.to_string());
        let to_path = table_id_to_path.get(rel.to_table_id.as_str()).map(|s| s.to_string());
        if rel.from_table_id == our_table_id {
            if let (Some(our_key), Some(their_key), Some(related_path)) = (from_col.clone(), to_col.clone(), to_path) {
                // To-one includes are named after the FK column without its `_id` suffix (tool_id -> tool).
                let name = our_key.strip_suffix("_id").unwrap_or(&related_path).to_string();
                includes.push(IncludeSpec {
                    name,
                    direction: IncludeDirection::ToOne,
                    related_path_segment: related_path,
                    our_key_column: our_key,
                    their_key_column: their_key,
                });
            }
        }
        if rel.to_table_id == our_table_id {
            if let (Some(our_key), Some(their_key), Some(related_path)) = (to_col, from_col, from_path) {
                includes.push(IncludeSpec {
                    name: related_path.clone(),
                    direction: IncludeDirection::ToMany,
                    related_path_segment: related_path,
                    our_key_column: our_key,
                    their_key_column: their_key,
                });
            }
        }
    }
    includes
}

fn column_pg_type_name(ty: &ColumnTypeConfig) -> Option<String> {
    let name = ty.base_name();
    let lower = name.to_lowercase();
    if lower == "timestamptz" || lower == "timestamp with time zone" {
        Some("timestamptz".into())
    } else if lower == "timestamp" || lower.starts_with("timestamp ") {
        Some("timestamp".into())
    } else if lower == "date" {
        Some("date".into())
    } else if lower.contains("uuid") {
        Some("uuid".into())
    } else {
        None
    }
}

fn infer_pk_type(col: &ColumnConfig) -> PkType {
    let type_lower = col.type_.base_name().to_lowercase();
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}
