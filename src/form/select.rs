//! Select widget whose options are loaded from a lookup list.

use crate::client::{ClientError, ResourceApi};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Clone, Debug)]
pub struct AsyncSelect {
    /// Form field the chosen value is written to (e.g. `tool_id`).
    pub name: String,
    pub label: String,
    pub placeholder: String,
    /// API path segment the options are listed from (e.g. `tools`).
    pub resource: String,
    /// Column of the listed records shown as the option text.
    pub label_column: String,
    /// Column of the listed records used as the option value.
    pub value_column: String,
}

impl AsyncSelect {
    /// `Select Tool`-style label and placeholder from a title-cased entity name.
    pub fn new(name: &str, title: &str, resource: &str, label_column: &str) -> Self {
        let label = format!("Select {}", title);
        AsyncSelect {
            name: name.to_string(),
            placeholder: label.clone(),
            label,
            resource: resource.to_string(),
            label_column: label_column.to_string(),
            value_column: "id".to_string(),
        }
    }

    /// Fetch the lookup list and render one option per record. Records without a value are skipped;
    /// a missing label renders as empty text.
    pub async fn options(&self, api: &dyn ResourceApi) -> Result<Vec<SelectOption>, ClientError> {
        let rows = api.list(&self.resource, &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let value = scalar_text(row.get(&self.value_column)?)?;
                let label = row.get(&self.label_column).and_then(scalar_text).unwrap_or_default();
                Some(SelectOption { value, label })
            })
            .collect())
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
