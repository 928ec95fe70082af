//! Edit page state: load a record, edit its fields, validate, submit the update.

use super::select::AsyncSelect;
use crate::client::{ClientError, ResourceApi};
use crate::config::{FieldType, ResolvedModel, ValidationRule};
use crate::dates;
use crate::error::{AppError, FieldErrors};
use crate::service::RequestValidator;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub enum FieldKind {
    /// Picked as `dd/MM/yyyy`, held and sent as RFC 3339.
    Date,
    Select(AsyncSelect),
    Text,
}

#[derive(Clone, Debug)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Update stored; navigate here.
    Redirect(String),
    /// Client-side validation failed; nothing was sent.
    Invalid(FieldErrors),
    /// The API rejected the update; see [`EditForm::form_error`].
    Failed,
}

pub struct EditForm {
    resource: String,
    id: String,
    redirect_to: String,
    fields: Vec<FormField>,
    rules: HashMap<String, ValidationRule>,
    values: Option<Map<String, Value>>,
    errors: FieldErrors,
    load_error: Option<ClientError>,
    form_error: Option<ClientError>,
}

impl EditForm {
    pub fn new(resource: &str, id: &str, rules: HashMap<String, ValidationRule>) -> Self {
        EditForm {
            resource: resource.to_string(),
            id: id.to_string(),
            redirect_to: format!("/{}", resource),
            fields: Vec::new(),
            rules,
            values: None,
            errors: FieldErrors::new(),
            load_error: None,
            form_error: None,
        }
    }

    pub fn redirect_to(mut self, path: &str) -> Self {
        self.redirect_to = path.to_string();
        self
    }

    pub fn date_field(mut self, name: &str, label: &str) -> Self {
        self.push_field(name, label, FieldKind::Date);
        self
    }

    pub fn text_field(mut self, name: &str, label: &str) -> Self {
        self.push_field(name, label, FieldKind::Text);
        self
    }

    pub fn select(mut self, select: AsyncSelect) -> Self {
        let name = select.name.clone();
        let label = select.label.clone();
        self.push_field(&name, &label, FieldKind::Select(select));
        self
    }

    fn push_field(&mut self, name: &str, label: &str, kind: FieldKind) {
        self.fields.push(FormField {
            name: name.to_string(),
            label: label.to_string(),
            kind,
        });
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn selects(&self) -> impl Iterator<Item = &AsyncSelect> {
        self.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Select(s) => Some(s),
            _ => None,
        })
    }

    /// Fetch the record and take its values as the initial form values. A failure is kept as
    /// [`load_error`](Self::load_error) and leaves the form unloaded.
    pub async fn load(&mut self, api: &dyn ResourceApi) {
        self.load_error = None;
        match api.get_by_id(&self.resource, &self.id).await {
            Ok(Value::Object(record)) => {
                self.values = Some(record);
                self.errors.clear();
            }
            Ok(other) => {
                self.load_error = Some(ClientError::Parse(format!("expected a record, got {}", other)));
            }
            Err(e) => {
                tracing::debug!(resource = %self.resource, id = %self.id, error = %e, "edit form load failed");
                self.load_error = Some(e);
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.values.is_some()
    }

    pub fn values(&self) -> Option<&Map<String, Value>> {
        self.values.as_ref()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.as_ref()?.get(name)
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.values.get_or_insert_with(Map::new).insert(name.to_string(), value);
    }

    /// Set a date field from its `dd/MM/yyyy` picker value; blank clears it.
    pub fn set_date(&mut self, name: &str, display: &str) -> Result<(), AppError> {
        if display.trim().is_empty() {
            self.set_field(name, Value::Null);
            return Ok(());
        }
        let date = dates::from_display(display)
            .ok_or_else(|| AppError::Validation(format!("{} must be a dd/MM/yyyy date", name)))?;
        self.set_field(name, Value::String(dates::to_wire(&date)));
        Ok(())
    }

    /// `dd/MM/yyyy` text of a date field, `None` when unset.
    pub fn display_date(&self, name: &str) -> Option<String> {
        self.value(name).and_then(Value::as_str).and_then(dates::to_display)
    }

    /// The body sent on submit: every form field, `null` when unset.
    pub fn submission(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), self.value(&f.name).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// Run the form rules over the submission; returns true when valid.
    pub fn validate(&mut self) -> bool {
        let rules: HashMap<String, ValidationRule> = self
            .rules
            .iter()
            .filter(|(name, _)| self.fields.iter().any(|f| &f.name == *name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.errors = RequestValidator::field_errors(&self.submission(), &rules);
        self.errors.is_empty()
    }

    pub async fn submit(&mut self, api: &dyn ResourceApi) -> SubmitOutcome {
        self.form_error = None;
        if !self.validate() {
            return SubmitOutcome::Invalid(self.errors.clone());
        }
        match api.update_by_id(&self.resource, &self.id, &self.submission()).await {
            Ok(updated) => {
                if let Value::Object(record) = updated {
                    self.values = Some(record);
                }
                tracing::info!(resource = %self.resource, id = %self.id, "record updated from edit form");
                SubmitOutcome::Redirect(self.redirect_to.clone())
            }
            Err(e) => {
                if let Some(details) = e.field_details() {
                    self.errors = details
                        .iter()
                        .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                        .collect();
                }
                self.form_error = Some(e);
                SubmitOutcome::Failed
            }
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn load_error(&self) -> Option<&ClientError> {
        self.load_error.as_ref()
    }

    pub fn form_error(&self) -> Option<&ClientError> {
        self.form_error.as_ref()
    }
}

/// `rental_date` -> `Rental Date`.
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Edit form for any resource: foreign keys become selects over the related resource (labelled by
/// its label column), date-typed columns become date fields, remaining writable columns text fields.
pub fn edit_form_for(model: &ResolvedModel, resource: &str, id: &str) -> Result<EditForm, AppError> {
    let entity = model
        .entity_by_path(resource)
        .ok_or_else(|| AppError::NotFound(format!("unknown resource '{}'", resource)))?;
    let mut form = EditForm::new(&entity.path_segment, id, entity.validation.clone());
    for col in entity.columns.iter().filter(|c| entity.is_writable(&c.name)) {
        if let Some(rel) = entity.references().find(|r| r.our_key_column == col.name) {
            let related = model
                .entity_by_path(&rel.related_path_segment)
                .ok_or_else(|| AppError::NotFound(format!("unknown resource '{}'", rel.related_path_segment)))?;
            let label_column = related.label_column.as_deref().unwrap_or(&related.pk_column);
            let mut select = AsyncSelect::new(&col.name, &title_case(&related.name), &related.path_segment, label_column);
            select.value_column = rel.their_key_column.clone();
            form = form.select(select);
        } else if entity.validation.get(&col.name).and_then(|r| r.type_) == Some(FieldType::Date) {
            form = form.date_field(&col.name, &title_case(&col.name));
        } else {
            form = form.text_field(&col.name, &title_case(&col.name));
        }
    }
    Ok(form)
}

/// The rental edit page: rental and return dates, then tool, user and outlet selects.
pub fn rental_edit_form(model: &ResolvedModel, id: &str) -> Result<EditForm, AppError> {
    Ok(edit_form_for(model, "rentals", id)?.redirect_to("/rentals"))
}
