//! Request validation from catalog rules.

use crate::config::{FieldType, ResolvedEntity, ValidationRule};
use crate::dates;
use crate::error::{AppError, FieldErrors};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Every failing field with its first error. Required fields must be present and non-null
    /// (and non-blank when typed `string`).
    pub fn field_errors(body: &Map<String, Value>, rules: &HashMap<String, ValidationRule>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for (col, rule) in rules {
            if let Err(msg) = check_field(col, body.get(col), rule) {
                errors.insert(col.clone(), msg);
            }
        }
        errors
    }

    /// Validate body against per-column rules.
    pub fn validate(body: &Map<String, Value>, rules: &HashMap<String, ValidationRule>) -> Result<(), AppError> {
        let errors = Self::field_errors(body, rules);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidFields(errors))
        }
    }

    /// Validate a write body for `entity`: keys must be entity columns, then the entity rules apply.
    pub fn validate_body(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<(), AppError> {
        let mut errors = Self::field_errors(body, &entity.validation);
        for key in body.keys() {
            if entity.column(key).is_none() {
                errors.insert(key.clone(), format!("{} is not a field of {}", key, entity.name));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidFields(errors))
        }
    }
}

fn check_field(col: &str, val: Option<&Value>, rule: &ValidationRule) -> Result<(), String> {
    let required = rule.required == Some(true);
    let v = match val {
        None | Some(Value::Null) if required => return Err(format!("{} is required", col)),
        None | Some(Value::Null) => return Ok(()),
        Some(v) => v,
    };
    if required && rule.type_ == Some(FieldType::String) && v.as_str().map(|s| s.trim().is_empty()).unwrap_or(false) {
        return Err(format!("{} is required", col));
    }
    if let Some(t) = rule.type_ {
        check_type(col, v, t)?;
    }
    if let Some(format) = &rule.format {
        check_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(format!("{} must be at most {} characters", col, max));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(format!("{} must be at least {} characters", col, min));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| format!("invalid pattern for {}", col))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(format!("{} does not match required pattern", col));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            ));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(format!("{} must be at least {}", col, min));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(format!("{} must be at most {}", col, max));
            }
        }
    }
    Ok(())
}

fn check_type(col: &str, v: &Value, t: FieldType) -> Result<(), String> {
    let ok = match t {
        FieldType::String => v.is_string(),
        FieldType::Date => v.as_str().and_then(dates::parse_timestamp).is_some(),
        FieldType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
        FieldType::Number => v.is_number(),
        FieldType::Integer => v.is_i64() || v.is_u64(),
        FieldType::Boolean => v.is_boolean(),
    };
    if ok {
        return Ok(());
    }
    Err(match t {
        FieldType::String => format!("{} must be a string", col),
        FieldType::Date => format!("{} must be a valid date", col),
        FieldType::Uuid => format!("{} must be a valid UUID", col),
        FieldType::Number => format!("{} must be a number", col),
        FieldType::Integer => format!("{} must be an integer", col),
        FieldType::Boolean => format!("{} must be a boolean", col),
    })
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(col: &str, v: &Value, format: &str) -> Result<(), String> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                let at = s.find('@');
                let valid = at.map(|i| i > 0 && i < s.len() - 1).unwrap_or(false) && !s.contains(char::is_whitespace);
                if !valid {
                    return Err(format!("{} must be a valid email", col));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(format!("{} must be a valid UUID", col));
                }
            }
        }
        _ => {}
    }
    Ok(())
}
