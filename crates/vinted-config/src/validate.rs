use serde_json::Value;
use vinted_common::{Error, FieldError, Result};

use crate::model::{SettingKind, Settings, kind_of};

/// A validated setting ready to be written to the parameters table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingUpdate {
    pub key: String,
    pub value: String,
}

/// Check every setting and convert it to its stored string form.
///
/// All failures are collected so the operator sees every bad key at once;
/// if any key fails, nothing is returned for writing.
pub fn validate(settings: &Settings) -> Result<Vec<SettingUpdate>> {
    let mut updates = Vec::with_capacity(settings.len());
    let mut errors = Vec::new();

    for (key, value) in settings.iter() {
        match kind_of(key) {
            None => errors.push(FieldError::new(key, "unknown setting")),
            Some(kind) => match check(kind, value) {
                Ok(()) => updates.push(SettingUpdate {
                    key: key.to_string(),
                    value: stored_form(value)?,
                }),
                Err(message) => errors.push(FieldError::new(key, message)),
            },
        }
    }

    if errors.is_empty() {
        Ok(updates)
    } else {
        Err(Error::Validation(errors))
    }
}

fn check(kind: SettingKind, value: &Value) -> std::result::Result<(), String> {
    match kind {
        SettingKind::Bool => match value {
            Value::Bool(_) => Ok(()),
            other => Err(format!(
                "must be a boolean (true/false), got {}",
                type_name(other)
            )),
        },
        SettingKind::Number => match value {
            Value::Number(_) => Ok(()),
            Value::String(s) if s.trim().parse::<i64>().is_ok() => Ok(()),
            other => Err(format!("must be a number, got {}", type_name(other))),
        },
        SettingKind::Json => match value {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map(|_| ())
                .map_err(|e| format!("must be valid JSON: {e}")),
            Value::Array(_) | Value::Object(_) => Ok(()),
            other => Err(format!(
                "must be a JSON string, list or mapping, got {}",
                type_name(other)
            )),
        },
        SettingKind::Text => Ok(()),
    }
}

/// The string written to the table for `value`. Booleans use the
/// `True`/`False` spelling the application compares against.
fn stored_form(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value)?,
    })
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
