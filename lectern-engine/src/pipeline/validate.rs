//! Built-in validation per field kind.
//!
//! Applies only when a field has no custom validator. Values that are
//! absent pass every check except `required`.

use chrono::DateTime;
use lectern_model::{Field, FieldKind, SelectOption};
use lectern_schema::BLOCK_DISCRIMINATOR;
use serde_json::Value;

pub(crate) const REQUIRED: &str = "This field is required.";

pub(crate) fn builtin(field: &Field, value: Option<&Value>) -> Result<(), String> {
    let structural = matches!(field.kind, FieldKind::Group { .. } | FieldKind::Row { .. });
    if field.required && !structural && is_empty(value) {
        return Err(REQUIRED.to_string());
    }
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(());
    };

    match &field.kind {
        FieldKind::Text { min_length, max_length } | FieldKind::Textarea { min_length, max_length } => {
            let text = value.as_str().ok_or("This field must be text.")?;
            length(text, *min_length, *max_length)
        }
        FieldKind::Code => value.as_str().map(|_| ()).ok_or_else(|| "This field must be text.".into()),
        FieldKind::Email => match value.as_str() {
            Some(address) if is_email(address) => Ok(()),
            _ => Err("Please enter a valid email address.".into()),
        },
        FieldKind::Number { min, max } => {
            let number = value.as_f64().ok_or("Please enter a valid number.")?;
            if let Some(min) = min.filter(|min| number < *min) {
                return Err(format!("{number} is less than the min allowed value of {min}."));
            }
            if let Some(max) = max.filter(|max| number > *max) {
                return Err(format!("{number} is greater than the max allowed value of {max}."));
            }
            Ok(())
        }
        FieldKind::Date => match value.as_str() {
            Some(text) if DateTime::parse_from_rfc3339(text).is_ok() => Ok(()),
            _ => Err(format!("{value} is not a valid date.")),
        },
        FieldKind::Checkbox => value
            .as_bool()
            .map(|_| ())
            .ok_or_else(|| "This field can only be equal to true or false.".into()),
        FieldKind::Radio { options } => selection(options, value, false),
        FieldKind::Select { options, has_many } => selection(options, value, *has_many),
        FieldKind::Array { min_rows, max_rows, .. } => {
            let rows = value.as_array().ok_or("This field must be a list of rows.")?;
            row_count(rows.len(), *min_rows, *max_rows)
        }
        FieldKind::Blocks { blocks, min_rows, max_rows } => {
            let items = value.as_array().ok_or("This field must be a list of blocks.")?;
            for item in items {
                let slug = item.get(BLOCK_DISCRIMINATOR).and_then(Value::as_str);
                match slug {
                    Some(slug) if blocks.iter().any(|b| b.slug == slug) => {}
                    Some(slug) => return Err(format!("Block type {slug} is not allowed.")),
                    None => return Err(format!("Every block needs a {BLOCK_DISCRIMINATOR}.")),
                }
            }
            row_count(items.len(), *min_rows, *max_rows)
        }
        _ => Ok(()),
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn length(text: &str, min: Option<usize>, max: Option<usize>) -> Result<(), String> {
    let len = text.chars().count();
    if let Some(min) = min.filter(|min| len < *min) {
        return Err(format!(
            "This value must be longer than the minimum length of {min} characters."
        ));
    }
    if let Some(max) = max.filter(|max| len > *max) {
        return Err(format!(
            "This value must be shorter than the max length of {max} characters."
        ));
    }
    Ok(())
}

fn row_count(count: usize, min: Option<usize>, max: Option<usize>) -> Result<(), String> {
    if let Some(min) = min.filter(|min| count < *min) {
        return Err(format!("This field requires at least {min} row(s)."));
    }
    if let Some(max) = max.filter(|max| count > *max) {
        return Err(format!("This field requires no more than {max} row(s)."));
    }
    Ok(())
}

fn selection(options: &[SelectOption], value: &Value, many: bool) -> Result<(), String> {
    let allowed = |v: &Value| {
        v.as_str()
            .is_some_and(|s| options.iter().any(|o| o.value() == s))
    };
    let valid = match value {
        Value::Array(items) if many => items.iter().all(allowed),
        single if !many => allowed(single),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err("This field has an invalid selection.".into())
    }
}

fn is_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = address.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
