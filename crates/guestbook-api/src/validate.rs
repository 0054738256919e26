//! Field rules for request bodies. Strings are trimmed first and an empty
//! result counts as missing.

use crate::error::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Records a "required" error when `value` is absent or blank and returns the
/// trimmed value otherwise.
pub fn required(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
    }
}

pub fn email(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    let value = required(errors, field, value)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Some(value)
        }
        _ => {
            errors.add(field, format!("The {field} must be a valid email address."));
            None
        }
    }
}

/// Passwords are not trimmed.
pub fn password(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !v.is_empty() => {
            if v.chars().count() < MIN_PASSWORD_LEN {
                errors.add(
                    field,
                    format!("The {field} must be at least {MIN_PASSWORD_LEN} characters."),
                );
                None
            } else {
                Some(v.to_string())
            }
        }
        _ => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
    }
}
