use crate::utils::error::{Result, RootfixError};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> RootfixError {
    RootfixError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            &value.to_string(),
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_list(field_name: &str, values: &[String]) -> Result<()> {
    if values.iter().all(|v| v.trim().is_empty()) {
        return Err(invalid(field_name, "", "At least one entry is required"));
    }
    Ok(())
}

/// Marker identities end up inside HTML comments, so they stay in a narrow alphabet.
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(field_name, value, "Identifier cannot be empty"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-'))
    {
        return Err(invalid(
            field_name,
            value,
            "Only letters, digits, '_', ':' and '-' are allowed",
        ));
    }
    Ok(())
}

/// Characters accepted in a deployment sub-path. The value is embedded in a
/// JavaScript string literal, so quotes and backslashes are never allowed.
pub fn validate_url_path(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be empty or whitespace-only"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.' | '~' | '%')))
    {
        return Err(invalid(
            field_name,
            value,
            format!("Unsupported character '{}' in URL path", bad),
        ));
    }
    Ok(())
}
