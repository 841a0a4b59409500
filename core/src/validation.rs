//! Input validation helpers shared by the facade and the entity store.

use crate::error::{OrchestratorError, Result};

/// Normalizes a label to its canonical slug form (§4.3): lowercase,
/// brackets stripped, any run of non-alphanumeric characters collapsed to a
/// single underscore, leading/trailing underscores trimmed.
pub fn normalize_label(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| *c != '[' && *c != ']' && *c != '(' && *c != ')')
        .collect();

    let mut out = String::with_capacity(stripped.len());
    let mut last_was_sep = true; // swallow leading separators
    for c in stripped.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OrchestratorError::invalid(format!(
            "field '{field}' cannot be empty"
        )));
    }
    Ok(())
}

/// Validates a title/name field against a reasonable max length, matching
/// the entity store's existing shape for bounded text fields.
pub fn require_within_length(field: &str, value: &str, max_len: usize) -> Result<()> {
    require_non_empty(field, value)?;
    if value.len() > max_len {
        return Err(OrchestratorError::invalid(format!(
            "field '{field}' exceeds maximum length of {max_len} characters"
        )));
    }
    Ok(())
}

pub fn require_fraction(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(OrchestratorError::invalid(format!(
            "field '{field}' must be between 0.0 and 1.0"
        )));
    }
    Ok(())
}

pub fn require_percentage(field: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(OrchestratorError::invalid(format!(
            "field '{field}' must be between 0 and 100"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_whitespace_and_brackets() {
        assert_eq!(normalize_label("  [Backend API]  "), "backend_api");
        assert_eq!(normalize_label("Auth/JWT"), "auth_jwt");
        assert_eq!(normalize_label("already_ok"), "already_ok");
        assert_eq!(normalize_label("---"), "");
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(require_non_empty("title", "   ").is_err());
        assert!(require_non_empty("title", "ok").is_ok());
    }

    #[test]
    fn bounds_checks() {
        assert!(require_fraction("confidence", 1.5).is_err());
        assert!(require_fraction("confidence", 0.8).is_ok());
        assert!(require_percentage("progress", 150.0).is_err());
        assert!(require_percentage("progress", 75.0).is_ok());
    }
}
