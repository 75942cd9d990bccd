//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings that are empty once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Game night") // Ok
/// validate_not_blank("   ")        // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects lists holding a blank entry.
pub fn validate_names(names: &[String]) -> Result<(), ValidationError> {
    if let Some(position) = names.iter().position(|name| name.trim().is_empty()) {
        let mut err = ValidationError::new("blank_name");
        err.message = Some(format!("name #{} must not be blank", position + 1).into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Game night").is_ok());
        assert!(validate_not_blank(" x ").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t ").is_err());
    }

    #[test]
    fn test_validate_names() {
        assert!(validate_names(&["Ana".into(), "Bo".into()]).is_ok());
        assert!(validate_names(&[]).is_ok());
        let err = validate_names(&["Ana".into(), " ".into()]).unwrap_err();
        assert_eq!(err.message.as_deref(), Some("name #2 must not be blank"));
    }
}
