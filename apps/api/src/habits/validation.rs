use crate::errors::AppError;

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_REASON_CHARS: usize = 500;

/// Trims the name and checks it holds 1–50 characters.
pub fn validate_habit_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 {
        return Err(AppError::InvalidName("name must not be empty".to_string()));
    }
    if len > MAX_NAME_CHARS {
        return Err(AppError::InvalidName(format!(
            "name must be at most {MAX_NAME_CHARS} characters (got {len})"
        )));
    }
    Ok(name.to_string())
}

/// Trims the reason. Blank reasons collapse to `None`.
pub fn normalize_reason(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(reason) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    let len = reason.chars().count();
    if len > MAX_REASON_CHARS {
        return Err(AppError::InvalidReason(format!(
            "reason must be at most {MAX_REASON_CHARS} characters (got {len})"
        )));
    }
    Ok(Some(reason.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(validate_habit_name("  No smoking ").unwrap(), "No smoking");
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            validate_habit_name("   "),
            Err(AppError::InvalidName(_))
        ));
    }

    #[test]
    fn test_name_limit_counts_characters_not_bytes() {
        let cyrillic = "ж".repeat(50);
        assert!(validate_habit_name(&cyrillic).is_ok());
        assert!(validate_habit_name(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_blank_reason_becomes_none() {
        assert_eq!(normalize_reason(Some("  ")).unwrap(), None);
        assert_eq!(normalize_reason(None).unwrap(), None);
    }

    #[test]
    fn test_long_reason_rejected() {
        let reason = "x".repeat(501);
        assert!(matches!(
            normalize_reason(Some(&reason)),
            Err(AppError::InvalidReason(_))
        ));
        assert!(normalize_reason(Some(&"x".repeat(500))).is_ok());
    }
}
