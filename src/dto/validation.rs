//! Validation helpers for DTOs.

use validator::ValidationError;

pub const MAX_USERNAME_LEN: usize = 32;

/// Usernames are shown on the leaderboard: non-blank, at most 32 characters,
/// and free of control characters.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        let mut err = ValidationError::new("username_blank");
        err.message = Some("Username must not be blank".into());
        return Err(err);
    }

    let len = username.chars().count();
    if len > MAX_USERNAME_LEN {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be at most {MAX_USERNAME_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    if username.chars().any(char::is_control) {
        let mut err = ValidationError::new("username_format");
        err.message = Some("Username must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("ada").is_ok());
        assert!(validate_username("Grace Hopper").is_ok());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN)).is_ok());
    }

    #[test]
    fn test_validate_username_blank() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
    }

    #[test]
    fn test_validate_username_too_long() {
        let err = validate_username(&"x".repeat(MAX_USERNAME_LEN + 1)).unwrap_err();
        assert_eq!(err.code, "username_length");
    }

    #[test]
    fn test_validate_username_control_chars() {
        assert!(validate_username("ada\nlovelace").is_err());
    }
}
