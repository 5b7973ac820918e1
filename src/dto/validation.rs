//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a chat message is non-empty after trimming and at most
/// 300 characters long.
///
/// # Examples
///
/// ```ignore
/// validate_chat_text("hello")   // Ok
/// validate_chat_text("   ")     // Err - blank
/// validate_chat_text(&long_301) // Err - too long
/// ```
pub fn validate_chat_text(text: &str) -> Result<(), ValidationError> {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        let mut err = ValidationError::new("chat_text_empty");
        err.message = Some("Message cannot be empty.".into());
        return Err(err);
    }

    if trimmed.chars().count() > 300 {
        let mut err = ValidationError::new("chat_text_length");
        err.message = Some("Message is too long (max 300 characters).".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_chat_text_valid() {
        assert!(validate_chat_text("hello").is_ok());
        assert!(validate_chat_text("  padded  ").is_ok());
        assert!(validate_chat_text(&"x".repeat(300)).is_ok());
    }

    #[test]
    fn test_validate_chat_text_blank() {
        assert!(validate_chat_text("").is_err());
        assert!(validate_chat_text("   ").is_err());
        assert!(validate_chat_text("\n\t").is_err());
    }

    #[test]
    fn test_validate_chat_text_too_long() {
        assert!(validate_chat_text(&"x".repeat(301)).is_err());
        // Surrounding whitespace does not count against the limit.
        let padded = format!("  {}  ", "x".repeat(300));
        assert!(validate_chat_text(&padded).is_ok());
    }
}
