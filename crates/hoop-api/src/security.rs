//! Input sanitization utilities.

/// Maximum title length accepted on a highlight update.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Trim and cap a user-supplied title for storage.
pub fn sanitize_title(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() > MAX_TITLE_LENGTH {
        trimmed.chars().take(MAX_TITLE_LENGTH).collect()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_title_trims_whitespace() {
        assert_eq!(sanitize_title("  Game Winner  "), "Game Winner");
    }

    #[test]
    fn sanitize_title_caps_length() {
        let long = "x".repeat(MAX_TITLE_LENGTH + 50);
        assert_eq!(sanitize_title(&long).len(), MAX_TITLE_LENGTH);
    }
}
