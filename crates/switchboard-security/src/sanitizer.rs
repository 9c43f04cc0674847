/// Longest user message forwarded to the dialogue engine.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 5000;

/// Input sanitizer applied to every user message before it leaves the gateway.
///
/// Strips control characters (which poison logs and confuse the NLU
/// tokenizer), trims surrounding whitespace and enforces a length limit
/// measured in characters, not bytes.
pub struct Sanitizer {
    max_message_chars: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }
}

impl Sanitizer {
    pub fn new(max_message_chars: usize) -> Self {
        Self { max_message_chars }
    }

    /// Sanitize a user message.
    pub fn sanitize(&self, input: &str) -> SanitizeResult {
        let cleaned: String = input
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect();
        let trimmed = cleaned.trim();

        if trimmed.is_empty() {
            return SanitizeResult::Rejected("Message cannot be empty".to_string());
        }
        if trimmed.chars().count() > self.max_message_chars {
            return SanitizeResult::Rejected(format!(
                "Message too long (max {} characters)",
                self.max_message_chars
            ));
        }

        if trimmed != input {
            SanitizeResult::Cleaned(trimmed.to_string())
        } else {
            SanitizeResult::Clean(trimmed.to_string())
        }
    }

    /// Sanitize header and form values before they are logged.
    pub fn sanitize_header(&self, value: &str) -> String {
        value
            .chars()
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .take(256)
            .collect()
    }
}

#[derive(Debug, PartialEq)]
pub enum SanitizeResult {
    /// Input was already clean.
    Clean(String),
    /// Input was cleaned (control characters or padding removed).
    Cleaned(String),
    /// Input was rejected entirely, with the reason.
    Rejected(String),
}

impl SanitizeResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SanitizeResult::Rejected(_))
    }

    /// The sanitized text, or the rejection reason as `Err`.
    pub fn into_result(self) -> Result<String, String> {
        match self {
            SanitizeResult::Clean(s) | SanitizeResult::Cleaned(s) => Ok(s),
            SanitizeResult::Rejected(reason) => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input() {
        let s = Sanitizer::default();
        let result = s.sanitize("Hello world\nNew line");
        assert!(matches!(result, SanitizeResult::Clean(_)));
    }

    #[test]
    fn test_control_chars_stripped() {
        let s = Sanitizer::default();
        let result = s.sanitize("Hello\x00\x01\x02World");
        assert_eq!(result, SanitizeResult::Cleaned("HelloWorld".to_string()));
    }

    #[test]
    fn test_whitespace_only_rejected() {
        let s = Sanitizer::default();
        assert!(s.sanitize("   \n\t ").is_rejected());
        assert!(s.sanitize("\x07").is_rejected());
    }

    #[test]
    fn test_length_counts_chars() {
        let s = Sanitizer::new(5);
        assert!(!s.sanitize("ééééé").is_rejected());
        assert!(s.sanitize("éééééé").is_rejected());
    }

    #[test]
    fn test_header_sanitization() {
        let s = Sanitizer::default();
        let clean = s.sanitize_header("normal-value\x00\x1b[31minjected\x1b[0m");
        assert!(!clean.contains('\x00'));
        assert!(!clean.contains('\x1b'));
    }
}
