use switchboard_core::{SwitchboardError, SwitchboardResult, DEFAULT_LANGUAGE};

/// Longest text accepted for synthesis, in characters.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Languages the speech backend accepts directly.
const SUPPORTED_LANGUAGES: &[&str] = &["en"];

/// Dialects the backend does not know, mapped to the closest supported language.
const DIALECTS: &[(&str, &str)] = &[("pidgin", "en"), ("pcm", "en")];

const PIDGIN_MARKERS: &[&str] = &["abeg", "una", "dey", "wetin", "na", "go", "come", "don"];

/// Trim and bound text for synthesis.
pub fn validate_text(text: &str) -> SwitchboardResult<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SwitchboardError::Validation(
            "Text cannot be empty or whitespace-only".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(SwitchboardError::Validation(format!(
            "Text exceeds maximum length of {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(trimmed)
}

/// Map a language tag onto one the backend supports.
///
/// `pidgin`, `en-NG`, `EN_us` and friends become `en`; anything unknown falls
/// back to the default language.
pub fn normalize_language(language: Option<&str>) -> &'static str {
    let Some(tag) = language.map(|l| l.trim().to_ascii_lowercase()) else {
        return DEFAULT_LANGUAGE;
    };
    if let Some(found) = supported(&tag) {
        return found;
    }
    if let Some((_, base)) = DIALECTS.iter().find(|(dialect, _)| *dialect == tag) {
        return *base;
    }
    tag.split(['-', '_'])
        .next()
        .and_then(supported)
        .unwrap_or(DEFAULT_LANGUAGE)
}

fn supported(tag: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES.iter().copied().find(|l| *l == tag)
}

/// Keyword heuristic: `pidgin` when the text uses Nigerian Pidgin markers,
/// otherwise `en`.
pub fn detect_language(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let is_pidgin = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| PIDGIN_MARKERS.contains(&word));
    if is_pidgin {
        "pidgin"
    } else {
        DEFAULT_LANGUAGE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text_bounds() {
        assert_eq!(validate_text("  hello  ").unwrap(), "hello");
        assert!(validate_text(&"a".repeat(MAX_TEXT_CHARS)).is_ok());
        assert!(matches!(
            validate_text(&"a".repeat(MAX_TEXT_CHARS + 1)),
            Err(SwitchboardError::Validation(_))
        ));
        assert!(validate_text(" \n\t").is_err());
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(None), "en");
        assert_eq!(normalize_language(Some("EN")), "en");
        assert_eq!(normalize_language(Some("pidgin")), "en");
        assert_eq!(normalize_language(Some("en-NG")), "en");
        assert_eq!(normalize_language(Some("en_US")), "en");
        assert_eq!(normalize_language(Some("klingon")), "en");
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("Abeg, wetin dey happen?"), "pidgin");
        assert_eq!(detect_language("I want to book a table"), "en");
        // Whole words only: "good" does not contain the marker "go" as a word.
        assert_eq!(detect_language("good morning"), "en");
    }
}
