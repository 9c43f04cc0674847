//! Redaction of credentials and user-identifying paths from free-form text.
//!
//! Every error message that reaches a log line or an HTTP error body goes
//! through [`Redactor::redact`]. Upstream HTTP errors are the main offender:
//! reqwest formats the request URL into its messages, and platform URLs such
//! as `https://api.telegram.org/bot<token>/sendMessage` embed the credential.

use regex::Regex;
use std::sync::LazyLock;

/// Placeholder substituted for every redacted span.
pub const REDACTED: &str = "[REDACTED]";

/// Literal secrets shorter than this are not worth scrubbing verbatim; they
/// would match innocent substrings.
const MIN_LITERAL_SECRET_LEN: usize = 6;

/// `(pattern, replacement)`; replacements may reference capture groups.
const PATTERNS: &[(&str, &str)] = &[
    // Credentialed connection strings.
    (
        r"(?i)\b(?:postgres(?:ql)?|mysql|mariadb|mongodb(?:\+srv)?|redis|amqps?)://[^\s@/]+@\S+",
        REDACTED,
    ),
    // URLs carrying userinfo.
    (r"(?i)\bhttps?://[^\s:/@]+:[^\s@/]+@\S+", REDACTED),
    // Secret-bearing query parameters.
    (
        r"(?i)([?&](?:api_key|apikey|access_token|token|key|secret|signature)=)[^&\s#]+",
        "${1}[REDACTED]",
    ),
    // Bearer tokens.
    (r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+", REDACTED),
    // api_key=..., api-key: ..., "apiKey": "..."
    (r#"(?i)\bapi[_\s-]*key["'\s:=]+[A-Za-z0-9._-]+"#, REDACTED),
    // token: <long value>
    (r#"(?i)\b(?:access[_-]?)?token["'\s:=]+[A-Za-z0-9._-]{10,}"#, REDACTED),
    // Telegram bot tokens (<bot id>:<35 char secret>), including inside /bot<token>/ paths.
    (r"\d{6,12}:[A-Za-z0-9_-]{30,}", REDACTED),
    // Common provider key prefixes.
    (r"\b(?:sk|pk|rk)-[A-Za-z0-9_-]{16,}", REDACTED),
    // ENV_VAR=value pairs.
    (r"\b[A-Z][A-Z0-9_]{2,}=\S+", REDACTED),
    // Home directories that leak user names.
    (r"/Users/[^/\s]+", "/Users/[REDACTED]"),
    (r"/home/[^/\s]+", "/home/[REDACTED]"),
    (r"(?i)C:\\Users\\[^\\/\s]+", r"C:\Users\[REDACTED]"),
];

static DEFAULT_REDACTOR: LazyLock<Redactor> = LazyLock::new(Redactor::default);

/// Redacts `text` with the default pattern set.
pub fn redact(text: &str) -> String {
    DEFAULT_REDACTOR.redact(text)
}

/// Pattern-based scrubber for credentials and user paths.
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<(Regex, &'static str)>,
    literals: Vec<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        let rules = PATTERNS
            .iter()
            .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
                Ok(re) => Some((re, *replacement)),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Skipping invalid redaction pattern");
                    None
                }
            })
            .collect();
        Self {
            rules,
            literals: Vec::new(),
        }
    }
}

impl Redactor {
    /// Default patterns plus the given configured secrets, scrubbed verbatim.
    pub fn with_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut redactor = Self::default();
        redactor.literals = secrets
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| s.len() >= MIN_LITERAL_SECRET_LEN)
            .collect();
        // Longest first so a secret that contains another is removed whole.
        redactor.literals.sort_by_key(|s| std::cmp::Reverse(s.len()));
        redactor
    }

    /// Returns `text` with every sensitive span replaced by [`REDACTED`].
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.literals {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        for (re, replacement) in &self.rules {
            if re.is_match(&out) {
                out = re.replace_all(&out, *replacement).into_owned();
            }
        }
        out
    }
}
