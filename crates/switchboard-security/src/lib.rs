//! Security primitives for the Switchboard gateway.
//!
//! Provides secret redaction for logs and error bodies, inbound text
//! sanitization, per-client rate limiting, and the constant-time checks used
//! to authenticate platform webhooks.
//!
//! # Main types
//!
//! - [`Redactor`] - Strips credentials and user paths from free-form text.
//! - [`Sanitizer`] - Input sanitization for user messages and headers.
//! - [`RateLimiter`] - Token-bucket rate limiter for request throttling.

/// Token-bucket rate limiting.
pub mod rate_limit;
/// Secret and credential redaction.
pub mod redaction;
/// Input sanitization utilities.
pub mod sanitizer;
/// Constant-time secret comparison and webhook signatures.
pub mod secret;

pub use rate_limit::RateLimiter;
pub use redaction::{redact, Redactor, REDACTED};
pub use sanitizer::{SanitizeResult, Sanitizer, DEFAULT_MAX_MESSAGE_CHARS};
pub use secret::{constant_time_eq, sign_hub_payload, verify_hub_signature};
