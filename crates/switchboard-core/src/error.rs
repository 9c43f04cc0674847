use thiserror::Error;

/// A convenience `Result` alias using [`SwitchboardError`].
pub type SwitchboardResult<T> = Result<T, SwitchboardError>;

/// Top-level error type for the gateway.
///
/// Variants are classified by *what went wrong*, not by which component
/// raised them, so the HTTP layer can map any of them to a status code and
/// the channel adapters can decide whether to apologise in-band.
#[derive(Error, Debug)]
pub enum SwitchboardError {
    /// Malformed or out-of-range input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A capability is missing the credentials or settings it needs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An upstream service did not answer within its time bound.
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// An upstream service could not be reached at all.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An upstream service answered with a failure (non-2xx or embedded status).
    #[error("Upstream error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        /// HTTP or embedded status code, when one was reported.
        status: Option<i64>,
        /// Redacted upstream status message.
        message: String,
    },

    /// The upstream service rejected the request with HTTP 429.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The upstream service rejected our credentials (HTTP 401/403).
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Audio payload did not carry a recognized container header.
    #[error("Invalid audio format: {0}")]
    InvalidAudioFormat(String),

    /// A referenced entity (session) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An outbound send to a messaging platform failed.
    #[error("Channel error: {0}")]
    Channel(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwitchboardError {
    /// Shorthand for an [`SwitchboardError::Upstream`] with a status code.
    pub fn upstream(status: Option<i64>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in API error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Configuration(_) => "configuration_error",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Upstream { .. } => "upstream_error",
            Self::RateLimited(_) => "rate_limited",
            Self::AuthFailed(_) => "auth_failed",
            Self::InvalidAudioFormat(_) => "invalid_audio_format",
            Self::NotFound(_) => "not_found",
            Self::Channel(_) => "channel_error",
            Self::Json(_) => "invalid_json",
            Self::Io(_) => "io_error",
        }
    }

    /// HTTP status the direct API answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Json(_) => 400,
            Self::NotFound(_) => 404,
            Self::RateLimited(_) => 429,
            Self::Upstream { .. }
            | Self::AuthFailed(_)
            | Self::InvalidAudioFormat(_)
            | Self::Channel(_) => 502,
            Self::Configuration(_) | Self::UpstreamUnavailable(_) => 503,
            Self::UpstreamTimeout(_) => 504,
            Self::Io(_) => 500,
        }
    }

    /// Whether the failure came from a remote service rather than the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout(_)
                | Self::UpstreamUnavailable(_)
                | Self::Upstream { .. }
                | Self::RateLimited(_)
                | Self::AuthFailed(_)
        )
    }
}
