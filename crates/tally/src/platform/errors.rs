use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by a metrics source.
///
/// Ingestion only cares which bucket an error falls into, so the variants are
/// grouped by the classifiers below rather than by upstream status codes.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Every credential is out of quota and anonymous access is off.
    #[error("No credential available")]
    NoCredentialAvailable,

    /// The upstream rejected a request because the primary quota ran out.
    #[error("Rate limit exhausted{}", reset_suffix(.reset_at))]
    QuotaExhausted { reset_at: Option<DateTime<Utc>> },

    /// Resource not found.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Access blocked (403 or 451).
    #[error("Access blocked: {resource}")]
    AccessBlocked { resource: String },

    /// Secondary throttling that outlasted the retry budget.
    #[error("Throttled: {message}")]
    Throttled { message: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Any other API failure.
    #[error("API error: {message}")]
    Api { message: String },

    /// A response that could not be understood.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(". Resets at {at}"),
        None => String::new(),
    }
}

impl PlatformError {
    #[inline]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn access_blocked(resource: impl Into<String>) -> Self {
        Self::AccessBlocked {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// The credential pool cannot serve requests until a reset.
    #[inline]
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            Self::NoCredentialAvailable | Self::QuotaExhausted { .. }
        )
    }

    /// The repository itself is gone or blocked for us.
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::AccessBlocked { .. })
    }

    #[inline]
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// First line of an error message, for compact log fields.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
