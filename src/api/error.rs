//! Report repository error types with retry classification

use std::fmt;

/// Errors that can occur when talking to the report backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401 Unauthorized - credential rejected
    Unauthorized { provider: String },
    /// 403 Forbidden - credential lacks access to the announcement
    Forbidden { provider: String },
    /// 404 Not Found - announcement does not exist
    NotFound { provider: String },
    /// 429 Rate Limited
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },
    /// Network or timeout error
    NetworkError { provider: String, message: String },
    /// Other HTTP errors
    HttpError {
        provider: String,
        status: u16,
        message: String,
    },
    /// Response body did not match the expected shape
    DecodingError { provider: String, message: String },
    /// Cached photo could not be read for upload
    LocalFile { provider: String, message: String },
}

impl ApiError {
    /// Check if this is an authentication error (401 or 403)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. }
        )
    }

    /// Check if repeating the same request may succeed
    ///
    /// Network failures, rate limiting and 5xx responses are transient;
    /// everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkError { .. } | ApiError::RateLimited { .. } => true,
            ApiError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get the provider name for this error
    pub fn provider_name(&self) -> &str {
        match self {
            ApiError::Unauthorized { provider } => provider,
            ApiError::Forbidden { provider } => provider,
            ApiError::NotFound { provider } => provider,
            ApiError::RateLimited { provider, .. } => provider,
            ApiError::NetworkError { provider, .. } => provider,
            ApiError::HttpError { provider, .. } => provider,
            ApiError::DecodingError { provider, .. } => provider,
            ApiError::LocalFile { provider, .. } => provider,
        }
    }

    /// Get retry-after seconds if rate limited
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    pub fn unauthorized(provider: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            provider: provider.into(),
        }
    }

    pub fn forbidden(provider: impl Into<String>) -> Self {
        ApiError::Forbidden {
            provider: provider.into(),
        }
    }

    pub fn not_found(provider: impl Into<String>) -> Self {
        ApiError::NotFound {
            provider: provider.into(),
        }
    }

    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<u64>) -> Self {
        ApiError::RateLimited {
            provider: provider.into(),
            retry_after_secs: retry_after,
        }
    }

    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn http(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ApiError::HttpError {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn decoding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::DecodingError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn local_file(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::LocalFile {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized { provider } => {
                write!(f, "{}: Unauthorized (401) - credential rejected", provider)
            }
            ApiError::Forbidden { provider } => {
                write!(
                    f,
                    "{}: Forbidden (403) - insufficient permissions",
                    provider
                )
            }
            ApiError::NotFound { provider } => {
                write!(f, "{}: Not found (404)", provider)
            }
            ApiError::RateLimited {
                provider,
                retry_after_secs,
            } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "{}: Rate limited - retry after {}s", provider, secs)
                } else {
                    write!(f, "{}: Rate limited", provider)
                }
            }
            ApiError::NetworkError { provider, message } => {
                write!(f, "{}: Network error - {}", provider, message)
            }
            ApiError::HttpError {
                provider,
                status,
                message,
            } => {
                write!(f, "{}: HTTP {} - {}", provider, status, message)
            }
            ApiError::DecodingError { provider, message } => {
                write!(f, "{}: Unexpected response - {}", provider, message)
            }
            ApiError::LocalFile { provider, message } => {
                write!(f, "{}: Cannot read photo - {}", provider, message)
            }
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_error() {
        assert!(ApiError::unauthorized("test").is_auth_error());
        assert!(ApiError::forbidden("test").is_auth_error());
        assert!(!ApiError::not_found("test").is_auth_error());
        assert!(!ApiError::network("test", "timeout").is_auth_error());
    }

    #[test]
    fn test_is_retryable() {
        assert!(ApiError::network("test", "connection reset").is_retryable());
        assert!(ApiError::rate_limited("test", Some(5)).is_retryable());
        assert!(ApiError::http("test", 503, "unavailable").is_retryable());

        assert!(!ApiError::http("test", 400, "bad request").is_retryable());
        assert!(!ApiError::unauthorized("test").is_retryable());
        assert!(!ApiError::not_found("test").is_retryable());
        assert!(!ApiError::decoding("test", "missing field `id`").is_retryable());
        assert!(!ApiError::local_file("test", "gone").is_retryable());
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(ApiError::unauthorized("petspot").provider_name(), "petspot");
        assert_eq!(ApiError::decoding("mock", "x").provider_name(), "mock");
    }

    #[test]
    fn test_display() {
        let err = ApiError::rate_limited("petspot", Some(30));
        assert_eq!(err.to_string(), "petspot: Rate limited - retry after 30s");

        let err = ApiError::http("petspot", 500, "boom");
        assert_eq!(err.to_string(), "petspot: HTTP 500 - boom");
        assert_eq!(err.retry_after(), None);
    }
}
