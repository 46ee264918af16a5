//! Error types and handling for the pickup locator

use thiserror::Error;

/// Main error type for location resolution and venue recommendation
///
/// Only `InvalidInput`, `UnresolvableLocation` and `Cancelled` ever reach callers of
/// the recommendation facade. The remaining variants are produced by individual
/// providers and absorbed by the fallback chains.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocatorError {
    /// Malformed query, rejected before any network call
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Every geocoding provider failed or returned no match
    #[error("Location could not be resolved: {query}")]
    UnresolvableLocation { query: String },

    /// A provider did not answer within its time budget
    #[error("Provider '{provider}' timed out after {timeout_ms} ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    /// A provider answered with an error or an unparseable payload
    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,
}

impl LocatorError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new unresolvable location error
    pub fn unresolvable<S: Into<String>>(query: S) -> Self {
        Self::UnresolvableLocation {
            query: query.into(),
        }
    }

    /// Create a new provider error
    pub fn provider<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error may cross the facade boundary
    #[must_use]
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::UnresolvableLocation { .. } | Self::Cancelled
        )
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            LocatorError::InvalidInput { message } => format!("Invalid input: {message}"),
            LocatorError::UnresolvableLocation { .. } => {
                "Location could not be found. Try a different address or zip code.".to_string()
            }
            LocatorError::ProviderTimeout { .. } | LocatorError::Provider { .. } => {
                "Unable to reach location services. Please check your internet connection."
                    .to_string()
            }
            LocatorError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            LocatorError::Cancelled => "Request cancelled.".to_string(),
        }
    }
}
