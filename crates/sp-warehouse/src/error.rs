//! Error types for sp-warehouse

use thiserror::Error;

/// Failures of an external capability call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// Network failure, throttling or a server-side outage (W001)
    #[error("[W001] {service} unavailable: {message}")]
    Transient {
        service: &'static str,
        message: String,
    },

    /// Definitive rejection; retrying will not help (W002)
    #[error("[W002] {service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    /// A single attempt exceeded its time budget (W003)
    #[error("[W003] {service} timed out after {timeout_ms}ms")]
    Timeout {
        service: &'static str,
        timeout_ms: u64,
    },

    /// Missing host, token or warehouse id (W004)
    #[error("[W004] {service} is not configured: {message}")]
    NotConfigured {
        service: &'static str,
        message: String,
    },

    /// The service answered with something we could not interpret (W005)
    #[error("[W005] Unexpected response from {service}: {message}")]
    UnexpectedResponse {
        service: &'static str,
        message: String,
    },
}

impl CapabilityError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CapabilityError::Transient { .. } | CapabilityError::Timeout { .. }
        )
    }

    pub fn service(&self) -> &'static str {
        match self {
            CapabilityError::Transient { service, .. }
            | CapabilityError::Rejected { service, .. }
            | CapabilityError::Timeout { service, .. }
            | CapabilityError::NotConfigured { service, .. }
            | CapabilityError::UnexpectedResponse { service, .. } => service,
        }
    }
}

/// Result type alias for CapabilityError
pub type CapabilityResult<T> = Result<T, CapabilityError>;
