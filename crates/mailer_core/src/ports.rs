//! crates/mailer_core/src/ports.rs
//!
//! Defines the service contracts (traits) the composer depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the generative-text backend, the delivery webhook and the
//! settings storage.

use async_trait::async_trait;
use crate::domain::{Draft, Tone, WorkerConfig};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The generative-text backend or its transport failed.
    #[error("Text generation failed: {0}")]
    Generation(String),
    /// The webhook rejected the draft or could not be reached.
    /// `status` is present when the endpoint answered with a non-2xx code.
    #[error("Delivery failed{}: {}", .status.map(|s| format!(" with status {s}")).unwrap_or_default(), .message)]
    Delivery { status: Option<u16>, message: String },
    #[error("Settings storage failed: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Writes an email body from a free-form prompt. Returns an empty string
    /// when the backend produced no text.
    async fn generate_body(&self, prompt: &str) -> PortResult<String>;

    /// Rewrites an existing body into the requested tone, keeping its intent.
    async fn refine_body(&self, body: &str, tone: Tone) -> PortResult<String>;
}

#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Submits the draft to the configured endpoint. Exactly one attempt per call.
    async fn send(&self, draft: &Draft, config: &WorkerConfig) -> PortResult<()>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads the persisted configuration; absent values load as empty strings.
    async fn load(&self) -> PortResult<WorkerConfig>;

    /// Overwrites both persisted values.
    async fn save(&self, config: &WorkerConfig) -> PortResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_mentions_status_when_known() {
        let err = PortError::Delivery {
            status: Some(502),
            message: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Delivery failed with status 502: Bad Gateway");

        let err = PortError::Delivery {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Delivery failed: connection refused");
    }
}
