//! The provider request seam.
//!
//! Transport, retry/backoff and credentials are external concerns: the
//! engine only needs a way to issue a named service operation and to tell
//! an expected "not found" apart from a real failure. Embedders inject an
//! implementation; tests use a call-recording mock.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::Error;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn request(
        &self,
        service: &str,
        operation: &str,
        params: Value,
        stage: &str,
        region: &str,
    ) -> std::result::Result<Value, ProviderFailure>;
}

/// A failed provider request. `NotFound` is recoverable at existence
/// checks; everything else is fatal for the deploy unit.
#[derive(Debug, Error)]
pub enum ProviderFailure {
    #[error("{service}.{operation}: resource not found: {message}")]
    NotFound {
        service: String,
        operation: String,
        message: String,
    },

    #[error("{service}.{operation}: {message}")]
    Request {
        service: String,
        operation: String,
        message: String,
    },
}

impl ProviderFailure {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderFailure::NotFound { .. })
    }
}

impl From<ProviderFailure> for Error {
    fn from(failure: ProviderFailure) -> Self {
        match failure {
            ProviderFailure::NotFound {
                service,
                operation,
                message,
            }
            | ProviderFailure::Request {
                service,
                operation,
                message,
            } => Error::Provider {
                service,
                operation,
                message,
            },
        }
    }
}
