//! Error taxonomy for federation operations.

use federation_crypto::CryptoError;
use federation_model::MappingError;
use thiserror::Error;

/// Result type for federation operations.
pub type FederationResult<T> = Result<T, FederationError>;

/// Errors raised while mapping, routing, receiving or delivering payloads.
#[derive(Debug, Error)]
pub enum FederationError {
    /// A required attribute was missing during wire conversion.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// No adapter matches a recipient or payload.
    #[error("routing error: {0}")]
    Routing(String),

    /// The wire payload is malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Signature verification failed or could not be attempted.
    #[error("authenticity error: {0}")]
    Authenticity(String),

    /// Transport-level send or fetch failure for one destination.
    #[error("delivery to {url} failed: {reason}")]
    Delivery { url: String, reason: String },

    /// Signing or encryption failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl FederationError {
    /// Shorthand for a delivery failure.
    pub fn delivery(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Delivery {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
