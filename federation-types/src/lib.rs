//! Core type definitions for the federation layer.
//!
//! This crate defines the small, protocol-agnostic values that every other
//! crate in the workspace passes around:
//! - [`ProtocolName`], the enumerated set of supported federation protocols
//! - [`Recipient`], a delivery-time target (id, optional key, optional guid)
//! - [`PublicKey`] / [`PrivateKey`], opaque key material
//! - [`UserIdentity`], an authoring identity that can sign outbound payloads
//!
//! Nothing here knows about wire formats; see `federation-model` for entities
//! and `federation-protocols` for the protocol adapters.

mod identity;
mod ids;
mod keys;
mod recipient;

pub use identity::UserIdentity;
pub use ids::ProtocolName;
pub use keys::{PrivateKey, PublicKey};
pub use recipient::Recipient;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}
