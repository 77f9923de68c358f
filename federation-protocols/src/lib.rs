//! Protocol adapters, routing and inbound receipt.
//!
//! - [`ProtocolAdapter`] is implemented once per protocol:
//!   [`activitypub::ActivityPubAdapter`] (JSON-LD, URL-addressed) and
//!   [`diaspora::DiasporaAdapter`] (XML magic envelopes, handle-addressed)
//! - [`ProtocolRegistry`] maps a [`ProtocolName`](federation_types::ProtocolName)
//!   to its adapter and identifies recipients and payloads
//! - [`InboundReceiver`] parses, verifies and maps incoming payloads
//!
//! All failures use the [`FederationError`] taxonomy.

pub mod activitypub;
pub mod adapter;
pub mod diaspora;
mod error;
mod receiver;
mod registry;

pub use adapter::{
    ParsedPayload, ProtocolAdapter, WireDocument, WirePayload, CONTENT_TYPE_ACTIVITY,
    CONTENT_TYPE_JSON, CONTENT_TYPE_MAGIC_ENVELOPE,
};
pub use error::{FederationError, FederationResult};
pub use receiver::{
    InboundReceiver, KeyFetcher, Receipt, ReceiptStage, StaticKeyFetcher, Verification,
};
pub use registry::ProtocolRegistry;
