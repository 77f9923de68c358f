//! The per-protocol adapter contract.
//!
//! An adapter converts entities to and from one protocol's wire format, signs
//! outbound payloads, checks inbound signatures and resolves delivery
//! endpoints. The registry selects adapters by [`ProtocolName`].

use federation_crypto::AuthToken;
use federation_model::{Entity, EntityKind};
use federation_types::{ProtocolName, PublicKey, Recipient, UserIdentity};

use crate::diaspora::XmlElement;
use crate::error::FederationResult;

/// `Content-Type` of activity documents.
pub const CONTENT_TYPE_ACTIVITY: &str = "application/activity+json";
/// `Content-Type` of encrypted single-recipient envelopes.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `Content-Type` of public magic envelopes.
pub const CONTENT_TYPE_MAGIC_ENVELOPE: &str = "application/magic-envelope+xml";

/// A built outbound payload, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePayload {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

impl WirePayload {
    /// The body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A protocol's native document.
#[derive(Debug, Clone, PartialEq)]
pub enum WireDocument {
    Json(serde_json::Value),
    Xml(XmlElement),
}

/// An inbound payload after parsing and actor extraction, before verification.
#[derive(Debug, Clone)]
pub struct ParsedPayload {
    pub protocol: ProtocolName,
    /// The identity the payload claims to come from.
    pub actor_id: String,
    /// Bytes covered by the signature.
    pub signed_data: Vec<u8>,
    /// Raw signature, if the payload carried one.
    pub signature: Option<Vec<u8>>,
    pub document: WireDocument,
}

/// One federation protocol.
pub trait ProtocolAdapter: Send + Sync {
    fn name(&self) -> ProtocolName;

    /// Whether a recipient identifier has this protocol's shape.
    fn identify_id(&self, id: &str) -> bool;

    /// Whether raw bytes look like this protocol's payload.
    ///
    /// Parse failures count as "not this protocol".
    fn identify_payload(&self, payload: &[u8]) -> bool;

    /// Maps, signs and encodes `entity`.
    ///
    /// `parent_author`, when given, adds a chained signature and becomes the
    /// sending identity for protocols that support it. A `recipient` carrying
    /// a key gets a payload only it can use.
    fn build_send(
        &self,
        entity: &Entity,
        author: &UserIdentity,
        parent_author: Option<&UserIdentity>,
        recipient: Option<&Recipient>,
    ) -> FederationResult<WirePayload>;

    /// Transport-layer authentication to attach to deliveries, if any.
    fn http_auth(&self, author: &UserIdentity) -> Option<AuthToken>;

    /// Where to deliver for `recipient`.
    fn delivery_endpoint(&self, recipient: &Recipient, private: bool) -> FederationResult<String>;

    /// Parses a payload and extracts the claimed actor.
    ///
    /// `user` is the receiving identity, needed to open private payloads.
    fn parse(&self, payload: &[u8], user: Option<&UserIdentity>) -> FederationResult<ParsedPayload>;

    /// Checks the payload's signature against the actor's key.
    fn verify(&self, parsed: &ParsedPayload, key: &PublicKey) -> bool;

    /// Author whose own signature the document carries, for protocols where
    /// content can be relayed by someone other than its author.
    fn content_author(&self, _parsed: &ParsedPayload) -> Option<String> {
        None
    }

    /// Checks the signatures embedded in the document.
    ///
    /// `author_key` belongs to [`content_author`](Self::content_author) and
    /// `signer_key` to the payload's signer.
    fn verify_content(
        &self,
        _parsed: &ParsedPayload,
        _author_key: &PublicKey,
        _signer_key: &PublicKey,
    ) -> bool {
        true
    }

    /// Maps a parsed document to an entity.
    fn to_entity(&self, parsed: &ParsedPayload) -> FederationResult<Entity>;

    /// URL to retrieve a remote entity from.
    fn remote_content_url(
        &self,
        id: &str,
        guid: Option<&str>,
        handle: Option<&str>,
        entity_type: Option<EntityKind>,
    ) -> FederationResult<String>;
}
