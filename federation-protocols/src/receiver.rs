//! Inbound receipt and verification.
//!
//! A payload moves through [`ReceiptStage`]s in order. Nothing is returned to
//! the caller before the signature is verified, unless verification was
//! explicitly skipped. A verified entity is attributed to the verified
//! sender, or for relayed content to the author whose own signature it
//! carries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use federation_model::Entity;
use federation_types::{ProtocolName, PublicKey, UserIdentity};
use tracing::{debug, warn};

use crate::error::{FederationError, FederationResult};
use crate::registry::ProtocolRegistry;

/// Resolves an actor's public key.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    /// Returns `None` when the actor has no known key.
    async fn fetch_key(&self, actor_id: &str) -> FederationResult<Option<PublicKey>>;
}

/// A fixed actor → key table.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyFetcher {
    keys: HashMap<String, PublicKey>,
}

impl StaticKeyFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, actor_id: impl Into<String>, key: PublicKey) -> Self {
        self.keys.insert(actor_id.into(), key);
        self
    }
}

#[async_trait]
impl KeyFetcher for StaticKeyFetcher {
    async fn fetch_key(&self, actor_id: &str) -> FederationResult<Option<PublicKey>> {
        Ok(self.keys.get(actor_id).cloned())
    }
}

/// Receipt state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStage {
    Unparsed,
    Parsed,
    ActorExtracted,
    Verified,
    VerificationSkipped,
    Delivered,
}

impl fmt::Display for ReceiptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReceiptStage::Unparsed => "unparsed",
            ReceiptStage::Parsed => "parsed",
            ReceiptStage::ActorExtracted => "actor-extracted",
            ReceiptStage::Verified => "verified",
            ReceiptStage::VerificationSkipped => "verification-skipped",
            ReceiptStage::Delivered => "delivered",
        };
        f.write_str(name)
    }
}

/// How the sender of a receipt was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Skipped,
}

/// A received entity and the actor that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub protocol: ProtocolName,
    pub actor_id: String,
    pub entity: Entity,
    pub verification: Verification,
}

/// Parses, verifies and maps inbound payloads.
#[derive(Clone)]
pub struct InboundReceiver {
    registry: Arc<ProtocolRegistry>,
    network_keys: Option<Arc<dyn KeyFetcher>>,
}

impl InboundReceiver {
    pub fn new(registry: Arc<ProtocolRegistry>) -> Self {
        Self {
            registry,
            network_keys: None,
        }
    }

    /// Key lookup used when a call passes no fetcher of its own.
    pub fn with_network_keys(mut self, fetcher: Arc<dyn KeyFetcher>) -> Self {
        self.network_keys = Some(fetcher);
        self
    }

    pub fn registry(&self) -> &Arc<ProtocolRegistry> {
        &self.registry
    }

    /// Identifies the protocol and receives the payload.
    pub async fn receive(
        &self,
        payload: &[u8],
        user: Option<&UserIdentity>,
        key_fetcher: Option<&dyn KeyFetcher>,
        skip_verification: bool,
    ) -> FederationResult<Receipt> {
        let protocol = self
            .registry
            .identify_payload(payload)
            .ok_or_else(|| FederationError::Routing("no protocol recognizes payload".into()))?;
        self.receive_as(protocol, payload, user, key_fetcher, skip_verification)
            .await
    }

    /// Receives a payload whose protocol is already known.
    pub async fn receive_as(
        &self,
        protocol: ProtocolName,
        payload: &[u8],
        user: Option<&UserIdentity>,
        key_fetcher: Option<&dyn KeyFetcher>,
        skip_verification: bool,
    ) -> FederationResult<Receipt> {
        let adapter = self.registry.get(protocol)?;
        debug!(%protocol, stage = %ReceiptStage::Unparsed, bytes = payload.len(), "receiving payload");

        let parsed = adapter.parse(payload, user)?;
        debug!(%protocol, stage = %ReceiptStage::Parsed, "payload parsed");
        let actor_id = parsed.actor_id.clone();
        debug!(%protocol, stage = %ReceiptStage::ActorExtracted, actor = %actor_id, "actor extracted");

        let verification = if skip_verification {
            warn!(%protocol, actor = %actor_id, stage = %ReceiptStage::VerificationSkipped, "signature verification skipped");
            Verification::Skipped
        } else {
            let key = self.resolve_key(&actor_id, key_fetcher).await?.ok_or_else(|| {
                warn!(%protocol, actor = %actor_id, "no public key for actor");
                FederationError::Authenticity(format!("no public key available for {actor_id}"))
            })?;
            if !adapter.verify(&parsed, &key) {
                warn!(%protocol, actor = %actor_id, "signature verification failed");
                return Err(FederationError::Authenticity(format!(
                    "signature does not match {actor_id}"
                )));
            }
            if let Some(author) = adapter.content_author(&parsed) {
                let author_key = if author == actor_id {
                    key.clone()
                } else {
                    self.resolve_key(&author, key_fetcher).await?.ok_or_else(|| {
                        warn!(%protocol, author = %author, "no public key for content author");
                        FederationError::Authenticity(format!(
                            "no public key available for {author}"
                        ))
                    })?
                };
                if !adapter.verify_content(&parsed, &author_key, &key) {
                    warn!(%protocol, actor = %actor_id, author = %author, "content signature verification failed");
                    return Err(FederationError::Authenticity(format!(
                        "content signature does not match {author}"
                    )));
                }
            }
            debug!(%protocol, stage = %ReceiptStage::Verified, actor = %actor_id, "signature verified");
            Verification::Verified
        };

        let entity = adapter.to_entity(&parsed)?;
        if verification == Verification::Verified {
            let attributed = adapter
                .content_author(&parsed)
                .unwrap_or_else(|| actor_id.clone());
            if entity.actor_id() != attributed {
                warn!(%protocol, actor = %actor_id, claimed = entity.actor_id(), "entity is attributed to another actor");
                return Err(FederationError::Authenticity(format!(
                    "{actor_id} cannot deliver content attributed to {}",
                    entity.actor_id()
                )));
            }
        }
        debug!(%protocol, stage = %ReceiptStage::Delivered, kind = entity.kind().as_str(), "entity delivered");
        Ok(Receipt {
            protocol,
            actor_id,
            entity,
            verification,
        })
    }

    async fn resolve_key(
        &self,
        actor_id: &str,
        key_fetcher: Option<&dyn KeyFetcher>,
    ) -> FederationResult<Option<PublicKey>> {
        match (key_fetcher, &self.network_keys) {
            (Some(fetcher), _) => fetcher.fetch_key(actor_id).await,
            (None, Some(network)) => network.fetch_key(actor_id).await,
            (None, None) => Ok(None),
        }
    }
}

impl fmt::Debug for InboundReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundReceiver")
            .field("registry", &self.registry)
            .field("network_keys", &self.network_keys.is_some())
            .finish()
    }
}
