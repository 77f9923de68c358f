//! Protocol selection.
//!
//! The registry maps [`ProtocolName`] to an adapter and answers the two
//! identification questions: which protocol a recipient speaks, and which
//! protocol produced a raw payload. Both are shape heuristics.

use std::collections::BTreeMap;
use std::sync::Arc;

use federation_crypto::{Ed25519Scheme, PayloadCipher, SealedBoxCipher, SignatureScheme};
use federation_types::ProtocolName;
use tracing::debug;

use crate::activitypub::ActivityPubAdapter;
use crate::adapter::ProtocolAdapter;
use crate::diaspora::DiasporaAdapter;
use crate::error::{FederationError, FederationResult};

/// Adapters indexed by protocol name.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    adapters: BTreeMap<ProtocolName, Arc<dyn ProtocolAdapter>>,
}

impl ProtocolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Both bundled protocols, signing with `scheme` and encrypting with `cipher`.
    pub fn with_crypto(scheme: Arc<dyn SignatureScheme>, cipher: Arc<dyn PayloadCipher>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ActivityPubAdapter::new(scheme.clone())));
        registry.register(Arc::new(DiasporaAdapter::new(scheme, cipher)));
        registry
    }

    /// Both bundled protocols with Ed25519 signatures and sealed-box encryption.
    pub fn with_defaults() -> Self {
        Self::with_crypto(Arc::new(Ed25519Scheme), Arc::new(SealedBoxCipher))
    }

    /// Adds or replaces the adapter for its protocol.
    pub fn register(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    pub fn get(&self, protocol: ProtocolName) -> FederationResult<Arc<dyn ProtocolAdapter>> {
        self.adapters
            .get(&protocol)
            .cloned()
            .ok_or_else(|| FederationError::Routing(format!("no adapter registered for {protocol}")))
    }

    /// Registered protocols, in identification order.
    pub fn protocols(&self) -> impl Iterator<Item = ProtocolName> + '_ {
        self.adapters.keys().copied()
    }

    /// Chooses a protocol from the shape of a recipient identifier.
    pub fn identify_recipient_protocol(&self, id: &str) -> FederationResult<ProtocolName> {
        self.adapters
            .values()
            .find(|adapter| adapter.identify_id(id))
            .map(|adapter| adapter.name())
            .ok_or_else(|| FederationError::Routing(format!("no protocol recognizes recipient {id}")))
    }

    /// Guesses which protocol produced `payload`.
    ///
    /// Candidates are tried in order; a candidate that cannot parse the
    /// payload simply does not match.
    pub fn identify_payload(&self, payload: &[u8]) -> Option<ProtocolName> {
        for adapter in self.adapters.values() {
            if adapter.identify_payload(payload) {
                return Some(adapter.name());
            }
            debug!(protocol = %adapter.name(), "payload not recognized, trying next protocol");
        }
        None
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}
