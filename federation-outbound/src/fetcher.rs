//! Remote content and profile retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use federation_model::{Entity, EntityKind, Profile};
use federation_protocols::{
    FederationError, FederationResult, InboundReceiver, KeyFetcher, ProtocolRegistry,
    CONTENT_TYPE_MAGIC_ENVELOPE,
};
use federation_types::{ProtocolName, PublicKey};
use tracing::debug;

use crate::config::HttpTransportConfig;
use crate::transport::DeliveryTransport;

/// Fetches entities from their home servers.
///
/// Also acts as the network [`KeyFetcher`]: an actor's key is read from its
/// fetched profile. Only ActivityPub actors resolve; Diaspora handles always
/// yield `None`.
#[derive(Clone)]
pub struct RemoteFetcher {
    registry: Arc<ProtocolRegistry>,
    transport: Arc<dyn DeliveryTransport>,
    receiver: InboundReceiver,
    activity_accept: String,
}

impl RemoteFetcher {
    pub fn new(registry: Arc<ProtocolRegistry>, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            receiver: InboundReceiver::new(registry.clone()),
            registry,
            transport,
            activity_accept: HttpTransportConfig::default().activity_accept,
        }
    }

    /// Uses the `Accept` header configured for `config`'s transport.
    pub fn with_config(mut self, config: &HttpTransportConfig) -> Self {
        self.activity_accept = config.activity_accept.clone();
        self
    }

    /// Protocol of `id`, falling back to `handle`.
    fn guess_protocol(&self, id: &str, handle: Option<&str>) -> FederationResult<ProtocolName> {
        match (self.registry.identify_recipient_protocol(id), handle) {
            (Ok(protocol), _) => Ok(protocol),
            (Err(_), Some(handle)) => self.registry.identify_recipient_protocol(handle),
            (Err(e), None) => Err(e),
        }
    }

    /// Fetches and maps a remote entity, guessing its protocol from `id` or
    /// `handle`.
    ///
    /// Returns `None` when the remote server has no such document.
    pub async fn retrieve_remote_content(
        &self,
        id: &str,
        guid: Option<&str>,
        handle: Option<&str>,
        entity_type: Option<EntityKind>,
        key_fetcher: Option<&dyn KeyFetcher>,
    ) -> FederationResult<Option<Entity>> {
        let protocol = self.guess_protocol(id, handle)?;
        self.retrieve_remote_content_with_protocol(
            protocol,
            id,
            guid,
            handle,
            entity_type,
            key_fetcher,
        )
        .await
    }

    /// Like [`retrieve_remote_content`](Self::retrieve_remote_content) with an
    /// explicit protocol.
    ///
    /// Diaspora content is verified against the author's key, looked up with
    /// `key_fetcher`. Diaspora keys need webfinger discovery, which this
    /// fetcher cannot do, so Diaspora retrieval without a `key_fetcher` is a
    /// [`FederationError::Routing`] error and nothing is fetched.
    pub async fn retrieve_remote_content_with_protocol(
        &self,
        protocol: ProtocolName,
        id: &str,
        guid: Option<&str>,
        handle: Option<&str>,
        entity_type: Option<EntityKind>,
        key_fetcher: Option<&dyn KeyFetcher>,
    ) -> FederationResult<Option<Entity>> {
        let adapter = self.registry.get(protocol)?;
        let url = adapter.remote_content_url(id, guid, handle, entity_type)?;
        debug!(%protocol, url, "retrieving remote content");

        match protocol {
            ProtocolName::ActivityPub => {
                let Some(body) = self
                    .transport
                    .fetch_document(&url, &self.activity_accept)
                    .await?
                else {
                    return Ok(None);
                };
                let parsed = adapter.parse(&body, None)?;
                Ok(Some(adapter.to_entity(&parsed)?))
            }
            ProtocolName::Diaspora => {
                let Some(keys) = key_fetcher else {
                    return Err(FederationError::Routing(format!(
                        "cannot verify diaspora content {url}: key discovery is not supported, pass a key fetcher"
                    )));
                };
                let Some(body) = self
                    .transport
                    .fetch_document(&url, CONTENT_TYPE_MAGIC_ENVELOPE)
                    .await?
                else {
                    return Ok(None);
                };
                let receipt = self
                    .receiver
                    .receive_as(protocol, &body, None, Some(keys), false)
                    .await?;
                Ok(Some(receipt.entity))
            }
        }
    }

    /// Fetches a remote profile, guessing its protocol from `id` or `handle`.
    pub async fn retrieve_remote_profile(
        &self,
        id: &str,
        handle: Option<&str>,
    ) -> FederationResult<Option<Profile>> {
        let protocol = self.guess_protocol(id, handle)?;
        self.retrieve_remote_profile_with_protocol(protocol, id).await
    }

    /// Fetches a remote profile over `protocol`.
    ///
    /// Diaspora profiles need webfinger/hCard discovery, which is not
    /// supported, so they always come back as `None`.
    pub async fn retrieve_remote_profile_with_protocol(
        &self,
        protocol: ProtocolName,
        id: &str,
    ) -> FederationResult<Option<Profile>> {
        match protocol {
            ProtocolName::ActivityPub => {
                let entity = self
                    .retrieve_remote_content_with_protocol(protocol, id, None, None, None, None)
                    .await?;
                match entity {
                    Some(Entity::Profile(profile)) => Ok(Some(profile)),
                    Some(other) => {
                        debug!(
                            id,
                            kind = other.kind().as_str(),
                            "remote document is not a profile"
                        );
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
            ProtocolName::Diaspora => {
                debug!(id, "diaspora profile retrieval needs discovery, skipping");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl KeyFetcher for RemoteFetcher {
    async fn fetch_key(&self, actor_id: &str) -> FederationResult<Option<PublicKey>> {
        let profile = self.retrieve_remote_profile(actor_id, None).await?;
        Ok(profile.and_then(|p| p.public_key))
    }
}

impl std::fmt::Debug for RemoteFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFetcher")
            .field("registry", &self.registry)
            .field("activity_accept", &self.activity_accept)
            .finish()
    }
}
