//! Outbound fan-out.
//!
//! # Planning
//!
//! Recipients are split per protocol into private ones (carrying a delivery
//! key, or forced private by [`DispatchConfig::activitypub_per_recipient`])
//! and public ones. Every private recipient gets its own payload and job.
//! Public recipients of one protocol share a single payload, built on first
//! sight and cached for the rest of the call, so public signing work grows
//! with the number of protocols rather than the number of recipients.
//!
//! # Delivery
//!
//! Each job URL is sent independently with bounded concurrency. Nothing
//! aborts the fan-out: failures become [`DeliveryOutcome`]s in the report.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use federation_crypto::AuthToken;
use federation_model::Entity;
use federation_protocols::{FederationResult, ProtocolAdapter, ProtocolRegistry, WirePayload};
use federation_types::{ProtocolName, Recipient, UserIdentity};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::config::DispatchConfig;
use crate::report::{DeliveryOutcome, DeliveryReport};
use crate::transport::DeliveryTransport;

/// Bytes of payload quoted in delivery failure logs.
const PAYLOAD_SUMMARY_BYTES: usize = 200;

/// Identical bytes bound for one or more URLs.
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub protocol: ProtocolName,
    pub auth: Option<AuthToken>,
    pub payload: Vec<u8>,
    pub content_type: &'static str,
    pub urls: BTreeSet<String>,
}

impl DeliveryJob {
    fn new(
        protocol: ProtocolName,
        auth: Option<AuthToken>,
        payload: WirePayload,
        url: String,
    ) -> Self {
        Self {
            protocol,
            auth,
            payload: payload.body,
            content_type: payload.content_type,
            urls: BTreeSet::from([url]),
        }
    }

    /// Leading bytes of the payload, for logs.
    pub fn summary(&self) -> String {
        let end = self.payload.len().min(PAYLOAD_SUMMARY_BYTES);
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }
}

/// The jobs for one `send` call, plus the recipients that got none.
#[derive(Debug, Default)]
pub struct DeliveryPlan {
    /// Private jobs first, then one public job per protocol.
    pub jobs: Vec<DeliveryJob>,
    pub skipped: Vec<DeliveryOutcome>,
}

struct Route {
    protocol: ProtocolName,
    adapter: Arc<dyn ProtocolAdapter>,
    private: bool,
    url: String,
}

/// State of a protocol's shared public payload within one call.
enum PublicBucket {
    Ready(DeliveryJob),
    Failed(String),
}

/// Builds payloads for recipients and hands them to a transport.
#[derive(Clone)]
pub struct OutboundDispatcher {
    registry: Arc<ProtocolRegistry>,
    transport: Arc<dyn DeliveryTransport>,
    config: DispatchConfig,
}

impl OutboundDispatcher {
    pub fn new(registry: Arc<ProtocolRegistry>, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self::with_config(registry, transport, DispatchConfig::default())
    }

    pub fn with_config(
        registry: Arc<ProtocolRegistry>,
        transport: Arc<dyn DeliveryTransport>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Builds one payload for one protocol.
    ///
    /// A `recipient` carrying a key gets a payload encrypted for it where the
    /// protocol supports that. `parent_author` adds a chained signature and
    /// becomes the sender on protocols that relay through the parent.
    pub fn handle_create_payload(
        &self,
        entity: &Entity,
        author: &UserIdentity,
        protocol: ProtocolName,
        recipient: Option<&Recipient>,
        parent_author: Option<&UserIdentity>,
    ) -> FederationResult<WirePayload> {
        let adapter = self.registry.get(protocol)?;
        adapter.build_send(entity, author, parent_author, recipient)
    }

    /// Plans delivery of `entity` to `recipients` without sending anything.
    pub fn build_jobs(
        &self,
        entity: &Entity,
        author: &UserIdentity,
        recipients: &[Recipient],
        parent_author: Option<&UserIdentity>,
    ) -> DeliveryPlan {
        let mut plan = DeliveryPlan::default();
        let mut public: BTreeMap<ProtocolName, PublicBucket> = BTreeMap::new();

        for recipient in recipients {
            let Route {
                protocol,
                adapter,
                private,
                url,
            } = match self.route(recipient) {
                Ok(route) => route,
                Err(e) => {
                    error!(recipient = %recipient.id, error = %e, "cannot route recipient");
                    plan.skipped.push(skip(recipient, e));
                    continue;
                }
            };

            if private {
                let built = self.handle_create_payload(
                    entity,
                    author,
                    protocol,
                    Some(recipient),
                    parent_author,
                );
                match built {
                    Ok(payload) => {
                        let job =
                            DeliveryJob::new(protocol, adapter.http_auth(author), payload, url);
                        debug!(
                            %protocol,
                            content_type = job.content_type,
                            recipient = %recipient.id,
                            "built private delivery job"
                        );
                        plan.jobs.push(job);
                    }
                    Err(e) => {
                        error!(%protocol, recipient = %recipient.id, error = %e, "failed to build private payload");
                        plan.skipped.push(skip(recipient, e));
                    }
                }
                continue;
            }

            match public.entry(protocol) {
                Entry::Vacant(slot) => {
                    let built =
                        self.handle_create_payload(entity, author, protocol, None, parent_author);
                    match built {
                        Ok(payload) => {
                            let job =
                                DeliveryJob::new(protocol, adapter.http_auth(author), payload, url);
                            slot.insert(PublicBucket::Ready(job));
                        }
                        Err(e) => {
                            error!(%protocol, recipient = %recipient.id, error = %e, "failed to build public payload");
                            plan.skipped.push(skip(recipient, &e));
                            slot.insert(PublicBucket::Failed(e.to_string()));
                        }
                    }
                }
                Entry::Occupied(mut slot) => match slot.get_mut() {
                    PublicBucket::Ready(job) => {
                        job.urls.insert(url);
                    }
                    PublicBucket::Failed(reason) => plan.skipped.push(skip(recipient, reason)),
                },
            }
        }

        for bucket in public.into_values() {
            if let PublicBucket::Ready(job) = bucket {
                debug!(
                    protocol = %job.protocol,
                    content_type = job.content_type,
                    urls = job.urls.len(),
                    "built public delivery job"
                );
                plan.jobs.push(job);
            }
        }
        plan
    }

    /// Sends every job URL, at most `max_concurrent_deliveries` at a time.
    pub async fn deliver(&self, jobs: &[DeliveryJob]) -> Vec<DeliveryOutcome> {
        let limit = self.config.max_concurrent_deliveries.max(1);
        stream::iter(
            jobs.iter()
                .flat_map(|job| job.urls.iter().map(move |url| (job, url.as_str()))),
        )
        .map(|(job, url)| self.deliver_one(job, url))
        .buffer_unordered(limit)
        .collect()
        .await
    }

    async fn deliver_one(&self, job: &DeliveryJob, url: &str) -> DeliveryOutcome {
        match self
            .transport
            .send_document(url, &job.payload, job.content_type, job.auth.as_ref())
            .await
        {
            Ok(()) => DeliveryOutcome::Delivered {
                url: url.to_string(),
                protocol: job.protocol,
            },
            Err(e) => {
                error!(
                    url,
                    protocol = %job.protocol,
                    error = %e,
                    payload = %job.summary(),
                    "delivery failed"
                );
                DeliveryOutcome::Failed {
                    url: url.to_string(),
                    protocol: job.protocol,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Builds and delivers `entity` to every recipient.
    pub async fn send(
        &self,
        entity: &Entity,
        author: &UserIdentity,
        recipients: &[Recipient],
        parent_author: Option<&UserIdentity>,
    ) -> DeliveryReport {
        let DeliveryPlan { jobs, skipped } =
            self.build_jobs(entity, author, recipients, parent_author);
        let mut outcomes = skipped;
        outcomes.extend(self.deliver(&jobs).await);

        let report = DeliveryReport { outcomes };
        info!(
            kind = entity.kind().as_str(),
            jobs = jobs.len(),
            delivered = report.delivered().len(),
            failed = report.failed().len(),
            skipped = report.skipped().len(),
            "send finished"
        );
        report
    }

    /// Resolves a recipient's protocol, privacy and delivery URL.
    fn route(&self, recipient: &Recipient) -> FederationResult<Route> {
        let protocol = self.registry.identify_recipient_protocol(&recipient.id)?;
        let adapter = self.registry.get(protocol)?;
        let url = adapter.delivery_endpoint(recipient, recipient.is_private())?;
        let private = recipient.is_private()
            || (protocol == ProtocolName::ActivityPub && self.config.activitypub_per_recipient);
        Ok(Route {
            protocol,
            adapter,
            private,
            url,
        })
    }
}

fn skip(recipient: &Recipient, reason: impl ToString) -> DeliveryOutcome {
    DeliveryOutcome::Skipped {
        recipient: recipient.id.clone(),
        reason: reason.to_string(),
    }
}

impl std::fmt::Debug for OutboundDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundDispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
