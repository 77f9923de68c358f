use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use federation_crypto::{
    generate_keypair, CryptoResult, Ed25519Scheme, SealedBoxCipher, SignatureScheme,
};
use federation_model::{Comment, Entity, Post};
use federation_outbound::transport::mock::RecordingTransport;
use federation_outbound::{DeliveryOutcome, DispatchConfig, OutboundDispatcher};
use federation_protocols::diaspora::MagicEnvelope;
use federation_protocols::{
    ProtocolRegistry, CONTENT_TYPE_ACTIVITY, CONTENT_TYPE_JSON, CONTENT_TYPE_MAGIC_ENVELOPE,
};
use federation_types::{PrivateKey, ProtocolName, PublicKey, Recipient, UserIdentity};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::Value;

const AUTHOR: &str = "https://example.com/users/alice";

/// Ed25519 that counts signing calls.
#[derive(Default)]
struct CountingScheme {
    signs: AtomicUsize,
}

impl CountingScheme {
    fn count(&self) -> usize {
        self.signs.load(Ordering::SeqCst)
    }
}

impl SignatureScheme for CountingScheme {
    fn algorithm(&self) -> &'static str {
        Ed25519Scheme.algorithm()
    }

    fn sign(&self, data: &[u8], key: &PrivateKey) -> CryptoResult<Vec<u8>> {
        self.signs.fetch_add(1, Ordering::SeqCst);
        Ed25519Scheme.sign(data, key)
    }

    fn verify(&self, data: &[u8], signature: &[u8], key: &PublicKey) -> bool {
        Ed25519Scheme.verify(data, signature, key)
    }
}

struct Harness {
    dispatcher: OutboundDispatcher,
    transport: RecordingTransport,
    scheme: Arc<CountingScheme>,
}

fn harness_with(config: DispatchConfig) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("federation_outbound=debug")
        .with_test_writer()
        .try_init();
    let scheme = Arc::new(CountingScheme::default());
    let registry = ProtocolRegistry::with_crypto(scheme.clone(), Arc::new(SealedBoxCipher));
    let transport = RecordingTransport::new();
    let dispatcher =
        OutboundDispatcher::with_config(Arc::new(registry), Arc::new(transport.clone()), config);
    Harness {
        dispatcher,
        transport,
        scheme,
    }
}

fn harness() -> Harness {
    harness_with(DispatchConfig::default())
}

fn author() -> UserIdentity {
    let (private, _) = generate_keypair();
    UserIdentity::new(AUTHOR, private).with_handle("alice@example.com")
}

fn public_post() -> Entity {
    Post {
        id: "https://example.com/post/1".into(),
        actor_id: AUTHOR.into(),
        guid: Some("g1".into()),
        raw_content: "hello".into(),
        public: true,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ..Default::default()
    }
    .into()
}

fn key() -> PublicKey {
    generate_keypair().1
}

// ── Public deduplication ─────────────────────────────────────────

#[test]
fn public_recipients_share_one_payload() {
    let h = harness();
    let recipients: Vec<Recipient> = [
        "https://a.example/inbox",
        "https://b.example/inbox",
        "https://c.example/inbox",
        "https://a.example/inbox",
    ]
    .into_iter()
    .map(Recipient::from)
    .collect();

    let plan = h
        .dispatcher
        .build_jobs(&public_post(), &author(), &recipients, None);

    assert_eq!(h.scheme.count(), 1);
    assert_eq!(plan.jobs.len(), 1);
    assert!(plan.skipped.is_empty());
    let job = &plan.jobs[0];
    assert_eq!(job.protocol, ProtocolName::ActivityPub);
    assert_eq!(job.content_type, CONTENT_TYPE_ACTIVITY);
    assert_eq!(
        job.urls,
        BTreeSet::from([
            "https://a.example/inbox".to_string(),
            "https://b.example/inbox".to_string(),
            "https://c.example/inbox".to_string(),
        ])
    );
    assert_eq!(
        job.auth.as_ref().map(|a| a.key_id().to_string()),
        Some(format!("{AUTHOR}#main-key"))
    );

    let doc: Value = serde_json::from_slice(&job.payload).unwrap();
    assert_eq!(
        doc["to"],
        serde_json::json!(["https://www.w3.org/ns/activitystreams#Public"])
    );
}

#[test]
fn diaspora_public_recipients_collapse_per_domain() {
    let h = harness();
    let recipients = vec![
        Recipient::new("bob@example.org"),
        Recipient::new("carol@example.org"),
        Recipient::new("dave@example.net"),
    ];
    let plan = h
        .dispatcher
        .build_jobs(&public_post(), &author(), &recipients, None);

    assert_eq!(h.scheme.count(), 1);
    assert_eq!(plan.jobs.len(), 1);
    let job = &plan.jobs[0];
    assert_eq!(job.content_type, CONTENT_TYPE_MAGIC_ENVELOPE);
    assert!(job.auth.is_none());
    assert_eq!(
        job.urls,
        BTreeSet::from([
            "https://example.net/receive/public".to_string(),
            "https://example.org/receive/public".to_string(),
        ])
    );
}

// ── Private recipients ───────────────────────────────────────────

#[test]
fn mixed_recipients_job_count() {
    let h = harness();
    let recipients = vec![
        Recipient::new("https://a.example/inbox"),
        Recipient::new("https://b.example/inbox"),
        Recipient::new("https://c.example/inbox").with_key(key()),
        Recipient::new("bob@example.org"),
        Recipient::new("carol@example.org")
            .with_key(key())
            .with_guid("carol-guid"),
    ];
    let plan = h
        .dispatcher
        .build_jobs(&public_post(), &author(), &recipients, None);

    // Two private jobs, then one public job per protocol.
    assert_eq!(plan.jobs.len(), 4);
    assert_eq!(h.scheme.count(), 4);
    assert!(plan.skipped.is_empty());

    let private_diaspora = plan
        .jobs
        .iter()
        .find(|j| j.content_type == CONTENT_TYPE_JSON)
        .unwrap();
    assert_eq!(
        private_diaspora.urls,
        BTreeSet::from(["https://example.org/receive/users/carol-guid".to_string()])
    );

    let private_ap = &plan.jobs[0];
    let doc: Value = serde_json::from_slice(&private_ap.payload).unwrap();
    assert_eq!(doc["to"], "https://c.example/inbox");

    let public_protocols: Vec<ProtocolName> =
        plan.jobs[2..].iter().map(|j| j.protocol).collect();
    assert_eq!(
        public_protocols,
        vec![ProtocolName::ActivityPub, ProtocolName::Diaspora]
    );
}

#[test]
fn private_diaspora_without_guid_is_skipped() {
    let h = harness();
    let recipients = vec![
        Recipient::new("bob@example.org").with_key(key()),
        Recipient::new("https://a.example/inbox"),
    ];
    let plan = h
        .dispatcher
        .build_jobs(&public_post(), &author(), &recipients, None);

    assert_eq!(plan.jobs.len(), 1);
    assert_eq!(plan.jobs[0].protocol, ProtocolName::ActivityPub);
    assert!(matches!(
        &plan.skipped[..],
        [DeliveryOutcome::Skipped { recipient, .. }] if recipient == "bob@example.org"
    ));
}

#[test]
fn per_recipient_activitypub_builds_one_payload_each() {
    let h = harness_with(DispatchConfig {
        activitypub_per_recipient: true,
        ..Default::default()
    });
    let recipients = vec![
        Recipient::new("https://a.example/inbox"),
        Recipient::new("https://b.example/inbox"),
    ];
    let plan = h
        .dispatcher
        .build_jobs(&public_post(), &author(), &recipients, None);

    assert_eq!(plan.jobs.len(), 2);
    assert_eq!(h.scheme.count(), 2);
    let inboxes = ["https://a.example/inbox", "https://b.example/inbox"];
    for (job, inbox) in plan.jobs.iter().zip(inboxes) {
        let doc: Value = serde_json::from_slice(&job.payload).unwrap();
        assert_eq!(doc["to"], inbox);
        assert_eq!(job.urls, BTreeSet::from([inbox.to_string()]));
    }
}

// ── Failure isolation ────────────────────────────────────────────

#[test]
fn unroutable_recipient_does_not_stop_others() {
    let h = harness();
    let recipients = vec![
        Recipient::new("not-an-address"),
        Recipient::new("https://a.example/inbox"),
    ];
    let plan = h
        .dispatcher
        .build_jobs(&public_post(), &author(), &recipients, None);
    assert_eq!(plan.jobs.len(), 1);
    assert_eq!(plan.skipped.len(), 1);
}

#[test]
fn mapping_failure_skips_bucket_only() {
    let h = harness();
    let comment: Entity = Comment {
        id: "https://example.com/comment/1".into(),
        actor_id: AUTHOR.into(),
        guid: Some("c1".into()),
        raw_content: "reply".into(),
        ..Default::default()
    }
    .into();
    let recipients = vec![
        Recipient::new("https://a.example/inbox"),
        Recipient::new("https://b.example/inbox"),
        Recipient::new("bob@example.org"),
    ];
    let plan = h.dispatcher.build_jobs(&comment, &author(), &recipients, None);

    assert!(plan.jobs.is_empty());
    assert_eq!(plan.skipped.len(), 3);
    assert_eq!(h.scheme.count(), 0);
}

#[tokio::test]
async fn failed_url_does_not_stop_delivery() {
    let h = harness();
    h.transport.fail_url("https://b.example/inbox");
    let recipients = vec![
        Recipient::new("https://a.example/inbox"),
        Recipient::new("https://b.example/inbox"),
        Recipient::new("https://c.example/inbox"),
        Recipient::new("bob@example.org"),
    ];

    let report = h
        .dispatcher
        .send(&public_post(), &author(), &recipients, None)
        .await;

    assert!(!report.is_complete_success());
    assert_eq!(report.failed(), vec!["https://b.example/inbox"]);
    let mut delivered = report.delivered();
    delivered.sort();
    assert_eq!(
        delivered,
        vec![
            "https://a.example/inbox",
            "https://c.example/inbox",
            "https://example.org/receive/public",
        ]
    );
    assert_eq!(h.transport.sent().len(), 3);

    let sent = h.transport.sent_to("https://a.example/inbox");
    assert_eq!(sent[0].content_type, CONTENT_TYPE_ACTIVITY);
    assert_eq!(sent[0].key_id.as_deref(), Some("https://example.com/users/alice#main-key"));
}

#[tokio::test]
async fn zero_concurrency_still_delivers() {
    let h = harness_with(DispatchConfig {
        max_concurrent_deliveries: 0,
        ..Default::default()
    });
    let report = h
        .dispatcher
        .send(
            &public_post(),
            &author(),
            &[Recipient::new("https://a.example/inbox")],
            None,
        )
        .await;
    assert!(report.is_complete_success());
    assert_eq!(report.delivered().len(), 1);
}

#[tokio::test]
async fn empty_recipient_list_sends_nothing() {
    let h = harness();
    let report = h.dispatcher.send(&public_post(), &author(), &[], None).await;
    assert!(report.outcomes.is_empty());
    assert!(report.is_complete_success());
    assert_eq!(h.scheme.count(), 0);
}

// ── Parent authors ───────────────────────────────────────────────

#[test]
fn diaspora_reply_is_sent_as_parent() {
    let h = harness();
    let (parent_private, _) = generate_keypair();
    let parent = UserIdentity::new("https://example.org/users/bob", parent_private)
        .with_handle("bob@example.org");
    let comment: Entity = Comment {
        id: "https://example.com/comment/1".into(),
        actor_id: "alice@example.com".into(),
        guid: Some("c1".into()),
        raw_content: "reply".into(),
        target_id: Some("https://example.org/post/9".into()),
        target_guid: Some("p9".into()),
        ..Default::default()
    }
    .into();

    let plan = h.dispatcher.build_jobs(
        &comment,
        &author(),
        &[Recipient::new("carol@example.net")],
        Some(&parent),
    );

    assert_eq!(plan.jobs.len(), 1);
    let body = std::str::from_utf8(&plan.jobs[0].payload).unwrap();
    let envelope = MagicEnvelope::parse(body).unwrap();
    assert_eq!(envelope.signer_handle().as_deref(), Some("bob@example.org"));
    // author signature, parent signature, envelope signature
    assert_eq!(h.scheme.count(), 3);
}

#[test]
fn handle_create_payload_uses_named_protocol() {
    let h = harness();
    let payload = h
        .dispatcher
        .handle_create_payload(&public_post(), &author(), ProtocolName::Diaspora, None, None)
        .unwrap();
    assert_eq!(payload.content_type, CONTENT_TYPE_MAGIC_ENVELOPE);

    let payload = h
        .dispatcher
        .handle_create_payload(&public_post(), &author(), ProtocolName::ActivityPub, None, None)
        .unwrap();
    assert_eq!(payload.content_type, CONTENT_TYPE_ACTIVITY);
}

// ── Properties ───────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn job_count_is_private_plus_public_protocols(
        ap_public in 0usize..4,
        ap_private in 0usize..3,
        d_public in 0usize..4,
        d_private in 0usize..3,
    ) {
        let h = harness();
        let shared_key = key();
        let mut recipients = Vec::new();
        for i in 0..ap_public {
            recipients.push(Recipient::new(format!("https://ap{i}.example/inbox")));
        }
        for i in 0..ap_private {
            recipients.push(
                Recipient::new(format!("https://p{i}.example/inbox")).with_key(shared_key.clone()),
            );
        }
        for i in 0..d_public {
            recipients.push(Recipient::new(format!("u{i}@d{i}.example")));
        }
        for i in 0..d_private {
            recipients.push(
                Recipient::new(format!("v{i}@e.example"))
                    .with_key(shared_key.clone())
                    .with_guid(format!("guid{i}")),
            );
        }

        let plan = h.dispatcher.build_jobs(&public_post(), &author(), &recipients, None);

        let public_protocols = usize::from(ap_public > 0) + usize::from(d_public > 0);
        prop_assert_eq!(plan.jobs.len(), ap_private + d_private + public_protocols);
        prop_assert_eq!(h.scheme.count(), plan.jobs.len());
        prop_assert!(plan.skipped.is_empty());
    }

    #[test]
    fn public_urls_are_distinct_destinations(hosts in prop::collection::vec(0u8..6, 1..12)) {
        let h = harness();
        let recipients: Vec<Recipient> = hosts
            .iter()
            .map(|n| Recipient::new(format!("https://h{n}.example/inbox")))
            .collect();
        let plan = h.dispatcher.build_jobs(&public_post(), &author(), &recipients, None);

        let distinct: BTreeSet<u8> = hosts.into_iter().collect();
        prop_assert_eq!(plan.jobs.len(), 1);
        prop_assert_eq!(plan.jobs[0].urls.len(), distinct.len());
        prop_assert_eq!(h.scheme.count(), 1);
    }
}
