use chrono::{TimeZone, Utc};
use federation_model::{
    Accept, Comment, Entity, EntityKind, Follow, ImageUrls, Like, MappingError, MapsFromWire,
    MapsToWire, Post, Profile, Reshare, Retraction,
};
use federation_protocols::activitypub::constants::{
    CONTEXT_ACTIVITYSTREAMS, CONTEXT_LD_SIGNATURES, PUBLIC_COLLECTION,
};
use federation_protocols::activitypub::ActivityPubMapper;
use federation_types::PublicKey;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

fn make_post() -> Post {
    Post {
        id: "http://127.0.0.1:8000/post/123456/".into(),
        actor_id: "http://127.0.0.1:8000/profile/123456/".into(),
        raw_content: "raw_content".into(),
        created_at: Utc.with_ymd_and_hms(2019, 4, 27, 0, 0, 0).unwrap(),
        ..Default::default()
    }
}

fn make_profile() -> Profile {
    Profile {
        id: "https://example.com/bob".into(),
        name: "Bob Bobertson".into(),
        raw_content: "foobar".into(),
        url: Some("https://example.com/bob-bobertson".into()),
        base_url: Some("https://example.com/".into()),
        public_key: Some(PublicKey::new("PUBKEY")),
        image_urls: ImageUrls {
            large: Some("urllarge".into()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn to_wire(entity: impl Into<Entity>) -> Value {
    ActivityPubMapper.to_wire(&entity.into()).unwrap()
}

fn from_wire(value: Value) -> Entity {
    ActivityPubMapper.from_wire(&value).unwrap()
}

// ── Outbound: Post ───────────────────────────────────────────────

#[test]
fn post_maps_to_note() {
    assert_eq!(
        to_wire(make_post()),
        json!({
            "@context": [
                CONTEXT_ACTIVITYSTREAMS,
                {"Hashtag": "as:Hashtag"},
                {"sensitive": "as:sensitive"},
            ],
            "attributedTo": "http://127.0.0.1:8000/profile/123456/",
            "content": "raw_content",
            "id": "http://127.0.0.1:8000/post/123456/",
            "inReplyTo": null,
            "published": "2019-04-27T00:00:00Z",
            "sensitive": false,
            "summary": null,
            "tag": [],
            "type": "Note",
            "url": null,
        })
    );
}

#[test]
fn post_tags_become_hashtags() {
    let wire = to_wire(make_post().with_tags(["Rust"]));
    assert_eq!(wire["tag"], json!([{"type": "Hashtag", "name": "#rust"}]));
}

#[test]
fn post_without_id_is_a_mapping_error() {
    let post = Post {
        id: String::new(),
        ..make_post()
    };
    let err = ActivityPubMapper.to_wire(&post.into()).unwrap_err();
    assert_eq!(
        err,
        MappingError::MissingAttribute {
            entity: "Post",
            attribute: "id"
        }
    );
}

proptest! {
    #[test]
    fn sensitive_iff_nsfw_tag(tags in prop::collection::vec("[a-z]{1,8}", 0..6), nsfw in any::<bool>()) {
        let mut tags = tags;
        tags.retain(|t| t != "nsfw");
        if nsfw {
            tags.push("NSFW".into());
        }
        let wire = to_wire(make_post().with_tags(&tags));
        prop_assert_eq!(wire["sensitive"].as_bool(), Some(nsfw));
    }
}

// ── Outbound: Comment ────────────────────────────────────────────

#[test]
fn comment_sets_in_reply_to() {
    let comment = Comment {
        id: "https://example.com/comment/1".into(),
        actor_id: "https://example.com/alice".into(),
        raw_content: "reply".into(),
        target_id: Some("https://example.org/post/9".into()),
        ..Default::default()
    };
    let wire = to_wire(comment);
    assert_eq!(wire["type"], "Note");
    assert_eq!(wire["inReplyTo"], "https://example.org/post/9");
}

#[test]
fn comment_without_target_is_a_mapping_error() {
    let comment = Comment {
        id: "https://example.com/comment/1".into(),
        actor_id: "https://example.com/alice".into(),
        ..Default::default()
    };
    let err = ActivityPubMapper.to_wire(&comment.into()).unwrap_err();
    assert_eq!(
        err,
        MappingError::MissingAttribute {
            entity: "Comment",
            attribute: "target_id"
        }
    );
}

// ── Outbound: Profile ────────────────────────────────────────────

#[test]
fn profile_maps_to_person() {
    assert_eq!(
        to_wire(make_profile()),
        json!({
            "@context": [
                CONTEXT_ACTIVITYSTREAMS,
                CONTEXT_LD_SIGNATURES,
                {"manuallyApprovesFollowers": "as:manuallyApprovesFollowers"},
            ],
            "endpoints": {"sharedInbox": "https://example.com/ap/inbox/"},
            "id": "https://example.com/bob",
            "inbox": "https://example.com/bob/inbox/",
            "manuallyApprovesFollowers": false,
            "name": "Bob Bobertson",
            "outbox": "https://example.com/bob/outbox/",
            "publicKey": {
                "id": "https://example.com/bob#main-key",
                "owner": "https://example.com/bob",
                "publicKeyPem": "PUBKEY",
            },
            "type": "Person",
            "url": "https://example.com/bob-bobertson",
            "summary": "foobar",
            "icon": "urllarge",
        })
    );
}

#[test]
fn profile_shared_inbox_derives_from_id_origin() {
    let profile = Profile {
        base_url: None,
        ..make_profile()
    };
    assert_eq!(
        to_wire(profile)["endpoints"]["sharedInbox"],
        "https://example.com/ap/inbox/"
    );
}

#[test]
fn profile_without_key_omits_key_block() {
    let profile = Profile {
        public_key: None,
        ..make_profile()
    };
    assert!(to_wire(profile).get("publicKey").is_none());
}

proptest! {
    #[test]
    fn inbox_and_outbox_use_single_slash(path in "[a-z]{1,10}", trailing in any::<bool>()) {
        let base = format!("https://example.com/{path}");
        let id = if trailing { format!("{base}/") } else { base.clone() };
        let wire = to_wire(Profile { id, ..make_profile() });
        let expected_inbox = format!("{base}/inbox/");
        prop_assert_eq!(wire["inbox"].as_str(), Some(expected_inbox.as_str()));
        let expected_outbox = format!("{base}/outbox/");
        prop_assert_eq!(wire["outbox"].as_str(), Some(expected_outbox.as_str()));
    }

    #[test]
    fn optional_profile_fields_present_iff_set(
        username in prop::option::of("[a-z]{0,6}"),
        bio in "[a-z ]{0,6}",
        icon in prop::option::of("[a-z]{0,6}"),
    ) {
        let profile = Profile {
            username: username.clone(),
            raw_content: bio.clone(),
            image_urls: ImageUrls { large: icon.clone(), ..Default::default() },
            ..make_profile()
        };
        let wire = to_wire(profile);
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        prop_assert_eq!(wire.get("preferredUsername").is_some(), set(&username));
        prop_assert_eq!(wire.get("summary").is_some(), !bio.trim().is_empty());
        prop_assert_eq!(wire.get("icon").is_some(), set(&icon));
    }
}

// ── Outbound: activities ─────────────────────────────────────────

#[test]
fn accept_maps_to_activity() {
    let accept = Accept {
        id: "https://localhost/accept".into(),
        actor_id: "https://localhost/profile".into(),
        target_id: Some("https://example.com/follow/1234".into()),
    };
    assert_eq!(
        to_wire(accept),
        json!({
            "@context": [CONTEXT_ACTIVITYSTREAMS],
            "id": "https://localhost/accept",
            "type": "Accept",
            "actor": "https://localhost/profile",
            "object": "https://example.com/follow/1234",
        })
    );
}

#[test]
fn follow_and_unfollow() {
    let follow = Follow {
        id: "https://localhost/follow".into(),
        actor_id: "https://localhost/profile".into(),
        target_id: Some("https://example.com/bob".into()),
        following: true,
    };
    let wire = to_wire(follow.clone());
    assert_eq!(wire["type"], "Follow");
    assert_eq!(wire["object"], "https://example.com/bob");

    let wire = to_wire(Follow {
        following: false,
        ..follow
    });
    assert_eq!(wire["type"], "Undo");
    assert_eq!(wire["id"], "https://localhost/follow#undo");
    assert_eq!(wire["object"]["type"], "Follow");
    assert_eq!(wire["object"]["id"], "https://localhost/follow");
}

#[test]
fn like_and_reshare() {
    let like = Like {
        id: "https://localhost/like".into(),
        actor_id: "https://localhost/profile".into(),
        target_id: Some("https://example.com/post/1".into()),
        ..Default::default()
    };
    assert_eq!(to_wire(like)["type"], "Like");

    let reshare = Reshare {
        id: "https://localhost/share".into(),
        actor_id: "https://localhost/profile".into(),
        target_id: Some("https://example.com/post/1".into()),
        created_at: Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap(),
        ..Default::default()
    };
    let wire = to_wire(reshare);
    assert_eq!(wire["type"], "Announce");
    assert_eq!(wire["published"], "2020-01-01T12:00:00Z");
}

#[test]
fn retractions_delete_or_undo() {
    let retraction = Retraction {
        id: "https://localhost/retract".into(),
        actor_id: "https://localhost/profile".into(),
        target_id: Some("https://localhost/post/1".into()),
        entity_type: EntityKind::Post,
        ..Default::default()
    };
    let wire = to_wire(retraction.clone());
    assert_eq!(wire["type"], "Delete");
    assert_eq!(
        wire["object"],
        json!({"id": "https://localhost/post/1", "type": "Tombstone"})
    );

    let wire = to_wire(Retraction {
        entity_type: EntityKind::Reshare,
        ..retraction
    });
    assert_eq!(wire["type"], "Undo");
    assert_eq!(wire["object"]["type"], "Announce");
}

#[test]
fn relational_activities_require_target() {
    let err = ActivityPubMapper
        .to_wire(&Like {
            id: "x".into(),
            actor_id: "y".into(),
            ..Default::default()
        }
        .into())
        .unwrap_err();
    assert!(matches!(
        err,
        MappingError::MissingAttribute {
            attribute: "target_id",
            ..
        }
    ));
}

// ── Inbound ──────────────────────────────────────────────────────

#[test]
fn follow_activity_maps_to_follow() {
    let entity = from_wire(json!({
        "@context": [CONTEXT_ACTIVITYSTREAMS, CONTEXT_LD_SIGNATURES],
        "id": "https://example.com/follow",
        "type": "Follow",
        "actor": "https://example.com/actor",
        "object": "https://example.org/actor",
    }));
    assert_eq!(
        entity,
        Entity::Follow(Follow {
            id: "https://example.com/follow".into(),
            actor_id: "https://example.com/actor".into(),
            target_id: Some("https://example.org/actor".into()),
            following: true,
        })
    );
}

#[test]
fn person_maps_to_profile() {
    let entity = from_wire(json!({
        "@context": [CONTEXT_ACTIVITYSTREAMS],
        "id": "https://diaspodon.fr/users/jaywink",
        "type": "Person",
        "inbox": "https://diaspodon.fr/users/jaywink/inbox",
        "preferredUsername": "jaywink",
        "name": "Jason Robinson",
        "summary": "<p>bio</p>",
        "url": "https://diaspodon.fr/@jaywink",
        "publicKey": {
            "id": "https://diaspodon.fr/users/jaywink#main-key",
            "owner": "https://diaspodon.fr/users/jaywink",
            "publicKeyPem": "KEY",
        },
        "tag": [],
        "endpoints": {"sharedInbox": "https://diaspodon.fr/inbox"},
        "icon": {"type": "Image", "url": "https://diaspodon.fr/avatar.jpg"},
    }));
    let Entity::Profile(profile) = entity else {
        panic!("expected a profile, got {entity:?}");
    };
    assert_eq!(profile.id, "https://diaspodon.fr/users/jaywink");
    assert_eq!(profile.name, "Jason Robinson");
    assert_eq!(profile.username.as_deref(), Some("jaywink"));
    assert_eq!(profile.raw_content, "<p>bio</p>");
    assert_eq!(profile.public_key, Some(PublicKey::new("KEY")));
    assert_eq!(profile.image_urls.large.as_deref(), Some("https://diaspodon.fr/avatar.jpg"));
    assert_eq!(profile.inbox.as_deref(), Some("https://diaspodon.fr/users/jaywink/inbox"));
    assert_eq!(profile.shared_inbox.as_deref(), Some("https://diaspodon.fr/inbox"));
    assert_eq!(profile.base_url.as_deref(), Some("https://diaspodon.fr"));
}

#[test]
fn person_with_null_id_is_rejected() {
    let err = ActivityPubMapper
        .from_wire(&json!({
            "@context": [CONTEXT_ACTIVITYSTREAMS],
            "id": null,
            "type": "Person",
            "name": "Jason Robinson",
        }))
        .unwrap_err();
    assert_eq!(
        err,
        MappingError::MissingAttribute {
            entity: "Profile",
            attribute: "id"
        }
    );
}

#[test]
fn create_with_reply_maps_to_comment() {
    let entity = from_wire(json!({
        "@context": [CONTEXT_ACTIVITYSTREAMS],
        "id": "https://diaspodon.fr/users/jaywink/statuses/1/activity",
        "type": "Create",
        "actor": "https://diaspodon.fr/users/jaywink",
        "to": [PUBLIC_COLLECTION],
        "object": {
            "id": "https://diaspodon.fr/users/jaywink/statuses/1",
            "type": "Note",
            "inReplyTo": "https://dev.example.org/content/653bad70/",
            "published": "2019-06-29T21:08:45Z",
            "url": "https://diaspodon.fr/@jaywink/1",
            "attributedTo": "https://diaspodon.fr/users/jaywink",
            "sensitive": false,
            "content": "<p>boom</p>",
            "tag": [{"type": "Mention", "name": "@jaywink@dev.example.org"}],
        },
    }));
    let Entity::Comment(comment) = entity else {
        panic!("expected a comment, got {entity:?}");
    };
    assert_eq!(comment.id, "https://diaspodon.fr/users/jaywink/statuses/1");
    assert_eq!(comment.actor_id, "https://diaspodon.fr/users/jaywink");
    assert_eq!(comment.target_id.as_deref(), Some("https://dev.example.org/content/653bad70/"));
    assert_eq!(comment.raw_content, "<p>boom</p>");
    assert!(comment.public);
    assert!(comment.tags.is_empty());
    assert_eq!(
        comment.created_at,
        Utc.with_ymd_and_hms(2019, 6, 29, 21, 8, 45).unwrap()
    );
}

#[test]
fn note_hashtags_and_sensitivity_become_tags() {
    let entity = from_wire(json!({
        "id": "https://a/note/1",
        "type": "Note",
        "attributedTo": "https://a/alice",
        "published": "2020-01-01T00:00:00Z",
        "content": "hi",
        "sensitive": true,
        "tag": [{"type": "Hashtag", "name": "#Rust"}],
    }));
    let Entity::Post(post) = entity else {
        panic!("expected a post, got {entity:?}");
    };
    assert!(post.is_sensitive());
    assert!(post.tags.contains("rust"));
    assert!(!post.public);
}

#[test]
fn undo_follow_maps_to_unfollow() {
    let entity = from_wire(json!({
        "id": "https://a/follow#undo",
        "type": "Undo",
        "actor": "https://a/alice",
        "object": {
            "id": "https://a/follow",
            "type": "Follow",
            "actor": "https://a/alice",
            "object": "https://b/bob",
        },
    }));
    assert_eq!(
        entity,
        Entity::Follow(Follow {
            id: "https://a/follow".into(),
            actor_id: "https://a/alice".into(),
            target_id: Some("https://b/bob".into()),
            following: false,
        })
    );
}

#[test]
fn undo_announce_maps_to_share_retraction() {
    let entity = from_wire(json!({
        "id": "https://a/undo/1",
        "type": "Undo",
        "actor": "https://a/alice",
        "object": {"id": "https://a/announce/1", "type": "Announce"},
    }));
    let Entity::Retraction(retraction) = entity else {
        panic!("expected a retraction, got {entity:?}");
    };
    assert_eq!(retraction.entity_type, EntityKind::Reshare);
    assert_eq!(retraction.target_id.as_deref(), Some("https://a/announce/1"));
}

#[test]
fn delete_maps_to_retraction() {
    let entity = from_wire(json!({
        "id": "https://a/delete/1",
        "type": "Delete",
        "actor": "https://a/alice",
        "object": {"id": "https://a/note/1", "type": "Tombstone"},
    }));
    assert_eq!(entity.kind(), EntityKind::Retraction);
    assert_eq!(entity.target_id(), Some("https://a/note/1"));
}

#[test]
fn unknown_type_is_unsupported() {
    let err = ActivityPubMapper
        .from_wire(&json!({"id": "https://a/x", "type": "Question"}))
        .unwrap_err();
    assert!(matches!(err, MappingError::Unsupported { .. }));
}

#[test]
fn outbound_post_maps_back() {
    let post = make_post().with_tags(["nsfw", "rust"]);
    let back = from_wire(to_wire(post.clone()));
    let Entity::Post(back) = back else {
        panic!("expected a post");
    };
    assert_eq!(back.id, post.id);
    assert_eq!(back.actor_id, post.actor_id);
    assert_eq!(back.created_at, post.created_at);
    assert_eq!(back.tags, post.tags);
}
