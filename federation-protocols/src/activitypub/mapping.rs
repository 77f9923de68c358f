//! Entity ⇄ ActivityStreams document mapping.
//!
//! Optional fields are omitted when the source attribute is empty. Derived
//! fields (inbox, outbox, `sensitive`) are computed on every call.

use chrono::{DateTime, SecondsFormat, Utc};
use federation_model::text::{join_path, origin};
use federation_model::{
    require, require_target, Accept, Comment, Entity, EntityKind, Follow, ImageUrls,
    Like, MappingError, MappingResult, MapsFromWire, MapsToWire, Post, Profile, Reshare,
    Retraction, NSFW_TAG,
};
use federation_types::PublicKey;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use super::constants::{
    context_hashtag, context_manually_approves_followers, context_sensitive, contexts_default,
    contexts_with, ACTOR_TYPES, CONTENT_TYPES, CONTEXT_LD_SIGNATURES, PUBLIC_COLLECTION,
};

const PROTOCOL: &str = "activitypub";

/// Maps entities to and from ActivityStreams JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityPubMapper;

impl MapsToWire for ActivityPubMapper {
    type Wire = Value;

    fn to_wire(&self, entity: &Entity) -> MappingResult<Value> {
        match entity {
            Entity::Post(post) => post_to_note(post),
            Entity::Comment(comment) => comment_to_note(comment),
            Entity::Profile(profile) => profile_to_person(profile),
            Entity::Accept(accept) => accept_to_activity(accept),
            Entity::Follow(follow) => follow_to_activity(
                "Follow",
                &follow.id,
                &follow.actor_id,
                follow.target_id.as_deref(),
                follow.following,
            ),
            Entity::Contact(contact) => follow_to_activity(
                "Contact",
                &contact.id,
                &contact.actor_id,
                contact.target_id.as_deref(),
                contact.following,
            ),
            Entity::Like(like) => like_to_activity(like),
            Entity::Reshare(reshare) => reshare_to_announce(reshare),
            Entity::Retraction(retraction) => retraction_to_activity(retraction),
        }
    }
}

impl MapsFromWire for ActivityPubMapper {
    type Wire = Value;

    fn from_wire(&self, wire: &Value) -> MappingResult<Entity> {
        if !wire.is_object() {
            return Err(MappingError::Malformed("expected a JSON object".into()));
        }
        let kind = str_field(wire, "type").ok_or(MappingError::MissingAttribute {
            entity: "Object",
            attribute: "type",
        })?;

        match kind {
            "Create" | "Update" => self.from_wire(&unwrap_activity_object(wire)?),
            t if ACTOR_TYPES.contains(&t) => person_to_profile(wire).map(Entity::from),
            t if CONTENT_TYPES.contains(&t) => note_to_entity(wire),
            "Follow" => Ok(Follow {
                id: required_id(wire, "Follow")?,
                actor_id: required_actor(wire, "Follow")?,
                target_id: wire.get("object").and_then(id_of).map(str::to_string),
                following: true,
            }
            .into()),
            "Accept" => Ok(Accept {
                id: required_id(wire, "Accept")?,
                actor_id: required_actor(wire, "Accept")?,
                target_id: wire.get("object").and_then(id_of).map(str::to_string),
            }
            .into()),
            "Like" => Ok(Like {
                id: required_id(wire, "Like")?,
                actor_id: required_actor(wire, "Like")?,
                target_id: wire.get("object").and_then(id_of).map(str::to_string),
                ..Default::default()
            }
            .into()),
            "Announce" => Ok(Reshare {
                id: required_id(wire, "Reshare")?,
                actor_id: required_actor(wire, "Reshare")?,
                public: is_public(wire),
                created_at: published(wire, "Reshare").unwrap_or_else(|_| Utc::now()),
                target_id: wire.get("object").and_then(id_of).map(str::to_string),
                ..Default::default()
            }
            .into()),
            "Delete" => {
                let object = wire.get("object");
                let entity_type = object
                    .and_then(|o| str_field(o, "type"))
                    .and_then(EntityKind::from_name)
                    .unwrap_or(EntityKind::Post);
                Ok(Retraction {
                    id: required_id(wire, "Retraction")?,
                    actor_id: required_actor(wire, "Retraction")?,
                    target_id: object.and_then(id_of).map(str::to_string),
                    target_guid: None,
                    entity_type,
                }
                .into())
            }
            "Undo" => undo_to_entity(wire),
            other => Err(MappingError::Unsupported {
                protocol: PROTOCOL,
                entity: other.to_string(),
            }),
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn hashtag_objects(tags: &BTreeSet<String>) -> Vec<Value> {
    tags.iter()
        .map(|tag| json!({"type": "Hashtag", "name": format!("#{tag}")}))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn note(
    entity: &'static str,
    id: &str,
    actor_id: &str,
    raw_content: &str,
    created_at: &DateTime<Utc>,
    tags: &BTreeSet<String>,
    url: Option<&str>,
    in_reply_to: Option<&str>,
) -> MappingResult<Value> {
    let id = require(entity, "id", Some(id))?;
    let actor_id = require(entity, "actor_id", Some(actor_id))?;
    Ok(json!({
        "@context": contexts_with([context_hashtag(), context_sensitive()]),
        "attributedTo": actor_id,
        "content": raw_content,
        "id": id,
        "inReplyTo": in_reply_to,
        "published": timestamp(created_at),
        "sensitive": tags.contains(NSFW_TAG),
        "summary": Value::Null,
        "tag": hashtag_objects(tags),
        "type": "Note",
        "url": url,
    }))
}

fn post_to_note(post: &Post) -> MappingResult<Value> {
    note(
        "Post",
        &post.id,
        &post.actor_id,
        &post.raw_content,
        &post.created_at,
        &post.tags,
        post.url.as_deref(),
        None,
    )
}

fn comment_to_note(comment: &Comment) -> MappingResult<Value> {
    let target = require_target("Comment", comment.target_id.as_deref())?;
    note(
        "Comment",
        &comment.id,
        &comment.actor_id,
        &comment.raw_content,
        &comment.created_at,
        &comment.tags,
        comment.url.as_deref(),
        Some(target),
    )
}

fn insert_non_empty(doc: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        doc.insert(key.to_string(), Value::from(value));
    }
}

fn profile_to_person(profile: &Profile) -> MappingResult<Value> {
    let id = require("Profile", "id", Some(&profile.id))?;
    let base_url = require(
        "Profile",
        "base_url",
        profile.base_url.as_deref().or_else(|| origin(id)),
    )?;

    let mut doc = Map::new();
    doc.insert(
        "@context".into(),
        contexts_with([
            Value::from(CONTEXT_LD_SIGNATURES),
            context_manually_approves_followers(),
        ]),
    );
    doc.insert("type".into(), Value::from("Person"));
    doc.insert("name".into(), Value::from(profile.name.as_str()));
    doc.insert("url".into(), json!(profile.url));
    doc.insert("id".into(), Value::from(id));
    doc.insert("inbox".into(), Value::from(join_path(id, "inbox")));
    doc.insert("outbox".into(), Value::from(join_path(id, "outbox")));
    doc.insert("manuallyApprovesFollowers".into(), Value::Bool(false));
    if let Some(key) = profile.public_key.as_ref().filter(|k| !k.is_empty()) {
        doc.insert(
            "publicKey".into(),
            json!({
                "id": format!("{id}#main-key"),
                "owner": id,
                "publicKeyPem": key.as_str(),
            }),
        );
    }
    doc.insert(
        "endpoints".into(),
        json!({"sharedInbox": join_path(base_url, "ap/inbox")}),
    );
    insert_non_empty(&mut doc, "preferredUsername", profile.username.as_deref());
    insert_non_empty(&mut doc, "summary", Some(&profile.raw_content));
    insert_non_empty(&mut doc, "icon", profile.image_urls.large.as_deref());
    Ok(Value::Object(doc))
}

fn accept_to_activity(accept: &Accept) -> MappingResult<Value> {
    Ok(json!({
        "@context": contexts_default(),
        "id": require("Accept", "id", Some(&accept.id))?,
        "type": "Accept",
        "actor": require("Accept", "actor_id", Some(&accept.actor_id))?,
        "object": require_target("Accept", accept.target_id.as_deref())?,
    }))
}

fn follow_to_activity(
    entity: &'static str,
    id: &str,
    actor_id: &str,
    target_id: Option<&str>,
    following: bool,
) -> MappingResult<Value> {
    let id = require(entity, "id", Some(id))?;
    let actor_id = require(entity, "actor_id", Some(actor_id))?;
    let target = require_target(entity, target_id)?;
    if following {
        return Ok(json!({
            "@context": contexts_default(),
            "id": id,
            "type": "Follow",
            "actor": actor_id,
            "object": target,
        }));
    }
    Ok(json!({
        "@context": contexts_default(),
        "id": format!("{id}#undo"),
        "type": "Undo",
        "actor": actor_id,
        "object": {
            "id": id,
            "type": "Follow",
            "actor": actor_id,
            "object": target,
        },
    }))
}

fn like_to_activity(like: &Like) -> MappingResult<Value> {
    Ok(json!({
        "@context": contexts_default(),
        "id": require("Like", "id", Some(&like.id))?,
        "type": "Like",
        "actor": require("Like", "actor_id", Some(&like.actor_id))?,
        "object": require_target("Like", like.target_id.as_deref())?,
    }))
}

fn reshare_to_announce(reshare: &Reshare) -> MappingResult<Value> {
    Ok(json!({
        "@context": contexts_default(),
        "id": require("Reshare", "id", Some(&reshare.id))?,
        "type": "Announce",
        "actor": require("Reshare", "actor_id", Some(&reshare.actor_id))?,
        "object": require_target("Reshare", reshare.target_id.as_deref())?,
        "published": timestamp(&reshare.created_at),
    }))
}

fn retraction_to_activity(retraction: &Retraction) -> MappingResult<Value> {
    let id = require("Retraction", "id", Some(&retraction.id))?;
    let actor_id = require("Retraction", "actor_id", Some(&retraction.actor_id))?;
    let target = require_target("Retraction", retraction.target_id.as_deref())?;
    let (kind, object_type) = match retraction.entity_type {
        EntityKind::Reshare => ("Undo", "Announce"),
        EntityKind::Like => ("Undo", "Like"),
        _ => ("Delete", "Tombstone"),
    };
    Ok(json!({
        "@context": contexts_default(),
        "id": id,
        "type": kind,
        "actor": actor_id,
        "object": {"id": target, "type": object_type},
    }))
}

// ── Inbound ──────────────────────────────────────────────────────

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key)?.as_str()
}

/// The id of a reference that is either a bare string or an object with `id`.
pub(crate) fn id_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(_) => str_field(value, "id"),
        Value::Array(items) => items.iter().find_map(id_of),
        _ => None,
    }
}

fn url_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(_) => str_field(value, "href").or_else(|| str_field(value, "url")),
        Value::Array(items) => items.iter().find_map(url_of),
        _ => None,
    }
}

fn required_id(wire: &Value, entity: &'static str) -> MappingResult<String> {
    require(entity, "id", str_field(wire, "id")).map(str::to_string)
}

fn required_actor(wire: &Value, entity: &'static str) -> MappingResult<String> {
    require(entity, "actor_id", wire.get("actor").and_then(id_of)).map(str::to_string)
}

fn addressed_to_public(value: Option<&Value>) -> bool {
    let is_public = |s: &str| s == PUBLIC_COLLECTION || s == "as:Public" || s == "Public";
    match value {
        Some(Value::String(s)) => is_public(s),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).any(is_public),
        _ => false,
    }
}

fn is_public(wire: &Value) -> bool {
    addressed_to_public(wire.get("to")) || addressed_to_public(wire.get("cc"))
}

fn hashtags(wire: &Value) -> Vec<String> {
    let Some(Value::Array(tags)) = wire.get("tag") else {
        return Vec::new();
    };
    tags.iter()
        .filter(|t| str_field(t, "type") == Some("Hashtag"))
        .filter_map(|t| str_field(t, "name"))
        .map(str::to_string)
        .collect()
}

fn published(wire: &Value, entity: &'static str) -> MappingResult<DateTime<Utc>> {
    let raw = require(entity, "published", str_field(wire, "published"))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MappingError::Malformed(format!("invalid published timestamp {raw:?}: {e}")))
}

/// Copies the activity's actor and addressing onto its embedded object.
fn unwrap_activity_object(wire: &Value) -> MappingResult<Value> {
    let mut object = match wire.get("object") {
        Some(object @ Value::Object(_)) => object.clone(),
        _ => {
            return Err(MappingError::Malformed(
                "activity does not embed its object".into(),
            ))
        }
    };
    if let Value::Object(map) = &mut object {
        if let Some(actor) = wire.get("actor") {
            map.entry("attributedTo").or_insert_with(|| actor.clone());
        }
        for key in ["to", "cc"] {
            if let Some(addressing) = wire.get(key) {
                map.entry(key).or_insert_with(|| addressing.clone());
            }
        }
    }
    Ok(object)
}

fn person_to_profile(wire: &Value) -> MappingResult<Profile> {
    let id = required_id(wire, "Profile")?;
    let public_key = wire
        .get("publicKey")
        .and_then(|k| str_field(k, "publicKeyPem"))
        .map(PublicKey::from);

    Ok(Profile {
        base_url: origin(&id).map(str::to_string),
        id,
        name: str_field(wire, "name").unwrap_or_default().to_string(),
        username: str_field(wire, "preferredUsername").map(str::to_string),
        raw_content: str_field(wire, "summary").unwrap_or_default().to_string(),
        public: true,
        image_urls: ImageUrls {
            large: wire.get("icon").and_then(url_of).map(str::to_string),
            ..Default::default()
        },
        public_key,
        url: wire.get("url").and_then(url_of).map(str::to_string),
        inbox: str_field(wire, "inbox").map(str::to_string),
        shared_inbox: wire
            .get("endpoints")
            .and_then(|e| str_field(e, "sharedInbox"))
            .map(str::to_string),
        ..Profile::default()
    }
    .with_tags(hashtags(wire)))
}

fn note_to_entity(wire: &Value) -> MappingResult<Entity> {
    let in_reply_to = str_field(wire, "inReplyTo");
    let entity = if in_reply_to.is_some() { "Comment" } else { "Post" };

    let id = required_id(wire, entity)?;
    let actor_id = require(entity, "actor_id", wire.get("attributedTo").and_then(id_of))?;
    let created_at = published(wire, entity)?;
    let raw_content = str_field(wire, "content").unwrap_or_default().to_string();
    let url = wire.get("url").and_then(url_of).map(str::to_string);

    let mut tags = hashtags(wire);
    if wire.get("sensitive").and_then(Value::as_bool) == Some(true) {
        tags.push(NSFW_TAG.to_string());
    }

    let entity = match in_reply_to {
        Some(target) => Comment {
            id,
            actor_id: actor_id.to_string(),
            raw_content,
            public: is_public(wire),
            created_at,
            url,
            target_id: Some(target.to_string()),
            ..Default::default()
        }
        .with_tags(tags)
        .into(),
        None => Post {
            id,
            actor_id: actor_id.to_string(),
            raw_content,
            public: is_public(wire),
            created_at,
            url,
            ..Default::default()
        }
        .with_tags(tags)
        .into(),
    };
    Ok(entity)
}

fn undo_to_entity(wire: &Value) -> MappingResult<Entity> {
    let actor_id = required_actor(wire, "Undo")?;
    let object = wire.get("object").ok_or(MappingError::MissingAttribute {
        entity: "Undo",
        attribute: "object",
    })?;

    match str_field(object, "type") {
        Some("Follow") => Ok(Follow {
            id: required_id(object, "Follow")?,
            actor_id,
            target_id: object.get("object").and_then(id_of).map(str::to_string),
            following: false,
        }
        .into()),
        Some(kind @ ("Announce" | "Like")) => Ok(Retraction {
            id: required_id(wire, "Retraction")?,
            actor_id,
            target_id: id_of(object).map(str::to_string),
            target_guid: None,
            entity_type: if kind == "Like" {
                EntityKind::Like
            } else {
                EntityKind::Reshare
            },
        }
        .into()),
        other => Err(MappingError::Unsupported {
            protocol: PROTOCOL,
            entity: format!("Undo {}", other.unwrap_or("<untyped>")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_of_accepts_string_object_and_array() {
        assert_eq!(id_of(&json!("https://a/x")), Some("https://a/x"));
        assert_eq!(id_of(&json!({"id": "https://a/y"})), Some("https://a/y"));
        assert_eq!(id_of(&json!(["https://a/z"])), Some("https://a/z"));
        assert_eq!(id_of(&json!(3)), None);
    }

    #[test]
    fn public_addressing_variants() {
        assert!(is_public(&json!({"to": [PUBLIC_COLLECTION]})));
        assert!(is_public(&json!({"cc": "as:Public"})));
        assert!(!is_public(&json!({"to": ["https://a/followers"]})));
        assert!(!is_public(&json!({})));
    }
}
