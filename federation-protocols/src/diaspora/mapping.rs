//! Entity ⇄ Diaspora entity XML mapping.
//!
//! Diaspora entities are flat: one root element named after the entity type
//! with one child element per property, in a fixed order. Relayables
//! (comments and likes) are signed over that order.

use chrono::{DateTime, SecondsFormat, Utc};
use federation_model::{
    require, require_target, Comment, Contact, Entity, EntityKind, ImageUrls, Like, MappingError,
    MappingResult, MapsFromWire, MapsToWire, Post, Profile, Reshare, Retraction, NSFW_TAG,
};

use super::xml::{write_element, XmlElement};

const PROTOCOL: &str = "diaspora";

pub const AUTHOR_SIGNATURE: &str = "author_signature";
pub const PARENT_AUTHOR_SIGNATURE: &str = "parent_author_signature";

/// A flat Diaspora entity document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiasporaDocument {
    pub tag: String,
    pub fields: Vec<(String, String)>,
}

impl DiasporaDocument {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fields: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, value: impl Into<String>) {
        self.fields.push((name.to_string(), value.into()));
    }

    fn push_opt(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.push(name, value);
        }
    }

    /// Value of the first field named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces a field in place, or appends it.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) => *existing = value,
            None => self.push(name, value),
        }
    }

    /// Whether the entity is relayed through its parent's author.
    pub fn is_relayable(&self) -> bool {
        matches!(self.tag.as_str(), "comment" | "like")
    }

    /// `;`-joined property values, excluding signatures, in document order.
    pub fn signable_text(&self) -> String {
        self.fields
            .iter()
            .filter(|(k, _)| k != AUTHOR_SIGNATURE && k != PARENT_AUTHOR_SIGNATURE)
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn to_xml(&self) -> String {
        let mut out = format!("<{}>", self.tag);
        for (name, value) in &self.fields {
            write_element(&mut out, name, &[], value);
        }
        out.push_str(&format!("</{}>", self.tag));
        out
    }

    pub fn from_element(element: &XmlElement) -> Self {
        Self {
            tag: element.name.clone(),
            fields: element
                .children
                .iter()
                .map(|c| (c.name.clone(), c.text.clone()))
                .collect(),
        }
    }
}

/// Maps entities to and from Diaspora entity documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiasporaMapper;

impl MapsToWire for DiasporaMapper {
    type Wire = DiasporaDocument;

    fn to_wire(&self, entity: &Entity) -> MappingResult<DiasporaDocument> {
        match entity {
            Entity::Post(post) => post_to_status_message(post),
            Entity::Comment(comment) => comment_to_xml(comment),
            Entity::Like(like) => like_to_xml(like),
            Entity::Reshare(reshare) => reshare_to_xml(reshare),
            Entity::Retraction(retraction) => retraction_to_xml(retraction),
            Entity::Profile(profile) => profile_to_xml(profile),
            Entity::Contact(contact) => contact_to_xml(
                "Contact",
                &contact.actor_id,
                contact.target_id.as_deref(),
                contact.following,
                contact.sharing,
            ),
            Entity::Follow(follow) => contact_to_xml(
                "Follow",
                &follow.actor_id,
                follow.target_id.as_deref(),
                follow.following,
                follow.following,
            ),
            Entity::Accept(_) => Err(MappingError::Unsupported {
                protocol: PROTOCOL,
                entity: "Accept".into(),
            }),
        }
    }
}

impl MapsFromWire for DiasporaMapper {
    type Wire = DiasporaDocument;

    fn from_wire(&self, doc: &DiasporaDocument) -> MappingResult<Entity> {
        match doc.tag.as_str() {
            "status_message" => status_message_to_post(doc).map(Entity::from),
            "comment" => xml_to_comment(doc).map(Entity::from),
            "like" => xml_to_like(doc).map(Entity::from),
            "reshare" => xml_to_reshare(doc).map(Entity::from),
            "retraction" => xml_to_retraction(doc).map(Entity::from),
            "profile" => xml_to_profile(doc).map(Entity::from),
            "contact" => xml_to_contact(doc).map(Entity::from),
            other => Err(MappingError::Unsupported {
                protocol: PROTOCOL,
                entity: other.to_string(),
            }),
        }
    }
}

/// Diaspora's name for an entity type, as used in `target_type` and fetch URLs.
pub fn diaspora_type(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Profile => "Person",
        other => other.as_str(),
    }
}

// ── Outbound ─────────────────────────────────────────────────────

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn post_to_status_message(post: &Post) -> MappingResult<DiasporaDocument> {
    require("Post", "id", Some(&post.id))?;
    let mut doc = DiasporaDocument::new("status_message");
    doc.push("author", require("Post", "actor_id", Some(&post.actor_id))?);
    doc.push("guid", require("Post", "guid", post.guid.as_deref())?);
    doc.push("created_at", timestamp(&post.created_at));
    doc.push("public", flag(post.public));
    doc.push("text", post.raw_content.as_str());
    doc.push_opt("provider_display_name", post.provider_display_name.as_deref());
    Ok(doc)
}

fn comment_to_xml(comment: &Comment) -> MappingResult<DiasporaDocument> {
    require("Comment", "id", Some(&comment.id))?;
    require_target("Comment", comment.target_id.as_deref())?;
    let mut doc = DiasporaDocument::new("comment");
    doc.push("author", require("Comment", "actor_id", Some(&comment.actor_id))?);
    doc.push("guid", require("Comment", "guid", comment.guid.as_deref())?);
    doc.push(
        "parent_guid",
        require("Comment", "target_guid", comment.target_guid.as_deref())?,
    );
    doc.push("text", comment.raw_content.as_str());
    doc.push("created_at", timestamp(&comment.created_at));
    Ok(doc)
}

fn like_to_xml(like: &Like) -> MappingResult<DiasporaDocument> {
    require("Like", "id", Some(&like.id))?;
    require_target("Like", like.target_id.as_deref())?;
    let mut doc = DiasporaDocument::new("like");
    doc.push("author", require("Like", "actor_id", Some(&like.actor_id))?);
    doc.push("guid", require("Like", "guid", like.guid.as_deref())?);
    doc.push(
        "parent_guid",
        require("Like", "target_guid", like.target_guid.as_deref())?,
    );
    doc.push("parent_type", "Post");
    doc.push("positive", "true");
    Ok(doc)
}

fn reshare_to_xml(reshare: &Reshare) -> MappingResult<DiasporaDocument> {
    require("Reshare", "id", Some(&reshare.id))?;
    let mut doc = DiasporaDocument::new("reshare");
    doc.push("author", require("Reshare", "actor_id", Some(&reshare.actor_id))?);
    doc.push("guid", require("Reshare", "guid", reshare.guid.as_deref())?);
    doc.push("created_at", timestamp(&reshare.created_at));
    doc.push_opt("root_author", reshare.target_handle.as_deref());
    doc.push(
        "root_guid",
        require("Reshare", "target_guid", reshare.target_guid.as_deref())?,
    );
    Ok(doc)
}

fn retraction_to_xml(retraction: &Retraction) -> MappingResult<DiasporaDocument> {
    require_target("Retraction", retraction.target_id.as_deref())?;
    let mut doc = DiasporaDocument::new("retraction");
    doc.push(
        "author",
        require("Retraction", "actor_id", Some(&retraction.actor_id))?,
    );
    doc.push(
        "target_guid",
        require("Retraction", "target_guid", retraction.target_guid.as_deref())?,
    );
    doc.push("target_type", diaspora_type(retraction.entity_type));
    Ok(doc)
}

fn profile_to_xml(profile: &Profile) -> MappingResult<DiasporaDocument> {
    let id = require("Profile", "id", Some(&profile.id))?;
    let mut doc = DiasporaDocument::new("profile");
    doc.push("author", profile.handle.as_deref().unwrap_or(id));
    doc.push_opt("first_name", Some(&profile.name));
    doc.push_opt("image_url", profile.image_urls.large.as_deref());
    doc.push_opt("image_url_medium", profile.image_urls.medium.as_deref());
    doc.push_opt("image_url_small", profile.image_urls.small.as_deref());
    doc.push_opt("bio", Some(&profile.raw_content));
    doc.push_opt("location", profile.location.as_deref());
    doc.push("searchable", flag(profile.public));
    doc.push("public", flag(profile.public));
    doc.push("nsfw", flag(profile.tags.contains(NSFW_TAG)));
    let tag_string = profile
        .tags
        .iter()
        .filter(|t| t.as_str() != NSFW_TAG)
        .map(|t| format!("#{t}"))
        .collect::<Vec<_>>()
        .join(" ");
    doc.push_opt("tag_string", Some(&tag_string));
    Ok(doc)
}

fn contact_to_xml(
    entity: &'static str,
    actor_id: &str,
    target_id: Option<&str>,
    following: bool,
    sharing: bool,
) -> MappingResult<DiasporaDocument> {
    let mut doc = DiasporaDocument::new("contact");
    doc.push("author", require(entity, "actor_id", Some(actor_id))?);
    doc.push("recipient", require_target(entity, target_id)?);
    doc.push("following", flag(following));
    doc.push("sharing", flag(sharing));
    Ok(doc)
}

// ── Inbound ──────────────────────────────────────────────────────

fn field(doc: &DiasporaDocument, entity: &'static str, name: &'static str) -> MappingResult<String> {
    require(entity, name, doc.get(name)).map(str::to_string)
}

fn optional(doc: &DiasporaDocument, name: &str) -> Option<String> {
    doc.get(name).filter(|v| !v.is_empty()).map(str::to_string)
}

fn bool_field(doc: &DiasporaDocument, name: &str) -> bool {
    doc.get(name).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn created_at(doc: &DiasporaDocument, entity: &'static str) -> MappingResult<DateTime<Utc>> {
    let raw = require(entity, "created_at", doc.get("created_at"))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MappingError::Malformed(format!("invalid created_at {raw:?}: {e}")))
}

fn status_message_to_post(doc: &DiasporaDocument) -> MappingResult<Post> {
    let guid = field(doc, "Post", "guid")?;
    Ok(Post {
        id: guid.clone(),
        actor_id: field(doc, "Post", "author")?,
        guid: Some(guid),
        raw_content: doc.get("text").unwrap_or_default().to_string(),
        public: bool_field(doc, "public"),
        created_at: created_at(doc, "Post")?,
        provider_display_name: optional(doc, "provider_display_name"),
        ..Default::default()
    })
}

fn xml_to_comment(doc: &DiasporaDocument) -> MappingResult<Comment> {
    let guid = field(doc, "Comment", "guid")?;
    let parent = field(doc, "Comment", "parent_guid")?;
    Ok(Comment {
        id: guid.clone(),
        actor_id: field(doc, "Comment", "author")?,
        guid: Some(guid),
        raw_content: doc.get("text").unwrap_or_default().to_string(),
        created_at: created_at(doc, "Comment")?,
        target_id: Some(parent.clone()),
        target_guid: Some(parent),
        author_signature: optional(doc, AUTHOR_SIGNATURE),
        parent_author_signature: optional(doc, PARENT_AUTHOR_SIGNATURE),
        ..Default::default()
    })
}

fn xml_to_like(doc: &DiasporaDocument) -> MappingResult<Like> {
    let guid = field(doc, "Like", "guid")?;
    let parent = field(doc, "Like", "parent_guid")?;
    Ok(Like {
        id: guid.clone(),
        actor_id: field(doc, "Like", "author")?,
        guid: Some(guid),
        target_id: Some(parent.clone()),
        target_guid: Some(parent),
        author_signature: optional(doc, AUTHOR_SIGNATURE),
        parent_author_signature: optional(doc, PARENT_AUTHOR_SIGNATURE),
    })
}

fn xml_to_reshare(doc: &DiasporaDocument) -> MappingResult<Reshare> {
    let guid = field(doc, "Reshare", "guid")?;
    let root = field(doc, "Reshare", "root_guid")?;
    Ok(Reshare {
        id: guid.clone(),
        actor_id: field(doc, "Reshare", "author")?,
        guid: Some(guid),
        public: true,
        created_at: created_at(doc, "Reshare")?,
        target_id: Some(root.clone()),
        target_guid: Some(root),
        target_handle: optional(doc, "root_author"),
        ..Default::default()
    })
}

fn xml_to_retraction(doc: &DiasporaDocument) -> MappingResult<Retraction> {
    let target = field(doc, "Retraction", "target_guid")?;
    let entity_type = doc
        .get("target_type")
        .and_then(EntityKind::from_name)
        .unwrap_or(EntityKind::Post);
    Ok(Retraction {
        id: target.clone(),
        actor_id: field(doc, "Retraction", "author")?,
        target_id: Some(target.clone()),
        target_guid: Some(target),
        entity_type,
    })
}

fn xml_to_profile(doc: &DiasporaDocument) -> MappingResult<Profile> {
    let author = field(doc, "Profile", "author")?;
    let name = [doc.get("first_name"), doc.get("last_name")]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut tags: Vec<String> = doc
        .get("tag_string")
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if bool_field(doc, "nsfw") {
        tags.push(NSFW_TAG.to_string());
    }
    Ok(Profile {
        id: author.clone(),
        handle: Some(author),
        name,
        raw_content: doc.get("bio").unwrap_or_default().to_string(),
        public: bool_field(doc, "public"),
        image_urls: ImageUrls {
            small: optional(doc, "image_url_small"),
            medium: optional(doc, "image_url_medium"),
            large: optional(doc, "image_url"),
        },
        location: optional(doc, "location"),
        ..Default::default()
    }
    .with_tags(tags))
}

fn xml_to_contact(doc: &DiasporaDocument) -> MappingResult<Contact> {
    let author = field(doc, "Contact", "author")?;
    let recipient = field(doc, "Contact", "recipient")?;
    Ok(Contact {
        id: format!("{author}#contact-{recipient}"),
        actor_id: author,
        target_id: Some(recipient),
        following: bool_field(doc, "following"),
        sharing: bool_field(doc, "sharing"),
    })
}
