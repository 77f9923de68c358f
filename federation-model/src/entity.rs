use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use federation_types::PublicKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved tag that marks content as sensitive on the wire.
pub const NSFW_TAG: &str = "nsfw";

/// The kind of an [`Entity`], used where one entity refers to another by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityKind {
    #[default]
    Post,
    Profile,
    Follow,
    Accept,
    Retraction,
    Reshare,
    Comment,
    Like,
    Contact,
}

impl EntityKind {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Post => "Post",
            EntityKind::Profile => "Profile",
            EntityKind::Follow => "Follow",
            EntityKind::Accept => "Accept",
            EntityKind::Retraction => "Retraction",
            EntityKind::Reshare => "Reshare",
            EntityKind::Comment => "Comment",
            EntityKind::Like => "Like",
            EntityKind::Contact => "Contact",
        }
    }

    /// Parses a kind from its canonical name or a common wire alias.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "post" | "status_message" | "statusmessage" => EntityKind::Post,
            "profile" | "person" => EntityKind::Profile,
            "follow" => EntityKind::Follow,
            "accept" => EntityKind::Accept,
            "retraction" => EntityKind::Retraction,
            "reshare" | "share" | "announce" => EntityKind::Reshare,
            "comment" => EntityKind::Comment,
            "like" => EntityKind::Like,
            "contact" => EntityKind::Contact,
            _ => return None,
        };
        Some(kind)
    }
}

/// Lowercases a topic token and strips a leading `#`.
fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#').to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

fn collect_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|t| normalize_tag(t.as_ref()))
        .collect()
}

/// A status message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub actor_id: String,
    pub guid: Option<String>,
    /// Untransformed body text.
    pub raw_content: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    /// Human-facing URL of the post.
    pub url: Option<String>,
    pub provider_display_name: Option<String>,
}

impl Post {
    /// Creates a post timestamped now.
    pub fn new(
        id: impl Into<String>,
        actor_id: impl Into<String>,
        raw_content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            actor_id: actor_id.into(),
            raw_content: raw_content.into(),
            created_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Replaces the tag set, lowercasing every token.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = collect_tags(tags);
        self
    }

    /// Whether the reserved sensitivity tag is present.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.tags.contains(NSFW_TAG)
    }
}

/// A reply to another entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub actor_id: String,
    pub guid: Option<String>,
    pub raw_content: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub url: Option<String>,
    /// Wire id of the parent entity.
    pub target_id: Option<String>,
    /// Envelope-protocol guid of the parent entity.
    pub target_guid: Option<String>,
    pub author_signature: Option<String>,
    pub parent_author_signature: Option<String>,
}

impl Comment {
    /// Replaces the tag set, lowercasing every token.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = collect_tags(tags);
        self
    }

    /// Whether the reserved sensitivity tag is present.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        self.tags.contains(NSFW_TAG)
    }
}

/// Avatar URLs by size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrls {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

/// A user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub guid: Option<String>,
    /// `user@domain` handle.
    pub handle: Option<String>,
    /// Display name.
    pub name: String,
    /// Preferred username.
    pub username: Option<String>,
    /// Bio.
    pub raw_content: String,
    pub public: bool,
    pub image_urls: ImageUrls,
    pub public_key: Option<PublicKey>,
    /// Human-facing profile page.
    pub url: Option<String>,
    /// Root URL of the origin server; derived from `id` when unset.
    pub base_url: Option<String>,
    pub location: Option<String>,
    pub tags: BTreeSet<String>,
    /// Inbox advertised by a remote server, if it differs from the derived one.
    pub inbox: Option<String>,
    pub shared_inbox: Option<String>,
}

impl Profile {
    /// Replaces the tag set, lowercasing every token.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = collect_tags(tags);
        self
    }
}

/// A follow or unfollow of another actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub actor_id: String,
    /// The actor being followed.
    pub target_id: Option<String>,
    /// `false` means the follow is being undone.
    pub following: bool,
}

impl Default for Follow {
    fn default() -> Self {
        Self {
            id: String::new(),
            actor_id: String::new(),
            target_id: None,
            following: true,
        }
    }
}

/// Acceptance of a follow request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accept {
    pub id: String,
    pub actor_id: String,
    /// Id of the accepted follow.
    pub target_id: Option<String>,
}

impl Accept {
    /// Builds the accept a profile sends back for a received follow.
    pub fn for_follow(follow: &Follow, profile_id: &str) -> Self {
        Self {
            id: format!("{profile_id}#accept-{}", Uuid::new_v4()),
            actor_id: profile_id.to_string(),
            target_id: Some(follow.id.clone()),
        }
    }
}

/// Deletion of a previously sent entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retraction {
    pub id: String,
    pub actor_id: String,
    pub target_id: Option<String>,
    pub target_guid: Option<String>,
    /// Kind of the retracted entity.
    pub entity_type: EntityKind,
}

/// A share of another entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reshare {
    pub id: String,
    pub actor_id: String,
    pub guid: Option<String>,
    pub raw_content: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub target_id: Option<String>,
    pub target_guid: Option<String>,
    /// Author of the shared entity.
    pub target_handle: Option<String>,
}

/// A like of another entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: String,
    pub actor_id: String,
    pub guid: Option<String>,
    pub target_id: Option<String>,
    pub target_guid: Option<String>,
    pub author_signature: Option<String>,
    pub parent_author_signature: Option<String>,
}

/// A sharing/following relationship between two users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub actor_id: String,
    /// The other party.
    pub target_id: Option<String>,
    pub following: bool,
    pub sharing: bool,
}

/// A protocol-agnostic unit of federated content or action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Entity {
    Post(Post),
    Profile(Profile),
    Follow(Follow),
    Accept(Accept),
    Retraction(Retraction),
    Reshare(Reshare),
    Comment(Comment),
    Like(Like),
    Contact(Contact),
}

impl Entity {
    /// The entity's kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Post(_) => EntityKind::Post,
            Entity::Profile(_) => EntityKind::Profile,
            Entity::Follow(_) => EntityKind::Follow,
            Entity::Accept(_) => EntityKind::Accept,
            Entity::Retraction(_) => EntityKind::Retraction,
            Entity::Reshare(_) => EntityKind::Reshare,
            Entity::Comment(_) => EntityKind::Comment,
            Entity::Like(_) => EntityKind::Like,
            Entity::Contact(_) => EntityKind::Contact,
        }
    }

    /// Globally unique wire identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Entity::Post(e) => &e.id,
            Entity::Profile(e) => &e.id,
            Entity::Follow(e) => &e.id,
            Entity::Accept(e) => &e.id,
            Entity::Retraction(e) => &e.id,
            Entity::Reshare(e) => &e.id,
            Entity::Comment(e) => &e.id,
            Entity::Like(e) => &e.id,
            Entity::Contact(e) => &e.id,
        }
    }

    /// Origin identity. A profile is its own actor.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        match self {
            Entity::Post(e) => &e.actor_id,
            Entity::Profile(e) => &e.id,
            Entity::Follow(e) => &e.actor_id,
            Entity::Accept(e) => &e.actor_id,
            Entity::Retraction(e) => &e.actor_id,
            Entity::Reshare(e) => &e.actor_id,
            Entity::Comment(e) => &e.actor_id,
            Entity::Like(e) => &e.actor_id,
            Entity::Contact(e) => &e.actor_id,
        }
    }

    /// Protocol-local identifier, when the entity has one.
    #[must_use]
    pub fn guid(&self) -> Option<&str> {
        match self {
            Entity::Post(e) => e.guid.as_deref(),
            Entity::Profile(e) => e.guid.as_deref(),
            Entity::Reshare(e) => e.guid.as_deref(),
            Entity::Comment(e) => e.guid.as_deref(),
            Entity::Like(e) => e.guid.as_deref(),
            Entity::Follow(_) | Entity::Accept(_) | Entity::Retraction(_) | Entity::Contact(_) => {
                None
            }
        }
    }

    /// Referenced entity or actor, for entities that point at another.
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Entity::Follow(e) => e.target_id.as_deref(),
            Entity::Accept(e) => e.target_id.as_deref(),
            Entity::Retraction(e) => e.target_id.as_deref(),
            Entity::Reshare(e) => e.target_id.as_deref(),
            Entity::Comment(e) => e.target_id.as_deref(),
            Entity::Like(e) => e.target_id.as_deref(),
            Entity::Contact(e) => e.target_id.as_deref(),
            Entity::Post(_) | Entity::Profile(_) => None,
        }
    }

    /// Visibility flag. Relationship and action entities count as public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        match self {
            Entity::Post(e) => e.public,
            Entity::Profile(e) => e.public,
            Entity::Reshare(e) => e.public,
            Entity::Comment(e) => e.public,
            _ => true,
        }
    }

    /// Whether the entity must reference a target before mapping.
    #[must_use]
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Entity::Like(_) | Entity::Comment(_) | Entity::Retraction(_) | Entity::Contact(_)
        )
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )*
    };
}

impl_from_variant!(Post, Profile, Follow, Accept, Retraction, Reshare, Comment, Like, Contact);
