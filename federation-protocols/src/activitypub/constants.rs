//! JSON-LD context declarations and well-known values.

use serde_json::{json, Value};

pub const CONTEXT_ACTIVITYSTREAMS: &str = "https://www.w3.org/ns/activitystreams";
pub const CONTEXT_LD_SIGNATURES: &str = "https://w3id.org/security/v1";

/// The public addressing collection.
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Object types that denote an actor.
pub const ACTOR_TYPES: [&str; 5] = ["Person", "Service", "Application", "Group", "Organization"];

/// Object types mapped to posts and comments.
pub const CONTENT_TYPES: [&str; 3] = ["Note", "Article", "Page"];

pub fn context_hashtag() -> Value {
    json!({"Hashtag": "as:Hashtag"})
}

pub fn context_sensitive() -> Value {
    json!({"sensitive": "as:sensitive"})
}

pub fn context_manually_approves_followers() -> Value {
    json!({"manuallyApprovesFollowers": "as:manuallyApprovesFollowers"})
}

/// The base context list every document starts from.
pub fn contexts_default() -> Vec<Value> {
    vec![Value::from(CONTEXT_ACTIVITYSTREAMS)]
}

/// The base context list plus per-entity extensions.
pub fn contexts_with(extra: impl IntoIterator<Item = Value>) -> Value {
    let mut contexts = contexts_default();
    contexts.extend(extra);
    Value::Array(contexts)
}
