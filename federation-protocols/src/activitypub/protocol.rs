use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{SecondsFormat, Utc};
use federation_crypto::{build_http_auth, AuthToken, SignatureScheme};
use federation_model::{Entity, EntityKind, MapsFromWire, MapsToWire};
use federation_types::{ProtocolName, PublicKey, Recipient, UserIdentity};
use serde_json::{json, Value};
use tracing::debug;

use super::constants::{ACTOR_TYPES, PUBLIC_COLLECTION};
use super::mapping::{id_of, ActivityPubMapper};
use crate::adapter::{
    ParsedPayload, ProtocolAdapter, WireDocument, WirePayload, CONTENT_TYPE_ACTIVITY,
};
use crate::error::{FederationError, FederationResult};

/// The JSON-LD activity protocol.
///
/// Payloads carry an embedded linked-data signature made by the author's
/// `#main-key`; deliveries additionally carry an HTTP signature token.
#[derive(Clone)]
pub struct ActivityPubAdapter {
    scheme: Arc<dyn SignatureScheme>,
    mapper: ActivityPubMapper,
}

impl ActivityPubAdapter {
    pub fn new(scheme: Arc<dyn SignatureScheme>) -> Self {
        Self {
            scheme,
            mapper: ActivityPubMapper,
        }
    }

    /// The linked-data signature type written into documents.
    fn signature_type(&self) -> String {
        format!("{}Signature2017", self.scheme.algorithm())
    }

    /// Signs `doc` in place with `author`'s key.
    fn sign_document(&self, doc: &mut Value, author: &UserIdentity) -> FederationResult<()> {
        let signed = canonical_json(doc);
        let signature = self.scheme.sign(signed.as_bytes(), &author.private_key)?;
        if let Value::Object(map) = doc {
            map.insert(
                "signature".into(),
                json!({
                    "type": self.signature_type(),
                    "creator": author.key_id(),
                    "created": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    "signatureValue": STANDARD.encode(signature),
                }),
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for ActivityPubAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityPubAdapter")
            .field("algorithm", &self.scheme.algorithm())
            .finish()
    }
}

impl ProtocolAdapter for ActivityPubAdapter {
    fn name(&self) -> ProtocolName {
        ProtocolName::ActivityPub
    }

    fn identify_id(&self, id: &str) -> bool {
        let lower = id.trim_start().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    fn identify_payload(&self, payload: &[u8]) -> bool {
        serde_json::from_slice::<Value>(payload)
            .map(|doc| doc.get("@context").is_some())
            .unwrap_or(false)
    }

    fn build_send(
        &self,
        entity: &Entity,
        author: &UserIdentity,
        _parent_author: Option<&UserIdentity>,
        recipient: Option<&Recipient>,
    ) -> FederationResult<WirePayload> {
        let mut doc = self.mapper.to_wire(entity)?;
        if let Value::Object(map) = &mut doc {
            match recipient {
                Some(recipient) => {
                    map.insert("to".into(), Value::from(recipient.id.as_str()));
                }
                None if is_addressable_content(entity) && entity.is_public() => {
                    map.insert("to".into(), json!([PUBLIC_COLLECTION]));
                }
                None => {}
            }
        }
        self.sign_document(&mut doc, author)?;

        let body = serde_json::to_vec(&doc)
            .map_err(|e| FederationError::Parse(format!("failed to encode document: {e}")))?;
        Ok(WirePayload {
            body,
            content_type: CONTENT_TYPE_ACTIVITY,
        })
    }

    fn http_auth(&self, author: &UserIdentity) -> Option<AuthToken> {
        Some(build_http_auth(
            self.scheme.clone(),
            &author.private_key,
            author.key_id(),
        ))
    }

    fn delivery_endpoint(&self, recipient: &Recipient, _private: bool) -> FederationResult<String> {
        if !self.identify_id(&recipient.id) {
            return Err(FederationError::Routing(format!(
                "{} is not an activitypub inbox",
                recipient.id
            )));
        }
        Ok(recipient.id.clone())
    }

    fn parse(&self, payload: &[u8], _user: Option<&UserIdentity>) -> FederationResult<ParsedPayload> {
        let mut doc: Value = serde_json::from_slice(payload)
            .map_err(|e| FederationError::Parse(format!("invalid JSON: {e}")))?;
        if !doc.is_object() {
            return Err(FederationError::Parse("expected a JSON object".into()));
        }

        let actor_id = extract_actor(&doc)
            .ok_or_else(|| FederationError::Parse("payload names no actor".into()))?
            .to_string();

        let signature_block = doc.as_object_mut().and_then(|m| m.remove("signature"));
        let signature = signature_block
            .as_ref()
            .and_then(|block| block.get("signatureValue"))
            .and_then(Value::as_str)
            .and_then(|v| STANDARD.decode(v).ok());
        if signature_block.is_none() {
            debug!(actor = %actor_id, "activitypub payload carries no signature block");
        }
        let signed_data = canonical_json(&doc).into_bytes();
        if let (Some(block), Value::Object(map)) = (signature_block, &mut doc) {
            map.insert("signature".into(), block);
        }

        Ok(ParsedPayload {
            protocol: ProtocolName::ActivityPub,
            actor_id,
            signed_data,
            signature,
            document: WireDocument::Json(doc),
        })
    }

    fn verify(&self, parsed: &ParsedPayload, key: &PublicKey) -> bool {
        let WireDocument::Json(doc) = &parsed.document else {
            return false;
        };
        let creator_matches = doc
            .get("signature")
            .and_then(|s| s.get("creator"))
            .and_then(Value::as_str)
            .map(|creator| creator.split('#').next() == Some(parsed.actor_id.as_str()))
            .unwrap_or(false);
        match &parsed.signature {
            Some(signature) if creator_matches => {
                self.scheme.verify(&parsed.signed_data, signature, key)
            }
            _ => false,
        }
    }

    fn to_entity(&self, parsed: &ParsedPayload) -> FederationResult<Entity> {
        match &parsed.document {
            WireDocument::Json(doc) => Ok(self.mapper.from_wire(doc)?),
            WireDocument::Xml(_) => Err(FederationError::Parse(
                "activitypub cannot map an XML document".into(),
            )),
        }
    }

    fn remote_content_url(
        &self,
        id: &str,
        _guid: Option<&str>,
        _handle: Option<&str>,
        _entity_type: Option<EntityKind>,
    ) -> FederationResult<String> {
        if !self.identify_id(id) {
            return Err(FederationError::Routing(format!(
                "{id} is not an activitypub id"
            )));
        }
        Ok(id.to_string())
    }
}

fn is_addressable_content(entity: &Entity) -> bool {
    matches!(
        entity,
        Entity::Post(_) | Entity::Comment(_) | Entity::Reshare(_)
    )
}

/// The claimed actor: the subject itself for actor documents, else `actor`.
///
/// Bare objects fetched without an activity fall back to `attributedTo`.
pub fn extract_actor(doc: &Value) -> Option<&str> {
    let kind = doc.get("type").and_then(Value::as_str);
    if kind.is_some_and(|k| ACTOR_TYPES.contains(&k)) {
        return doc.get("id").and_then(Value::as_str);
    }
    doc.get("actor")
        .and_then(id_of)
        .or_else(|| doc.get("attributedTo").and_then(id_of))
}

/// Serializes `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [true, null], "c": "x"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"x","z":[true,null]},"b":1}"#
        );
    }

    #[test]
    fn extract_actor_uses_id_for_actor_documents() {
        let doc = json!({"type": "Person", "id": "https://a/bob", "actor": "https://a/x"});
        assert_eq!(extract_actor(&doc), Some("https://a/bob"));
    }

    #[test]
    fn extract_actor_reads_actor_field() {
        let doc = json!({"type": "Follow", "actor": {"id": "https://a/alice"}});
        assert_eq!(extract_actor(&doc), Some("https://a/alice"));
    }

    #[test]
    fn extract_actor_falls_back_to_attribution() {
        let doc = json!({"type": "Note", "attributedTo": "https://a/carol"});
        assert_eq!(extract_actor(&doc), Some("https://a/carol"));
    }
}
