use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use federation_crypto::{AuthToken, EncryptedPayload, PayloadCipher, SignatureScheme};
use federation_model::text::handle_domain;
use federation_model::{Entity, EntityKind, MapsFromWire, MapsToWire};
use federation_types::{ProtocolName, PublicKey, Recipient, UserIdentity};
use tracing::debug;

use super::envelope::{EncryptedEnvelope, MagicEnvelope};
use super::mapping::{
    diaspora_type, DiasporaDocument, DiasporaMapper, AUTHOR_SIGNATURE, PARENT_AUTHOR_SIGNATURE,
};
use super::xml::XmlElement;
use crate::adapter::{
    ParsedPayload, ProtocolAdapter, WireDocument, WirePayload, CONTENT_TYPE_JSON,
    CONTENT_TYPE_MAGIC_ENVELOPE,
};
use crate::error::{FederationError, FederationResult};

/// Whether `id` is a bare `user@domain` handle.
pub fn is_handle(id: &str) -> bool {
    !id.contains("://")
        && !id.contains(['/', ' '])
        && handle_domain(id).is_some()
}

/// The XML magic-envelope protocol.
///
/// Public payloads are signed magic envelopes. Private payloads are the same
/// envelope encrypted for one recipient and wrapped in JSON.
#[derive(Clone)]
pub struct DiasporaAdapter {
    scheme: Arc<dyn SignatureScheme>,
    cipher: Arc<dyn PayloadCipher>,
    mapper: DiasporaMapper,
}

impl DiasporaAdapter {
    pub fn new(scheme: Arc<dyn SignatureScheme>, cipher: Arc<dyn PayloadCipher>) -> Self {
        Self {
            scheme,
            cipher,
            mapper: DiasporaMapper,
        }
    }

    /// Adds `author_signature` and, with a parent, `parent_author_signature`.
    fn sign_relayable(
        &self,
        doc: &mut DiasporaDocument,
        entity: &Entity,
        author: &UserIdentity,
        parent_author: Option<&UserIdentity>,
    ) -> FederationResult<()> {
        let text = doc.signable_text();
        let existing = match entity {
            Entity::Comment(c) => c.author_signature.clone(),
            Entity::Like(l) => l.author_signature.clone(),
            _ => None,
        };
        let author_signature = match existing.filter(|s| !s.is_empty()) {
            Some(signature) => signature,
            None => STANDARD.encode(self.scheme.sign(text.as_bytes(), &author.private_key)?),
        };
        doc.set(AUTHOR_SIGNATURE, author_signature.as_str());

        if let Some(parent) = parent_author {
            let chained = format!("{text};{author_signature}");
            let signature = self.scheme.sign(chained.as_bytes(), &parent.private_key)?;
            doc.set(PARENT_AUTHOR_SIGNATURE, STANDARD.encode(signature));
        }
        Ok(())
    }

    /// Checks a base64 signature, treating undecodable input as invalid.
    fn verify_encoded(&self, data: &[u8], signature: &str, key: &PublicKey) -> bool {
        STANDARD
            .decode(signature.trim())
            .is_ok_and(|bytes| self.scheme.verify(data, &bytes, key))
    }

    /// Opens a private JSON payload, or returns the input as envelope XML.
    fn envelope_xml(&self, text: &str, user: Option<&UserIdentity>) -> FederationResult<String> {
        if !text.trim_start().starts_with('{') {
            return Ok(text.to_string());
        }
        let wrapped: EncryptedEnvelope = serde_json::from_str(text)
            .map_err(|e| FederationError::Parse(format!("invalid encrypted envelope: {e}")))?;
        let user = user.ok_or_else(|| {
            FederationError::Parse("private payload received without a receiving user".into())
        })?;
        let plain = self
            .cipher
            .decrypt(&EncryptedPayload::from(wrapped), &user.private_key)
            .map_err(|e| FederationError::Parse(format!("cannot open private payload: {e}")))?;
        String::from_utf8(plain)
            .map_err(|e| FederationError::Parse(format!("private payload is not UTF-8: {e}")))
    }
}

impl std::fmt::Debug for DiasporaAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiasporaAdapter")
            .field("algorithm", &self.scheme.algorithm())
            .finish()
    }
}

impl ProtocolAdapter for DiasporaAdapter {
    fn name(&self) -> ProtocolName {
        ProtocolName::Diaspora
    }

    fn identify_id(&self, id: &str) -> bool {
        is_handle(id)
    }

    fn identify_payload(&self, payload: &[u8]) -> bool {
        let Ok(text) = std::str::from_utf8(payload) else {
            return false;
        };
        if text.trim_start().starts_with('{') {
            return serde_json::from_str::<EncryptedEnvelope>(text).is_ok();
        }
        text.contains("magic-env") || text.contains("<me:env")
    }

    fn build_send(
        &self,
        entity: &Entity,
        author: &UserIdentity,
        parent_author: Option<&UserIdentity>,
        recipient: Option<&Recipient>,
    ) -> FederationResult<WirePayload> {
        let mut doc = self.mapper.to_wire(entity)?;
        if let Some(handle) = author.handle.as_deref() {
            if !doc.get("author").is_some_and(is_handle) {
                doc.set("author", handle);
            }
        }
        if doc.is_relayable() {
            self.sign_relayable(&mut doc, entity, author, parent_author)?;
        }

        let sender = parent_author.unwrap_or(author);
        let envelope = MagicEnvelope::seal(&doc.to_xml(), sender, self.scheme.as_ref())?;

        match recipient.filter(|r| r.is_private()) {
            Some(Recipient {
                public_key: Some(key),
                ..
            }) => {
                let encrypted = self.cipher.encrypt_for(envelope.to_xml().as_bytes(), key)?;
                let body = serde_json::to_vec(&EncryptedEnvelope::from(encrypted)).map_err(|e| {
                    FederationError::Parse(format!("failed to encode private payload: {e}"))
                })?;
                Ok(WirePayload {
                    body,
                    content_type: CONTENT_TYPE_JSON,
                })
            }
            _ => Ok(WirePayload {
                body: envelope.to_xml().into_bytes(),
                content_type: CONTENT_TYPE_MAGIC_ENVELOPE,
            }),
        }
    }

    fn http_auth(&self, _author: &UserIdentity) -> Option<AuthToken> {
        None
    }

    fn delivery_endpoint(&self, recipient: &Recipient, private: bool) -> FederationResult<String> {
        let domain = handle_domain(&recipient.id)
            .filter(|_| is_handle(&recipient.id))
            .ok_or_else(|| {
                FederationError::Routing(format!("{} is not a diaspora handle", recipient.id))
            })?;
        if !private {
            return Ok(format!("https://{domain}/receive/public"));
        }
        let guid = recipient
            .guid
            .as_deref()
            .filter(|g| !g.is_empty())
            .ok_or_else(|| {
                FederationError::Routing(format!(
                    "private delivery to {} needs the recipient guid",
                    recipient.id
                ))
            })?;
        Ok(format!("https://{domain}/receive/users/{guid}"))
    }

    fn parse(&self, payload: &[u8], user: Option<&UserIdentity>) -> FederationResult<ParsedPayload> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| FederationError::Parse(format!("payload is not UTF-8: {e}")))?;
        let envelope = MagicEnvelope::parse(&self.envelope_xml(text, user)?)?;
        let element = XmlElement::parse(&envelope.payload()?)?;

        let actor_id = envelope
            .signer_handle()
            .or_else(|| element.child_text("author").map(str::to_string))
            .ok_or_else(|| FederationError::Parse("envelope names no author".into()))?;

        Ok(ParsedPayload {
            protocol: ProtocolName::Diaspora,
            actor_id,
            signed_data: envelope.signed_text().into_bytes(),
            signature: envelope.signature_bytes(),
            document: WireDocument::Xml(element),
        })
    }

    fn verify(&self, parsed: &ParsedPayload, key: &PublicKey) -> bool {
        let WireDocument::Xml(element) = &parsed.document else {
            return false;
        };
        let relayable = matches!(element.name.as_str(), "comment" | "like");
        if !relayable && element.child_text("author") != Some(parsed.actor_id.as_str()) {
            debug!(actor = %parsed.actor_id, "envelope signer is not the entity author");
            return false;
        }
        parsed
            .signature
            .as_deref()
            .is_some_and(|signature| self.scheme.verify(&parsed.signed_data, signature, key))
    }

    fn content_author(&self, parsed: &ParsedPayload) -> Option<String> {
        let WireDocument::Xml(element) = &parsed.document else {
            return None;
        };
        if !matches!(element.name.as_str(), "comment" | "like") {
            return None;
        }
        element.child_text("author").map(str::to_string)
    }

    /// Relayables need the author's signature over the signable text. When a
    /// third party signed the envelope it must also have added a parent
    /// signature over that text and the author signature.
    fn verify_content(
        &self,
        parsed: &ParsedPayload,
        author_key: &PublicKey,
        signer_key: &PublicKey,
    ) -> bool {
        let WireDocument::Xml(element) = &parsed.document else {
            return false;
        };
        let doc = DiasporaDocument::from_element(element);
        if !doc.is_relayable() {
            return true;
        }
        let text = doc.signable_text();
        let Some(author_signature) = doc.get(AUTHOR_SIGNATURE).filter(|s| !s.is_empty()) else {
            debug!(actor = %parsed.actor_id, "relayable carries no author signature");
            return false;
        };
        if !self.verify_encoded(text.as_bytes(), author_signature, author_key) {
            debug!(actor = %parsed.actor_id, "author signature does not verify");
            return false;
        }
        if doc.get("author") == Some(parsed.actor_id.as_str()) {
            return true;
        }
        let chained = format!("{text};{author_signature}");
        let relayed = doc
            .get(PARENT_AUTHOR_SIGNATURE)
            .is_some_and(|signature| self.verify_encoded(chained.as_bytes(), signature, signer_key));
        if !relayed {
            debug!(actor = %parsed.actor_id, "relayer did not sign the relayable");
        }
        relayed
    }

    fn to_entity(&self, parsed: &ParsedPayload) -> FederationResult<Entity> {
        match &parsed.document {
            WireDocument::Xml(element) => {
                Ok(self.mapper.from_wire(&DiasporaDocument::from_element(element))?)
            }
            WireDocument::Json(_) => Err(FederationError::Parse(
                "diaspora cannot map a JSON document".into(),
            )),
        }
    }

    fn remote_content_url(
        &self,
        id: &str,
        guid: Option<&str>,
        handle: Option<&str>,
        entity_type: Option<EntityKind>,
    ) -> FederationResult<String> {
        let handle = handle.unwrap_or(id);
        let domain = handle_domain(handle)
            .filter(|_| is_handle(handle))
            .ok_or_else(|| {
                FederationError::Routing(format!("cannot fetch {id} without a diaspora handle"))
            })?;
        let guid = guid.unwrap_or(id);
        let kind = diaspora_type(entity_type.unwrap_or(EntityKind::Post)).to_ascii_lowercase();
        Ok(format!("https://{domain}/fetch/{kind}/{guid}"))
    }
}
