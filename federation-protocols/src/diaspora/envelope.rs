//! Magic envelopes and their encrypted single-recipient wrapper.

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};
use federation_crypto::{EncryptedPayload, SignatureScheme};
use federation_types::UserIdentity;
use serde::{Deserialize, Serialize};

use super::xml::{write_element, XmlElement};
use crate::error::{FederationError, FederationResult};

pub const MAGIC_ENV_NS: &str = "http://salmon-protocol.org/ns/magic-env";
pub const DATA_TYPE: &str = "application/xml";
pub const ENCODING: &str = "base64url";

pub fn b64url(data: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(data)
}

/// Decodes base64url with or without padding.
pub fn b64url_decode(data: &str) -> Option<Vec<u8>> {
    let data = data.trim();
    URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')))
        .ok()
}

/// A signed magic envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicEnvelope {
    /// base64url of the entity XML.
    pub data: String,
    pub data_type: String,
    pub encoding: String,
    pub alg: String,
    /// base64url of the signer's handle.
    pub key_id: Option<String>,
    /// base64url signature.
    pub signature: String,
}

impl MagicEnvelope {
    /// Text covered by the envelope signature.
    pub fn signed_text(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.data,
            b64url(&self.data_type),
            b64url(&self.encoding),
            b64url(&self.alg)
        )
    }

    /// Wraps `payload_xml` and signs it as `sender`.
    pub fn seal(
        payload_xml: &str,
        sender: &UserIdentity,
        scheme: &dyn SignatureScheme,
    ) -> FederationResult<Self> {
        let mut envelope = Self {
            data: b64url(payload_xml),
            data_type: DATA_TYPE.to_string(),
            encoding: ENCODING.to_string(),
            alg: scheme.algorithm().to_string(),
            key_id: Some(b64url(sender.handle_or_id())),
            signature: String::new(),
        };
        let signature = scheme.sign(envelope.signed_text().as_bytes(), &sender.private_key)?;
        envelope.signature = b64url(signature);
        Ok(envelope)
    }

    pub fn to_xml(&self) -> String {
        let mut out = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><me:env xmlns:me=\"{MAGIC_ENV_NS}\">"
        );
        write_element(&mut out, "me:data", &[("type", self.data_type.as_str())], &self.data);
        write_element(&mut out, "me:encoding", &[], &self.encoding);
        write_element(&mut out, "me:alg", &[], &self.alg);
        match &self.key_id {
            Some(key_id) => write_element(&mut out, "me:sig", &[("key_id", key_id.as_str())], &self.signature),
            None => write_element(&mut out, "me:sig", &[], &self.signature),
        }
        out.push_str("</me:env>");
        out
    }

    pub fn parse(xml: &str) -> FederationResult<Self> {
        let root = XmlElement::parse(xml)?;
        if root.name != "env" {
            return Err(FederationError::Parse(format!(
                "expected a magic envelope, found <{}>",
                root.name
            )));
        }
        let missing = |name: &str| FederationError::Parse(format!("magic envelope has no {name}"));
        let data = root.child("data").ok_or_else(|| missing("data"))?;
        let sig = root.child("sig").ok_or_else(|| missing("sig"))?;

        Ok(Self {
            data: data.text.trim().to_string(),
            data_type: data.attribute("type").unwrap_or(DATA_TYPE).to_string(),
            encoding: root
                .child_text("encoding")
                .unwrap_or(ENCODING)
                .trim()
                .to_string(),
            alg: root
                .child_text("alg")
                .ok_or_else(|| missing("alg"))?
                .trim()
                .to_string(),
            key_id: sig.attribute("key_id").map(str::to_string),
            signature: sig.text.trim().to_string(),
        })
    }

    /// The decoded entity XML.
    pub fn payload(&self) -> FederationResult<String> {
        let bytes = b64url_decode(&self.data)
            .ok_or_else(|| FederationError::Parse("magic envelope data is not base64url".into()))?;
        String::from_utf8(bytes)
            .map_err(|e| FederationError::Parse(format!("magic envelope data is not UTF-8: {e}")))
    }

    /// The signer's handle, decoded from `key_id`.
    pub fn signer_handle(&self) -> Option<String> {
        let bytes = b64url_decode(self.key_id.as_deref()?)?;
        String::from_utf8(bytes).ok()
    }

    pub fn signature_bytes(&self) -> Option<Vec<u8>> {
        b64url_decode(&self.signature)
    }
}

/// A magic envelope encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub aes_key: String,
    pub encrypted_magic_envelope: String,
}

impl From<EncryptedPayload> for EncryptedEnvelope {
    fn from(payload: EncryptedPayload) -> Self {
        Self {
            aes_key: payload.key,
            encrypted_magic_envelope: payload.ciphertext,
        }
    }
}

impl From<EncryptedEnvelope> for EncryptedPayload {
    fn from(envelope: EncryptedEnvelope) -> Self {
        Self {
            key: envelope.aes_key,
            ciphertext: envelope.encrypted_magic_envelope,
        }
    }
}
