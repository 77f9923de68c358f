use crate::PrivateKey;

/// An identity that authors and signs outbound payloads.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    /// Actor id, a URL for the activity protocol.
    pub id: String,
    /// `user@domain` handle, used by the envelope protocol.
    pub handle: Option<String>,
    /// Local guid of the user.
    pub guid: Option<String>,
    /// Signing key.
    pub private_key: PrivateKey,
}

impl UserIdentity {
    /// Creates an identity from an id and signing key.
    pub fn new(id: impl Into<String>, private_key: PrivateKey) -> Self {
        Self {
            id: id.into(),
            handle: None,
            guid: None,
            private_key,
        }
    }

    /// Sets the `user@domain` handle.
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Sets the local guid.
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// The key id remote servers resolve to fetch this identity's public key.
    #[must_use]
    pub fn key_id(&self) -> String {
        format!("{}#main-key", self.id)
    }

    /// The handle when known, otherwise the id.
    #[must_use]
    pub fn handle_or_id(&self) -> &str {
        self.handle.as_deref().unwrap_or(&self.id)
    }
}
