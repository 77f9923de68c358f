//! Delivery-time recipients.

use crate::{Error, PublicKey, Result};
use serde::{Deserialize, Serialize};

/// A single delivery target.
///
/// A bare identifier is shorthand for a public recipient. Carrying a public
/// key marks the recipient as private; the guid is only used to route
/// private envelope-protocol deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Actor URL or `user@domain` handle.
    pub id: String,
    /// Key used to encrypt a private delivery.
    #[serde(default)]
    pub public_key: Option<PublicKey>,
    /// Remote guid of the recipient (envelope protocol only).
    #[serde(default)]
    pub guid: Option<String>,
}

impl Recipient {
    /// Creates a public recipient.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            public_key: None,
            guid: None,
        }
    }

    /// Attaches a delivery key, making the recipient private.
    pub fn with_key(mut self, key: PublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    /// Attaches the recipient's remote guid.
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// Parses a recipient from its JSON form, rejecting an empty or
    /// whitespace-bearing id.
    pub fn from_json(json: &str) -> Result<Self> {
        let recipient: Self = serde_json::from_str(json)?;
        if recipient.id.is_empty() || recipient.id.contains(char::is_whitespace) {
            return Err(Error::InvalidRecipient(recipient.id));
        }
        Ok(recipient)
    }

    /// Whether this recipient carries a delivery key.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.public_key.as_ref().is_some_and(|k| !k.is_empty())
    }
}

impl From<&str> for Recipient {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Recipient {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<(String, Option<PublicKey>)> for Recipient {
    fn from((id, public_key): (String, Option<PublicKey>)) -> Self {
        Self {
            id,
            public_key,
            guid: None,
        }
    }
}

impl From<(String, Option<PublicKey>, Option<String>)> for Recipient {
    fn from((id, public_key, guid): (String, Option<PublicKey>, Option<String>)) -> Self {
        Self {
            id,
            public_key,
            guid,
        }
    }
}
