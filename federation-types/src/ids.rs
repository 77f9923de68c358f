//! Protocol identifiers.
//!
//! Protocols are selected through an enumerated name rather than a free-form
//! string, so an unknown protocol is rejected at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported federation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolName {
    /// The JSON-LD activity protocol. Actors are addressed by URL.
    ActivityPub,
    /// The XML magic-envelope protocol. Actors are addressed by `user@domain` handle.
    Diaspora,
}

impl ProtocolName {
    /// Every protocol, in identification order.
    pub const ALL: [ProtocolName; 2] = [ProtocolName::ActivityPub, ProtocolName::Diaspora];

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProtocolName::ActivityPub => "activitypub",
            ProtocolName::Diaspora => "diaspora",
        }
    }
}

impl fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolName {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "activitypub" => Ok(ProtocolName::ActivityPub),
            "diaspora" => Ok(ProtocolName::Diaspora),
            _ => Err(crate::Error::UnknownProtocol(s.to_string())),
        }
    }
}
