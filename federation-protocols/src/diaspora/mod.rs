//! The XML magic-envelope protocol (Diaspora).
//!
//! Recipients are addressed by `user@domain` handle. Entities travel as flat
//! XML inside a signed magic envelope; private deliveries encrypt the
//! envelope for the recipient's key.

mod envelope;
mod mapping;
mod protocol;
mod xml;

pub use envelope::{b64url, b64url_decode, EncryptedEnvelope, MagicEnvelope};
pub use mapping::{diaspora_type, DiasporaDocument, DiasporaMapper};
pub use protocol::{is_handle, DiasporaAdapter};
pub use xml::XmlElement;
