//! The JSON-LD activity protocol (ActivityPub).
//!
//! Recipients are addressed by URL. Documents are mapped by
//! [`ActivityPubMapper`] and signed by [`ActivityPubAdapter`].

pub mod constants;
mod mapping;
mod protocol;

pub use mapping::ActivityPubMapper;
pub use protocol::{canonical_json, extract_actor, ActivityPubAdapter};
