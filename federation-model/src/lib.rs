//! Protocol-agnostic entity model for the federation layer.
//!
//! Defines the types every protocol adapter maps to and from:
//! - [`Entity`]: one of Post, Profile, Follow, Accept, Retraction, Reshare,
//!   Comment, Like or Contact
//! - [`MapsToWire`] / [`MapsFromWire`]: the per-protocol mapping capability an
//!   adapter implements over the base entities
//! - [`MappingError`]: a required attribute was absent during conversion
//!
//! Entities are built by the calling application and handed to the dispatcher
//! or returned from the receiver. This crate holds no state between calls.

mod entity;
mod error;
mod mapping;
pub mod text;

pub use entity::{
    Accept, Comment, Contact, Entity, EntityKind, Follow, ImageUrls, Like, Post, Profile,
    Reshare, Retraction, NSFW_TAG,
};
pub use error::{MappingError, MappingResult};
pub use mapping::{require, require_target, MapsFromWire, MapsToWire};
