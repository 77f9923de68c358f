use crate::{Entity, MappingError, MappingResult};

/// Converts base entities into one protocol's wire structure.
///
/// Protocol adapters implement this over the shared [`Entity`] model instead
/// of subclassing it. Optional wire fields are omitted when the source
/// attribute is empty; required ones fail with [`MappingError`].
pub trait MapsToWire {
    /// The protocol's native document type.
    type Wire;

    /// Maps an entity to the wire structure.
    fn to_wire(&self, entity: &Entity) -> MappingResult<Self::Wire>;
}

/// Converts one protocol's wire structure back into a base entity.
pub trait MapsFromWire {
    /// The protocol's native document type.
    type Wire;

    /// Maps a wire structure to an entity.
    fn from_wire(&self, wire: &Self::Wire) -> MappingResult<Entity>;
}

/// Returns the value when present and non-blank.
pub fn require<'a>(
    entity: &'static str,
    attribute: &'static str,
    value: Option<&'a str>,
) -> MappingResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MappingError::MissingAttribute { entity, attribute }),
    }
}

/// `target_id` check shared by relational entities.
pub fn require_target<'a>(entity: &'static str, target_id: Option<&'a str>) -> MappingResult<&'a str> {
    require(entity, "target_id", target_id)
}
