use thiserror::Error;

/// Result type for entity mapping.
pub type MappingResult<T> = Result<T, MappingError>;

/// Errors raised while converting entities to or from a wire format.
///
/// Mapping never substitutes a default for a required attribute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// A required source attribute is absent or empty.
    #[error("{entity} is missing required attribute `{attribute}`")]
    MissingAttribute {
        entity: &'static str,
        attribute: &'static str,
    },

    /// The protocol has no representation for this entity.
    #[error("{protocol} cannot represent {entity}")]
    Unsupported {
        protocol: &'static str,
        entity: String,
    },

    /// The wire document is structurally invalid.
    #[error("malformed wire document: {0}")]
    Malformed(String),
}
