//! Entity and value-object markers.

/// Something with identity that persists across state changes
/// (a document line keeps its id while its quantity is edited).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Immutable value compared by its attributes, not by identity.
///
/// To "modify" a value object, build a new one. Pricing inputs and tax
/// breakdowns are value objects: two breakdowns with the same amounts are the
/// same breakdown regardless of which line produced them.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
