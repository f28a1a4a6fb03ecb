//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// instances with the same values are the same value. To "modify" one, build
/// a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
