//! Repository layer: entity-scoped database operations.

mod certificate;

pub use certificate::*;
