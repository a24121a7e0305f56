pub mod certificate;
pub mod enums;

pub use certificate::*;
