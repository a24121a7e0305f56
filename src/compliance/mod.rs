//! Transport compliance: which documents a route requires, which certificates
//! satisfy them, and whether a transport may be created.

pub mod catalog;
pub mod engine;
pub mod evaluator;
pub mod gate;
pub mod helpers;
pub mod matcher;
pub mod types;

pub use catalog::RequirementCatalog;
pub use engine::{derive_requirements, RequirementEngine};
pub use evaluator::{auto_confirm, evaluate};
pub use gate::{check_transport, GateDecision, GateOptions};
pub use matcher::{is_valid, CertificateMatcher};
pub use types::*;
