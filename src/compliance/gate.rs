use serde::{Deserialize, Serialize};

use super::evaluator::evaluate;
use super::types::{ComplianceVerdict, RequirementDocument, RequirementSet};
use crate::models::enums::RequirementCategory;

/// Options the transport-creation workflow passes to the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateOptions {
    /// The caller creates the border-crossing document in the same
    /// transaction as the transport.
    #[serde(default)]
    pub synthesize_border_document: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDecision {
    pub allowed: bool,
    pub verdict: ComplianceVerdict,
    /// Missing documents that block creation.
    pub blocking: Vec<RequirementDocument>,
}

/// Decides whether a transport may be created.
///
/// Blocks on any missing required document. With
/// `synthesize_border_document`, border-category documents are dropped from
/// the blocking list; the verdict itself is reported unchanged.
pub fn check_transport(
    requirements: Option<&RequirementSet>,
    confirmed_ids: &[String],
    options: GateOptions,
) -> GateDecision {
    let verdict = evaluate(requirements, confirmed_ids);
    let blocking: Vec<RequirementDocument> = verdict
        .missing
        .iter()
        .filter(|d| !(options.synthesize_border_document && d.category == RequirementCategory::Border))
        .cloned()
        .collect();

    GateDecision {
        allowed: blocking.is_empty(),
        verdict,
        blocking,
    }
}
