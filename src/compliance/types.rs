use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::{RequirementCategory, WarningLevel};

// ═══════════════════════════════════════════
// Route input
// ═══════════════════════════════════════════

/// Route attributes supplied by the routing collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAttributes {
    pub distance_meters: f64,
    #[serde(default)]
    pub border_crossing: bool,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
}

impl RouteAttributes {
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}

// ═══════════════════════════════════════════
// Requirement output
// ═══════════════════════════════════════════

/// A document a transport must (or may) carry. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementDocument {
    pub id: String,
    pub name: String,
    pub required: bool,
    pub description: String,
    pub category: RequirementCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementWarning {
    pub level: WarningLevel,
    pub message: String,
}

impl RequirementWarning {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarningLevel::Warning,
            message: message.into(),
        }
    }
}

/// Documents and warnings scoped to one matched country.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CountryRequirements {
    pub documents: Vec<RequirementDocument>,
    pub warnings: Vec<RequirementWarning>,
}

/// Output of the requirement engine. A value: produced fresh per route.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequirementSet {
    pub documents: Vec<RequirementDocument>,
    pub warnings: Vec<RequirementWarning>,
    pub country_specific: BTreeMap<String, CountryRequirements>,
}

impl RequirementSet {
    /// General documents first, then each country block in key order.
    pub fn all_documents(&self) -> impl Iterator<Item = &RequirementDocument> {
        self.documents
            .iter()
            .chain(self.country_specific.values().flat_map(|c| c.documents.iter()))
    }

    /// Ids of required documents, deduplicated, in `all_documents` order.
    pub fn required_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.all_documents()
            .filter(|d| d.required)
            .filter(|d| seen.insert(d.id.as_str()))
            .map(|d| d.id.as_str())
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<&RequirementDocument> {
        self.all_documents().find(|d| d.id == id)
    }

    pub fn documents_in(&self, category: RequirementCategory) -> Vec<&RequirementDocument> {
        self.all_documents().filter(|d| d.category == category).collect()
    }
}

// ═══════════════════════════════════════════
// Verdict
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceVerdict {
    pub is_compliant: bool,
    pub total_required: usize,
    pub confirmed: usize,
    pub missing: Vec<RequirementDocument>,
}

impl ComplianceVerdict {
    /// Verdict for an absent requirement set: vacuously compliant.
    pub fn vacuous() -> Self {
        Self {
            is_compliant: true,
            total_required: 0,
            confirmed: 0,
            missing: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════

/// Catalog loading errors. Rule evaluation itself never fails.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog load failed ({0}): {1}")]
    Load(String, String),

    #[error("Catalog parse failed ({0}): {1}")]
    Parse(String, String),

    #[error("Catalog invalid: {0}")]
    Invalid(String),
}
