//! Requirement catalog: document tables, country rules and the keyword index.
//!
//! Loaded once at startup from a versioned JSON data file. The bundled file
//! in `resources/` is the default; deployments may point at their own copy.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::helpers::normalize;
use super::types::{CatalogError, RequirementDocument, RequirementWarning};
use crate::models::enums::RequirementCategory;

const BUNDLED_CATALOG: &str = include_str!("../../resources/requirement_catalog.json");

// ═══════════════════════════════════════════
// File format
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl CatalogDocument {
    pub fn to_requirement(&self, category: RequirementCategory) -> RequirementDocument {
        RequirementDocument {
            id: self.id.clone(),
            name: self.name.clone(),
            required: self.required,
            description: self.description.clone(),
            category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceRule {
    pub document: CatalogDocument,
    pub required_warning: String,
    pub not_required_warning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderRule {
    pub document: CatalogDocument,
    pub warning: String,
}

/// One output key of a country rule family (e.g. `switzerland`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryVariant {
    pub key: String,
    pub match_terms: Vec<String>,
    #[serde(default)]
    pub documents: Vec<CatalogDocument>,
    #[serde(default)]
    pub truck_documents: Vec<CatalogDocument>,
    #[serde(default)]
    pub warnings: Vec<RequirementWarning>,
}

/// A family of country rules. Each matched country name selects exactly one
/// variant of the family; single-country families have one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryRuleFamily {
    pub family: String,
    pub variants: Vec<CountryVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub version: String,
    pub distance_threshold_km: f64,
    #[serde(default)]
    pub truck_vehicle_types: Vec<String>,
    pub base_documents: Vec<CatalogDocument>,
    pub distance: DistanceRule,
    pub border: BorderRule,
    #[serde(default)]
    pub country_rules: Vec<CountryRuleFamily>,
    #[serde(default)]
    pub keywords: HashMap<String, String>,
}

// ═══════════════════════════════════════════
// Loaded catalog
// ═══════════════════════════════════════════

/// Validated, indexed catalog. Read-only after construction.
#[derive(Debug, Clone)]
pub struct RequirementCatalog {
    file: CatalogFile,
    truck_types: HashSet<String>,
    /// normalized keyword → requirement id
    keyword_index: HashMap<String, String>,
    /// requirement id → normalized keywords mapped to it
    keywords_by_id: HashMap<String, Vec<String>>,
}

impl RequirementCatalog {
    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json("bundled requirement_catalog.json", BUNDLED_CATALOG)
    }

    /// Load a catalog file from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Load(path.display().to_string(), e.to_string()))?;
        Self::from_json(&path.display().to_string(), &json)
    }

    pub fn from_json(source: &str, json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| CatalogError::Parse(source.to_string(), e.to_string()))?;
        let catalog = Self::from_file(file)?;
        tracing::info!(
            source,
            version = %catalog.version(),
            keywords = catalog.keyword_index.len(),
            families = catalog.file.country_rules.len(),
            "Requirement catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        validate(&file)?;

        let document_ids = collect_document_ids(&file);

        let mut keyword_index: HashMap<String, String> = HashMap::new();
        for (keyword, id) in &file.keywords {
            if !document_ids.contains(id.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "keyword '{keyword}' maps to unknown document '{id}'"
                )));
            }
            let key = normalize(keyword);
            if key.is_empty() {
                return Err(CatalogError::Invalid("empty keyword".into()));
            }
            if let Some(existing) = keyword_index.get(&key) {
                if existing != id {
                    return Err(CatalogError::Invalid(format!(
                        "keyword '{key}' maps to both '{existing}' and '{id}'"
                    )));
                }
            }
            keyword_index.insert(key, id.clone());
        }

        // Every requirement id doubles as a keyword for itself.
        for id in &document_ids {
            keyword_index
                .entry(normalize(id))
                .or_insert_with(|| id.to_string());
        }

        let mut keywords_by_id: HashMap<String, Vec<String>> = HashMap::new();
        for (keyword, id) in &keyword_index {
            keywords_by_id
                .entry(id.clone())
                .or_default()
                .push(keyword.clone());
        }
        for keywords in keywords_by_id.values_mut() {
            keywords.sort();
        }

        let truck_types = file.truck_vehicle_types.iter().map(|t| normalize(t)).collect();

        Ok(Self {
            file,
            truck_types,
            keyword_index,
            keywords_by_id,
        })
    }

    pub fn version(&self) -> &str {
        &self.file.version
    }

    pub fn distance_threshold_km(&self) -> f64 {
        self.file.distance_threshold_km
    }

    pub fn base_documents(&self) -> &[CatalogDocument] {
        &self.file.base_documents
    }

    pub fn distance_rule(&self) -> &DistanceRule {
        &self.file.distance
    }

    pub fn border_rule(&self) -> &BorderRule {
        &self.file.border
    }

    pub fn country_rules(&self) -> &[CountryRuleFamily] {
        &self.file.country_rules
    }

    /// Case-insensitive check against the configured truck vehicle types.
    pub fn is_truck(&self, vehicle_type: Option<&str>) -> bool {
        vehicle_type
            .map(normalize)
            .is_some_and(|v| self.truck_types.contains(&v))
    }

    /// Exact lookup of a normalized keyword.
    pub fn requirement_for_keyword(&self, normalized: &str) -> Option<&str> {
        self.keyword_index.get(normalized).map(String::as_str)
    }

    /// Normalized keywords mapped to `requirement_id`.
    pub fn keywords_for(&self, requirement_id: &str) -> &[String] {
        self.keywords_by_id
            .get(requirement_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn collect_document_ids(file: &CatalogFile) -> HashSet<&str> {
    let mut ids: HashSet<&str> = file.base_documents.iter().map(|d| d.id.as_str()).collect();
    ids.insert(file.distance.document.id.as_str());
    ids.insert(file.border.document.id.as_str());
    for family in &file.country_rules {
        for variant in &family.variants {
            ids.extend(variant.documents.iter().map(|d| d.id.as_str()));
            ids.extend(variant.truck_documents.iter().map(|d| d.id.as_str()));
        }
    }
    ids
}

fn validate(file: &CatalogFile) -> Result<(), CatalogError> {
    if !file.distance_threshold_km.is_finite() || file.distance_threshold_km < 0.0 {
        return Err(CatalogError::Invalid(format!(
            "distance threshold must be a non-negative number, got {}",
            file.distance_threshold_km
        )));
    }

    let mut seen_ids = HashSet::new();
    let all_docs = file
        .base_documents
        .iter()
        .chain(std::iter::once(&file.distance.document))
        .chain(std::iter::once(&file.border.document))
        .chain(file.country_rules.iter().flat_map(|f| {
            f.variants
                .iter()
                .flat_map(|v| v.documents.iter().chain(v.truck_documents.iter()))
        }));
    for doc in all_docs {
        if doc.id.trim().is_empty() {
            return Err(CatalogError::Invalid(format!("document '{}' has an empty id", doc.name)));
        }
        if !seen_ids.insert(doc.id.as_str()) {
            return Err(CatalogError::Invalid(format!("duplicate document id '{}'", doc.id)));
        }
    }

    let mut seen_keys = HashSet::new();
    for family in &file.country_rules {
        if family.variants.is_empty() {
            return Err(CatalogError::Invalid(format!(
                "country family '{}' has no variants",
                family.family
            )));
        }
        for variant in &family.variants {
            if !seen_keys.insert(variant.key.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate country key '{}'",
                    variant.key
                )));
            }
            if variant.match_terms.iter().all(|t| normalize(t).is_empty()) {
                return Err(CatalogError::Invalid(format!(
                    "country key '{}' has no match terms",
                    variant.key
                )));
            }
        }
    }

    Ok(())
}
