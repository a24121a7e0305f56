use std::collections::HashSet;
use std::sync::Arc;

use super::catalog::{CatalogDocument, CountryRuleFamily, RequirementCatalog};
use super::helpers::{normalize, token_matches_any};
use super::types::{
    CountryRequirements, RequirementDocument, RequirementSet, RequirementWarning, RouteAttributes,
};
use crate::models::enums::RequirementCategory;

/// Derives the documents a transport must carry from its route attributes.
///
/// Pure and reentrant: holds only the read-only catalog.
#[derive(Debug, Clone)]
pub struct RequirementEngine {
    catalog: Arc<RequirementCatalog>,
}

impl RequirementEngine {
    pub fn new(catalog: Arc<RequirementCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    pub fn derive(&self, route: &RouteAttributes) -> RequirementSet {
        let set = derive_requirements(route, &self.catalog);
        tracing::debug!(
            catalog_version = %self.catalog.version(),
            documents = set.all_documents().count(),
            warnings = set.warnings.len(),
            countries = set.country_specific.len(),
            "Requirements derived"
        );
        set
    }
}

/// Emits document ids at most once per route; the first emitter wins.
struct DocumentSink {
    seen: HashSet<String>,
}

impl DocumentSink {
    fn push(
        &mut self,
        out: &mut Vec<RequirementDocument>,
        doc: &CatalogDocument,
        category: RequirementCategory,
    ) {
        if self.seen.insert(doc.id.clone()) {
            out.push(doc.to_requirement(category));
        }
    }
}

/// Route attributes → requirement set. Total: malformed input (negative
/// distance, blank country names) simply triggers no special requirement.
pub fn derive_requirements(route: &RouteAttributes, catalog: &RequirementCatalog) -> RequirementSet {
    let mut sink = DocumentSink {
        seen: HashSet::new(),
    };
    let mut set = RequirementSet::default();

    // Base documents
    for doc in catalog.base_documents() {
        sink.push(&mut set.documents, doc, RequirementCategory::Base);
    }

    // Distance tier: exactly one warning either way
    let distance = catalog.distance_rule();
    if is_over_threshold(route.distance_km(), catalog.distance_threshold_km()) {
        sink.push(&mut set.documents, &distance.document, RequirementCategory::Distance);
        set.warnings
            .push(RequirementWarning::info(distance.required_warning.clone()));
    } else {
        set.warnings
            .push(RequirementWarning::info(distance.not_required_warning.clone()));
    }

    // Border crossing
    if route.border_crossing {
        let border = catalog.border_rule();
        sink.push(&mut set.documents, &border.document, RequirementCategory::Border);
        set.warnings
            .push(RequirementWarning::warning(border.warning.clone()));
    }

    // Country rules
    let tokens: Vec<String> = route
        .countries
        .iter()
        .map(|c| normalize(c))
        .filter(|c| !c.is_empty())
        .collect();
    if tokens.is_empty() {
        return set;
    }

    let is_truck = catalog.is_truck(route.vehicle_type.as_deref());
    for family in catalog.country_rules() {
        for variant_index in matched_variants(family, &tokens) {
            let variant = &family.variants[variant_index];
            let mut block = CountryRequirements::default();

            for doc in &variant.documents {
                sink.push(&mut block.documents, doc, RequirementCategory::Country);
            }
            if is_truck {
                for doc in &variant.truck_documents {
                    sink.push(&mut block.documents, doc, RequirementCategory::Country);
                }
            }
            block.warnings.extend(variant.warnings.iter().cloned());

            set.country_specific.insert(variant.key.clone(), block);
        }
    }

    set
}

/// Strict `>`: exactly on the threshold is "not over". NaN is never over.
fn is_over_threshold(distance_km: f64, threshold_km: f64) -> bool {
    distance_km > threshold_km
}

/// Variants selected by the route's country tokens, in catalog order.
///
/// Each token selects at most one variant of the family (the first whose
/// terms match), so a single name never populates two keys of one family.
fn matched_variants(family: &CountryRuleFamily, tokens: &[String]) -> Vec<usize> {
    let mut selected: Vec<usize> = tokens
        .iter()
        .filter_map(|token| {
            family
                .variants
                .iter()
                .position(|v| token_matches_any(token, &v.match_terms))
        })
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}
