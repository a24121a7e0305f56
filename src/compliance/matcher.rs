//! Certificate ↔ requirement matching and expiry validity.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use super::catalog::RequirementCatalog;
use super::helpers::normalize;
use crate::models::Certificate;

/// Matches certificate records against requirement ids via the catalog's
/// keyword index. Stateless apart from the shared catalog.
#[derive(Debug, Clone)]
pub struct CertificateMatcher {
    catalog: Arc<RequirementCatalog>,
}

impl CertificateMatcher {
    pub fn new(catalog: Arc<RequirementCatalog>) -> Self {
        Self { catalog }
    }

    /// True when any descriptive field of the certificate names the requirement.
    ///
    /// Candidates are tried in priority order; the first hit wins. A candidate
    /// hits on an exact keyword mapped to `requirement_id`, or when a keyword
    /// mapped to `requirement_id` contains it.
    pub fn matches(&self, certificate: &Certificate, requirement_id: &str) -> bool {
        let keywords = self.catalog.keywords_for(requirement_id);

        candidates(certificate).into_iter().any(|candidate| {
            let exact = self
                .catalog
                .requirement_for_keyword(&candidate)
                .is_some_and(|id| id == requirement_id);
            exact || keywords.iter().any(|k| k.contains(candidate.as_str()))
        })
    }
}

/// Normalized, non-empty match candidates in priority order.
fn candidates(certificate: &Certificate) -> Vec<String> {
    let extracted = certificate.extracted_data.as_ref();
    let raw: [Option<&str>; 6] = [
        certificate.document_type.as_deref(),
        extracted.and_then(|d| d.get("document_type")).and_then(Value::as_str),
        certificate.certificate_type.as_deref(),
        certificate.display_name.as_deref(),
        Some(certificate.file_name.as_str()),
        extracted
            .and_then(|d| d.get("authorisation"))
            .and_then(|a| a.get("type"))
            .and_then(Value::as_str),
    ];

    raw.into_iter()
        .flatten()
        .map(normalize)
        .filter(|c| !c.is_empty())
        .collect()
}

/// Whether the certificate may count towards compliance at `now`.
///
/// No discoverable expiry, or one that cannot be parsed, counts as valid.
pub fn is_valid(certificate: &Certificate, now: DateTime<Utc>) -> bool {
    match expiry_of(certificate) {
        Some(expiry) => expiry > now,
        None => true,
    }
}

/// First parseable expiry: the record field, then the extracted payload.
pub fn expiry_of(certificate: &Certificate) -> Option<DateTime<Utc>> {
    let extracted = certificate.extracted_data.as_ref();
    let raw = certificate
        .expiry_date
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            extracted.and_then(|d| {
                d.get("expiryDate")
                    .or_else(|| d.get("expiry_date"))
                    .and_then(Value::as_str)
            })
        })?;

    let parsed = parse_expiry(raw);
    if parsed.is_none() {
        tracing::debug!(
            certificate_id = %certificate.id,
            expiry = raw,
            "Unparseable expiry date, treating certificate as valid"
        );
    }
    parsed
}

/// Accepts RFC 3339 and the day-precision formats seen on Nordic documents.
/// Dates without a time resolve to midnight UTC.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
