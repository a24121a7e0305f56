//! Folds certificates and user confirmations into a compliance verdict.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::matcher::{is_valid, CertificateMatcher};
use super::types::{ComplianceVerdict, RequirementSet};
use crate::models::Certificate;

/// Required ids covered by at least one valid certificate, in requirement order.
///
/// Expired certificates never count, whatever they would match.
pub fn auto_confirm(
    matcher: &CertificateMatcher,
    requirements: &RequirementSet,
    certificates: &[Certificate],
    now: DateTime<Utc>,
) -> Vec<String> {
    let valid: Vec<&Certificate> = certificates.iter().filter(|c| is_valid(c, now)).collect();

    requirements
        .required_ids()
        .into_iter()
        .filter(|id| valid.iter().any(|c| matcher.matches(c, id)))
        .map(String::from)
        .collect()
}

/// Verdict over the required documents. An absent requirement set is
/// vacuously compliant.
pub fn evaluate(requirements: Option<&RequirementSet>, confirmed_ids: &[String]) -> ComplianceVerdict {
    let Some(requirements) = requirements else {
        return ComplianceVerdict::vacuous();
    };

    let confirmed: HashSet<&str> = confirmed_ids.iter().map(String::as_str).collect();
    let required = requirements.required_ids();

    let missing: Vec<_> = required
        .iter()
        .filter(|id| !confirmed.contains(*id))
        .filter_map(|id| requirements.find(id).cloned())
        .collect();

    ComplianceVerdict {
        is_compliant: missing.is_empty(),
        total_required: required.len(),
        confirmed: required.len() - missing.len(),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::catalog::RequirementCatalog;
    use crate::compliance::engine::derive_requirements;
    use crate::compliance::types::RouteAttributes;
    use crate::models::enums::EntityType;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn setup() -> (CertificateMatcher, RequirementSet) {
        let catalog = RequirementCatalog::bundled().unwrap();
        let route = RouteAttributes {
            distance_meters: 40_000.0,
            border_crossing: false,
            countries: vec![],
            vehicle_type: Some("Personbil".into()),
        };
        let set = derive_requirements(&route, &catalog);
        (CertificateMatcher::new(Arc::new(catalog)), set)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn cert(id: &str, document_type: &str) -> Certificate {
        let mut c = Certificate::new(id, EntityType::Horse, "h1", format!("{id}.jpg"));
        c.document_type = Some(document_type.into());
        c
    }

    #[test]
    fn auto_confirm_returns_ids_in_requirement_order() {
        let (matcher, set) = setup();
        let certs = vec![cert("a", "Autorisasjon"), cert("b", "Hestepas"), cert("c", "Vognkort")];

        let ids = auto_confirm(&matcher, &set, &certs, now());
        assert_eq!(ids, vec!["horse_passport", "registration", "authorization"]);
    }

    #[test]
    fn expired_certificate_is_not_confirmed() {
        let (matcher, set) = setup();
        let mut expired = cert("a", "Hestepas");
        expired.expiry_date = Some((now() - Duration::hours(1)).to_rfc3339());

        assert!(auto_confirm(&matcher, &set, &[expired.clone()], now()).is_empty());

        // a second, valid passport still confirms
        let valid = cert("b", "Hestepas");
        assert_eq!(
            auto_confirm(&matcher, &set, &[expired, valid], now()),
            vec!["horse_passport"]
        );
    }

    #[test]
    fn evaluate_reports_missing_in_requirement_order() {
        let (_, set) = setup();
        let verdict = evaluate(Some(&set), &["registration".to_string()]);

        assert!(!verdict.is_compliant);
        assert_eq!(verdict.total_required, 4);
        assert_eq!(verdict.confirmed, 1);
        let missing: Vec<&str> = verdict.missing.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(missing, vec!["horse_passport", "approval_certificate", "authorization"]);
    }

    #[test]
    fn unrelated_confirmations_do_not_count() {
        let (_, set) = setup();
        let confirmed: Vec<String> = ["horse_passport", "registration", "approval_certificate", "authorization", "something_else"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let verdict = evaluate(Some(&set), &confirmed);

        assert!(verdict.is_compliant);
        assert_eq!(verdict.confirmed, 4);
        assert!(verdict.missing.is_empty());
    }

    #[test]
    fn absent_requirements_are_vacuously_compliant() {
        assert_eq!(evaluate(None, &[]), ComplianceVerdict::vacuous());
    }

    #[test]
    fn optional_documents_are_never_missing() {
        let catalog = RequirementCatalog::bundled().unwrap();
        let route = RouteAttributes {
            distance_meters: 10_000.0,
            countries: vec!["Sverige".into()],
            ..RouteAttributes::default()
        };
        let set = derive_requirements(&route, &catalog);
        assert!(set.find("sweden_journey_log").is_some());

        let verdict = evaluate(Some(&set), &[]);
        assert_eq!(verdict.total_required, 4);
        assert!(verdict.missing.iter().all(|d| d.id != "sweden_journey_log"));
    }
}
