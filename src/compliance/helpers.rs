/// Trim and lowercase. The single normalization used for keywords,
/// candidates and country names.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Bidirectional substring test between a normalized country token and a
/// normalized rule term. Tolerates partial names ("Sveits" / "sveits kanton").
/// Empty tokens never match.
pub fn country_term_matches(token: &str, term: &str) -> bool {
    if token.is_empty() || term.is_empty() {
        return false;
    }
    term.contains(token) || token.contains(term)
}

/// True when any of `terms` matches the normalized `token`.
pub fn token_matches_any(token: &str, terms: &[String]) -> bool {
    terms
        .iter()
        .any(|term| country_term_matches(token, &normalize(term)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Hestepas "), "hestepas");
        assert_eq!(normalize("FÄRDJOURNAL"), "färdjournal");
    }

    #[test]
    fn matching_is_bidirectional() {
        // token inside term
        assert!(country_term_matches("kingdom", "united kingdom"));
        // term inside token
        assert!(country_term_matches("france (paris)", "france"));
        assert!(!country_term_matches("germany", "france"));
    }

    #[test]
    fn empty_token_never_matches() {
        assert!(!country_term_matches("", "france"));
        assert!(!token_matches_any("", &["france".to_string()]));
    }
}
