//! Brand-specific thematic query expansion

use crate::domain::DomainProfile;
use crate::text::{compact, tokens};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedQuery {
    pub text: String,
    /// Canonical terms appended to the query
    pub added: Vec<&'static str>,
}

/// Append canonical terms for every thematic trigger the query fires.
///
/// A term is skipped when it is already present: short terms (three
/// characters or fewer) must match a whole token, longer terms are checked
/// against the compact form of the query.
pub fn expand_query(profile: &DomainProfile, query: &str) -> ExpandedQuery {
    let query_tokens: HashSet<String> = tokens(query).into_iter().collect();
    let query_compact = compact(query);

    let mut added: Vec<&'static str> = Vec::new();
    for rule in &profile.expansions {
        if !rule.trigger.is_match(query) {
            continue;
        }
        for &term in rule.terms {
            let term_compact = compact(term);
            let present = if term_compact.chars().count() <= 3 {
                query_tokens.contains(&term_compact)
            } else {
                query_compact.contains(&term_compact)
            };
            if !present && !added.contains(&term) {
                added.push(term);
            }
        }
    }

    if added.is_empty() {
        return ExpandedQuery {
            text: query.to_string(),
            added,
        };
    }

    tracing::info!("Domain expansion for {}: +{:?}", profile.brand, added);
    ExpandedQuery {
        text: format!("{} {}", query.trim_end(), added.join(" ")),
        added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_door_theme_adds_signals() {
        let otis = DomainProfile::for_brand("otis");
        let expanded = expand_query(otis, "porta não fecha no GEN2");
        assert_eq!(expanded.added, vec!["DW", "DFC", "ES"]);
        assert_eq!(expanded.text, "porta não fecha no GEN2 DW DFC ES");
    }

    #[test]
    fn test_present_terms_are_skipped() {
        let otis = DomainProfile::for_brand("otis");
        let expanded = expand_query(otis, "porta abre, sinal dw ok");
        assert_eq!(expanded.added, vec!["DFC", "ES"]);
    }

    #[test]
    fn test_short_term_needs_whole_token() {
        let otis = DomainProfile::for_brand("otis");
        // "es" inside "trinco esquerdo" is not the ES signal
        let expanded = expand_query(otis, "trinco esquerdo");
        assert!(expanded.added.contains(&"ES"));
    }

    #[test]
    fn test_no_trigger_no_change() {
        let otis = DomainProfile::for_brand("otis");
        let expanded = expand_query(otis, "calibração do drive OVF10");
        assert!(expanded.added.is_empty());
        assert_eq!(expanded.text, "calibração do drive OVF10");
    }

    #[test]
    fn test_generic_brand_never_expands() {
        let generic = DomainProfile::for_brand("atlas");
        assert!(expand_query(generic, "porta não fecha").added.is_empty());
    }
}
