//! Tiered matching of a query record against a candidate pool.

use crate::core::normalize::normalize_opt;
use crate::core::similarity::similarity;
use crate::model::{CanonicalRecord, MatchMethod, MatchResult};

/// Default acceptance threshold for the fuzzy tier. Titles vary mostly in
/// edition/format suffixes that normalization already strips; below this a
/// candidate is more likely a different work than a labeling variant.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Resolve `query` against `candidates`, first successful tier wins:
///
/// 1. exact identifier: `source_identifier` shared by exactly one candidate;
/// 2. exact normalized title: non-empty key equal to exactly one candidate's;
/// 3. fuzzy title: best similarity ratio, accepted iff `>= threshold`,
///    ties broken by candidate order.
///
/// Never panics: absent titles, empty identifiers, and empty pools all
/// degrade to a no-match result.
pub fn resolve(
    query: &CanonicalRecord,
    candidates: &[CanonicalRecord],
    threshold: f64,
) -> MatchResult {
    if candidates.is_empty() {
        return MatchResult::miss();
    }

    // Tier 1: identifiers are sparse but perfectly reliable when present.
    // A shared identifier is only trusted when it is unambiguous.
    if let Some(identifier) = query.source_identifier.as_deref().filter(|s| !s.is_empty()) {
        let mut hits = candidates
            .iter()
            .filter(|c| c.source_identifier.as_deref() == Some(identifier));
        if let (Some(hit), None) = (hits.next(), hits.next()) {
            return MatchResult::hit(hit.clone(), MatchMethod::ExactIdentifier, 1.0);
        }
    }

    // Tier 2: exact normalized title. An empty key never matches anything,
    // so the tier is skipped entirely for absent/degenerate titles.
    let key = normalize_opt(query.title.as_deref());
    if !key.is_empty() {
        let mut hits = candidates
            .iter()
            .filter(|c| normalize_opt(c.title.as_deref()) == key);
        if let (Some(hit), None) = (hits.next(), hits.next()) {
            return MatchResult::hit(hit.clone(), MatchMethod::ExactNormalizedTitle, 1.0);
        }
    }

    // Tier 3: fuzzy title, last resort. An empty key describes no work, so
    // untitled queries stop here no matter how permissive the threshold is,
    // and untitled candidates are never scored. Strict comparison keeps the
    // first candidate on ties, which keeps results deterministic.
    if key.is_empty() {
        return MatchResult::miss();
    }
    let query_title = query.title.as_deref().unwrap_or("");
    let mut best: Option<(&CanonicalRecord, f64)> = None;
    for candidate in candidates {
        if normalize_opt(candidate.title.as_deref()).is_empty() {
            continue;
        }
        let score = similarity(query_title, candidate.title.as_deref().unwrap_or(""));
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    if let Some((candidate, score)) = best {
        if score >= threshold {
            return MatchResult::hit(candidate.clone(), MatchMethod::FuzzyTitle, score);
        }
    }

    MatchResult::miss()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, title: &str) -> CanonicalRecord {
        CanonicalRecord::new(path).with_title(title)
    }

    #[test]
    fn test_identifier_tier_beats_fuzzy_decoy() {
        let query = record("q", "Dune")
            .with_source_identifier("B000FC1PJI");
        let candidates = vec![
            // Perfect fuzzy decoy: same title, no identifier.
            record("a", "Dune"),
            record("b", "Consider Phlebas").with_source_identifier("B000FC1PJI"),
        ];
        let result = resolve(&query, &candidates, DEFAULT_FUZZY_THRESHOLD);
        assert!(result.found);
        assert_eq!(result.method, Some(MatchMethod::ExactIdentifier));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.matched.unwrap().path, "b");
    }

    #[test]
    fn test_ambiguous_identifier_falls_through() {
        let query = record("q", "Dune").with_source_identifier("B000FC1PJI");
        let candidates = vec![
            record("a", "Dune").with_source_identifier("B000FC1PJI"),
            record("b", "Dune Messiah").with_source_identifier("B000FC1PJI"),
        ];
        let result = resolve(&query, &candidates, DEFAULT_FUZZY_THRESHOLD);
        assert!(result.found);
        assert_ne!(result.method, Some(MatchMethod::ExactIdentifier));
        assert_eq!(result.matched.unwrap().path, "a");
    }

    #[test]
    fn test_exact_title_tier_requires_unique_key() {
        let query = record("q", "The Stand: A Novel");
        let candidates = vec![
            record("a", "The Stand (Unabridged)"),
            record("b", "The Stand"),
        ];
        // Two candidates share the normalized key, so the exact tier is
        // ambiguous and the fuzzy tier decides (first candidate, ratio 1.0).
        let result = resolve(&query, &candidates, DEFAULT_FUZZY_THRESHOLD);
        assert!(result.found);
        assert_eq!(result.method, Some(MatchMethod::FuzzyTitle));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.matched.unwrap().path, "a");
    }

    #[test]
    fn test_empty_title_never_matches_exact_tier() {
        let query = record("q", "");
        let candidates = vec![record("a", ""), record("b", "Dune")];
        let result = resolve(&query, &candidates, DEFAULT_FUZZY_THRESHOLD);
        assert_ne!(result.method, Some(MatchMethod::ExactNormalizedTitle));
        assert!(!result.found);
    }

    #[test]
    fn test_empty_title_never_matches_fuzzy_tier() {
        // A zero threshold would accept the 0.0 score an empty title earns
        // against everything; the tier has to refuse outright.
        let query = record("q", "");
        let candidates = vec![record("a", "Dune")];
        let result = resolve(&query, &candidates, 0.0);
        assert!(!result.found);
        assert!(result.matched.is_none());

        // Same rule on the candidate side: an untitled candidate is never
        // the best fuzzy match, even when any score would clear the bar.
        let query = record("q", "Dune");
        let candidates = vec![CanonicalRecord::new("a"), record("b", "(:")];
        let result = resolve(&query, &candidates, 0.0);
        assert!(!result.found);
    }

    #[test]
    fn test_fuzzy_threshold_rejects_distant_titles() {
        let query = record("q", "Dune");
        let candidates = vec![record("a", "Dune Messiah")];
        let result = resolve(&query, &candidates, DEFAULT_FUZZY_THRESHOLD);
        assert!(!result.found);
        assert!(result.matched.is_none());

        // The threshold is a parameter, not a constant of the engine.
        let result = resolve(&query, &candidates, 0.4);
        assert!(result.found);
        assert_eq!(result.method, Some(MatchMethod::FuzzyTitle));
    }

    #[test]
    fn test_empty_candidate_pool() {
        let query = record("q", "Dune");
        let result = resolve(&query, &[], DEFAULT_FUZZY_THRESHOLD);
        assert!(!result.found);
        assert!(result.matched.is_none());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_scenario_dune_against_editions() {
        let query = record("q", "Dune");
        let candidates = vec![
            record("a", "Dune (Unabridged)"),
            record("b", "Dune Messiah"),
        ];
        let result = resolve(&query, &candidates, DEFAULT_FUZZY_THRESHOLD);
        assert!(result.found);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.matched.unwrap().path, "a");
        assert!(matches!(
            result.method,
            Some(MatchMethod::ExactNormalizedTitle) | Some(MatchMethod::FuzzyTitle)
        ));
    }

    #[test]
    fn test_missing_title_record_is_harmless() {
        let query = CanonicalRecord::new("q");
        let candidates = vec![CanonicalRecord::new("a"), record("b", "Dune")];
        let result = resolve(&query, &candidates, DEFAULT_FUZZY_THRESHOLD);
        assert!(!result.found);
    }
}
