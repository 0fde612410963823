use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::title::clean_title;
use super::types::{RankedSource, RawMatch, SourceKey, UNKNOWN_LEVEL, UNKNOWN_PAGE};

/// Sort position for levels outside `L1`..`L5`.
pub const UNRANKED_TIER: u8 = 99;

/// Authority tier of a level label. `L1` is the highest authority.
pub fn precedence_tier(level: &str) -> u8 {
    match level {
        "L1" => 1,
        "L2" => 2,
        "L3" => 3,
        "L4" => 4,
        "L5" => 5,
        _ => UNRANKED_TIER,
    }
}

impl RankedSource {
    pub fn from_match(raw: &RawMatch) -> Self {
        let meta = &raw.metadata;
        let title_field = meta.title.as_deref().or(meta.parent_title.as_deref());

        Self {
            title: clean_title(title_field),
            level: meta
                .level
                .clone()
                .unwrap_or_else(|| UNKNOWN_LEVEL.to_string()),
            page: meta.page.clone().unwrap_or_else(|| UNKNOWN_PAGE.to_string()),
            version: meta.version.clone().unwrap_or_default(),
            score: raw.score.unwrap_or(0.0),
            source_metadata: meta.clone(),
        }
    }

    pub fn tier(&self) -> u8 {
        precedence_tier(&self.level)
    }
}

/// Collapses matches that cite the same source and orders what is left.
///
/// Matches sharing a `(title, level, page, version)` key keep only the
/// highest-scoring record; on equal scores the earlier record stays. The
/// survivors are ordered by precedence tier, then by descending score, and
/// cut to `top_k`.
pub fn dedup_and_rank(matches: &[RawMatch], top_k: usize) -> Vec<RankedSource> {
    let mut positions: HashMap<SourceKey, usize> = HashMap::new();
    let mut sources: Vec<RankedSource> = Vec::new();

    for raw in matches {
        let candidate = RankedSource::from_match(raw);
        match positions.entry(candidate.identity_key()) {
            Entry::Occupied(entry) => {
                let best = &mut sources[*entry.get()];
                if candidate.score > best.score {
                    *best = candidate;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(sources.len());
                sources.push(candidate);
            }
        }
    }

    // stable: equal keys keep first-insertion order
    sources.sort_by(|a, b| {
        a.tier()
            .cmp(&b.tier())
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });
    sources.truncate(top_k);

    tracing::debug!(
        "Ranked {} matches into {} sources",
        matches.len(),
        sources.len()
    );
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::types::MatchMetadata;
    use serde_json::json;
    use std::collections::HashSet;

    fn raw(score: f64, metadata: serde_json::Value) -> RawMatch {
        RawMatch::new(score, MatchMetadata::from_json(&metadata))
    }

    #[test]
    fn duplicate_matches_collapse_to_best_score() {
        let meta = json!({
            "title": "L2_Gilbert Law Summaries_abcdef1234567890_OCR",
            "doc_level": "L2",
            "page": "5"
        });
        let ranked = dedup_and_rank(&[raw(0.81, meta.clone()), raw(0.93, meta)], 10);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "Gilbert Law Summaries");
        assert_eq!(ranked[0].level, "L2");
        assert_eq!(ranked[0].page, "5");
        assert_eq!(ranked[0].version, "");
        assert_eq!(ranked[0].score, 0.93);
    }

    #[test]
    fn missing_metadata_degrades_to_placeholders() {
        let ranked = dedup_and_rank(&[RawMatch::from_json(&json!({"metadata": {}}))], 5);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "Unknown");
        assert_eq!(ranked[0].level, "N/A");
        assert_eq!(ranked[0].page, "?");
        assert_eq!(ranked[0].score, 0.0);
    }

    #[test]
    fn tier_dominates_score() {
        let matches = vec![
            raw(0.5, json!({"title": "A", "doc_level": "L1", "page": 1})),
            raw(0.9, json!({"title": "A", "doc_level": "L1", "page": 2})),
            raw(0.7, json!({"title": "A", "doc_level": "L1", "page": 3})),
            raw(0.99, json!({"title": "B", "doc_level": "L3", "page": 1})),
            raw(0.95, json!({"title": "B", "doc_level": "L3", "page": 2})),
        ];

        let ranked = dedup_and_rank(&matches, 3);

        let scores: Vec<f64> = ranked.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.5]);
        assert!(ranked.iter().all(|s| s.level == "L1"));
    }

    #[test]
    fn empty_input_is_not_an_error() {
        assert!(dedup_and_rank(&[], 5).is_empty());
        assert!(dedup_and_rank(&[], 0).is_empty());
    }

    #[test]
    fn zero_top_k_yields_nothing() {
        let matches = vec![raw(0.4, json!({"title": "X"}))];
        assert!(dedup_and_rank(&matches, 0).is_empty());
    }

    #[test]
    fn equal_scores_keep_first_record() {
        let matches = vec![
            raw(0.6, json!({"title": "Same", "doc_level": "L1", "text": "first"})),
            raw(0.6, json!({"title": "Same", "doc_level": "L1", "text": "second"})),
        ];

        let ranked = dedup_and_rank(&matches, 5);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].source_metadata.texts[0].as_deref(), Some("first"));
    }

    #[test]
    fn winning_record_supplies_metadata() {
        let matches = vec![
            raw(0.2, json!({"title": "Same", "text": "weak"})),
            raw(0.8, json!({"title": "Same", "text": "strong"})),
            raw(0.5, json!({"title": "Same", "text": "middle"})),
        ];

        let ranked = dedup_and_rank(&matches, 5);

        assert_eq!(ranked[0].score, 0.8);
        assert_eq!(ranked[0].source_metadata.texts[0].as_deref(), Some("strong"));
    }

    #[test]
    fn unrecognized_levels_sort_last_but_pass_through() {
        let matches = vec![
            raw(0.99, json!({"title": "Blog", "doc_level": "L9"})),
            raw(0.1, json!({"title": "Statute", "doc_level": "L5"})),
            raw(0.98, json!({"title": "Memo"})),
        ];

        let ranked = dedup_and_rank(&matches, 10);

        let levels: Vec<&str> = ranked.iter().map(|s| s.level.as_str()).collect();
        assert_eq!(levels, vec!["L5", "L9", "N/A"]);
        assert_eq!(ranked[1].tier(), UNRANKED_TIER);
    }

    #[test]
    fn title_falls_back_to_parent_document() {
        let ranked = dedup_and_rank(&[raw(0.3, json!({"source": "L1_Trust_Handbook"}))], 5);
        assert_eq!(ranked[0].title, "Trust Handbook");
    }

    #[test]
    fn output_keys_unique_ordered_and_bounded() {
        let mut matches = Vec::new();
        for i in 0..40 {
            matches.push(raw(
                (i % 7) as f64 / 10.0,
                json!({
                    "title": format!("Doc {}", i % 5),
                    "doc_level": format!("L{}", i % 6 + 1),
                    "page": i % 3,
                    "version": if i % 2 == 0 { "" } else { "2" }
                }),
            ));
        }

        let distinct_inputs: HashSet<SourceKey> = matches
            .iter()
            .map(|m| RankedSource::from_match(m).identity_key())
            .collect();

        let all = dedup_and_rank(&matches, usize::MAX);
        let all_keys: HashSet<SourceKey> = all.iter().map(|s| s.identity_key()).collect();
        assert_eq!(all.len(), all_keys.len());
        assert_eq!(all_keys, distinct_inputs);

        for pair in all.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.tier() <= b.tier());
            if a.tier() == b.tier() {
                assert!(a.score >= b.score);
            }
        }

        for source in &all {
            let best = matches
                .iter()
                .filter(|m| RankedSource::from_match(m).identity_key() == source.identity_key())
                .filter_map(|m| m.score)
                .fold(f64::MIN, f64::max);
            assert_eq!(source.score, best);
        }

        for k in [0, 1, 4, 100] {
            assert!(dedup_and_rank(&matches, k).len() <= k);
        }
    }
}
