use std::collections::HashSet;

use super::types::RankedSource;

/// Unique titles in first-seen order, for the citations block.
pub fn titles_only(sources: &[RankedSource]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    sources
        .iter()
        .filter(|source| seen.insert(source.title.as_str()))
        .map(|source| source.title.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::types::MatchMetadata;

    fn source(title: &str, page: &str) -> RankedSource {
        RankedSource {
            title: title.to_string(),
            level: "L1".to_string(),
            page: page.to_string(),
            version: String::new(),
            score: 0.5,
            source_metadata: MatchMetadata::default(),
        }
    }

    #[test]
    fn repeated_titles_are_emitted_once() {
        let sources = vec![
            source("Uniform Trust Code", "3"),
            source("Uniform Trust Code", "9"),
        ];
        assert_eq!(titles_only(&sources), vec!["Uniform Trust Code"]);
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let sources = vec![
            source("B", "1"),
            source("A", "1"),
            source("B", "2"),
            source("C", "1"),
        ];
        assert_eq!(titles_only(&sources), vec!["B", "A", "C"]);
    }

    #[test]
    fn empty_input() {
        assert!(titles_only(&[]).is_empty());
    }
}
