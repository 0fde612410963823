//! Typed view over vector-index matches.
//!
//! The index hands back an open-ended JSON metadata map per match. Everything
//! dynamic about it is handled here, in [`MatchMetadata::from_json`]; the rest
//! of the ranking code only sees typed fields.

use serde::Serialize;
use serde_json::{Map, Value};

/// Text-bearing metadata keys, highest priority first.
pub const SNIPPET_KEYS: [&str; 5] = ["text", "chunk", "content", "body", "passage"];

const TITLE_KEYS: [&str; 1] = ["title"];
const PARENT_TITLE_KEYS: [&str; 4] = ["source", "file_name", "filename", "document"];
const LEVEL_KEYS: [&str; 2] = ["doc_level", "level"];
const PAGE_KEYS: [&str; 2] = ["page", "page_number"];
const VERSION_KEYS: [&str; 2] = ["version", "v"];

pub const UNKNOWN_TITLE: &str = "Unknown";
pub const UNKNOWN_LEVEL: &str = "N/A";
pub const UNKNOWN_PAGE: &str = "?";

/// Metadata fields the ranking pipeline cares about.
///
/// Label-like fields (`title`, `level`, `page`, `version`) are trimmed and
/// `None` when absent, empty, or of a non-scalar JSON type. Text candidates are
/// kept verbatim, aligned with [`SNIPPET_KEYS`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchMetadata {
    pub title: Option<String>,
    pub parent_title: Option<String>,
    pub level: Option<String>,
    pub page: Option<String>,
    pub version: Option<String>,
    pub texts: [Option<String>; 5],
}

impl MatchMetadata {
    pub fn from_json(value: &Value) -> Self {
        match value.as_object() {
            Some(map) => Self::from_map(map),
            None => Self::default(),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        let texts = SNIPPET_KEYS.map(|key| {
            map.get(key)
                .and_then(|value| value.as_str())
                .map(|text| text.to_string())
        });

        Self {
            title: first_label(map, &TITLE_KEYS),
            parent_title: first_label(map, &PARENT_TITLE_KEYS),
            level: first_label(map, &LEVEL_KEYS),
            page: first_label(map, &PAGE_KEYS),
            version: first_label(map, &VERSION_KEYS),
            texts,
        }
    }
}

/// A single result from the vector index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMatch {
    pub id: Option<String>,
    /// `None` when the index omitted the score or sent something unparseable.
    pub score: Option<f64>,
    pub metadata: MatchMetadata,
}

impl RawMatch {
    pub fn new(score: f64, metadata: MatchMetadata) -> Self {
        Self {
            id: None,
            score: Some(score),
            metadata,
        }
    }

    /// Builds a match from one element of an index response. The score is read
    /// from the match itself, falling back to a `score` key nested in metadata.
    pub fn from_json(value: &Value) -> Self {
        let metadata_value = value.get("metadata").unwrap_or(&Value::Null);
        let score = value
            .get("score")
            .or_else(|| metadata_value.get("score"))
            .and_then(parse_score);
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());

        Self {
            id,
            score,
            metadata: MatchMetadata::from_json(metadata_value),
        }
    }
}

/// A deduplicated, display-ready citation source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSource {
    pub title: String,
    pub level: String,
    pub page: String,
    pub version: String,
    pub score: f64,
    #[serde(skip)]
    pub source_metadata: MatchMetadata,
}

/// Identity of a citable source; two matches with equal keys collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub title: String,
    pub level: String,
    pub page: String,
    pub version: String,
}

impl RankedSource {
    pub fn identity_key(&self) -> SourceKey {
        SourceKey {
            title: self.title.clone(),
            level: self.level.clone(),
            page: self.page.clone(),
            version: self.version.clone(),
        }
    }
}

fn first_label(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(label_from_value)
}

fn label_from_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            // Pinecone stores every number as a float; show 5.0 as "5".
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn parse_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    score.is_finite().then_some(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_reads_primary_and_fallback_keys() {
        let meta = MatchMetadata::from_json(&json!({
            "source": "trust_code.pdf",
            "level": " L3 ",
            "page_number": 12.0,
            "v": "2024",
            "chunk": "body text"
        }));

        assert_eq!(meta.title, None);
        assert_eq!(meta.parent_title.as_deref(), Some("trust_code.pdf"));
        assert_eq!(meta.level.as_deref(), Some("L3"));
        assert_eq!(meta.page.as_deref(), Some("12"));
        assert_eq!(meta.version.as_deref(), Some("2024"));
        assert_eq!(meta.texts[1].as_deref(), Some("body text"));
        assert_eq!(meta.texts[0], None);
    }

    #[test]
    fn primary_key_wins_over_fallback() {
        let meta = MatchMetadata::from_json(&json!({
            "doc_level": "L1",
            "level": "L4",
            "version": "",
            "v": "3"
        }));

        assert_eq!(meta.level.as_deref(), Some("L1"));
        // an empty primary value falls through to the fallback key
        assert_eq!(meta.version.as_deref(), Some("3"));
    }

    #[test]
    fn non_scalar_values_are_treated_as_absent() {
        let meta = MatchMetadata::from_json(&json!({
            "title": ["a", "b"],
            "page": null,
            "doc_level": true,
            "text": 42
        }));

        assert_eq!(meta, MatchMetadata::default());
    }

    #[test]
    fn non_object_metadata_yields_defaults() {
        assert_eq!(MatchMetadata::from_json(&json!("x")), MatchMetadata::default());
        assert_eq!(MatchMetadata::from_json(&Value::Null), MatchMetadata::default());
    }

    #[test]
    fn raw_match_score_parsing() {
        let direct = RawMatch::from_json(&json!({"id": "a", "score": 0.42, "metadata": {}}));
        assert_eq!(direct.id.as_deref(), Some("a"));
        assert_eq!(direct.score, Some(0.42));

        let nested = RawMatch::from_json(&json!({"metadata": {"score": "0.7"}}));
        assert_eq!(nested.score, Some(0.7));

        let garbage = RawMatch::from_json(&json!({"score": "high"}));
        assert_eq!(garbage.score, None);
    }

    #[test]
    fn fractional_page_numbers_keep_their_fraction() {
        let meta = MatchMetadata::from_json(&json!({"page": 4.5}));
        assert_eq!(meta.page.as_deref(), Some("4.5"));
    }
}
