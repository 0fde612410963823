use super::types::MatchMetadata;

/// Returns the first usable text field of a match, trimmed, in
/// [`SNIPPET_KEYS`](super::types::SNIPPET_KEYS) priority order.
///
/// Empty when no candidate key holds non-blank text.
pub fn extract_snippet(metadata: &MatchMetadata) -> String {
    metadata
        .texts
        .iter()
        .flatten()
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}
