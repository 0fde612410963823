//! Display-title cleanup for ingested document names.
//!
//! Titles coming out of the ingestion pipeline carry tier prefixes, OCR
//! markers, content hashes and filename cruft. Each rule is its own step so
//! it can be tested on its own; [`clean_title`] runs them in order.

use std::sync::LazyLock;

use regex::Regex;

use super::types::UNKNOWN_TITLE;

static TIER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:L\d[_\-:\s]+)+").expect("valid tier prefix regex"));

static OCR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ocr").expect("valid ocr regex"));

static HEX_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9A-Fa-f]{8,}").expect("valid hex regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const TAIL_SEPARATOR: &str = " -- ";
const MIN_HEAD_CHARS: usize = 6;

pub fn clean_title(raw: Option<&str>) -> String {
    let title = placeholder_if_empty(raw);
    let title = strip_tier_prefix(&title);
    let title = remove_ocr_token(&title);
    let title = remove_hex_runs(&title);
    let title = cut_filename_tail(&title);
    let title = underscores_to_spaces(&title);
    let title = tidy_whitespace_and_dashes(&title);

    if title.is_empty() {
        UNKNOWN_TITLE.to_string()
    } else {
        title
    }
}

fn placeholder_if_empty(raw: Option<&str>) -> String {
    match raw {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => UNKNOWN_TITLE.to_string(),
    }
}

/// `L2_Title`, `L1 - Title`, `L3:Title` → `Title`.
fn strip_tier_prefix(title: &str) -> String {
    TIER_PREFIX.replace(title, "").into_owned()
}

/// Drops `ocr` when it stands alone. Any non-alphanumeric character,
/// underscore included, counts as a boundary.
fn remove_ocr_token(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last = 0;

    for found in OCR_TOKEN.find_iter(title) {
        let before = title[..found.start()].chars().next_back();
        let after = title[found.end()..].chars().next();
        let standalone = !before.is_some_and(char::is_alphanumeric)
            && !after.is_some_and(char::is_alphanumeric);
        if standalone {
            out.push_str(&title[last..found.start()]);
            last = found.end();
        }
    }

    out.push_str(&title[last..]);
    out
}

fn remove_hex_runs(title: &str) -> String {
    HEX_RUN.replace_all(title, "").into_owned()
}

/// `Real Title -- 1998_scan_final.pdf` → `Real Title`, unless the head is too
/// short to be a title on its own.
fn cut_filename_tail(title: &str) -> String {
    match title.split_once(TAIL_SEPARATOR) {
        Some((head, _)) if head.trim().chars().count() >= MIN_HEAD_CHARS => head.to_string(),
        _ => title.to_string(),
    }
}

fn underscores_to_spaces(title: &str) -> String {
    title.replace('_', " ")
}

fn tidy_whitespace_and_dashes(title: &str) -> String {
    WHITESPACE_RUN
        .replace_all(title, " ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—'))
        .to_string()
}
