//! Domain-aware tokenizer for the BM25 index (spec §4.2).
//!
//! TWS identifiers are preserved as single tokens; `RC=8`, `rc 8`, `RC8`
//! normalize to the same token family; everything else is lowercased and
//! split on non-alphanumeric boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bAWSBH\d+\b|\bEQQQ\w*\d+\b|\bABEND\w*\b|\bRC\s*=?\s*\d+\b").unwrap()
});
static RC_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^RC\s*=?\s*(\d+)$").unwrap());
static WORD_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Tokenize `text` into the BM25 term vocabulary.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut last_end = 0;

    for m in IDENTIFIER.find_iter(text) {
        if m.start() > last_end {
            tokens.extend(tokenize_plain(&text[last_end..m.start()]));
        }
        tokens.push(normalize_identifier(m.as_str()));
        last_end = m.end();
    }
    if last_end < text.len() {
        tokens.extend(tokenize_plain(&text[last_end..]));
    }
    tokens
}

fn tokenize_plain(segment: &str) -> Vec<String> {
    WORD_SPLIT
        .split(&segment.to_lowercase())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalize an identifier match: return-code variants fold to `rc_<n>`,
/// everything else is preserved verbatim (case folded) as a single token.
fn normalize_identifier(raw: &str) -> String {
    if let Some(cap) = RC_DIGITS.captures(raw.trim()) {
        return format!("rc_{}", &cap[1]);
    }
    raw.to_lowercase().split_whitespace().collect::<Vec<_>>().join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_variants_normalize_identically() {
        assert_eq!(tokenize("RC=8"), tokenize("rc 8"));
        assert_eq!(tokenize("RC=8"), tokenize("RC8"));
    }

    #[test]
    fn job_identifiers_stay_whole() {
        let tokens = tokenize("Job AWSBH001 fails with RC=8 — restart via conman.");
        assert!(tokens.contains(&"awsbh001".to_string()));
        assert!(tokens.contains(&"rc_8".to_string()));
        assert!(tokens.contains(&"restart".to_string()));
    }

    #[test]
    fn empty_query_yields_no_tokens() {
        assert!(tokenize("").is_empty());
    }
}
