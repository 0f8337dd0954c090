//! TWS identifier patterns shared by the tokenizer (resync-retrieval),
//! intent classifier and entity extraction (resync-agent), and anaphora
//! resolution (resync-memory) — spec §4.2, §4.10, §4.12 all call for "the
//! same regex suite".

use once_cell::sync::Lazy;
use regex::Regex;

static JOB_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bAWSBH\d+\b").unwrap());
static EQQ_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bEQQQ\w*\d+\b").unwrap());
static ABEND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bABEND\w*\b").unwrap());
static RETURN_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bRC\s*=?\s*(\d+)\b").unwrap());
static WORKSTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z]{2,8}WS\d*\b").unwrap());

/// Entities pulled out of free text by the shared regex suite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedEntities {
    pub jobs: Vec<String>,
    pub error_codes: Vec<String>,
    pub workstations: Vec<String>,
}

/// True if `text` contains any TWS identifier pattern (job name, error
/// code, EQQ code, ABEND). Used by query classification (spec §4.4) and
/// intent extraction (spec §4.12).
#[must_use]
pub fn contains_tws_identifier(text: &str) -> bool {
    JOB_NAME.is_match(text)
        || EQQ_CODE.is_match(text)
        || ABEND.is_match(text)
        || RETURN_CODE.is_match(text)
}

/// Extract job names, normalized return/abend codes, and workstation names
/// from `text`.
#[must_use]
pub fn extract_entities(text: &str) -> ExtractedEntities {
    let mut jobs: Vec<String> = JOB_NAME.find_iter(text).map(|m| m.as_str().to_string()).collect();
    jobs.sort();
    jobs.dedup();

    let mut error_codes: Vec<String> = Vec::new();
    for cap in RETURN_CODE.captures_iter(text) {
        error_codes.push(normalize_rc_token(&cap[1]));
    }
    for m in ABEND.find_iter(text) {
        error_codes.push(m.as_str().to_uppercase());
    }
    for m in EQQ_CODE.find_iter(text) {
        error_codes.push(m.as_str().to_uppercase());
    }
    error_codes.sort();
    error_codes.dedup();

    let mut workstations: Vec<String> =
        WORKSTATION.find_iter(text).map(|m| m.as_str().to_string()).collect();
    workstations.sort();
    workstations.dedup();

    ExtractedEntities {
        jobs,
        error_codes,
        workstations,
    }
}

/// Normalize `RC=8`, `rc 8`, `RC8` to the same token family (`rc_8`).
/// Spec §4.2 and the BM25 round-trip law in §8.
#[must_use]
pub fn normalize_rc_token(digits: &str) -> String {
    format!("rc_{digits}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_job_names_and_return_codes() {
        let entities = extract_entities("Job AWSBH001 fails with RC=8 on WKSTNWS1");
        assert_eq!(entities.jobs, vec!["AWSBH001".to_string()]);
        assert_eq!(entities.error_codes, vec!["rc_8".to_string()]);
    }

    #[test]
    fn normalizes_rc_variants_identically() {
        assert_eq!(
            extract_entities("RC=8").error_codes,
            extract_entities("rc 8").error_codes
        );
        assert_eq!(
            extract_entities("RC=8").error_codes,
            extract_entities("RC8").error_codes
        );
    }

    #[test]
    fn plain_prose_has_no_identifiers() {
        assert!(!contains_tws_identifier("how do I recover a failed scheduled job"));
    }
}
