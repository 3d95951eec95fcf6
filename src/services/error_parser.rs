//! Extraction of (expected, found) element pairs from validator messages.
//!
//! The authority reports schema-order violations as free text, in Spanish
//! (`El elemento esperado es: X en lugar de: Y`) or, from some gateways, in
//! English (`expected element X instead of Y`). Names may carry a namespace
//! prefix (`ns2:dDesTiDE`) or a Clark qualifier (`{http://...}dDesTiDE`);
//! both are stripped to the local name.

use crate::domain::response::ExpectedFound;
use regex::Regex;
use std::sync::LazyLock;

const NAME: &str = r"(\{[^}]*\}[A-Za-z_][\w.\-]*|[A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?)";

static SPANISH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)elemento\s+esperado\s+es:?\s*['"<]?{NAME}['">]?\s*,?\s*en\s+lugar\s+de:?\s*['"<]?{NAME}"#
    ))
    .expect("Invalid regex pattern for Spanish order message")
});

static ENGLISH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)expected\s+element:?\s*['"<]?{NAME}['">]?\s*,?\s*instead\s+of:?\s*['"<]?{NAME}"#
    ))
    .expect("Invalid regex pattern for English order message")
});

static MALFORMATION_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(mal\s*formad[oa]|malformed|schema|esquema|cvc-|elemento\s+esperado|expected\s+element)")
        .expect("Invalid regex pattern for malformation markers")
});

/// Parse a validator message into the pair to correct, if it is one.
#[must_use]
pub fn parse_expected_found(text: &str) -> Option<ExpectedFound> {
    [&*SPANISH_PATTERN, &*ENGLISH_PATTERN]
        .iter()
        .find_map(|pattern| pattern.captures(text))
        .and_then(|caps| {
            let expected = local_name(caps.get(1)?.as_str());
            let found = local_name(caps.get(2)?.as_str());
            if expected.is_empty() || found.is_empty() {
                return None;
            }
            Some(ExpectedFound { expected, found })
        })
}

/// Whether a message describes an XML/schema malformation rather than a
/// business rule.
#[must_use]
pub fn is_malformation_text(text: &str) -> bool {
    MALFORMATION_MARKERS.is_match(text)
}

fn local_name(raw: &str) -> String {
    let without_clark = match raw.rfind('}') {
        Some(end) => &raw[end + 1..],
        None => raw,
    };
    let local = match without_clark.rsplit_once(':') {
        Some((_, local)) => local,
        None => without_clark,
    };
    local.trim_end_matches(['.', ',', ';']).to_string()
}
