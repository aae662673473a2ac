use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, ScrapeError};

use super::{ProcessedText, TextSource};

const MAX_DEPTH: usize = 10;
/// Shorter strings are ids, labels and enum values, not document text.
const MIN_STRING_LEN: usize = 20;

/// Key names that suggest the value holds document text.
const TEXT_KEY_HINTS: &[&str] = &[
    "text",
    "content",
    "description",
    "body",
    "document",
    "beskrivelse",
    "innhold",
    "tekst",
];

/// Domain markers that qualify a string on content alone.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(m²|\bm2\b|kvm|\bkr\b|salgsoppgave|prospekt|bruksareal|prisantydning|soverom|fellesgjeld)")
        .expect("static pattern")
});

/// json-payload processor: depth-bounded scan for document-like strings,
/// concatenated in traversal order.
pub fn process(payload: &Value, source_url: Option<&str>) -> Result<ProcessedText> {
    let mut parts: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    let mut queue: VecDeque<(&Value, usize, Option<&str>)> = VecDeque::from([(payload, 0, None)]);
    while let Some((v, depth, key)) = queue.pop_front() {
        if depth > MAX_DEPTH {
            continue;
        }
        match v {
            Value::String(s) => {
                let trimmed = s.trim();
                if qualifies(key, trimmed) && seen.insert(trimmed) {
                    parts.push(trimmed);
                }
            }
            // arrays inherit the key of the field that held them
            Value::Array(items) => queue.extend(items.iter().map(|i| (i, depth + 1, key))),
            Value::Object(map) => {
                queue.extend(map.iter().map(|(k, i)| (i, depth + 1, Some(k.as_str()))))
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        return Err(ScrapeError::no_content("no document-like strings in json payload"));
    }
    Ok(ProcessedText {
        text: parts.join("\n\n"),
        source: TextSource::JsonPayload,
        source_url: source_url.map(|s| s.to_string()),
        page_count: None,
    })
}

fn qualifies(key: Option<&str>, s: &str) -> bool {
    // length floor plus a whitespace requirement keeps ids and blobs out
    if s.len() < MIN_STRING_LEN || !s.contains(' ') {
        return false;
    }
    if let Some(k) = key {
        let k = k.to_lowercase();
        if TEXT_KEY_HINTS.iter().any(|hint| k.contains(hint)) {
            return true;
        }
    }
    MARKER_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn harvests_by_key_hint_and_content_marker() {
        let payload = json!({
            "id": "f1234567",
            "beskrivelse": "Lys og luftig leilighet med gjennomgående planløsning.",
            "facts": {"areal": "Bruksareal: 84 m² fordelt på to plan."},
            "noise": {"code": "XJ-19"},
        });
        let doc = process(&payload, None).unwrap();
        assert_eq!(doc.source, TextSource::JsonPayload);
        assert!(doc.text.contains("gjennomgående planløsning"));
        assert!(doc.text.contains("Bruksareal: 84 m²"));
        assert!(!doc.text.contains("XJ-19"));
    }

    #[test]
    fn strings_in_arrays_inherit_the_field_key() {
        let payload = json!({
            "documents": ["Salgsoppgaven beskriver eiendommen i detalj her."],
        });
        let doc = process(&payload, None).unwrap();
        assert!(doc.text.contains("beskriver eiendommen"));
    }

    #[test]
    fn short_strings_and_blobs_do_not_qualify() {
        let payload = json!({
            "description": "kort",
            "content": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        });
        assert!(matches!(
            process(&payload, None).unwrap_err(),
            ScrapeError::NoQualifyingContent(_)
        ));
    }

    #[test]
    fn depth_bound_cuts_off_deep_text() {
        let mut value = json!("Salgsoppgave med bruksareal 84 m² og mer tekst.");
        for _ in 0..12 {
            value = json!({ "description": value });
        }
        assert!(process(&value, None).is_err());
    }

    #[test]
    fn duplicate_strings_collapse() {
        let text = "Bruksareal: 84 m² ifølge takstrapporten.";
        let payload = json!({"a": {"text": text}, "b": {"text": text}});
        let doc = process(&payload, None).unwrap();
        assert_eq!(doc.text.matches("84 m²").count(), 1);
    }
}
