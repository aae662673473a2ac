use std::collections::VecDeque;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;

use crate::error::{Result, ScrapeError};

use super::pdf::{self, PdfDecoder};
use super::{ProcessedText, TextSource};

/// Runs shorter than this are ids/tokens, not embedded documents.
const MIN_RUN_LEN: usize = 100;
/// Traversal depth bound; pathological or cyclic-looking payloads terminate.
const MAX_DEPTH: usize = 10;

static BASE64_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/]{100,}={0,2}").expect("static pattern"));

/// First contiguous base64-alphabet run longer than MIN_RUN_LEN chars.
pub fn find_base64_run(s: &str) -> Option<&str> {
    BASE64_RUN.find(s).map(|m| m.as_str())
}

/// Breadth-first, depth-bounded search through a JSON graph for an embedded
/// base64 run. Explicit queue instead of recursion.
pub fn find_in_value(value: &Value) -> Option<&str> {
    let mut queue: VecDeque<(&Value, usize)> = VecDeque::from([(value, 0)]);
    while let Some((v, depth)) = queue.pop_front() {
        if depth > MAX_DEPTH {
            continue;
        }
        match v {
            Value::String(s) => {
                if let Some(run) = find_base64_run(s) {
                    return Some(run);
                }
            }
            Value::Array(items) => queue.extend(items.iter().map(|i| (i, depth + 1))),
            Value::Object(map) => queue.extend(map.values().map(|i| (i, depth + 1))),
            _ => {}
        }
    }
    None
}

/// base64-embedded processor: locate a qualifying run in the payload, decode
/// it, and delegate to the pdf-binary path.
pub fn process(
    decoder: &dyn PdfDecoder,
    payload: &Value,
    source_url: Option<&str>,
) -> Result<ProcessedText> {
    let run = match payload {
        Value::String(s) => find_base64_run(s),
        other => find_in_value(other),
    }
    .ok_or_else(|| ScrapeError::no_content("no embedded base64 document"))?;

    let bytes = decode_run(run)?;
    let mut doc = pdf::process(decoder, &bytes, source_url)?;
    doc.source = TextSource::EmbeddedBase64;
    Ok(doc)
}

/// Strict decode first; a run with a ragged tail is retried truncated to a
/// whole number of quads.
fn decode_run(run: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(run)
        .or_else(|_| STANDARD.decode(&run[..run.len() - run.len() % 4]))
        .map_err(|e| ScrapeError::decode(format!("base64 run: {e}")))
}
