use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};

use crate::browser::{Browser, CapturedResponse, Page};
use crate::document::embedded;
use crate::error::Result;

/// Waited after initial load before the active strategies run, so passive
/// captures can accumulate.
pub const SETTLE_DELAY: Duration = Duration::from_millis(2500);

const SPECULATIVE_LIMIT: usize = 3;
const SPECULATIVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Fixed vocabulary marking an element as document-related.
const DOCUMENT_TERMS: &[&str] = &[
    "salgsoppgave",
    "prospekt",
    "takst",
    "tilstandsrapport",
    "boligsalgsrapport",
    "egenerklæring",
    "dokument",
    "vedlegg",
    "last ned",
    "nedlast",
    "download",
    "pdf",
];

/// URL tokens that make a captured response document-suggestive.
const URL_TOKENS: &[&str] = &[
    "salgsoppgave",
    "prospekt",
    "dokument",
    "document",
    "vedlegg",
    "attachment",
    "download",
    ".pdf",
];

static HANDLER_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(https?://[^'"\s)]+|/[^'"\s)]+\.pdf[^'"\s)]*)"#).expect("static pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateOrigin {
    PassiveNetwork,
    DomLink,
    DomAttribute,
    OnclickHandler,
}

/// Material already in hand for a candidate; link-only candidates carry none.
#[derive(Debug, Clone)]
pub enum CandidatePayload {
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Html(String),
}

/// A possible prospectus location. Immutable once created; ranking and
/// processing happen in the assembler.
#[derive(Debug, Clone)]
pub struct DocumentCandidate {
    pub origin: CandidateOrigin,
    pub locator: String,
    pub content_type_hint: Option<String>,
    pub payload: Option<CandidatePayload>,
    pub label: Option<String>,
}

/// Run all three discovery strategies and combine their candidates.
/// Strategies are independent; none short-circuits the others. Failures
/// inside a strategy degrade to an empty contribution.
pub async fn discover(browser: &dyn Browser, page: &dyn Page) -> Vec<DocumentCandidate> {
    tokio::time::sleep(SETTLE_DELAY).await;

    let mut candidates = passive_candidates(&page.captured_responses().await);

    let html = match page.html().await {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "could not read page markup for active scan");
            String::new()
        }
    };
    let dom = dom_candidates(&html);
    let speculative = speculative_candidates(browser, &dom).await;

    debug!(
        passive = candidates.len(),
        dom = dom.len(),
        speculative = speculative.len(),
        "discovery complete"
    );
    candidates.extend(dom);
    candidates.extend(speculative);
    candidates
}

/// Strategy 1: passively captured responses with document-like content types
/// or document-suggestive URLs. JSON bodies are inspected for the base64 PDF
/// signature.
fn passive_candidates(captures: &[CapturedResponse]) -> Vec<DocumentCandidate> {
    let mut out = Vec::new();
    for cap in captures {
        let ct = cap
            .content_type
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        let doc_like_url = has_url_token(&cap.url);

        if ct.contains("pdf") || cap.body.starts_with(b"%PDF") {
            out.push(DocumentCandidate {
                origin: CandidateOrigin::PassiveNetwork,
                locator: cap.url.clone(),
                content_type_hint: cap.content_type.clone(),
                payload: Some(CandidatePayload::Bytes(cap.body.clone())),
                label: None,
            });
        } else if ct.contains("json") {
            let Ok(value) = serde_json::from_slice::<serde_json::Value>(&cap.body) else {
                continue;
            };
            if has_pdf_signature(&cap.body) || doc_like_url {
                out.push(DocumentCandidate {
                    origin: CandidateOrigin::PassiveNetwork,
                    locator: cap.url.clone(),
                    content_type_hint: cap.content_type.clone(),
                    payload: Some(CandidatePayload::Json(value)),
                    label: None,
                });
            }
        } else if doc_like_url && (ct.is_empty() || ct.contains("octet-stream")) {
            out.push(DocumentCandidate {
                origin: CandidateOrigin::PassiveNetwork,
                locator: cap.url.clone(),
                content_type_hint: cap.content_type.clone(),
                payload: Some(CandidatePayload::Bytes(cap.body.clone())),
                label: None,
            });
        }
    }
    out
}

/// Strategy 2: scan the rendered markup for interactive elements and
/// data-attributes matching the document vocabulary.
fn dom_candidates(html: &str) -> Vec<DocumentCandidate> {
    if html.trim().is_empty() {
        return Vec::new();
    }
    let doc = Html::parse_document(html);
    let mut out: Vec<DocumentCandidate> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let interactive =
        Selector::parse(r#"a[href], button, [role="button"]"#).expect("static selector");
    for el in doc.select(&interactive) {
        let text: String = el.text().collect::<String>();
        let aria = el.value().attr("aria-label").unwrap_or_default();
        let title = el.value().attr("title").unwrap_or_default();
        let href = el.value().attr("href").unwrap_or_default();
        let document_related = [text.as_str(), aria, title, href]
            .iter()
            .any(|s| matches_vocabulary(s));

        if document_related && !href.is_empty() && seen.insert(href.to_string()) {
            out.push(DocumentCandidate {
                origin: CandidateOrigin::DomLink,
                locator: href.to_string(),
                content_type_hint: None,
                payload: None,
                label: non_empty(text.trim()),
            });
        }

        if let Some(onclick) = el.value().attr("onclick") {
            if document_related || matches_vocabulary(onclick) {
                if let Some(url) = HANDLER_URL.find(onclick) {
                    if seen.insert(url.as_str().to_string()) {
                        out.push(DocumentCandidate {
                            origin: CandidateOrigin::OnclickHandler,
                            locator: url.as_str().to_string(),
                            content_type_hint: None,
                            payload: None,
                            label: non_empty(text.trim()),
                        });
                    }
                }
            }
        }
    }

    // arbitrary data-attributes pointing at documents
    let any = Selector::parse("*").expect("static selector");
    for el in doc.select(&any) {
        for (name, value) in el.value().attrs() {
            if !name.starts_with("data-") {
                continue;
            }
            let looks_like_target = value.starts_with("http") || value.starts_with('/');
            if looks_like_target
                && (matches_vocabulary(value) || matches_vocabulary(name))
                && seen.insert(value.to_string())
            {
                out.push(DocumentCandidate {
                    origin: CandidateOrigin::DomAttribute,
                    locator: value.to_string(),
                    content_type_hint: None,
                    payload: None,
                    label: None,
                });
            }
        }
    }

    out
}

/// Strategy 3: follow up to SPECULATIVE_LIMIT fully-qualified candidates in
/// short-lived contexts, strictly sequentially, sniffing for document or
/// viewer signatures. Every context is closed on every exit path.
async fn speculative_candidates(
    browser: &dyn Browser,
    dom: &[DocumentCandidate],
) -> Vec<DocumentCandidate> {
    let mut out = Vec::new();
    let targets = dom
        .iter()
        .filter(|c| c.locator.starts_with("http"))
        .take(SPECULATIVE_LIMIT);

    for candidate in targets {
        match probe(browser, &candidate.locator).await {
            Ok(Some(found)) => out.push(found),
            Ok(None) => debug!(url = %candidate.locator, "no document signature behind link"),
            Err(e) => debug!(url = %candidate.locator, error = %e, "speculative probe failed"),
        }
    }
    out
}

async fn probe(browser: &dyn Browser, url: &str) -> Result<Option<DocumentCandidate>> {
    let page = browser.new_page().await?;
    let outcome = probe_page(page.as_ref(), url).await;
    page.close().await;
    outcome
}

async fn probe_page(page: &dyn Page, url: &str) -> Result<Option<DocumentCandidate>> {
    page.goto(url, SPECULATIVE_TIMEOUT).await?;

    // a directly captured PDF settles it
    for cap in page.captured_responses().await {
        let ct = cap
            .content_type
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if ct.contains("pdf") || cap.body.starts_with(b"%PDF") {
            return Ok(Some(DocumentCandidate {
                origin: CandidateOrigin::DomLink,
                locator: cap.url.clone(),
                content_type_hint: cap.content_type.clone(),
                payload: Some(CandidatePayload::Bytes(cap.body)),
                label: None,
            }));
        }
    }

    let html = page.html().await?;
    if has_viewer_signature(&html) {
        return Ok(Some(DocumentCandidate {
            origin: CandidateOrigin::DomLink,
            locator: url.to_string(),
            content_type_hint: Some("text/html".to_string()),
            payload: Some(CandidatePayload::Html(html)),
            label: None,
        }));
    }
    Ok(None)
}

fn has_viewer_signature(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("application/pdf")
        || lower.contains("pdfviewer")
        || lower.contains("pdf.js")
        || lower.contains("salgsoppgave")
        || lower.contains("tilstandsrapport")
        || embedded::find_base64_run(html).is_some()
}

fn matches_vocabulary(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let lower = s.to_lowercase();
    DOCUMENT_TERMS.iter().any(|term| lower.contains(term))
}

fn has_url_token(url: &str) -> bool {
    let lower = url.to_lowercase();
    URL_TOKENS.iter().any(|token| lower.contains(token))
}

fn has_pdf_signature(body: &[u8]) -> bool {
    // "JVBERi" is "%PDF" in base64
    body.windows(6).any(|w| w == b"JVBERi")
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
