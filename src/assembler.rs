use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use tracing::{debug, warn};

use crate::discovery::{CandidateOrigin, CandidatePayload, DocumentCandidate};
use crate::document::pdf::PdfDecoder;
use crate::document::{self, ProcessedText, TextSource};
use crate::error::{Result, ScrapeError};

/// First success at or above this length wins outright.
pub const SUFFICIENT_TEXT_LEN: usize = 500;
/// Shorter successes are retained as fallbacks while the search continues.
pub const USABLE_TEXT_LEN: usize = 100;
/// Below this, the winning text is abandoned for a whole-page scrape.
pub const LAST_RESORT_MIN_LEN: usize = 200;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);
const DOWNLOAD_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 500;

/// What happened to one candidate during assembly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Selected,
    Fallback,
    TooShort,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateOutcome {
    pub locator: String,
    pub origin: CandidateOrigin,
    pub rank: u8,
    pub outcome: Outcome,
}

/// The assembler's result: winning text plus the full candidate ledger.
#[derive(Debug, Serialize)]
pub struct AssembledDocument {
    pub text: String,
    pub source: TextSource,
    pub source_url: Option<String>,
    pub page_count: Option<usize>,
    pub candidates: Vec<CandidateOutcome>,
}

pub struct Assembler<'a> {
    client: &'a reqwest::Client,
    decoder: &'a dyn PdfDecoder,
}

impl<'a> Assembler<'a> {
    pub fn new(client: &'a reqwest::Client, decoder: &'a dyn PdfDecoder) -> Self {
        Self { client, decoder }
    }

    /// Process candidates in fixed priority order, stopping at the first
    /// sufficient text. Per-candidate failures are recorded, never fatal;
    /// when nothing qualifies the listing page itself is scraped.
    pub async fn assemble(
        &self,
        candidates: Vec<DocumentCandidate>,
        listing_url: &str,
        listing_html: &str,
    ) -> AssembledDocument {
        let mut ranked: Vec<(u8, DocumentCandidate)> =
            candidates.into_iter().map(|c| (rank(&c), c)).collect();
        // stable sort keeps arrival order within a rank, so selection is
        // deterministic for a fixed candidate list
        ranked.sort_by_key(|(rank, _)| *rank);

        let base = Url::parse(listing_url).ok();
        let mut outcomes: Vec<CandidateOutcome> = Vec::new();
        let mut winner: Option<ProcessedText> = None;
        let mut fallback: Option<ProcessedText> = None;

        for (rank, candidate) in &ranked {
            if winner.is_some() {
                outcomes.push(outcome_of(candidate, *rank, Outcome::Skipped));
                continue;
            }
            let outcome = match self.process_candidate(candidate, base.as_ref()).await {
                Ok(doc) if doc.text.len() >= SUFFICIENT_TEXT_LEN => {
                    debug!(locator = %candidate.locator, len = doc.text.len(), "winning document");
                    winner = Some(doc);
                    Outcome::Selected
                }
                Ok(doc) if doc.text.len() > USABLE_TEXT_LEN => {
                    debug!(locator = %candidate.locator, len = doc.text.len(), "usable fallback");
                    if fallback.as_ref().map_or(true, |f| doc.text.len() > f.text.len()) {
                        fallback = Some(doc);
                    }
                    Outcome::Fallback
                }
                Ok(_) => Outcome::TooShort,
                Err(e) => {
                    debug!(locator = %candidate.locator, error = %e, "candidate failed");
                    Outcome::Failed(e.to_string())
                }
            };
            outcomes.push(outcome_of(candidate, *rank, outcome));
        }

        let chosen = winner.or(fallback);
        match chosen {
            Some(doc) if doc.text.len() >= LAST_RESORT_MIN_LEN => AssembledDocument {
                text: doc.text,
                source: doc.source,
                source_url: doc.source_url,
                page_count: doc.page_count,
                candidates: outcomes,
            },
            _ => {
                warn!("no qualifying document text, scraping the listing page itself");
                AssembledDocument {
                    text: document::page::visible_text(listing_html),
                    source: TextSource::ListingPage,
                    source_url: Some(listing_url.to_string()),
                    page_count: None,
                    candidates: outcomes,
                }
            }
        }
    }

    async fn process_candidate(
        &self,
        candidate: &DocumentCandidate,
        base: Option<&Url>,
    ) -> Result<ProcessedText> {
        let locator = Some(candidate.locator.as_str());
        match &candidate.payload {
            Some(CandidatePayload::Bytes(bytes)) => {
                document::pdf::process(self.decoder, bytes, locator)
            }
            Some(CandidatePayload::Json(value)) => {
                if json_has_embedded_document(value) {
                    document::embedded::process(self.decoder, value, locator)
                } else {
                    document::json_payload::process(value, locator)
                }
            }
            Some(CandidatePayload::Html(html)) => document::page::process(html, locator),
            None => self.download(&candidate.locator, base).await,
        }
    }

    /// Fetch a link-only candidate and route it to the processor matching
    /// the response shape.
    async fn download(&self, locator: &str, base: Option<&Url>) -> Result<ProcessedText> {
        let url = resolve_locator(locator, base)?;
        let (content_type, body) = self.fetch(url.as_str()).await?;

        let ct = content_type.as_deref().unwrap_or_default().to_lowercase();
        if ct.contains("pdf") || body.starts_with(b"%PDF") {
            document::pdf::process(self.decoder, &body, Some(url.as_str()))
        } else if ct.contains("json") {
            let value: serde_json::Value = serde_json::from_slice(&body)
                .map_err(|e| ScrapeError::decode(format!("json body: {e}")))?;
            if json_has_embedded_document(&value) {
                document::embedded::process(self.decoder, &value, Some(url.as_str()))
            } else {
                document::json_payload::process(&value, Some(url.as_str()))
            }
        } else {
            let html = String::from_utf8_lossy(&body);
            document::page::process(&html, Some(url.as_str()))
        }
    }

    async fn fetch(&self, url: &str) -> Result<(Option<String>, Vec<u8>)> {
        let mut attempt = 0u32;
        loop {
            let result = tokio::time::timeout(DOWNLOAD_TIMEOUT, self.client.get(url).send()).await;

            let retryable = matches!(
                &result,
                Ok(Ok(resp)) if matches!(resp.status().as_u16(), 429 | 500 | 502 | 503)
            );
            if retryable && attempt < DOWNLOAD_RETRIES {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                warn!(url, attempt, "transient status, backing off {:?}", backoff);
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let response = result
                .map_err(|_| ScrapeError::NavigationTimeout(DOWNLOAD_TIMEOUT))??;
            if !response.status().is_success() {
                return Err(ScrapeError::no_content(format!(
                    "status {} from {url}",
                    response.status()
                )));
            }
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = tokio::time::timeout(DOWNLOAD_TIMEOUT, response.bytes())
                .await
                .map_err(|_| ScrapeError::NavigationTimeout(DOWNLOAD_TIMEOUT))??
                .to_vec();
            return Ok((content_type, body));
        }
    }
}

/// Fixed candidate priority: passive PDF > passive base64 document >
/// passive JSON payload > viewer page > remaining links.
fn rank(candidate: &DocumentCandidate) -> u8 {
    match &candidate.payload {
        Some(CandidatePayload::Bytes(bytes)) if looks_like_pdf(candidate, bytes) => 0,
        Some(CandidatePayload::Json(value)) if json_has_embedded_document(value) => 1,
        Some(CandidatePayload::Bytes(_)) => 2,
        Some(CandidatePayload::Json(_)) => 2,
        Some(CandidatePayload::Html(_)) => 3,
        None => 4,
    }
}

fn looks_like_pdf(candidate: &DocumentCandidate, bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
        || candidate
            .content_type_hint
            .as_deref()
            .map_or(false, |ct| ct.to_lowercase().contains("pdf"))
}

fn json_has_embedded_document(value: &serde_json::Value) -> bool {
    document::embedded::find_in_value(value).is_some()
}

fn resolve_locator(locator: &str, base: Option<&Url>) -> Result<Url> {
    if let Ok(url) = Url::parse(locator) {
        return Ok(url);
    }
    match base {
        Some(base) => base
            .join(locator)
            .map_err(|e| ScrapeError::no_content(format!("bad locator {locator}: {e}"))),
        None => Err(ScrapeError::no_content(format!(
            "relative locator {locator} without a base"
        ))),
    }
}

fn outcome_of(candidate: &DocumentCandidate, rank: u8, outcome: Outcome) -> CandidateOutcome {
    CandidateOutcome {
        locator: candidate.locator.clone(),
        origin: candidate.origin,
        rank,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::discovery::{CandidateOrigin, CandidatePayload, DocumentCandidate};
    use crate::document::pdf::testing::{FailingDecoder, FixedDecoder};

    use super::*;

    const LISTING_URL: &str = "https://megler.no/bolig/1";

    fn listing_html() -> String {
        format!(
            "<html><body><main>Nødløsning: hele annonsesiden. {}</main></body></html>",
            "Beskrivelse av boligen med flere detaljer. ".repeat(8)
        )
    }

    fn link(locator: &str) -> DocumentCandidate {
        DocumentCandidate {
            origin: CandidateOrigin::DomLink,
            locator: locator.to_string(),
            content_type_hint: None,
            payload: None,
            label: None,
        }
    }

    fn passive_pdf(locator: &str) -> DocumentCandidate {
        DocumentCandidate {
            origin: CandidateOrigin::PassiveNetwork,
            locator: locator.to_string(),
            content_type_hint: Some("application/pdf".to_string()),
            payload: Some(CandidatePayload::Bytes(b"%PDF-1.7 body".to_vec())),
            label: None,
        }
    }

    fn long_text() -> String {
        "Salgsoppgave. Bruksareal: 84 m². ".repeat(30)
    }

    #[tokio::test]
    async fn passive_pdf_wins_regardless_of_arrival_order() {
        let client = reqwest::Client::new();
        let decoder = FixedDecoder::with_text(&long_text());
        let assembler = Assembler::new(&client, &decoder);

        // PDF arrives last; DOM links would require network and must be skipped
        let candidates = vec![
            link("https://megler.no/a"),
            link("https://megler.no/b"),
            link("https://megler.no/c"),
            passive_pdf("https://megler.no/api/doc.pdf"),
        ];
        let assembled = assembler.assemble(candidates, LISTING_URL, &listing_html()).await;

        assert_eq!(assembled.source, TextSource::PdfBinary);
        assert_eq!(assembled.source_url.as_deref(), Some("https://megler.no/api/doc.pdf"));
        assert!(matches!(assembled.candidates[0].outcome, Outcome::Selected));
        assert_eq!(assembled.candidates[0].rank, 0);
        assert!(assembled.candidates[1..]
            .iter()
            .all(|c| matches!(c.outcome, Outcome::Skipped)));
    }

    #[tokio::test]
    async fn embedded_json_outranks_plain_json() {
        let client = reqwest::Client::new();
        let decoder = FixedDecoder::with_text(&long_text());
        let assembler = Assembler::new(&client, &decoder);

        let run = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b"%PDF-1.4 ".repeat(20),
        );
        let plain = DocumentCandidate {
            origin: CandidateOrigin::PassiveNetwork,
            locator: "https://megler.no/api/tekst".to_string(),
            content_type_hint: Some("application/json".to_string()),
            payload: Some(CandidatePayload::Json(
                json!({"beskrivelse": "Salgsoppgave med bruksareal 84 m² og mye mer innhold."}),
            )),
            label: None,
        };
        let embedded = DocumentCandidate {
            origin: CandidateOrigin::PassiveNetwork,
            locator: "https://megler.no/api/vedlegg".to_string(),
            content_type_hint: Some("application/json".to_string()),
            payload: Some(CandidatePayload::Json(json!({"data": run}))),
            label: None,
        };

        let assembled = assembler
            .assemble(vec![plain, embedded], LISTING_URL, &listing_html())
            .await;
        assert_eq!(assembled.source, TextSource::EmbeddedBase64);
        assert_eq!(
            assembled.source_url.as_deref(),
            Some("https://megler.no/api/vedlegg")
        );
    }

    #[tokio::test]
    async fn short_success_is_kept_as_fallback() {
        let client = reqwest::Client::new();
        // decoded text is usable (>100) but never sufficient (<500)
        let decoder = FixedDecoder::with_text(&"Kort salgsoppgave. ".repeat(12));
        let assembler = Assembler::new(&client, &decoder);

        let assembled = assembler
            .assemble(
                vec![passive_pdf("https://megler.no/api/doc.pdf")],
                LISTING_URL,
                &listing_html(),
            )
            .await;
        assert_eq!(assembled.source, TextSource::PdfBinary);
        assert!(matches!(assembled.candidates[0].outcome, Outcome::Fallback));
    }

    #[tokio::test]
    async fn failures_fall_through_to_listing_scrape() {
        let client = reqwest::Client::new();
        let assembler = Assembler::new(&client, &FailingDecoder);

        let assembled = assembler
            .assemble(
                vec![passive_pdf("https://megler.no/api/doc.pdf")],
                LISTING_URL,
                &listing_html(),
            )
            .await;
        assert_eq!(assembled.source, TextSource::ListingPage);
        assert!(assembled.text.contains("hele annonsesiden"));
        assert!(matches!(assembled.candidates[0].outcome, Outcome::Failed(_)));
    }

    #[tokio::test]
    async fn no_candidates_at_all_scrapes_the_listing() {
        let client = reqwest::Client::new();
        let decoder = FixedDecoder::with_text("unused");
        let assembler = Assembler::new(&client, &decoder);

        let assembled = assembler.assemble(vec![], LISTING_URL, &listing_html()).await;
        assert_eq!(assembled.source, TextSource::ListingPage);
        assert!(assembled.candidates.is_empty());
        assert!(!assembled.text.is_empty());
    }

    #[tokio::test]
    async fn viewer_page_payload_is_processed_without_network() {
        let client = reqwest::Client::new();
        let decoder = FixedDecoder::with_text("unused");
        let assembler = Assembler::new(&client, &decoder);

        let viewer = DocumentCandidate {
            origin: CandidateOrigin::DomLink,
            locator: "https://megler.no/visning".to_string(),
            content_type_hint: Some("text/html".to_string()),
            payload: Some(CandidatePayload::Html(format!(
                "<html><body><main>{}</main></body></html>",
                long_text()
            ))),
            label: None,
        };
        let assembled = assembler
            .assemble(vec![viewer], LISTING_URL, &listing_html())
            .await;
        assert_eq!(assembled.source, TextSource::ViewerPage);
        assert_eq!(assembled.candidates[0].rank, 3);
        assert!(matches!(assembled.candidates[0].outcome, Outcome::Selected));
    }
}
