use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::{ListingAnalysis, Summarizer};
use crate::assembler::{Assembler, CandidateOutcome};
use crate::browser::{Browser, Page};
use crate::discovery;
use crate::document::pdf::PdfDecoder;
use crate::document::{self, TextSource};
use crate::error::{Result, ScrapeError};
use crate::extract::{self, ListingFacts};
use crate::quality::{self, QualityVerdict};

pub struct AnalyzeOptions {
    pub nav_timeout: Duration,
    pub skip_analysis: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(30),
            skip_analysis: false,
        }
    }
}

/// Everything one analysis run produces. JSON-serializable for callers.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub url: String,
    pub success: bool,
    pub source: TextSource,
    pub text_length: usize,
    pub quality: QualityVerdict,
    pub document_candidates: Vec<CandidateOutcome>,
    pub listing: ListingFacts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ListingAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// Analyze one listing URL end to end: discover the prospectus, normalize it
/// to text, extract baseline facts from the listing itself, gate on text
/// quality, then (optionally) run the narrative summarizer.
///
/// Only session-level failures (no page, listing unreachable) return `Err`;
/// everything below that degrades and is recorded in the report.
pub async fn analyze_listing(
    browser: &dyn Browser,
    decoder: &dyn PdfDecoder,
    summarizer: Option<&dyn Summarizer>,
    url: &str,
    options: &AnalyzeOptions,
) -> Result<AnalysisReport> {
    let page = browser.new_page().await?;
    let result = run_pipeline(browser, page.as_ref(), decoder, summarizer, url, options).await;
    // the primary session is closed on every path
    page.close().await;
    result
}

async fn run_pipeline(
    browser: &dyn Browser,
    page: &dyn Page,
    decoder: &dyn PdfDecoder,
    summarizer: Option<&dyn Summarizer>,
    url: &str,
    options: &AnalyzeOptions,
) -> Result<AnalysisReport> {
    page.goto(url, options.nav_timeout).await?;

    // discovery waits out the settle delay before reading captures
    let candidates = discovery::discover(browser, page).await;
    if candidates.is_empty() {
        warn!(error = %ScrapeError::NoCandidatesFound, "continuing with listing text only");
    } else {
        info!(count = candidates.len(), "document candidates discovered");
    }

    let listing_html = page.html().await.unwrap_or_default();

    // baseline facts from the listing itself, independent of discovery
    let listing_text = document::page::visible_text(&listing_html);
    let listing = extract::extract_listing_fields(&listing_text);
    info!(fields = listing.field_count(), "listing baseline extracted");

    let client = reqwest::Client::builder().build()?;
    let assembled = Assembler::new(&client, decoder)
        .assemble(candidates, url, &listing_html)
        .await;
    info!(source = assembled.source.as_str(), len = assembled.text.len(), "document assembled");

    let verdict = quality::assess(&assembled.text);
    if verdict.needs_manual_upload {
        info!(quality = ?verdict.quality, "text below quality gate, manual upload recommended");
    }

    let (analysis, analysis_error) = match summarizer {
        Some(s) if !options.skip_analysis && !assembled.text.trim().is_empty() => {
            match s.summarize(&assembled.text).await {
                Ok(a) => (Some(a), None),
                Err(e) => {
                    warn!(error = %e, "narrative analysis unavailable, continuing without it");
                    (None, Some(e.to_string()))
                }
            }
        }
        _ => (None, None),
    };

    Ok(AnalysisReport {
        url: url.to_string(),
        success: true,
        source: assembled.source,
        text_length: assembled.text.len(),
        quality: verdict,
        document_candidates: assembled.candidates,
        listing,
        analysis,
        analysis_error,
        generated_at: Utc::now(),
    })
}
