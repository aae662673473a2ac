pub mod embedded;
pub mod json_payload;
pub mod page;
pub mod pdf;

use serde::Serialize;

/// Where a winning text body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextSource {
    PdfBinary,
    EmbeddedBase64,
    JsonPayload,
    ViewerPage,
    ListingPage,
}

impl TextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextSource::PdfBinary => "pdf-binary",
            TextSource::EmbeddedBase64 => "embedded-base64",
            TextSource::JsonPayload => "json-payload",
            TextSource::ViewerPage => "viewer-page",
            TextSource::ListingPage => "listing-page",
        }
    }
}

/// Uniform output shape of every document processor. Failures are
/// `Err(ScrapeError)`, recorded per candidate by the assembler.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedText {
    pub text: String,
    pub source: TextSource,
    pub source_url: Option<String>,
    pub page_count: Option<usize>,
}
