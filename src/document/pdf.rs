use std::collections::HashMap;

use crate::error::{Result, ScrapeError};

use super::{ProcessedText, TextSource};

/// Decoded output of a binary PDF decoder.
#[derive(Debug, Clone)]
pub struct DecodedPdf {
    pub text: String,
    pub page_count: usize,
    pub metadata: HashMap<String, String>,
}

/// Injected binary PDF-to-text capability.
pub trait PdfDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPdf>;
}

/// In-memory decoder over the pure-Rust `pdf-extract` crate. Page count is
/// derived from form-feed separators, an approximation richer decoders may
/// replace.
pub struct PdfExtractDecoder;

impl PdfDecoder for PdfExtractDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPdf> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ScrapeError::decode(e.to_string()))?;
        let page_count = text.matches('\u{c}').count() + 1;
        Ok(DecodedPdf {
            text,
            page_count,
            metadata: HashMap::new(),
        })
    }
}

/// pdf-binary processor: decode a byte buffer into plain text.
pub fn process(
    decoder: &dyn PdfDecoder,
    bytes: &[u8],
    source_url: Option<&str>,
) -> Result<ProcessedText> {
    if bytes.is_empty() {
        return Err(ScrapeError::decode("empty pdf buffer"));
    }
    let decoded = decoder.decode(bytes)?;
    if decoded.text.trim().is_empty() {
        return Err(ScrapeError::no_content("pdf decoded to empty text"));
    }
    Ok(ProcessedText {
        text: decoded.text,
        source: TextSource::PdfBinary,
        source_url: source_url.map(|s| s.to_string()),
        page_count: Some(decoded.page_count),
    })
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingDecoder, FixedDecoder};
    use super::*;

    #[test]
    fn empty_buffer_is_a_decode_error() {
        let decoder = FixedDecoder::with_text("irrelevant");
        let err = process(&decoder, &[], None).unwrap_err();
        assert!(matches!(err, ScrapeError::Decode(_)));
    }

    #[test]
    fn decoder_failure_propagates() {
        let err = process(&FailingDecoder, b"%PDF-1.7 junk", None).unwrap_err();
        assert!(matches!(err, ScrapeError::Decode(_)));
    }

    #[test]
    fn empty_decoded_text_is_no_content() {
        let decoder = FixedDecoder::with_text("   \n ");
        let err = process(&decoder, b"%PDF-1.7", None).unwrap_err();
        assert!(matches!(err, ScrapeError::NoQualifyingContent(_)));
    }

    #[test]
    fn successful_decode_carries_source_and_pages() {
        let decoder = FixedDecoder::with_text("Bruksareal: 84 m²");
        let doc = process(&decoder, b"%PDF-1.7", Some("https://x.no/p.pdf")).unwrap();
        assert_eq!(doc.source, TextSource::PdfBinary);
        assert_eq!(doc.source_url.as_deref(), Some("https://x.no/p.pdf"));
        assert_eq!(doc.page_count, Some(3));
        assert!(doc.text.contains("84 m²"));
    }
}
