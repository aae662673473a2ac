use scraper::{ElementRef, Html, Selector};

use crate::error::{Result, ScrapeError};

use super::{ProcessedText, TextSource};

/// Anything below this is chrome, not a document.
const MIN_DOC_LEN: usize = 100;

/// Subtrees that never contribute visible content.
const SKIP_ELEMENTS: &[&str] = &[
    "head", "script", "style", "nav", "header", "footer", "noscript", "iframe", "svg",
];

/// Ranked containers tried before falling back to the whole body.
const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    "#content",
    ".content",
    ".object-content",
    ".listing-content",
    ".prospectus",
];

/// Block-level elements that end a line in the flattened text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table", "section",
    "br", "dt", "dd", "article", "main",
];

/// rendered-document-page processor: strip non-content elements, prefer a
/// ranked content container, fall back to the whole body.
pub fn process(html: &str, source_url: Option<&str>) -> Result<ProcessedText> {
    let doc = Html::parse_document(html);

    let mut text = String::new();
    for sel in CONTENT_SELECTORS {
        let selector = Selector::parse(sel).expect("static selector");
        if let Some(el) = doc.select(&selector).next() {
            let candidate = element_text(el);
            if candidate.len() >= MIN_DOC_LEN {
                text = candidate;
                break;
            }
        }
    }
    if text.len() < MIN_DOC_LEN {
        text = collect_document_text(&doc);
    }
    if text.len() < MIN_DOC_LEN {
        return Err(ScrapeError::no_content("rendered page below minimum length"));
    }

    Ok(ProcessedText {
        text,
        source: TextSource::ViewerPage,
        source_url: source_url.map(|s| s.to_string()),
        page_count: None,
    })
}

/// Visible text of a whole page, chrome stripped, whitespace collapsed.
/// Never fails; an empty page gives an empty string.
pub fn visible_text(html: &str) -> String {
    collect_document_text(&Html::parse_document(html))
}

fn collect_document_text(doc: &Html) -> String {
    element_text(doc.root_element())
}

fn element_text(el: ElementRef) -> String {
    let mut buf = String::new();
    walk(el, &mut buf);
    collapse(&buf)
}

fn walk(el: ElementRef, out: &mut String) {
    if SKIP_ELEMENTS.contains(&el.value().name()) {
        return;
    }
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            walk(child_el, out);
            if BLOCK_ELEMENTS.contains(&child_el.value().name()) {
                out.push('\n');
            }
        }
    }
}

/// Collapse runs of spaces within lines and drop empty lines, keeping the
/// line structure the field patterns rely on.
fn collapse(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
