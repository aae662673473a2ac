use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Input cap for one summarizer call.
pub const MAX_PROMPT_CHARS: usize = 10_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const INSTRUCTION: &str = "\
You are a Norwegian real-estate analyst. You receive text from a sales \
prospectus (salgsoppgave) or listing page. Respond with ONLY a JSON object, \
no markdown fences, with exactly these keys: \
technical_condition {score (0-100), summary, findings []}, \
risk {score (0-100), summary, risks []}, \
price_assessment {score (0-100), summary}, \
renovation_needs {required [], desired [], cost_estimate}, \
recommended_questions [], \
conclusion. \
Scores: higher is better for technical_condition and price_assessment, \
higher is riskier for risk. Write all prose in Norwegian.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalCondition {
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceAssessment {
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenovationNeeds {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub desired: Vec<String>,
    #[serde(default)]
    pub cost_estimate: Option<String>,
}

/// The fixed narrative-analysis schema. Unknown fields from the model are
/// ignored; missing ones default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingAnalysis {
    #[serde(default)]
    pub technical_condition: TechnicalCondition,
    #[serde(default)]
    pub risk: RiskAssessment,
    #[serde(default)]
    pub price_assessment: PriceAssessment,
    #[serde(default)]
    pub renovation_needs: RenovationNeeds,
    #[serde(default)]
    pub recommended_questions: Vec<String>,
    #[serde(default)]
    pub conclusion: String,
    /// Set when the response could not be parsed and was wrapped as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ListingAnalysis {
    /// Raw-text wrapper, the last rung of the salvage ladder.
    pub fn from_raw(content: &str) -> Self {
        Self {
            conclusion: truncate_chars(content.trim(), 300).to_string(),
            raw_response: Some(content.to_string()),
            ..Self::default()
        }
    }

    pub fn is_salvaged_raw(&self) -> bool {
        self.raw_response.is_some()
    }
}

/// Injected narrative summarizer. Field extraction never goes through this;
/// it produces prose analysis only.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prospectus_text: &str) -> Result<ListingAnalysis>;
}

/// Summarizer over an OpenAI-compatible chat-completions endpoint.
pub struct ChatSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatSummarizer {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Reads OPENAI_API_KEY (required), OPENAI_BASE_URL and OPENAI_MODEL.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        Self::new(
            api_key,
            std::env::var("OPENAI_BASE_URL").ok(),
            std::env::var("OPENAI_MODEL").ok(),
        )
        .ok()
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, prospectus_text: &str) -> Result<ListingAnalysis> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                {"role": "system", "content": INSTRUCTION},
                {"role": "user", "content": truncate_chars(prospectus_text, MAX_PROMPT_CHARS)},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScrapeError::DownstreamService(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScrapeError::DownstreamService(format!(
                "status {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScrapeError::DownstreamService(e.to_string()))?;
        let content = value
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| ScrapeError::DownstreamService("no completion content".to_string()))?;

        Ok(salvage_analysis(content))
    }
}

/// Salvage ladder: direct JSON → fence-stripped → first balanced JSON
/// object → raw-text wrapper. Never fails; garbage degrades to `from_raw`.
pub fn salvage_analysis(content: &str) -> ListingAnalysis {
    if let Some(analysis) = parse_candidate(content) {
        return analysis;
    }
    let unfenced = strip_fences(content);
    if let Some(analysis) = parse_candidate(&unfenced) {
        return analysis;
    }
    if let Some(object) = first_json_object(&unfenced) {
        if let Some(analysis) = parse_candidate(object) {
            return analysis;
        }
    }
    ListingAnalysis::from_raw(content)
}

/// Parse only objects that carry at least one schema key; an arbitrary JSON
/// object must not masquerade as an empty analysis.
fn parse_candidate(s: &str) -> Option<ListingAnalysis> {
    const KNOWN_KEYS: &[&str] = &[
        "technical_condition",
        "risk",
        "price_assessment",
        "renovation_needs",
        "recommended_questions",
        "conclusion",
    ];
    let value: serde_json::Value = serde_json::from_str(s.trim()).ok()?;
    let object = value.as_object()?;
    if !KNOWN_KEYS.iter().any(|k| object.contains_key(*k)) {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn strip_fences(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// First balanced `{…}` span, string-literal aware.
fn first_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn schema_json() -> String {
        serde_json::json!({
            "technical_condition": {"score": 72, "summary": "God stand.", "findings": ["Nyere kjøkken"]},
            "risk": {"score": 35, "summary": "Lav risiko.", "risks": ["Eldre bad"]},
            "price_assessment": {"score": 60, "summary": "Riktig priset."},
            "renovation_needs": {"required": ["Bad"], "desired": ["Maling"], "cost_estimate": "150 000-250 000 kr"},
            "recommended_questions": ["Når ble taket skiftet?"],
            "conclusion": "Gjennomgående solid objekt."
        })
        .to_string()
    }

    #[test]
    fn direct_json_parses() {
        let analysis = salvage_analysis(&schema_json());
        assert_eq!(analysis.technical_condition.score, 72);
        assert_eq!(analysis.renovation_needs.required, vec!["Bad"]);
        assert!(!analysis.is_salvaged_raw());
    }

    #[test]
    fn fenced_json_is_stripped() {
        let fenced = format!("```json\n{}\n```", schema_json());
        let analysis = salvage_analysis(&fenced);
        assert_eq!(analysis.risk.score, 35);
        assert!(!analysis.is_salvaged_raw());
    }

    #[test]
    fn json_embedded_in_prose_is_extracted() {
        let wrapped = format!("Her er analysen du ba om:\n{}\nHåper det hjelper!", schema_json());
        let analysis = salvage_analysis(&wrapped);
        assert_eq!(analysis.conclusion, "Gjennomgående solid objekt.");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_extraction() {
        let tricky = format!(
            "Kommentar: {{\"note\": \"ikke denne\"}} er ikke analysen. {}",
            schema_json()
        );
        // first balanced object is the note; it lacks schema keys, so the
        // ladder falls through to the raw wrapper rather than a wrong parse
        let analysis = salvage_analysis(&tricky);
        assert!(analysis.is_salvaged_raw());
    }

    #[test]
    fn garbage_degrades_to_raw_wrapper() {
        let analysis = salvage_analysis("Beklager, jeg kan ikke svare på det.");
        assert!(analysis.is_salvaged_raw());
        assert!(analysis.conclusion.contains("Beklager"));
    }

    #[test]
    fn arbitrary_json_object_is_not_an_analysis() {
        let analysis = salvage_analysis(r#"{"foo": 1, "bar": 2}"#);
        assert!(analysis.is_salvaged_raw());
    }

    #[test]
    fn partial_schema_fills_defaults() {
        let analysis = salvage_analysis(r#"{"conclusion": "Kort konklusjon."}"#);
        assert_eq!(analysis.conclusion, "Kort konklusjon.");
        assert_eq!(analysis.technical_condition.score, 0);
        assert!(!analysis.is_salvaged_raw());
    }

    #[test]
    fn prompt_truncation_respects_char_boundaries() {
        let text = "æøå".repeat(10_000);
        let cut = truncate_chars(&text, MAX_PROMPT_CHARS);
        assert_eq!(cut.chars().count(), MAX_PROMPT_CHARS);
    }
}
