use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Chars inspected before a match for disqualifying labels. The guard stops
/// at the previous clause boundary so `"…, Bruksareal: 105"` is not poisoned
/// by an earlier `"Eksternt bruksareal"` clause.
const GUARD_WINDOW: usize = 32;

/// One priority rank of label patterns. Lower-indexed tiers always win over
/// higher ones; confidence is a pure function of the tier.
pub struct Tier {
    pub source: &'static str,
    pub confidence: u8,
    pub patterns: Vec<Regex>,
}

#[derive(Debug, Clone, Copy)]
pub enum ValueFormat {
    SquareMeters,
    Count,
    Year,
    Kroner,
    Verbatim,
}

/// A field described as data: ranked tiers, disqualifying context patterns,
/// a plausibility window, a typicality anchor for tie-breaks, and the output
/// format. New fields are new table rows, not new control flow.
pub struct FieldProfile {
    pub field: &'static str,
    pub tiers: Vec<Tier>,
    pub exclusions: Vec<Regex>,
    pub window: Option<(f64, f64)>,
    pub anchor: Option<f64>,
    pub format: ValueFormat,
}

/// The externally visible winner for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub value: String,
    pub confidence: u8,
    pub source: String,
    pub context: String,
    pub alternatives: usize,
}

enum CandidateValue {
    Number(f64),
    Text(String),
}

struct Candidate {
    tier: usize,
    source: &'static str,
    confidence: u8,
    value: CandidateValue,
    formatted: String,
    context: String,
    position: usize,
}

/// Resolve one field against free text.
///
/// Candidates are collected from every tier, filtered by the exclusion guard
/// and the plausibility window, and only then ranked by tier. An implausible
/// top-tier match therefore never blocks a plausible lower-tier one, and a
/// text offering only disqualified labels yields `None` rather than a
/// lower-quality fallback value.
pub fn resolve(profile: &FieldProfile, text: &str) -> Option<Extraction> {
    if text.trim().is_empty() {
        return None;
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    for (tier_idx, tier) in profile.tiers.iter().enumerate() {
        for pattern in &tier.patterns {
            for caps in pattern.captures_iter(text) {
                let m = caps.get(0).expect("whole match");
                let raw = caps.get(1).map(|g| g.as_str()).unwrap_or(m.as_str());

                if excluded(profile, text, m.start(), m.end()) {
                    debug!(
                        field = profile.field,
                        tier = tier_idx,
                        raw = raw.trim(),
                        "match disqualified by exclusion guard"
                    );
                    continue;
                }

                let value = match profile.format {
                    ValueFormat::Verbatim => CandidateValue::Text(clean_text(raw)),
                    _ => match parse_number(raw) {
                        Some(v) => CandidateValue::Number(v),
                        None => continue,
                    },
                };

                if let (Some((lo, hi)), CandidateValue::Number(v)) = (profile.window, &value) {
                    if *v < lo || *v > hi {
                        debug!(
                            field = profile.field,
                            tier = tier_idx,
                            value = *v,
                            "outside plausibility window, rejected"
                        );
                        continue;
                    }
                }

                let formatted = format_value(&value, profile.format);
                debug!(
                    field = profile.field,
                    tier = tier_idx,
                    source = tier.source,
                    value = %formatted,
                    "candidate"
                );
                candidates.push(Candidate {
                    tier: tier_idx,
                    source: tier.source,
                    confidence: tier.confidence,
                    value,
                    formatted,
                    context: context_snippet(text, m.start(), m.end()),
                    position: m.start(),
                });
            }
        }
    }

    if candidates.is_empty() {
        debug!(field = profile.field, "no qualifying candidates");
        return None;
    }

    let best_tier = candidates.iter().map(|c| c.tier).min()?;
    let winner = candidates
        .iter()
        .filter(|c| c.tier == best_tier)
        .min_by(|a, b| {
            anchor_distance(a, profile.anchor)
                .total_cmp(&anchor_distance(b, profile.anchor))
                .then(a.position.cmp(&b.position))
        })?;

    // Distinct values across all tiers; duplicates of the winner collapse
    // into the winning tier's confidence/source.
    let distinct: HashSet<&str> = candidates.iter().map(|c| c.formatted.as_str()).collect();
    let alternatives = distinct.len().saturating_sub(1);

    debug!(
        field = profile.field,
        tier = best_tier,
        source = winner.source,
        value = %winner.formatted,
        alternatives,
        "selected"
    );

    Some(Extraction {
        value: winner.formatted.clone(),
        confidence: winner.confidence,
        source: winner.source.to_string(),
        context: winner.context.clone(),
        alternatives,
    })
}

/// Tie-break distance: closer to the profile's typicality anchor wins.
/// Text fields and anchor-less profiles fall back to match order.
fn anchor_distance(c: &Candidate, anchor: Option<f64>) -> f64 {
    match (&c.value, anchor) {
        (CandidateValue::Number(v), Some(a)) => (v - a).abs(),
        _ => 0.0,
    }
}

/// A match is disqualified when an exclusion pattern hits the matched span or
/// the guarded prefix (same clause only, at most GUARD_WINDOW chars back).
fn excluded(profile: &FieldProfile, text: &str, start: usize, end: usize) -> bool {
    if profile.exclusions.is_empty() {
        return false;
    }
    let mut from = start.saturating_sub(GUARD_WINDOW);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let prefix = &text[from..start];
    let clause_start = prefix
        .rfind(|c: char| matches!(c, '\n' | ',' | ';' | '.'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let guard = &text[from + clause_start..end];
    profile.exclusions.iter().any(|re| re.is_match(guard))
}

/// Parse Norwegian-formatted numbers: `"95"`, `"95,5"`, `"3 500 000"`,
/// `"1.500.000"`, `"105.5"`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ',');
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if let Some(comma) = cleaned.rfind(',') {
        let frac = &cleaned[comma + 1..];
        if (1..=2).contains(&frac.len()) && frac.chars().all(|c| c.is_ascii_digit()) {
            // comma is the decimal separator
            let ints: String = cleaned[..comma].chars().filter(|c| c.is_ascii_digit()).collect();
            format!("{}.{}", ints, frac)
        } else {
            cleaned.chars().filter(|c| c.is_ascii_digit()).collect()
        }
    } else if cleaned.matches('.').count() > 1 {
        cleaned.replace('.', "")
    } else if let Some(dot) = cleaned.find('.') {
        let frac = &cleaned[dot + 1..];
        if frac.len() == 3 && frac.chars().all(|c| c.is_ascii_digit()) {
            // "1.500" is a thousands grouping in Norwegian notation
            cleaned.replace('.', "")
        } else {
            cleaned.to_string()
        }
    } else {
        cleaned.to_string()
    };

    normalized.parse::<f64>().ok()
}

fn format_value(value: &CandidateValue, format: ValueFormat) -> String {
    match (value, format) {
        (CandidateValue::Text(t), _) => t.clone(),
        (CandidateValue::Number(v), ValueFormat::SquareMeters) => {
            format!("{} m²", v.round() as i64)
        }
        (CandidateValue::Number(v), ValueFormat::Count) => format!("{}", v.round() as i64),
        (CandidateValue::Number(v), ValueFormat::Year) => format!("{}", v.round() as i64),
        (CandidateValue::Number(v), ValueFormat::Kroner) => {
            format!("{} kr", group_thousands(v.round() as i64))
        }
        (CandidateValue::Number(v), ValueFormat::Verbatim) => format!("{}", v),
    }
}

fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '.' || c == ',' || c == '-')
        .trim()
        .to_string()
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn context_snippet(text: &str, start: usize, end: usize) -> String {
    let mut lo = start.saturating_sub(40);
    while !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + 40).min(text.len());
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    text[lo..hi].split_whitespace().collect::<Vec<_>>().join(" ")
}
