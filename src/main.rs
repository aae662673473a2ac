mod analysis;
mod analyze;
mod assembler;
mod browser;
mod discovery;
mod document;
mod error;
mod extract;
mod quality;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::analysis::{ChatSummarizer, Summarizer};
use crate::document::pdf::PdfExtractDecoder;

#[derive(Parser)]
#[command(name = "boliganalyse", about = "Norwegian real-estate listing analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a listing URL: discover the prospectus, extract facts, assess
    Analyze {
        url: String,
        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
        /// Skip the narrative LLM analysis
        #[arg(long)]
        skip_analysis: bool,
    },
    /// Analyze a manually supplied prospectus PDF
    Document {
        path: PathBuf,
        /// Emit the extracted fields as JSON
        #[arg(long)]
        json: bool,
        /// Skip the narrative LLM analysis
        #[arg(long)]
        skip_analysis: bool,
    },
    /// Run field extraction over a plain-text file
    Extract { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            url,
            json,
            skip_analysis,
        } => cmd_analyze(&url, json, skip_analysis).await,
        Commands::Document {
            path,
            json,
            skip_analysis,
        } => cmd_document(&path, json, skip_analysis).await,
        Commands::Extract { path } => cmd_extract(&path),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn cmd_analyze(url: &str, json: bool, skip_analysis: bool) -> anyhow::Result<()> {
    let browser = browser::HttpBrowser::new()?;
    let decoder = PdfExtractDecoder;
    let summarizer = ChatSummarizer::from_env();
    if summarizer.is_none() && !skip_analysis {
        println!("OPENAI_API_KEY is not set; skipping narrative analysis.");
    }

    let options = analyze::AnalyzeOptions {
        skip_analysis,
        ..Default::default()
    };
    let report = analyze::analyze_listing(
        &browser,
        &decoder,
        summarizer.as_ref().map(|s| s as &dyn Summarizer),
        url,
        &options,
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn cmd_document(path: &Path, json: bool, skip_analysis: bool) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)?;
    let decoder = PdfExtractDecoder;
    let doc = document::pdf::process(&decoder, &bytes, path.to_str())?;
    println!(
        "Decoded {} ({} pages, {} chars)",
        path.display(),
        doc.page_count.unwrap_or(0),
        doc.text.len()
    );

    let facts = extract::extract_listing_fields(&doc.text);
    if json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
    } else {
        print_facts(&facts);
    }

    let verdict = quality::assess(&doc.text);
    println!("\nQuality: {:?} ({} chars)", verdict.quality, verdict.text_length);

    if !skip_analysis {
        if let Some(summarizer) = ChatSummarizer::from_env() {
            match summarizer.summarize(&doc.text).await {
                Ok(analysis) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&analysis)?);
                    } else {
                        print_analysis(&analysis);
                    }
                }
                Err(e) => println!("Narrative analysis unavailable: {}", e),
            }
        } else {
            println!("OPENAI_API_KEY is not set; skipping narrative analysis.");
        }
    }
    Ok(())
}

fn cmd_extract(path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)?;
    let facts = extract::extract_listing_fields(&text);
    if facts.field_count() == 0 {
        println!("No fields could be extracted from {}.", path.display());
        return Ok(());
    }
    print_facts(&facts);
    Ok(())
}

fn print_report(report: &analyze::AnalysisReport) {
    println!("Listing:   {}", report.url);
    println!("Source:    {}", report.source.as_str());
    println!("Text:      {} chars", report.text_length);
    println!(
        "Quality:   {:?}{}",
        report.quality.quality,
        if report.quality.needs_manual_upload {
            " (upload the prospectus PDF for a reliable analysis)"
        } else {
            ""
        }
    );

    if !report.document_candidates.is_empty() {
        println!("\n--- Document candidates ---");
        for (i, c) in report.document_candidates.iter().enumerate() {
            println!(
                "{:>3} | rank {} | {:<32} | {:?}",
                i + 1,
                c.rank,
                truncate(&c.locator, 32),
                c.outcome
            );
        }
    }

    print_facts(&report.listing);

    if let Some(analysis) = &report.analysis {
        print_analysis(analysis);
    } else if let Some(e) = &report.analysis_error {
        println!("\nNarrative analysis unavailable: {}", e);
    }
}

fn print_facts(facts: &extract::ListingFacts) {
    let present = facts.present();
    if present.is_empty() {
        println!("\nNo listing fields extracted.");
        return;
    }
    println!("\n--- Listing fields ---");
    println!("{:<20} | {:<28} | {:>4} | {}", "Field", "Value", "Conf", "Source");
    println!("{}", "-".repeat(72));
    for (name, e) in present {
        println!(
            "{:<20} | {:<28} | {:>4} | {}",
            name,
            truncate(&e.value, 28),
            e.confidence,
            e.source
        );
    }
}

fn print_analysis(analysis: &analysis::ListingAnalysis) {
    println!("\n--- Analysis ---");
    if analysis.is_salvaged_raw() {
        println!("(unstructured summarizer response)");
    }
    if !analysis.technical_condition.summary.is_empty() {
        println!(
            "Condition ({}): {}",
            analysis.technical_condition.score, analysis.technical_condition.summary
        );
    }
    if !analysis.risk.summary.is_empty() {
        println!("Risk ({}): {}", analysis.risk.score, analysis.risk.summary);
    }
    if !analysis.price_assessment.summary.is_empty() {
        println!(
            "Price ({}): {}",
            analysis.price_assessment.score, analysis.price_assessment.summary
        );
    }
    for q in &analysis.recommended_questions {
        println!("Ask: {}", q);
    }
    if !analysis.conclusion.is_empty() {
        println!("\n{}", analysis.conclusion);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
