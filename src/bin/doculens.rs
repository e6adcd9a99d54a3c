//! CLI binary for doculens.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, renders the analysis report, and optionally appends
//! history records.

use anyhow::{anyhow, Result};
use clap::Parser;
use doculens::pipeline::input::resolve_input;
use doculens::{
    analyze_batch, AnalysisConfig, AnalysisOutcome, AnalysisPhase, CropRect, DocumentInput,
    HistoryRecord, HistoryStore, JsonlHistory, Orchestrator,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a local document
  doculens lease.pdf

  # Analyze a photo capture, cropped to the document
  doculens scan.jpg --crop 120,80,1400,2000

  # Analyze from a URL
  doculens https://example.com/contract.pdf

  # Several documents at once
  doculens lease.pdf invoice.png tos.pdf --concurrency 3

  # Machine-readable output
  doculens lease.pdf --json > analysis.json

  # Keep a history log
  doculens lease.pdf --history-file ~/.doculens/history.jsonl

  # Use a specific model
  doculens --provider openai --model gpt-4.1 lease.pdf

ENVIRONMENT:
  OPENAI_API_KEY / ANTHROPIC_API_KEY / …   provider credentials
  DOCULENS_LLM_PROVIDER + DOCULENS_MODEL   fixed provider/model pair
  RUST_LOG                                  log filter (e.g. doculens=debug)"#;

#[derive(Parser, Debug)]
#[command(
    name = "doculens",
    version,
    about = "Analyze legal and administrative documents with an LLM",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Document files or HTTP(S) URLs to analyze
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Override the sniffed MIME type (e.g. application/pdf)
    #[arg(long)]
    mime: Option<String>,

    /// Crop rectangle X,Y,WIDTH,HEIGHT in pixels (single image input only)
    #[arg(long, value_name = "X,Y,W,H")]
    crop: Option<String>,

    /// LLM model identifier
    #[arg(long, env = "DOCULENS_MODEL")]
    model: Option<String>,

    /// LLM provider name (openai, anthropic, gemini, …)
    #[arg(long, env = "DOCULENS_LLM_PROVIDER")]
    provider: Option<String>,

    /// Model call deadline in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Maximum document size in bytes
    #[arg(long)]
    max_bytes: Option<usize>,

    /// Concurrent analyses when several inputs are given
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Emit raw JSON instead of the formatted report
    #[arg(long)]
    json: bool,

    /// Append a history record per document to this JSON-lines file
    #[arg(long, value_name = "FILE")]
    history_file: Option<PathBuf>,

    /// Suppress the progress spinner
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = AnalysisConfig::builder().api_timeout_secs(cli.timeout_secs);
    if let Some(max) = cli.max_bytes {
        builder = builder.max_document_bytes(max);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    let config = builder.build()?;

    let crop = cli.crop.as_deref().map(parse_crop).transpose()?;
    if crop.is_some() && cli.inputs.len() > 1 {
        return Err(anyhow!("--crop applies to a single image input"));
    }

    let history = cli
        .history_file
        .as_ref()
        .map(|path| JsonlHistory::new(path.clone()));

    let failures = if cli.inputs.len() == 1 {
        run_single(&cli, &config, crop, history.as_ref()).await?
    } else {
        run_batch(&cli, &config, history.as_ref()).await?
    };

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Analyze one document with a live phase spinner. Returns the failure count.
async fn run_single(
    cli: &Cli,
    config: &AnalysisConfig,
    crop: Option<CropRect>,
    history: Option<&JsonlHistory>,
) -> Result<usize> {
    let input = &cli.inputs[0];
    let resolved = resolve_input(input, config.download_timeout_secs).await?;
    let mime = cli.mime.clone().unwrap_or(resolved.mime_type);

    let orchestrator = Orchestrator::new(config.clone())?;
    let spinner = if cli.quiet || cli.json {
        None
    } else {
        Some(spawn_phase_spinner(&orchestrator))
    };

    let outcome = match crop {
        Some(rect) => {
            orchestrator
                .analyze_cropped(&resolved.bytes, &mime, rect)
                .await
        }
        None => orchestrator.analyze(&resolved.bytes, &mime).await,
    };

    if let Some((bar, watcher)) = spinner {
        watcher.abort();
        bar.finish_and_clear();
    }

    match outcome {
        Ok(outcome) => {
            record_history(history, Ok(&outcome)).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_report(input, &outcome);
            }
            Ok(0)
        }
        Err(e) => {
            record_history(history, Err(&e)).await;
            if cli.json {
                let entry = serde_json::json!({
                    "input": input,
                    "error": { "kind": e.kind(), "message": e.to_string() },
                });
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_failure(input, &e);
            }
            Ok(1)
        }
    }
}

/// Analyze several documents concurrently. Returns the failure count.
async fn run_batch(
    cli: &Cli,
    config: &AnalysisConfig,
    history: Option<&JsonlHistory>,
) -> Result<usize> {
    let mut inputs = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let resolved = resolve_input(input, config.download_timeout_secs).await?;
        let mime = cli.mime.clone().unwrap_or(resolved.mime_type);
        inputs.push(DocumentInput {
            name: input.clone(),
            bytes: resolved.bytes,
            mime_type: mime,
        });
    }

    let bar = if cli.quiet || cli.json {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style());
        bar.set_message(format!("analyzing {} documents…", inputs.len()));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let items = analyze_batch(inputs, config, cli.concurrency).await?;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if cli.json {
        let entries: Vec<serde_json::Value> = items
            .iter()
            .map(|item| match &item.outcome {
                Ok(outcome) => serde_json::json!({
                    "input": item.name,
                    "outcome": outcome,
                }),
                Err(e) => serde_json::json!({
                    "input": item.name,
                    "error": { "kind": e.kind(), "message": e.to_string() },
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }

    let mut failures = 0;
    for item in &items {
        match &item.outcome {
            Ok(outcome) => {
                record_history(history, Ok(outcome)).await;
                if !cli.json {
                    eprintln!(
                        "{} {}  {}",
                        green("✓"),
                        bold(&item.name),
                        dim(&outcome.result.document_type)
                    );
                    print_report(&item.name, outcome);
                }
            }
            Err(e) => {
                failures += 1;
                record_history(history, Err(e)).await;
                if !cli.json {
                    print_failure(&item.name, e);
                }
            }
        }
    }

    Ok(failures)
}

/// Spinner that follows the orchestrator's phase transitions.
fn spawn_phase_spinner(
    orchestrator: &Orchestrator,
) -> (ProgressBar, tokio::task::JoinHandle<()>) {
    let bar = ProgressBar::new_spinner();
    bar.set_style(spinner_style());
    bar.enable_steady_tick(Duration::from_millis(80));

    let mut rx = orchestrator.subscribe();
    let bar_clone = bar.clone();
    let watcher = tokio::spawn(async move {
        loop {
            let phase = *rx.borrow_and_update();
            bar_clone.set_message(phase.to_string());
            if matches!(phase, AnalysisPhase::Succeeded | AnalysisPhase::Failed(_)) {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    });

    (bar, watcher)
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"])
}

/// Parse "X,Y,W,H" into a crop rectangle.
fn parse_crop(s: &str) -> Result<CropRect> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(anyhow!("--crop expects X,Y,WIDTH,HEIGHT, got '{s}'"));
    }
    let nums: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| anyhow!("--crop expects four non-negative integers, got '{s}'"))?;
    Ok(CropRect {
        x: nums[0],
        y: nums[1],
        width: nums[2],
        height: nums[3],
    })
}

async fn record_history(
    history: Option<&JsonlHistory>,
    outcome: Result<&AnalysisOutcome, &doculens::AnalysisError>,
) {
    let Some(store) = history else { return };
    let record = match outcome {
        Ok(outcome) => HistoryRecord::completed(&outcome.result),
        Err(e) => HistoryRecord::failed(e.to_string()),
    };
    if let Err(e) = store.append(record).await {
        eprintln!("{} could not write history: {e}", yellow("⚠"));
    }
}

fn print_report(input: &str, outcome: &AnalysisOutcome) {
    let result = &outcome.result;
    println!();
    println!("{}", bold(&format!("{}  {}", result.document_type, dim(input))));
    println!();
    println!("{}", result.summary);

    if !result.key_facts.is_empty() {
        println!();
        println!("{}", cyan("Key facts"));
        for fact in &result.key_facts {
            println!("  • {}  {}", fact.fact, dim(&fact.citation));
        }
    }

    if !result.risks_and_fees.is_empty() {
        println!();
        println!("{}", yellow("Risks & fees"));
        for risk in &result.risks_and_fees {
            println!("  • {}  {}", risk.description, dim(&risk.citation));
        }
    }

    if !result.to_do_items.is_empty() {
        println!();
        println!("{}", cyan("To do"));
        for item in &result.to_do_items {
            match &item.deadline {
                Some(deadline) => println!(
                    "  • {} {}  {}",
                    item.item,
                    bold(&format!("(by {deadline})")),
                    dim(&item.citation)
                ),
                None => println!("  • {}  {}", item.item, dim(&item.citation)),
            }
        }
    }

    println!();
    eprintln!(
        "{}",
        dim(&format!(
            "{} tokens in / {} tokens out, {:.1}s",
            outcome.stats.input_tokens,
            outcome.stats.output_tokens,
            outcome.stats.total_duration_ms as f64 / 1000.0
        ))
    );
}

fn print_failure(input: &str, e: &doculens::AnalysisError) {
    eprintln!("{} {}  {}", red("✗"), bold(input), red(&e.to_string()));
    if e.is_retryable() {
        eprintln!("  {}", dim("transient failure; trying again may succeed"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_crop_accepts_four_fields() {
        let rect = parse_crop("10, 20, 300, 400").unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 10,
                y: 20,
                width: 300,
                height: 400
            }
        );
    }

    #[test]
    fn parse_crop_rejects_bad_shapes() {
        assert!(parse_crop("10,20,300").is_err());
        assert!(parse_crop("a,b,c,d").is_err());
        assert!(parse_crop("-1,0,10,10").is_err());
    }
}
