use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use sofex_core::{
    AnomalyKind, DocumentCache, PipelineConfig, ProcessOptions, ProcessingMode, ProcessingResult,
};

/// Statement of Facts processor - extract timestamped port-call events
/// from shipping documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// PDF or DOCX documents to process
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Processing mode (cost-saving skips OCR and fuzzy matching)
    #[arg(long, value_enum, default_value = "accuracy")]
    mode: Mode,

    /// IANA timezone local times in the document are read in
    #[arg(long, default_value = "UTC")]
    port_timezone: String,

    /// Disable OCR for pages without a usable text layer
    #[arg(long)]
    no_ocr: bool,

    /// Path to a TOML pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat inputs as free-text fixture recaps instead of SoF documents
    #[arg(long)]
    recap: bool,

    /// Emit full results as JSON
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Accuracy,
    CostSaving,
}

impl From<Mode> for ProcessingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Accuracy => ProcessingMode::Accuracy,
            Mode::CostSaving => ProcessingMode::CostSaving,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.recap {
        return run_recaps(&args.files);
    }

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PipelineConfig::from_toml(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    let options = ProcessOptions {
        mode: args.mode.into(),
        port_timezone: args.port_timezone.clone(),
        enable_ocr: !args.no_ocr,
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let cache = DocumentCache::new();
    let progress = if args.json || args.files.len() == 1 {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(args.files.len() as u64)
    };
    progress.set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")?);

    let mut failures = 0usize;
    for path in &args.files {
        if cancel.is_cancelled() {
            break;
        }
        progress.set_message(path.display().to_string());

        match process_file(path, &options, &config, &cache, cancel.clone()).await {
            Ok(result) => progress.suspend(|| {
                if args.json {
                    print_json(&result);
                } else {
                    print_summary(path, &result, !args.no_color);
                }
            }),
            Err(e) => {
                failures += 1;
                progress.suspend(|| eprintln!("{}: {e:#}", path.display()));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if cancel.is_cancelled() {
        anyhow::bail!("interrupted");
    }
    if failures > 0 {
        anyhow::bail!("{failures} document(s) failed");
    }
    Ok(())
}

/// Parse fixture-recap text files into structured chartering terms.
fn run_recaps(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut failures = 0usize;
    for path in files {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let extraction = sofex_core::recap::parse_recap(&text);
                match serde_json::to_string_pretty(&extraction) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("{}: failed to serialize: {e}", path.display()),
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} recap(s) failed");
    }
    Ok(())
}

async fn process_file(
    path: &Path,
    options: &ProcessOptions,
    config: &PipelineConfig,
    cache: &DocumentCache,
    cancel: CancellationToken,
) -> anyhow::Result<Arc<ProcessingResult>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let declared = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let result = cache
        .get_or_process(bytes, &declared, options, config, cancel)
        .await?;
    Ok(result)
}

fn print_json(result: &ProcessingResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize result: {e}"),
    }
}

fn print_summary(path: &Path, result: &ProcessingResult, color: bool) {
    println!();
    if color {
        println!("{}", path.display().to_string().bold());
    } else {
        println!("{}", path.display());
    }
    println!(
        "  {} event(s), {} low confidence, {} anomaly(ies)",
        result.stats.total_events,
        result.stats.low_confidence_count,
        result.anomalies.len()
    );

    for event in &result.events {
        let start = event
            .start_time
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unparsed".to_string());
        let span = match (event.end_time, event.duration_minutes) {
            (Some(end), Some(minutes)) => {
                format!(" -> {} ({minutes} min)", end.format("%Y-%m-%d %H:%M UTC"))
            }
            _ => String::new(),
        };
        let line = format!(
            "  [{:>3}] p{} {:<24} {start}{span}  ({:.2})",
            event.row_index, event.page, event.event_name, event.confidence
        );
        if color && event.confidence < 0.85 {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }

    for anomaly in &result.anomalies {
        let line = format!(
            "  ! {:?} (row {}): {}",
            anomaly.kind, anomaly.row_index, anomaly.message
        );
        if color {
            match anomaly.kind {
                AnomalyKind::LowConfidence => println!("{}", line.yellow()),
                _ => println!("{}", line.red()),
            }
        } else {
            println!("{line}");
        }
    }
}
