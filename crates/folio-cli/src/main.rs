//! folio - drive an AI text provider over a directory of chapter files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use folio_core::{logging, JobConfig, JobOutcome, RewriteMode};
use folio_engine::{JobManager, JobReport};
use folio_inference::{build_provider, ProviderConfig, ProviderKind};
use folio_store::{looks_like_chapter_dir, TextDirStore};

const DEFAULT_PROMPT: &str = "Rewrite the user's text with OCR artifacts, broken hyphenation, and \
formatting noise removed. Preserve the wording and meaning exactly; do not summarize or comment. \
If the input is not prose worth keeping, reply with exactly [[SKIP]]. Output only the rewritten text.";

#[derive(Parser, Debug)]
#[command(
    name = "folio",
    version,
    about = "Clean up OCR and formatting noise in chaptered documents with an AI text provider"
)]
struct Cli {
    /// Directory of .txt chapter files
    dir: PathBuf,

    /// Provider backend: ollama, openai, or anthropic
    #[arg(long, default_value = "ollama")]
    provider: String,

    /// Model name (overrides the provider's env var / default)
    #[arg(long)]
    model: Option<String>,

    /// API base URL override
    #[arg(long)]
    base_url: Option<String>,

    /// API key (overrides the provider's env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Rewrite mode: cleanup or simplify
    #[arg(long, default_value = "cleanup")]
    mode: String,

    /// Parallel worker count
    #[arg(long)]
    workers: Option<usize>,

    /// Maximum chunk size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Cumulative fallback count that aborts the job
    #[arg(long)]
    fallback_threshold: Option<u32>,

    /// File containing the system prompt (a built-in prompt is used
    /// otherwise)
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Write skipped-chunk audit records to this JSON file at job end
    #[arg(long)]
    audit_out: Option<PathBuf>,
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=info"));

    if let Ok(dir) = std::env::var("FOLIO_LOG_DIR") {
        let appender = tracing_appender::rolling::daily(dir, "folio.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        None
    }
}

fn provider_config(cli: &Cli) -> Result<ProviderConfig> {
    let Some(kind) = ProviderKind::from_str_loose(&cli.provider) else {
        bail!(
            "unknown provider '{}' (expected ollama, openai, or anthropic)",
            cli.provider
        );
    };

    let mut config = ProviderConfig::from_env(kind);
    if let Some(ref model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(ref url) = cli.base_url {
        config = config.with_base_url(url);
    }
    if let Some(ref key) = cli.api_key {
        config = config.with_api_key(key);
    }
    Ok(config)
}

fn job_config(cli: &Cli) -> Result<JobConfig> {
    let Some(mode) = RewriteMode::from_str_loose(&cli.mode) else {
        bail!("unknown mode '{}' (expected cleanup or simplify)", cli.mode);
    };

    let prompt = match cli.prompt_file {
        Some(ref path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display()))?,
        None => DEFAULT_PROMPT.to_string(),
    };

    let mut config = JobConfig::from_env()
        .with_mode(mode)
        .with_system_prompt(prompt);
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(size) = cli.chunk_size {
        config = config.with_chunk_size(size);
    }
    if let Some(threshold) = cli.fallback_threshold {
        config = config.with_fallback_threshold(threshold);
    }
    Ok(config)
}

fn write_audit(path: &PathBuf, report: &JobReport) -> Result<()> {
    let json = serde_json::to_string_pretty(&report.skipped)
        .context("failed to serialize audit records")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write audit file {}", path.display()))?;
    println!(
        "audit: {} skipped chunk(s) written to {}",
        report.skipped.len(),
        path.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    if !looks_like_chapter_dir(&cli.dir) {
        bail!(
            "{} does not contain any .txt chapter files",
            cli.dir.display()
        );
    }

    let provider = build_provider(&provider_config(&cli)?)
        .context("failed to build provider")?;
    let config = job_config(&cli)?;
    let store = Arc::new(
        TextDirStore::open(&cli.dir)
            .await
            .with_context(|| format!("failed to open {}", cli.dir.display()))?,
    );

    let manager = JobManager::new();
    let mut events = manager.events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event.chapter_index.is_some() {
                println!("[{:>5.1}%] {}", event.percentage, event.message);
            } else {
                println!("[{}] {}", event.phase, event.message);
            }
            if event.phase.is_terminal() {
                break;
            }
        }
    });

    let job_id = manager.start(store, provider, config).await;

    let canceller = manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling…");
            canceller.cancel(job_id).await;
        }
    });

    let report = manager.wait(job_id).await.context("job task failed")?;
    let _ = printer.await;

    if let Some(ref path) = cli.audit_out {
        write_audit(path, &report)?;
    }

    let analytics = &report.analytics;
    info!(
        { logging::JOB_ID } = tracing::field::display(report.job_id),
        { logging::DURATION_MS } = analytics.duration_ms,
        { logging::CHUNK_COUNT } = analytics.chunks_total,
        { logging::FALLBACK_COUNT } = analytics.fallbacks.total(),
        "Run finished"
    );
    println!(
        "{} chapters, {}/{} chunks, {} fallbacks, {:.1}s ({:.0} chars/s)",
        analytics.chapters_processed,
        analytics.chunks_completed,
        analytics.chunks_total,
        analytics.fallbacks.total(),
        analytics.duration_ms as f64 / 1_000.0,
        analytics.chars_per_second
    );

    match report.outcome {
        JobOutcome::Complete => Ok(()),
        JobOutcome::Cancelled => {
            println!("cancelled by user; chapters already cleaned remain on disk");
            std::process::exit(130);
        }
        JobOutcome::Failed(reason) => bail!("job failed: {}", reason),
    }
}
