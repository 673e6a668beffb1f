//! rag-prep command line
//!
//! Run with: cargo run -p rag-prep -- process ./docs -o data/processed/documents.jsonl

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rag_prep::output::{preview, read_jsonl, write_jsonl};
use rag_prep::types::SUPPORTED_EXTENSIONS;
use rag_prep::{FileOutcome, FileReport, IdScheme, IngestPipeline, PrepConfig, TimestampMode};

#[derive(Parser)]
#[command(name = "rag-prep", version, about = "Convert office documents into JSONL chunks for RAG indexing")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and write every supported file in a directory
    Process(ProcessArgs),
    /// Show the record count and first record of a JSONL file
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ProcessArgs {
    /// Directory containing .pdf, .docx, .pptx, .pptm and .xlsx files
    input_dir: PathBuf,

    /// Output JSONL file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum words per chunk
    #[arg(long)]
    words_per_chunk: Option<usize>,

    /// Words repeated between consecutive chunks
    #[arg(long)]
    overlap: Option<usize>,

    /// Thematic block marker
    #[arg(long, conflicts_with = "no_separator")]
    separator: Option<String>,

    /// Disable the thematic split
    #[arg(long)]
    no_separator: bool,

    /// Descend into subdirectories
    #[arg(long)]
    recursive: bool,

    /// Files processed in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// How chunk ids are derived
    #[arg(long, value_enum)]
    id_scheme: Option<IdScheme>,

    /// How date_processed is stamped
    #[arg(long, value_enum)]
    timestamp: Option<TimestampMode>,
}

impl ProcessArgs {
    /// Layer command-line flags over the loaded configuration
    fn apply(&self, config: &mut PrepConfig) {
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if let Some(words) = self.words_per_chunk {
            config.chunking.words_per_chunk = words;
        }
        if let Some(overlap) = self.overlap {
            config.chunking.overlap = overlap;
        }
        if let Some(separator) = &self.separator {
            config.chunking.thematic_split = true;
            config.chunking.separator = separator.clone();
        }
        if self.no_separator {
            config.chunking.thematic_split = false;
        }
        if self.recursive {
            config.input.recursive = true;
        }
        if let Some(jobs) = self.jobs {
            config.input.jobs = jobs;
        }
        if let Some(scheme) = self.id_scheme {
            config.chunking.id_scheme = scheme;
        }
        if let Some(mode) = self.timestamp {
            config.chunking.timestamp_mode = mode;
        }
    }
}

#[derive(Args)]
struct InspectArgs {
    /// JSONL file produced by `process`
    file: PathBuf,

    /// Characters of the first record to print
    #[arg(long, default_value_t = 500)]
    preview_chars: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Process(args) => process(args),
        Command::Inspect(args) => inspect(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rag_prep={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn process(args: ProcessArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PrepConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PrepConfig::default(),
    };
    args.apply(&mut config);

    let pipeline = IngestPipeline::new(config)?;
    let output = pipeline.config().output.path.clone();

    tracing::info!("Configuration loaded");
    tracing::info!("  - Words per chunk: {}", pipeline.config().chunking.words_per_chunk);
    tracing::info!("  - Overlap: {}", pipeline.config().chunking.overlap);

    let files = pipeline.discover(&args.input_dir)?;
    if files.is_empty() {
        println!(
            "{} No supported files found in {} (looked for .{})",
            style("⚠").yellow(),
            args.input_dir.display(),
            SUPPORTED_EXTENSIONS.join(", .")
        );
        return Ok(());
    }

    let rule = "=".repeat(60);
    println!("\n{}\nProcessing {} files\n{}\n", rule, files.len(), rule);

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let report = pipeline.process_files(&args.input_dir, &files, |file| {
        bar.suspend(|| println!("{}", describe(file)));
        bar.set_message(file.source.clone());
        bar.inc(1);
    });
    bar.finish_and_clear();

    write_jsonl(&output, &report.records)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("\n{}", rule);
    println!("{} Completed", style("✓").green());
    println!("{} Total chunks: {}", style("✓").green(), report.records.len());
    if report.failed_files() > 0 {
        println!("{} Failed files: {}", style("✗").red(), report.failed_files());
    }
    println!("{} Saved to: {}", style("✓").green(), output.display());
    println!("{}\n", rule);

    println!("Summary by file:");
    for (source, count) in report.summary() {
        println!("  • {}: {} chunks", source, count);
    }

    Ok(())
}

fn describe(file: &FileReport) -> String {
    match &file.outcome {
        FileOutcome::Chunked(count) => {
            format!("{} {}: {} chunks", style("✓").green(), file.source, count)
        }
        FileOutcome::Empty => {
            format!("{} {}: no text extracted", style("⚠").yellow(), file.source)
        }
        FileOutcome::Unsupported(ext) => {
            format!("{} {}: unsupported format {}", style("⚠").yellow(), file.source, ext)
        }
        FileOutcome::Failed(reason) => {
            format!("{} {}: {}", style("✗").red(), file.source, reason)
        }
    }
}

fn inspect(args: InspectArgs) -> Result<()> {
    let records = read_jsonl(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    println!("Total records: {}", records.len());
    if let Some(first) = records.first() {
        println!("\nFirst record:");
        println!("{}", preview(first, args.preview_chars)?);
    }

    Ok(())
}
