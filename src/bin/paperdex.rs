//! CLI binary for paperdex.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use paperdex::{
    run_batch, BatchOptions, BatchProgress, Bibliography, CancelFlag, DocumentProcessor,
    ExtractionConfig, KnowledgeStore, OllamaClient, TextGenerator,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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
  # Extract one paper with AI enhancement
  paperdex extract paper.pdf

  # Extract with bibliography matching and knowledge indexing
  paperdex extract paper.pdf --bib-file refs.bib --update-knowledge

  # Process a whole directory of papers
  paperdex batch papers/*.pdf --concurrency 4 --update-knowledge

  # Search the knowledge index
  paperdex knowledge --search "catalysis"

  # Concepts co-occurring with a term
  paperdex knowledge --related "ammonia"

  # Index statistics and graph export
  paperdex knowledge --stats
  paperdex knowledge --export-graph graph.json

  # Check the inference service and list installed models
  paperdex setup

ENVIRONMENT VARIABLES:
  PAPERDEX_BASE_URL   Inference service address (default http://localhost:11434)
  PAPERDEX_MODEL      Model identifier (default qwen2.5:7b)
  PAPERDEX_OUTPUT     Output directory for extractions
  PAPERDEX_DB         Knowledge database path

SETUP:
  1. Install Ollama and pull a model:  ollama pull qwen2.5:7b
  2. Verify:                           paperdex setup
  3. Extract:                          paperdex extract paper.pdf
"#;

/// Extract, AI-enhance, and index text from scientific PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "paperdex",
    version,
    about = "Extract, AI-enhance, and index text from scientific PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAPERDEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAPERDEX_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Args)]
struct ExtractOpts {
    /// Model identifier (e.g. qwen2.5:7b, llama3.2).
    #[arg(long, env = "PAPERDEX_MODEL")]
    model: Option<String>,

    /// Inference service base address.
    #[arg(long, env = "PAPERDEX_BASE_URL")]
    base_url: Option<String>,

    /// BibTeX file for metadata matching.
    #[arg(long)]
    bib_file: Option<PathBuf>,

    /// Output directory for extraction files.
    #[arg(short, long, env = "PAPERDEX_OUTPUT", default_value = "extractions")]
    output_dir: PathBuf,

    /// Update the knowledge index after extraction.
    #[arg(long)]
    update_knowledge: bool,

    /// Knowledge database path.
    #[arg(long, env = "PAPERDEX_DB", default_value = "knowledge.db")]
    knowledge_db: PathBuf,

    /// Generate a document-level summary (one extra AI call).
    #[arg(long)]
    summary: bool,

    /// Per-AI-call timeout in seconds.
    #[arg(long, env = "PAPERDEX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract and enhance a single PDF.
    Extract {
        /// PDF file to process.
        pdf: PathBuf,

        #[command(flatten)]
        opts: ExtractOpts,

        /// Print the extraction result as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Process many PDFs concurrently.
    Batch {
        /// PDF files to process.
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,

        #[command(flatten)]
        opts: ExtractOpts,

        /// Number of documents processed concurrently.
        #[arg(short, long, default_value_t = 2)]
        concurrency: usize,

        /// Disable the progress bar.
        #[arg(long)]
        no_progress: bool,
    },

    /// Query the knowledge index.
    Knowledge {
        /// Search for keywords.
        #[arg(long)]
        search: Option<String>,

        /// Find concepts related to a term.
        #[arg(long)]
        related: Option<String>,

        /// Show index statistics.
        #[arg(long)]
        stats: bool,

        /// Export the co-occurrence graph to a JSON file.
        #[arg(long)]
        export_graph: Option<PathBuf>,

        /// Maximum results to return.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Knowledge database path.
        #[arg(long, env = "PAPERDEX_DB", default_value = "knowledge.db")]
        knowledge_db: PathBuf,
    },

    /// Check the inference service and list installed models.
    Setup {
        /// Inference service base address.
        #[arg(long, env = "PAPERDEX_BASE_URL")]
        base_url: Option<String>,

        /// Model to verify.
        #[arg(long, env = "PAPERDEX_MODEL")]
        model: Option<String>,
    },
}

// ── Batch progress callback using indicatif ──────────────────────────────────

/// Terminal progress callback: a live bar plus per-document log lines.
/// Documents complete out of order in concurrent mode, so all state is
/// internally synchronised.
struct CliBatchProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliBatchProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgress for CliBatchProgress {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
    }

    fn on_document_start(&self, path: &Path) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_document_complete(&self, path: &Path, pages: usize, keywords: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            path.display(),
            dim(&format!("{pages} pages, {keywords} keywords")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 100 {
            format!("{}…", &error[..99])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), path.display(), red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, completed: usize, failed: usize, skipped: usize) {
        self.bar.finish_and_clear();
        if failed == 0 && skipped == 0 {
            eprintln!(
                "{} {} documents processed",
                green("✔"),
                bold(&completed.to_string())
            );
        } else {
            eprintln!(
                "{} {} processed, {} failed, {} skipped",
                cyan("⚠"),
                bold(&completed.to_string()),
                red(&failed.to_string()),
                skipped,
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Extract { pdf, opts, json } => extract_command(pdf, opts, json, cli.quiet).await,
        Command::Batch {
            pdfs,
            opts,
            concurrency,
            no_progress,
        } => batch_command(pdfs, opts, concurrency, no_progress || cli.quiet).await,
        Command::Knowledge {
            search,
            related,
            stats,
            export_graph,
            limit,
            knowledge_db,
        } => knowledge_command(search, related, stats, export_graph, limit, knowledge_db),
        Command::Setup { base_url, model } => setup_command(base_url, model).await,
    }
}

/// Map shared extract options to an `ExtractionConfig`.
fn build_config(opts: &ExtractOpts, concurrency: Option<usize>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .api_timeout_secs(opts.api_timeout)
        .generate_summary(opts.summary);
    if let Some(ref model) = opts.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref url) = opts.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(n) = concurrency {
        builder = builder.concurrency(n);
    }
    builder.build().context("Invalid configuration")
}

fn load_bibliography(opts: &ExtractOpts) -> Result<Option<Arc<Bibliography>>> {
    match opts.bib_file {
        Some(ref path) => {
            let bib = Bibliography::from_file(path)
                .with_context(|| format!("Failed to load bibliography {}", path.display()))?;
            Ok(Some(Arc::new(bib)))
        }
        None => Ok(None),
    }
}

async fn extract_command(pdf: PathBuf, opts: ExtractOpts, json: bool, quiet: bool) -> Result<()> {
    let config = build_config(&opts, None)?;
    let client = Arc::new(OllamaClient::new(&config)?);

    if !quiet && !client.is_available().await {
        eprintln!(
            "{} model '{}' not reachable at {} — pages will keep raw text",
            cyan("⚠"),
            config.model,
            config.base_url,
        );
    }

    let bibliography = load_bibliography(&opts)?;
    let processor = DocumentProcessor::new(client, config.clone());

    let result = processor
        .process_document(&pdf, bibliography.as_deref())
        .await
        .context("Extraction failed")?;

    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let saved = paperdex::render::save_results(&result, &opts.output_dir, &stem)
        .await
        .context("Failed to write output files")?;

    if opts.update_knowledge {
        let store = KnowledgeStore::open(&opts.knowledge_db)
            .with_context(|| format!("Failed to open {}", opts.knowledge_db.display()))?;
        store
            .ingest(
                &result,
                &pdf.display().to_string(),
                config.context_snippet_chars,
            )
            .context("Knowledge index update failed")?;
        if !quiet {
            eprintln!("{} knowledge index updated", green("✔"));
        }
    }

    if json {
        println!("{}", paperdex::render::to_json(&result)?);
    }

    if !quiet {
        eprintln!(
            "{} {} pages, {} keywords in {:.1}s",
            green("✔"),
            result.pages.len(),
            result.all_keywords.len(),
            result.metadata.processing_time,
        );
        eprintln!("   {}", dim(&saved.extraction.display().to_string()));
        eprintln!("   {}", dim(&saved.markdown.display().to_string()));
        eprintln!("   {}", dim(&saved.keywords.display().to_string()));
    }
    Ok(())
}

async fn batch_command(
    pdfs: Vec<PathBuf>,
    opts: ExtractOpts,
    concurrency: usize,
    no_progress: bool,
) -> Result<()> {
    let config = build_config(&opts, Some(concurrency))?;
    let client = Arc::new(OllamaClient::new(&config)?);
    let bibliography = load_bibliography(&opts)?;

    let store = if opts.update_knowledge {
        Some(Arc::new(KnowledgeStore::open(&opts.knowledge_db).with_context(
            || format!("Failed to open {}", opts.knowledge_db.display()),
        )?))
    } else {
        None
    };

    let processor = Arc::new(DocumentProcessor::new(client, config.clone()));
    let options = BatchOptions {
        output_dir: opts.output_dir.clone(),
        concurrency: config.concurrency,
    };

    // Ctrl-C stops new documents; in-flight ones finish and persist.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} cancelling — letting in-flight documents finish", cyan("⚠"));
                cancel.cancel();
            }
        });
    }

    let progress: Option<Arc<dyn BatchProgress>> = if no_progress {
        None
    } else {
        Some(CliBatchProgress::new() as Arc<dyn BatchProgress>)
    };

    let summary = run_batch(
        processor,
        pdfs,
        bibliography,
        store,
        options,
        cancel,
        progress,
    )
    .await;

    for (path, reason) in &summary.failed {
        eprintln!("{} {}: {}", red("✗"), path.display(), reason);
    }
    if summary.completed.is_empty() && !summary.failed.is_empty() {
        anyhow::bail!("all documents failed");
    }
    Ok(())
}

fn knowledge_command(
    search: Option<String>,
    related: Option<String>,
    stats: bool,
    export_graph: Option<PathBuf>,
    limit: usize,
    knowledge_db: PathBuf,
) -> Result<()> {
    let store = KnowledgeStore::open(&knowledge_db)
        .with_context(|| format!("Failed to open {}", knowledge_db.display()))?;

    if let Some(query) = search {
        let hits = store.search(&query, limit)?;
        if hits.is_empty() {
            println!("No results for '{query}'");
            return Ok(());
        }
        println!("{}", bold(&format!("Results for '{query}':")));
        for hit in hits {
            let authors = match hit.authors.len() {
                0 => "unknown authors".to_string(),
                1..=2 => hit.authors.join(", "),
                _ => format!("{} et al.", hit.authors[0]),
            };
            println!();
            println!(
                "  {} {}",
                bold(&hit.title),
                dim(&hit.cite_key.map(|k| format!("[{k}]")).unwrap_or_default())
            );
            println!("    {}  {}", authors, dim(&hit.file_path));
            println!(
                "    {} (page {}, relevance {:.3})",
                cyan(&hit.keyword),
                hit.page_number,
                hit.relevance
            );
            if !hit.context.is_empty() {
                println!("    {}", dim(&hit.context));
            }
        }
    } else if let Some(term) = related {
        let related = store.related(&term, limit)?;
        if related.is_empty() {
            println!("No concepts related to '{term}'");
            return Ok(());
        }
        println!("{}", bold(&format!("Concepts related to '{term}':")));
        for (keyword, count) in related {
            println!("  {} — {} shared document(s)", cyan(&keyword), count);
        }
    } else if let Some(output) = export_graph {
        store.export_graph(&output, 2)?;
        println!("{} graph exported to {}", green("✔"), output.display());
    } else if stats {
        let stats = store.stats()?;
        println!("{}", bold("Knowledge index:"));
        println!("  documents:            {}", stats.document_count);
        println!("  unique keywords:      {}", stats.unique_keywords);
        println!("  keyword associations: {}", stats.keyword_associations);
        if !stats.top_keywords.is_empty() {
            println!("  top keywords:");
            for (keyword, frequency) in &stats.top_keywords {
                println!("    {keyword}: {frequency}");
            }
        }
    } else {
        println!("Use --search, --related, --stats, or --export-graph (see --help)");
    }
    Ok(())
}

/// Models worth recommending for this workload, with sizes users can plan
/// around.
const RECOMMENDED_MODELS: &[(&str, &str, &str)] = &[
    ("qwen2.5:7b", "4.7GB", "Default — reliable JSON output, good cleanup"),
    ("qwen2.5:32b-instruct-q4_K_M", "19GB", "High-quality structured extraction"),
    ("llama3.2", "2.0GB", "Fast, light on memory"),
    ("mistral", "4.1GB", "Fast general-purpose alternative"),
];

async fn setup_command(base_url: Option<String>, model: Option<String>) -> Result<()> {
    let mut builder = ExtractionConfig::builder();
    if let Some(url) = base_url {
        builder = builder.base_url(url);
    }
    if let Some(model) = model {
        builder = builder.model(model);
    }
    let config = builder.build().context("Invalid configuration")?;
    let client = OllamaClient::new(&config)?;

    println!("Service: {}", config.base_url);
    match client.list_models().await {
        Ok(models) => {
            println!("{} service is running", green("✔"));
            if models.is_empty() {
                println!("  no models installed — run: ollama pull {}", config.model);
            } else {
                println!("  installed models:");
                for name in &models {
                    let marker = if name.contains(&config.model) || name.starts_with(&config.model)
                    {
                        green("●")
                    } else {
                        dim("○")
                    };
                    println!("    {marker} {name}");
                }
            }
            if client.is_available().await {
                println!(
                    "{} model '{}' is ready",
                    green("✔"),
                    bold(&config.model)
                );
            } else {
                println!(
                    "{} model '{}' not installed — run: ollama pull {}",
                    red("✗"),
                    config.model,
                    config.model
                );
            }
        }
        Err(e) => {
            println!("{} service unreachable: {e}", red("✗"));
            println!("  start it with: ollama serve");
        }
    }

    println!();
    println!("{}", bold("Recommended models:"));
    println!("  {:<30} {:<8} {}", "MODEL", "SIZE", "NOTES");
    for (name, size, notes) in RECOMMENDED_MODELS {
        println!("  {name:<30} {size:<8} {notes}");
    }
    Ok(())
}
