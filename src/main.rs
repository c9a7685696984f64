//! Pensionbot CLI
//!
//! Browse the preloaded client documents and ask questions about one PDF.
//! Answers and listings go to stdout; banners and logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pensionbot_lib::{
    Catalog, CatalogError, ConfigError, ExtractError, Pipeline, PipelineError, PreparedAnswer, ProviderError,
    QuestionRequest, Settings,
};

#[derive(Parser)]
#[command(name = "pensionbot")]
#[command(about = "Pensionbot - Ask questions about client pension documents", long_about = None)]
struct Cli {
    /// Config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog folder with one subfolder per category
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List categories
    Categories,
    /// List documents in a category
    Documents {
        /// Category folder name
        #[arg(required_unless_present = "all")]
        category: Option<String>,
        /// List every PDF in the catalog as category/title
        #[arg(long)]
        all: bool,
    },
    /// Save a copy of a document
    Download {
        category: String,
        document: String,
        /// Target path (default: the document filename)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Ask one question about a document
    Ask {
        category: String,
        document: String,
        question: String,
        /// Print the retrieved passages before the answer
        #[arg(long)]
        show_context: bool,
    },
    /// Ask questions line by line from stdin
    Chat {
        category: String,
        document: String,
        /// Print the retrieved passages before each answer
        #[arg(long)]
        show_context: bool,
    },
}

/// Shown on stderr while a question is processed
const THINKING: &str = "Denken...";

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(catalog) = &cli.catalog {
        settings.catalog_root = catalog.clone();
    }
    settings.validate().context("Invalid configuration")?;
    debug!(?settings, "Settings resolved");
    Ok(settings)
}

// ============ Main ============

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", banner(&e));
            return Ok(ExitCode::FAILURE);
        }
    };

    let result = match cli.command {
        Commands::Categories => handle_categories(&settings),
        Commands::Documents { category, all } => handle_documents(&settings, category.as_deref(), all),
        Commands::Download { category, document, output } => {
            handle_download(&settings, &category, &document, output)
        }
        Commands::Ask { category, document, question, show_context } => {
            handle_ask(&settings, category, document, question, show_context).await
        }
        Commands::Chat { category, document, show_context } => {
            handle_chat(&settings, category, document, show_context).await
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            debug!(error = ?e, "Command failed");
            eprintln!("{}", banner(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Dutch banner for a failed command
fn banner(err: &anyhow::Error) -> String {
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        e.user_message()
    } else if let Some(e) = err.downcast_ref::<CatalogError>() {
        e.user_message()
    } else if let Some(e) = err.downcast_ref::<ExtractError>() {
        e.user_message()
    } else if let Some(e) = err.downcast_ref::<ProviderError>() {
        e.user_message()
    } else if let Some(e) = err.downcast_ref::<ConfigError>() {
        e.user_message()
    } else {
        format!("Er ging iets mis: {:#}", err)
    }
}

// ============ Handlers ============

fn handle_categories(settings: &Settings) -> Result<()> {
    let catalog = Catalog::new(&settings.catalog_root);
    let mut out = std::io::stdout().lock();
    for category in catalog.list_categories()? {
        writeln!(out, "{}", category)?;
    }
    Ok(())
}

fn handle_documents(settings: &Settings, category: Option<&str>, all: bool) -> Result<()> {
    let catalog = Catalog::new(&settings.catalog_root);
    let mut out = std::io::stdout().lock();

    if all {
        for document in catalog.all_documents()? {
            if document.category.is_empty() {
                writeln!(out, "{}", document.title)?;
            } else {
                writeln!(out, "{}/{}", document.category, document.title)?;
            }
        }
        return Ok(());
    }

    let Some(category) = category else {
        anyhow::bail!("Kies een categorie of gebruik --all.");
    };

    let documents = catalog.list_documents(category)?;
    if documents.is_empty() {
        eprintln!("Geen documenten gevonden in {}.", category);
    }
    for document in documents {
        writeln!(out, "{}", document)?;
    }
    Ok(())
}

fn handle_download(
    settings: &Settings,
    category: &str,
    document: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let catalog = Catalog::new(&settings.catalog_root);
    let bytes = catalog.read_document(category, document)?;
    let target = output.unwrap_or_else(|| PathBuf::from(document));

    std::fs::write(&target, &bytes)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    eprintln!("Opgeslagen: {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

async fn handle_ask(
    settings: &Settings,
    category: String,
    document: String,
    question: String,
    show_context: bool,
) -> Result<()> {
    let pipeline = Pipeline::from_settings(settings)?;
    let request = QuestionRequest::new(category, document, question);
    eprintln!("{}", THINKING);
    let prepared = pipeline.answer(&request).await?;
    render_answer(prepared, show_context).await
}

async fn handle_chat(
    settings: &Settings,
    category: String,
    document: String,
    show_context: bool,
) -> Result<()> {
    let pipeline = Pipeline::from_settings(settings)?;
    // Fail early on a bad selection instead of on the first question
    pipeline.catalog().resolve_document(&category, &document)?;

    eprintln!("Stel een vraag over {}/{} (Ctrl-D om te stoppen).", category, document);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        std::io::stderr().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let request = QuestionRequest::new(category.as_str(), document.as_str(), line);
        if !request.question.trim().is_empty() {
            eprintln!("{}", THINKING);
        }
        let outcome = match pipeline.answer(&request).await {
            Ok(prepared) => render_answer(prepared, show_context).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = outcome {
            eprintln!("{}", banner(&e));
        }
    }

    Ok(())
}

/// Print fragments to stdout as they arrive.
async fn render_answer(prepared: PreparedAnswer, show_context: bool) -> Result<()> {
    let PreparedAnswer { request_id, context, mut stream, .. } = prepared;

    if show_context {
        for passage in &context.passages {
            eprintln!("[passage {} | score {:.3}] {}", passage.position + 1, passage.score, passage.content.trim());
        }
        eprintln!();
    }

    let mut out = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(e) => {
                writeln!(out)?;
                return Err(e.into());
            }
        };
        out.write_all(fragment.as_bytes())?;
        out.flush()?;
    }
    writeln!(out)?;

    debug!(request_id = %request_id, "Answer rendered");
    Ok(())
}
