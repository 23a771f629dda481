use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use docent_core::config::{Config, resolve_config_path};
use docent_core::{CoreError, Docent, Failure, RetrievalRequest, Selection};
use docent_gateway::GatewayServer;
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "docent",
    version,
    about = "Ask questions about your documents using per-document vector indexes"
)]
struct Cli {
    /// Configuration file (falls back to DOCENT_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse, chunk, embed and index one or more files
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show the best matching passages for a query
    Search {
        query: String,
        /// Document id or file name to search; repeat for several (default: all)
        #[arg(long = "doc")]
        docs: Vec<String>,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Answer a question from the selected documents
    Ask {
        question: String,
        #[arg(long = "doc")]
        docs: Vec<String>,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List ingested documents
    Files,
    /// Delete documents by file name, or all of them
    Delete {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        names: Vec<String>,
        #[arg(long)]
        all: bool,
    },
    /// Re-index a document from its retained upload
    Rebuild { document_id: Uuid },
    /// Serve /ingest, /ask, /respond and /files over HTTP until interrupted
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_subscriber();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(core) = e.downcast_ref::<CoreError>() {
                let failure = Failure::from(core);
                match serde_json::to_string(&failure) {
                    Ok(json) => eprintln!("{json}"),
                    Err(_) => eprintln!("{}: {}", failure.kind, failure.message),
                }
            } else {
                eprintln!("error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref());
    tracing::debug!(path = %config_path.display(), "loading config");
    let config = Config::load(&config_path)?;
    let docent = Docent::from_config(config)?;

    match cli.command {
        Command::Ingest { paths } => {
            let mut results = Vec::with_capacity(paths.len());
            for path in &paths {
                results.push(docent.ingest(path).await?);
            }
            print_json(&results)
        }
        Command::Search { query, docs, top_k } => {
            let request = build_request(&docent, query, &docs, top_k)?;
            print_json(&docent.retrieve(request).await?)
        }
        Command::Ask {
            question,
            docs,
            top_k,
        } => {
            let request = build_request(&docent, question, &docs, top_k)?;
            print_json(&docent.answer(request).await?)
        }
        Command::Files => print_json(&docent.list_documents()),
        Command::Delete { names, all } => {
            let selection = if all {
                Selection::All
            } else {
                Selection::Names(names)
            };
            let deleted = docent.delete_documents(&selection).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))
        }
        Command::Rebuild { document_id } => {
            print_json(&docent.rebuild_document(document_id).await?)
        }
        Command::Serve { bind, port } => serve(docent, &bind, port).await,
    }
}

async fn serve(docent: Docent, bind: &str, port: u16) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(bind, port, Arc::new(docent), shutdown_rx)
        .serve()
        .await?;
    Ok(())
}

fn build_request<E, C>(
    docent: &Docent<E, C>,
    query: String,
    docs: &[String],
    top_k: Option<usize>,
) -> anyhow::Result<RetrievalRequest>
where
    E: docent_llm::EmbeddingProvider,
    C: docent_llm::ChatProvider,
{
    let document_ids = resolve_documents(docent, docs)?;
    let mut request = RetrievalRequest::new(query, document_ids);
    request.top_k = top_k;
    Ok(request)
}

/// Map `--doc` values to ids. A value that parses as a UUID is passed through
/// unchecked; anything else must match a registered file name.
fn resolve_documents<E, C>(docent: &Docent<E, C>, docs: &[String]) -> anyhow::Result<Vec<Uuid>>
where
    E: docent_llm::EmbeddingProvider,
    C: docent_llm::ChatProvider,
{
    if docs.is_empty() {
        let ids = docent.all_document_ids();
        if ids.is_empty() {
            bail!("no documents ingested yet; run `docent ingest <file>` first");
        }
        return Ok(ids);
    }

    let mut ids = Vec::new();
    for doc in docs {
        if let Ok(id) = Uuid::parse_str(doc) {
            ids.push(id);
            continue;
        }
        let matches = docent.store().registry().find_by_name(doc);
        if matches.is_empty() {
            bail!("no document named {doc}");
        }
        ids.extend(matches.into_iter().map(|e| e.id));
    }
    Ok(ids)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{json}");
    Ok(())
}
