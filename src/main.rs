use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use vectormind::commands::{
    DocumentSource, add_document, print_hits, rebuild_session, search_session,
    show_session_status,
};
use vectormind::config::{load_config, run_interactive_config, show_config};
use vectormind::limits::RateLimiter;
use vectormind::query::{DEFAULT_TOP_K, QueryRequest};

#[derive(Parser)]
#[command(name = "vectormind")]
#[command(about = "Session-scoped vector indexing and retrieval for RAG")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Read the document from a file
    #[arg(long)]
    file: Option<PathBuf>,
    /// Use the given text as the document
    #[arg(long)]
    text: Option<String>,
}

impl SourceArgs {
    fn into_source(self) -> Option<DocumentSource> {
        self.file
            .map(DocumentSource::File)
            .or_else(|| self.text.map(DocumentSource::Text))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding service and storage backend
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Split a document into chunks and add them to a session
    Add {
        /// Session to add to; the default session when omitted
        #[arg(long)]
        session: Option<String>,
        #[command(flatten)]
        source: SourceArgs,
        /// Create a new session with a generated id
        #[arg(long, conflicts_with = "session")]
        new_session: bool,
    },
    /// Retrieve the chunks most similar to a question
    Search {
        #[arg(long)]
        session: Option<String>,
        /// Number of chunks to return
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Read a JSON query request instead of a question
        #[arg(long, conflicts_with = "question")]
        request: Option<PathBuf>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// The question to search for
        #[arg(required_unless_present = "request")]
        question: Option<String>,
    },
    /// Show chunk and vector counts and consistency of a session
    Status {
        #[arg(long)]
        session: Option<String>,
    },
    /// Re-embed every stored chunk of a session
    Rebuild {
        #[arg(long)]
        session: Option<String>,
    },
}

fn build_request(
    question: Option<String>,
    request: Option<PathBuf>,
    top_k: usize,
) -> Result<QueryRequest> {
    if let Some(path) = request {
        let body = fs::read_to_string(&path)?;
        return Ok(QueryRequest::from_json(&body)?);
    }

    let mut query = QueryRequest::new(question.unwrap_or_default().trim());
    query.top_k = top_k;
    query.validate()?;
    Ok(query)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Add {
            session,
            source,
            new_session,
        } => {
            let source = source
                .into_source()
                .ok_or_else(|| anyhow::anyhow!("Either --file or --text is required"))?;
            add_document(&load_config()?, session, new_session, &source).await?;
        }
        Commands::Search {
            session,
            top_k,
            request,
            json,
            question,
        } => {
            let query = build_request(question, request, top_k)?;
            let config = load_config()?;
            let limiter = RateLimiter::new(config.limits.clone());
            let hits = search_session(&config, &limiter, &query, session.as_deref()).await?;
            print_hits(&hits, json)?;
        }
        Commands::Status { session } => {
            show_session_status(&load_config()?, session.as_deref()).await?;
        }
        Commands::Rebuild { session } => {
            rebuild_session(&load_config()?, session.as_deref()).await?;
        }
    }

    Ok(())
}
