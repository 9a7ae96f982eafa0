use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::embeddings::{build_client, split_text};
use crate::limits::{RateLimiter, caller_key};
use crate::query::QueryRequest;
use crate::session::{AddOutcome, SearchHit, SessionIndexManager};
use crate::storage::build_backend;

/// Caller identity for rate limiting when no session is named
const LOCAL_CALLER: &str = "local";

/// Where the text of an `add` invocation comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Text(String),
}

impl DocumentSource {
    #[inline]
    pub fn read(&self) -> Result<String> {
        match self {
            Self::File(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read document: {}", path.display())),
            Self::Text(text) => Ok(text.clone()),
        }
    }
}

/// Wire the configured storage backend and embedding client into a manager
#[inline]
pub fn build_manager(config: &Config) -> Result<SessionIndexManager> {
    config.validate().context("Invalid configuration")?;
    let backend = build_backend(&config.resolved_storage())?;
    let embedder = build_client(&config.embedding)?;
    Ok(SessionIndexManager::new(
        backend,
        embedder,
        config.index.verify_writes,
    ))
}

/// Session the command should operate on; `--new-session` mints a fresh id
#[inline]
pub fn target_session(session: Option<String>, new_session: bool) -> Option<String> {
    if new_session {
        if let Some(requested) = session {
            warn!("Ignoring --session {} because --new-session was given", requested);
        }
        return Some(Uuid::new_v4().to_string());
    }
    session
}

/// Split a document into chunks and add them to a session
#[inline]
pub async fn add_document(
    config: &Config,
    session: Option<String>,
    new_session: bool,
    source: &DocumentSource,
) -> Result<AddOutcome> {
    let text = source.read()?;
    let pieces = split_text(&text, &config.chunking);
    let session = target_session(session, new_session);
    let manager = build_manager(config)?;

    info!(
        "Adding {} chunks to session {}",
        pieces.len(),
        session.as_deref().unwrap_or("default")
    );

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_length(pieces.len() as u64);
    bar.set_message(session.clone().unwrap_or_else(|| "default".to_string()));

    let batch_size = (config.embedding.batch_size as usize).max(1);
    let mut outcome = manager.add_chunks(session.as_deref(), &[]).await?;
    let mut added = 0;
    for batch in pieces.chunks(batch_size) {
        let step = manager.add_chunks(session.as_deref(), batch).await?;
        added += step.new_chunks;
        bar.inc(batch.len() as u64);
        outcome = AddOutcome {
            new_chunks: added,
            rebuilt: outcome.rebuilt || step.rebuilt,
            ..step
        };
    }
    bar.finish_and_clear();

    if let Some(id) = session.as_deref().filter(|_| new_session) {
        eprintln!("Session: {}", style(id).cyan());
    }
    if outcome.rebuilt {
        eprintln!(
            "{}",
            style("⚠ Session was stale and has been rebuilt from its stored text").yellow()
        );
    }
    eprintln!(
        "{} Added {} chunks ({} total, index {:.2} MB, generation {})",
        style("✓").green(),
        outcome.new_chunks,
        outcome.total_chunks,
        outcome.index_size_mb(),
        outcome.generation
    );

    Ok(outcome)
}

/// Rate-limit, embed and run a validated query against a session.
///
/// The limiter is owned by the caller so that its windows span every search
/// the caller makes.
#[inline]
pub async fn search_session(
    config: &Config,
    limiter: &RateLimiter,
    request: &QueryRequest,
    header_session: Option<&str>,
) -> Result<Vec<SearchHit>> {
    request.validate()?;
    let session = request.effective_session(header_session);

    limiter
        .check_now("search", caller_key(session, LOCAL_CALLER))
        .with_context(|| format!("Search refused for {}", session.unwrap_or(LOCAL_CALLER)))?;

    let manager = build_manager(config)?;
    let hits = manager
        .search_text(session, &request.question, request.top_k, None)
        .await?;
    Ok(hits)
}

/// Print search hits for a terminal, or as JSON
#[inline]
pub fn print_hits(hits: &[SearchHit], json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(hits).context("Failed to encode results")?
        );
        return Ok(());
    }

    if hits.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{} {} {}",
            style(format!("#{}", rank + 1)).bold(),
            style(format!("[chunk {}]", hit.position)).dim(),
            style(format!("score {:.4}", hit.score)).cyan()
        );
        println!("{}", hit.text);
        println!();
    }
    Ok(())
}

/// Show a session's counts and consistency
#[inline]
pub async fn show_session_status(config: &Config, session: Option<&str>) -> Result<()> {
    let manager = build_manager(config)?;
    let status = manager.status(session).await?;

    println!("{}", style("📊 Session Status").bold().cyan());
    println!("   Location: {}", status.location);
    println!("   State: {}", status.state);
    println!("   Chunks: {}", status.chunk_count);
    println!("   Vectors: {}", status.vector_count);
    println!("   Generation: {}", status.generation);
    if status.dimension > 0 {
        println!("   Dimension: {}", status.dimension);
    }

    match status.issue {
        None => println!("   {}", style("✅ Consistent").green()),
        Some(issue) => {
            println!("   {} {}", style("⚠️  Stale:").yellow(), issue);
            println!("   Run 'vectormind rebuild' or add more text to repair it.");
        }
    }
    Ok(())
}

/// Re-embed all stored chunks of a session
#[inline]
pub async fn rebuild_session(config: &Config, session: Option<&str>) -> Result<AddOutcome> {
    let manager = build_manager(config)?;
    let outcome = manager.rebuild(session).await?;
    eprintln!(
        "{} Rebuilt {} chunks (index {:.2} MB, generation {})",
        style("✓").green(),
        outcome.total_chunks,
        outcome.index_size_mb(),
        outcome.generation
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, EmbeddingProvider};
    use crate::limits::RateLimitError;
    use crate::storage::BackendKind;
    use tempfile::TempDir;

    fn offline_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.embedding = EmbeddingConfig::for_provider(EmbeddingProvider::Token);
        config.embedding.embedding_dimension = 256;
        config.embedding.batch_size = 2;
        config.storage.backend = BackendKind::Local;
        config.storage.local_root = temp_dir.path().join("data");
        config
    }

    #[test]
    fn new_session_mints_an_id() {
        let id = target_session(Some("given".to_string()), true).expect("session id");
        assert_ne!(id, "given");
        assert!(Uuid::parse_str(&id).is_ok());

        assert_eq!(
            target_session(Some("given".to_string()), false),
            Some("given".to_string())
        );
        assert_eq!(target_session(None, false), None);
    }

    #[test]
    fn document_source_reads_file() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("doc.txt");
        fs::write(&path, "hello").expect("write");

        assert_eq!(DocumentSource::File(path).read().expect("read"), "hello");
        assert!(
            DocumentSource::File(temp_dir.path().join("missing.txt"))
                .read()
                .is_err()
        );
    }

    #[tokio::test]
    async fn add_then_search() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut config = offline_config(&temp_dir);
        config.chunking.chunk_size = 40;
        config.chunking.chunk_overlap = 0;

        let text = "Paris is the capital of France.\n\n\
                    Tokyo is the capital of Japan.\n\n\
                    Berlin is the capital of Germany.";
        let outcome = add_document(
            &config,
            Some("cli".to_string()),
            false,
            &DocumentSource::Text(text.to_string()),
        )
        .await
        .expect("add");
        assert_eq!(outcome.total_chunks, 3);
        assert_eq!(outcome.new_chunks, 3);

        let mut request = QueryRequest::new("capital of France");
        request.top_k = 1;
        let limiter = RateLimiter::new(config.limits.clone());
        let hits = search_session(&config, &limiter, &request, Some("cli"))
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("Paris"));
    }

    #[tokio::test]
    async fn search_respects_burst_limit() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut config = offline_config(&temp_dir);
        config.limits.burst_limit = 1;
        assert!(config.validate().is_ok());

        add_document(
            &config,
            Some("limited".to_string()),
            false,
            &DocumentSource::Text("Some indexed text.".to_string()),
        )
        .await
        .expect("add");

        let limiter = RateLimiter::new(config.limits.clone());
        let request = QueryRequest::new("indexed text");

        let first = search_session(&config, &limiter, &request, Some("limited")).await;
        assert!(first.is_ok());

        let second = search_session(&config, &limiter, &request, Some("limited")).await;
        let err = second.expect_err("second search within the burst window");
        assert!(matches!(
            err.downcast_ref::<RateLimitError>(),
            Some(RateLimitError::Burst { .. })
        ));

        // Another session has its own window
        let other = search_session(&config, &limiter, &request, Some("elsewhere")).await;
        assert!(matches!(
            other.expect_err("nothing indexed").downcast_ref::<crate::RagError>(),
            Some(crate::RagError::SessionEmpty { .. })
        ));
    }

    #[tokio::test]
    async fn rebuild_of_missing_session_fails() {
        let temp_dir = TempDir::new().expect("temp dir");
        let config = offline_config(&temp_dir);

        assert!(rebuild_session(&config, Some("nothing")).await.is_err());
    }

    #[test]
    fn print_hits_as_json() {
        let hits = vec![SearchHit {
            position: 0,
            text: "chunk".to_string(),
            score: 0.5,
        }];
        assert!(print_hits(&hits, true).is_ok());
        assert!(print_hits(&[], false).is_ok());
    }
}
