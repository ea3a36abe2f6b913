//! TutorVault CLI
//!
//! Command-line entry point: run the API server, ingest files from disk,
//! query the store, or print collection status.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tutorvault::config::{self, Backend, Config};
use tutorvault::embedding::EmbeddingProvider;
use tutorvault::model::{Difficulty, DocumentType, PartialMetadata};
use tutorvault::server::{self, AppState};
use tutorvault::store::{open_store, QueryFilter, DEFAULT_QUERY_LIMIT};
use tutorvault::{Ingestor, UploadFile, UploadRequest};

#[derive(Parser)]
#[command(name = "tutorvault")]
#[command(about = "Document ingestion and vector retrieval for educational material", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreOpts,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreOpts {
    /// Store backend
    #[arg(long, value_enum, default_value = "local")]
    backend: Backend,
    /// Data directory for the local store
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Base URL of the remote vector service
    #[arg(long, default_value = config::DEFAULT_REMOTE_URL)]
    remote_url: String,
    /// Collection name
    #[arg(long, default_value = config::DEFAULT_COLLECTION)]
    collection: String,
}

impl StoreOpts {
    fn into_config(self) -> Config {
        Config {
            backend: self.backend,
            data_dir: self.data_dir.unwrap_or_else(config::default_data_dir),
            remote_url: self.remote_url,
            collection: self.collection,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:7700")]
        addr: SocketAddr,
    },
    /// Ingest a document (exam papers require a solution file)
    Ingest {
        /// Path to the document file (pdf, md, or txt)
        paper: PathBuf,
        /// Path to the mark scheme, required for exams
        #[arg(long)]
        solution: Option<PathBuf>,
        /// Document type: exam, syllabus, notes, or worksheet
        #[arg(long = "type")]
        doc_type: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        level: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        subtopic: Option<String>,
        /// Difficulty: easy, medium, or hard
        #[arg(long, default_value = "medium")]
        difficulty: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        year: i32,
        /// Paper code, e.g. "P1"
        #[arg(long)]
        paper_code: Option<String>,
        #[arg(long)]
        chapter: Option<String>,
    },
    /// Run a similarity query
    Query {
        /// Query text
        text: String,
        #[arg(long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: usize,
        /// Restrict to one document type
        #[arg(long = "type")]
        doc_type: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        vetted: Option<bool>,
    },
    /// Print collection status
    Status,
}

fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("md") | Some("markdown") => "text/markdown",
        _ => "text/plain",
    }
}

fn read_upload(path: &Path) -> anyhow::Result<UploadFile> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(UploadFile {
        filename,
        mime: mime_for_path(path).to_string(),
        bytes,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tutorvault=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.store.into_config();

    let provider = Arc::new(EmbeddingProvider::new());
    provider.initialize().await?;
    let store = open_store(&config, provider).await?;

    match cli.command {
        Commands::Serve { addr } => {
            server::serve(addr, AppState { store }).await?;
        }
        Commands::Ingest {
            paper,
            solution,
            doc_type,
            title,
            subject,
            level,
            topic,
            subtopic,
            difficulty,
            source,
            year,
            paper_code,
            chapter,
        } => {
            let metadata = PartialMetadata {
                doc_type: DocumentType::from_str(&doc_type)?,
                title,
                subject,
                level,
                topic,
                subtopic,
                difficulty: Difficulty::from_str(&difficulty)?,
                source,
                year,
                paper: paper_code,
                chapter,
            };
            let request = UploadRequest {
                document: read_upload(&paper)?,
                solution: solution.as_deref().map(read_upload).transpose()?,
                metadata,
            };
            let report = Ingestor::new(store).ingest(request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Query {
            text,
            limit,
            doc_type,
            subject,
            level,
            topic,
            difficulty,
            source,
            year,
            vetted,
        } => {
            let filter = QueryFilter {
                doc_type: doc_type.as_deref().map(DocumentType::from_str).transpose()?,
                subject,
                level,
                topic,
                difficulty: difficulty.as_deref().map(Difficulty::from_str).transpose()?,
                source,
                year,
                vetted,
            };
            let hits = store.query(&text, &filter, limit).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::Status => {
            let status = store.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
