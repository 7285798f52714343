//! # Grantmuse CLI (`gmuse`)
//!
//! The `gmuse` binary drives the grant-assistant backend: database setup,
//! document intake and processing, question answering, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! gmuse --config ./config/grantmuse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gmuse init` | Create the SQLite database and run schema migrations |
//! | `gmuse add <file>` | Store a file and create its document record |
//! | `gmuse process <id>` | Extract text and metadata for a stored document |
//! | `gmuse list` | List documents with category and chunk counts |
//! | `gmuse get <id>` | Print a document's metadata and extracted text |
//! | `gmuse tag <id> <tag>` | Add a tag to a document |
//! | `gmuse delete <id>` | Delete a document and its stored file |
//! | `gmuse ask "<question>"` | Answer a question grounded in the documents |
//! | `gmuse history` | Show recent chat interactions |
//! | `gmuse serve` | Start the HTTP API server |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use grantmuse::chat::{answer_chat, ChatRequest};
use grantmuse::config::{self, Config};
use grantmuse::generation::HttpGenerationClient;
use grantmuse::models::UserProfile;
use grantmuse::process::{self, process_document};
use grantmuse::storage::BlobStore;
use grantmuse::{db, migrate, server, store};

/// Grantmuse — a document-grounded grant assistant backend for Canadian
/// musicians.
#[derive(Parser)]
#[command(
    name = "gmuse",
    about = "Grantmuse — document-grounded grant assistant backend",
    version,
    long_about = "Grantmuse stores grant documents, extracts searchable text and metadata, \
    and answers questions by excerpting the most relevant documents and forwarding them to \
    an external text-generation API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/grantmuse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents and interactions
    /// tables. Idempotent — running it multiple times is safe.
    Init,

    /// Store a file and create its document record.
    ///
    /// Copies the file into the blob store and inserts an unprocessed
    /// document row. Run `gmuse process <id>` afterwards to extract text.
    Add {
        /// Path to the file to store.
        file: PathBuf,

        /// Override the detected file type (e.g. `text/plain`,
        /// `application/pdf`).
        #[arg(long)]
        file_type: Option<String>,
    },

    /// Extract text and metadata for a stored document.
    ///
    /// Decodes the stored bytes as text, derives category, tags, word or
    /// page counts, and the chunk count, and writes everything back to the
    /// document record. Reprocessing overwrites the previous result.
    Process {
        /// Document id.
        id: String,
    },

    /// List documents with category and chunk counts.
    List,

    /// Print a document's metadata and extracted text.
    Get {
        /// Document id.
        id: String,
    },

    /// Add a tag to a document.
    Tag {
        /// Document id.
        id: String,
        /// Tag to add (stored lowercased).
        tag: String,
    },

    /// Delete a document and its stored file.
    Delete {
        /// Document id.
        id: String,
    },

    /// Answer a question grounded in the stored documents.
    ///
    /// Requires the generation API key (see `[generation]` in the config)
    /// in the environment.
    Ask {
        /// The question to answer.
        message: String,

        /// Career stage for the profile clause (e.g. `emerging`).
        #[arg(long)]
        career_stage: Option<String>,

        /// Musical genre for the profile clause.
        #[arg(long)]
        genre: Option<String>,

        /// Project type for the profile clause (e.g. `debut album`).
        #[arg(long)]
        project_type: Option<String>,

        /// Project budget for the profile clause.
        #[arg(long)]
        project_budget: Option<String>,
    },

    /// Show recent chat interactions.
    History {
        /// Maximum number of interactions to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// chat and document endpoints.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add { file, file_type } => {
            run_add(&cfg, &file, file_type).await?;
        }
        Commands::Process { id } => {
            run_process(&cfg, &id).await?;
        }
        Commands::List => {
            run_list(&cfg).await?;
        }
        Commands::Get { id } => {
            run_get(&cfg, &id).await?;
        }
        Commands::Tag { id, tag } => {
            run_tag(&cfg, &id, &tag).await?;
        }
        Commands::Delete { id } => {
            run_delete(&cfg, &id).await?;
        }
        Commands::Ask {
            message,
            career_stage,
            genre,
            project_type,
            project_budget,
        } => {
            run_ask(
                &cfg,
                &message,
                career_stage,
                genre,
                project_type,
                project_budget,
            )
            .await?;
        }
        Commands::History { limit } => {
            run_history(&cfg, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// Map a file extension to the stored file type when `--file-type` is not
/// given. Unknown extensions fall back to `text/plain`; the processor
/// rejects genuinely unsupported types at processing time.
fn detect_file_type(path: &std::path::Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("pdf") => process::MIME_PDF.to_string(),
        Some("doc") => process::MIME_DOC.to_string(),
        Some("docx") => process::MIME_DOCX.to_string(),
        Some("md") => "text/markdown".to_string(),
        Some("csv") => "text/csv".to_string(),
        _ => "text/plain".to_string(),
    }
}

async fn run_add(cfg: &Config, file: &std::path::Path, file_type: Option<String>) -> Result<()> {
    let bytes = std::fs::read(file)?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let file_type = file_type.unwrap_or_else(|| detect_file_type(file));

    let blobs = BlobStore::new(&cfg.storage.root);
    let key = blobs.put(&file_name, &bytes)?;

    let pool = db::connect(cfg).await?;
    let id = store::insert_document(&pool, &file_name, &file_type, &key).await?;
    pool.close().await;

    println!("added {}", file_name);
    println!("  id:   {}", id);
    println!("  type: {}", file_type);
    println!("  size: {} bytes", bytes.len());
    Ok(())
}

async fn run_process(cfg: &Config, id: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let blobs = BlobStore::new(&cfg.storage.root);

    let metadata = process_document(&pool, &blobs, cfg.chunking.max_chars, id).await?;
    pool.close().await;

    println!("processed {}", id);
    println!(
        "  category: {}",
        metadata.category.as_deref().unwrap_or("(none)")
    );
    println!("  tags:     {}", metadata.tags.join(", "));
    if let Some(words) = metadata.word_count {
        println!("  words:    {}", words);
    }
    if let Some(pages) = metadata.page_count {
        println!("  pages:    {}", pages);
    }
    println!("  chunks:   {}", metadata.chunk_count.unwrap_or(0));
    println!("ok");
    Ok(())
}

async fn run_list(cfg: &Config) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let docs = store::list_documents(&pool).await?;
    pool.close().await;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for doc in docs {
        let status = if doc.content.is_some() {
            doc.metadata
                .category
                .clone()
                .unwrap_or_else(|| "processed".to_string())
        } else {
            "unprocessed".to_string()
        };
        println!("{}  {}  [{}]", doc.id, doc.file_name, status);
    }
    Ok(())
}

async fn run_get(cfg: &Config, id: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let doc = store::get_document(&pool, id).await?;
    pool.close().await;

    let doc = match doc {
        Some(d) => d,
        None => {
            eprintln!("Error: document not found: {}", id);
            std::process::exit(1);
        }
    };

    println!("--- Document ---");
    println!("id:        {}", doc.id);
    println!("file_name: {}", doc.file_name);
    println!("file_type: {}", doc.file_type);
    println!("metadata:  {}", serde_json::to_string(&doc.metadata)?);
    println!();

    match doc.content {
        Some(content) => {
            println!("--- Content ---");
            println!("{}", content);
        }
        None => println!("(not processed yet)"),
    }
    Ok(())
}

async fn run_tag(cfg: &Config, id: &str, tag: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let found = store::add_tag(&pool, id, tag).await?;
    pool.close().await;

    if !found {
        eprintln!("Error: document not found: {}", id);
        std::process::exit(1);
    }
    println!("tagged {} with \"{}\"", id, tag.trim().to_lowercase());
    Ok(())
}

async fn run_delete(cfg: &Config, id: &str) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let doc = store::get_document(&pool, id).await?;

    let doc = match doc {
        Some(d) => d,
        None => {
            pool.close().await;
            eprintln!("Error: document not found: {}", id);
            std::process::exit(1);
        }
    };

    let blobs = BlobStore::new(&cfg.storage.root);
    blobs.delete(&doc.file_path)?;
    store::delete_document(&pool, id).await?;
    pool.close().await;

    println!("deleted {}", id);
    Ok(())
}

async fn run_ask(
    cfg: &Config,
    message: &str,
    career_stage: Option<String>,
    genre: Option<String>,
    project_type: Option<String>,
    project_budget: Option<String>,
) -> Result<()> {
    let profile = if career_stage.is_some()
        || genre.is_some()
        || project_type.is_some()
        || project_budget.is_some()
    {
        Some(UserProfile {
            career_stage: career_stage.unwrap_or_default(),
            genre: genre.unwrap_or_default(),
            project_type: project_type.unwrap_or_default(),
            project_budget: project_budget.unwrap_or_default(),
            streaming_numbers: None,
            previous_grants: None,
        })
    } else {
        None
    };

    let pool = db::connect(cfg).await?;
    let backend = Arc::new(HttpGenerationClient::new(cfg.generation.clone()));
    let request = ChatRequest {
        message: message.to_string(),
        user_profile: profile,
    };

    let response = answer_chat(&pool, &cfg.retrieval, backend.as_ref(), request).await?;
    pool.close().await;

    println!("{}", response.response);

    if let Some(sources) = response.sources {
        println!();
        println!("Sources:");
        for source in sources {
            println!("  - {} ({})", source.name, source.id);
            println!("    \"{}\"", source.snippet.replace('\n', " "));
        }
    }
    Ok(())
}

async fn run_history(cfg: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let interactions = store::list_interactions(&pool, limit).await?;
    pool.close().await;

    if interactions.is_empty() {
        println!("No interactions.");
        return Ok(());
    }

    for interaction in interactions {
        let date = chrono::DateTime::from_timestamp(interaction.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("[{}] {}", date, interaction.user_message);
        println!("    {}", interaction.assistant_response.replace('\n', " "));
        if let Some(sources) = &interaction.sources {
            let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
            println!("    sources: {}", names.join(", "));
        }
        println!();
    }
    Ok(())
}
