//! papershelf CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use papershelf::{
    commands::{
        cmd_add, cmd_enqueue, cmd_init, cmd_paper, cmd_papers, cmd_recover, cmd_search, cmd_serve,
        cmd_stats, cmd_status, cmd_tasks, parse_metadata_arg, print_add_reports, print_enqueue_reports,
        print_init_report, print_paper_outcome, print_papers, print_recovered,
        print_search_results, print_serve_summary, print_stats, print_status, print_tasks,
        InitOptions, PaperAction, PaperFilter, SearchOptions,
    },
    config::Config,
    embed::EmbeddingAdapter,
    error::Result,
    library::Library,
    queue::{QueueStore, TaskStatus},
    store::QdrantStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "papershelf")]
#[command(version, about = "Research-paper library with background PDF embedding", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize papershelf configuration, queue and watched directory
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,

        /// Qdrant URL to write into the new config
        #[arg(long)]
        qdrant_url: Option<String>,
    },

    /// Run the watcher and the ingestion worker until Ctrl-C
    Serve,

    /// Copy PDFs into the watched directory and queue them with upload metadata
    Add {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// JSON object of paper metadata; title defaults to the file name
        #[arg(short, long)]
        metadata: Option<String>,

        /// Folder to file the papers under
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Queue PDFs (or directories of PDFs) for ingestion in place
    Enqueue {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// JSON object stored as metadata on every chunk, e.g. '{"category": "ml"}'
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Show system status
    Status,

    /// List queue tasks
    Tasks {
        /// Only tasks with this status (pending, processing, completed, failed)
        #[arg(short, long)]
        status: Option<TaskStatus>,

        /// Maximum number of tasks
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Return tasks left in processing by a crashed run to the queue
    Recover,

    /// List papers in the library
    Papers {
        /// Only papers with this tag
        #[arg(long)]
        tag: Option<String>,

        /// Only papers in this category
        #[arg(long)]
        category: Option<String>,

        /// Only papers in this folder
        #[arg(long)]
        folder: Option<String>,
    },

    /// Show library statistics
    Stats,

    /// Semantic search over paper chunks
    Search {
        /// The search query
        query: String,

        /// Maximum number of results (defaults to search.default_results)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only chunks of papers in this category
        #[arg(long)]
        category: Option<String>,

        /// Only chunks of papers in this folder
        #[arg(long)]
        folder: Option<String>,
    },

    /// Show or edit one paper
    Paper {
        #[command(subcommand)]
        action: PaperCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PaperCommand {
    /// Show a paper's metadata
    Show { filename: String },

    /// Merge a JSON object into a paper's metadata
    Update {
        filename: String,
        /// JSON object, e.g. '{"title": "Attention Is All You Need", "year": 2017}'
        patch: String,
    },

    /// Move a paper to another folder
    Move { filename: String, folder_id: String },

    /// Print the path of the PDF a paper was ingested from
    File { filename: String },

    /// Delete every chunk of a paper
    Delete {
        filename: String,

        /// Also remove the PDF from the watched directory
        #[arg(long)]
        remove_file: bool,
    },
}

impl PaperCommand {
    fn into_parts(self) -> Result<(String, PaperAction)> {
        Ok(match self {
            PaperCommand::Show { filename } => (filename, PaperAction::Show),
            PaperCommand::Update { filename, patch } => (
                filename,
                PaperAction::Update {
                    patch: parse_metadata_arg(&patch)?,
                },
            ),
            PaperCommand::Move {
                filename,
                folder_id,
            } => (filename, PaperAction::Move { folder_id }),
            PaperCommand::File { filename } => (filename, PaperAction::File),
            PaperCommand::Delete {
                filename,
                remove_file,
            } => (filename, PaperAction::Delete { remove_file }),
        })
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    // Handle commands that don't need an existing config
    if let Commands::Init { force, qdrant_url } = &cli.command {
        let (base_dir, config_path) = init_paths(cli.config.clone());
        let report = cmd_init(InitOptions {
            base_dir,
            config_path,
            force: *force,
            qdrant_url: qdrant_url.clone(),
        })
        .await?;
        return output(cli.json, &report, print_init_report);
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "papershelf", &mut std::io::stdout());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_from(None)?,
    };

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Serve => {
            let counts = cmd_serve(&config).await?;
            output(cli.json, &counts, print_serve_summary)?;
        }

        Commands::Add {
            paths,
            metadata,
            folder,
        } => {
            let queue = QueueStore::connect(&config).await?;
            let reports = cmd_add(
                &queue,
                &config.watch_dir(),
                &paths,
                metadata.as_deref(),
                folder.as_deref(),
            )
            .await?;
            output(cli.json, &reports, |r| print_add_reports(r))?;
        }

        Commands::Enqueue { paths, metadata } => {
            let queue = QueueStore::connect(&config).await?;
            let reports = cmd_enqueue(&queue, &paths, metadata.as_deref()).await?;
            output(cli.json, &reports, |r| print_enqueue_reports(r))?;
        }

        Commands::Status => {
            let queue = QueueStore::connect(&config).await?;
            let store = QdrantStore::connect(&config).await?;
            let status = cmd_status(&config, &queue, &store).await?;
            output(cli.json, &status, print_status)?;
        }

        Commands::Tasks { status, limit } => {
            let queue = QueueStore::connect(&config).await?;
            let tasks = cmd_tasks(&queue, status, limit).await?;
            output(cli.json, &tasks, |t| print_tasks(t))?;
        }

        Commands::Recover => {
            let queue = QueueStore::connect(&config).await?;
            let recovered = cmd_recover(&queue).await?;
            output(cli.json, &recovered, |n| print_recovered(*n))?;
        }

        Commands::Papers {
            tag,
            category,
            folder,
        } => {
            let library = open_library(&config).await?;
            let filter = PaperFilter {
                tag,
                category,
                folder,
            };
            let papers = cmd_papers(&library, &filter).await?;
            output(cli.json, &papers, |p| print_papers(p))?;
        }

        Commands::Stats => {
            let library = open_library(&config).await?;
            let stats = cmd_stats(&library).await?;
            output(cli.json, &stats, print_stats)?;
        }

        Commands::Search {
            query,
            limit,
            category,
            folder,
        } => {
            let library = open_library(&config).await?;
            let options = SearchOptions {
                limit: limit.unwrap_or(config.search.default_results),
                category,
                folder,
            };
            let results = cmd_search(&library, &query, &options).await?;
            output(cli.json, &results, print_search_results)?;
        }

        Commands::Paper { action } => {
            let library = open_library(&config).await?;
            let (filename, action) = action.into_parts()?;
            let outcome = cmd_paper(&library, &filename, action).await?;
            output(cli.json, &outcome, print_paper_outcome)?;
        }
    }

    Ok(())
}

/// Print `value` as pretty JSON or through its console printer
fn output<T, F>(json: bool, value: &T, print: F) -> Result<()>
where
    T: serde::Serialize + ?Sized,
    F: FnOnce(&T),
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

/// Base directory and config path for `init`
///
/// `--config` may name a `.toml` file or a directory to hold `config.toml`.
fn init_paths(config: Option<PathBuf>) -> (PathBuf, PathBuf) {
    match config {
        Some(path) if path.extension().map_or(false, |e| e == "toml") => {
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            (base, path)
        }
        Some(dir) => (dir.clone(), dir.join("config.toml")),
        None => {
            let base = Config::default_base_dir();
            (base.clone(), base.join("config.toml"))
        }
    }
}

async fn open_library(config: &Config) -> Result<Library> {
    let store = QdrantStore::connect(config).await?;
    let embedder = EmbeddingAdapter::from_config(&config.embedding)?;
    Ok(Library::new(
        Arc::new(store),
        Arc::new(embedder),
        config.search.preview_chars,
    )
    .with_files_dir(config.watch_dir()))
}
