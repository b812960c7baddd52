mod commands;
mod context;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "codecontext",
    version,
    about = "Offline per-repository hybrid code search",
    long_about = "CodeContext indexes a source tree with tree-sitter, embeds each code unit\n\
        densely and sparsely (BM25F), and answers natural-language queries by fusing\n\
        both retrieval channels.\n\n\
        Supported languages: Python, Java, Kotlin, JavaScript, TypeScript.\n\n\
        Quick start:\n  \
        codecontext init\n  \
        codecontext index\n  \
        codecontext search \"user authentication\"\n  \
        codecontext status"
)]
struct Cli {
    /// Enable verbose logging (set log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to an extra config file (merged above global/project config)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize CodeContext for a project
    ///
    /// Creates the per-project data directory under ~/.codecontext/data/
    /// and registers the project metadata.
    Init {
        /// Path to the project root (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Index a project's source tree
    ///
    /// Examples:
    ///   codecontext index
    ///   codecontext index --incremental
    ///   codecontext index --force
    Index {
        /// Path to the project root (default: current directory)
        #[arg(short, long)]
        path: Option<String>,

        /// Only re-index files changed since the last recorded commit
        #[arg(long)]
        incremental: bool,

        /// Wipe the collection and re-index everything
        #[arg(long)]
        force: bool,
    },
    /// Search the indexed project
    ///
    /// Examples:
    ///   codecontext search "calculate tax"
    ///   codecontext search "retry policy" --type document
    ///   codecontext search "OrderService" --language java --format json
    Search {
        /// Natural-language or code query
        query: String,

        /// Maximum number of results (1-100)
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Filter by programming language
        #[arg(long)]
        language: Option<String>,

        /// Filter by exact repo-relative file path
        #[arg(long)]
        file: Option<String>,

        /// Filter by result type: code or document
        #[arg(long = "type")]
        type_filter: Option<String>,

        /// Expand fields: signature, snippet, content, complexity,
        /// relationships, impact, all (repeatable)
        #[arg(long)]
        expand: Vec<String>,

        /// Instruction type for the query embedding (default nl2code_query)
        #[arg(long)]
        instruction: Option<String>,

        /// Path to the project root (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Show index status for a project
    Status {
        /// Path to the project root (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },
    /// List all indexed projects
    ListProjects,
    /// Delete a project's index and metadata
    DeleteProject {
        /// Project id (see list-projects)
        project_id: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a commented default global config
    Init,
    /// Print the effective merged configuration
    Show,
    /// Print the global config path
    Path,
    /// Open the global config in $EDITOR
    Edit,
    /// Load the configuration and report problems
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_file = cli.config.as_deref();

    match cli.command {
        Commands::Init { path } => {
            let path = resolve_path(path)?;
            commands::init::run(&path, config_file)?;
        }
        Commands::Index {
            path,
            incremental,
            force,
        } => {
            let path = resolve_path(path)?;
            commands::index::run(&path, incremental, force, config_file)?;
        }
        Commands::Search {
            query,
            limit,
            format,
            language,
            file,
            type_filter,
            expand,
            instruction,
            path,
        } => {
            let path = resolve_path(path)?;
            commands::search::run(commands::search::SearchArgs {
                repo_path: path,
                query,
                limit,
                format,
                language,
                file,
                type_filter,
                expand,
                instruction,
                config_file: config_file.map(str::to_string),
            })?;
        }
        Commands::Status { path } => {
            let path = resolve_path(path)?;
            commands::status::run(&path, config_file)?;
        }
        Commands::ListProjects => {
            commands::projects::list(config_file)?;
        }
        Commands::DeleteProject { project_id } => {
            commands::projects::delete(&project_id, config_file)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config_cmd::init()?,
            ConfigAction::Show => commands::config_cmd::show(config_file)?,
            ConfigAction::Path => commands::config_cmd::path()?,
            ConfigAction::Edit => commands::config_cmd::edit()?,
            ConfigAction::Validate => commands::config_cmd::validate(config_file)?,
        },
        Commands::Version => {
            println!("codecontext {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn resolve_path(path: Option<String>) -> anyhow::Result<std::path::PathBuf> {
    match path {
        Some(p) => Ok(std::path::PathBuf::from(p)),
        None => Ok(std::env::current_dir()?),
    }
}
