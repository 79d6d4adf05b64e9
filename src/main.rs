//! DevAC CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "devac")]
#[command(about = "Code-intelligence engine: analyze, resolve, and federate code graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a package into its seed partitions
    Analyze {
        /// Package directory
        #[arg(default_value = ".")]
        package: PathBuf,

        /// Logical repository name
        #[arg(short, long, default_value = "repo")]
        repo: String,

        /// Branch partition to write
        #[arg(short, long, default_value = "base")]
        branch: String,

        /// Re-analyze files even when their content hash is unchanged
        #[arg(short, long)]
        force: bool,

        /// Also analyze test files
        #[arg(long)]
        include_tests: bool,
    },
    /// Rebind unresolved refs and edges using the export index
    Resolve {
        #[arg(default_value = ".")]
        package: PathBuf,

        #[arg(short, long, default_value = "base")]
        branch: String,
    },
    /// Run SQL over seed views ({nodes}, {edges}, {external_refs}, {effects})
    Query {
        /// SQL to execute
        sql: String,

        /// Package directories to query
        #[arg(short, long, default_value = ".")]
        packages: Vec<PathBuf>,

        #[arg(short, long, default_value = "base")]
        branch: String,
    },
    /// Classify a package's effects into domains and containers
    Effects {
        #[arg(default_value = ".")]
        package: PathBuf,

        #[arg(short, long, default_value = "base")]
        branch: String,
    },
    /// Report seed readiness for a set of packages
    Status {
        #[arg(default_value = ".")]
        packages: Vec<PathBuf>,

        #[arg(short, long, default_value = "base")]
        branch: String,
    },
    /// Workspace hub operations
    Hub {
        /// Workspace root holding .devac/central.duckdb
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        #[command(subcommand)]
        command: HubCommands,
    },
    /// Compute the upstream impact of changed entities
    Affected {
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Changed entity ids
        entities: Vec<String>,

        /// Changed file (relative to --repo-path) instead of entity ids
        #[arg(long)]
        file: Option<String>,

        /// Repo root for --file lookups
        #[arg(long)]
        repo_path: Option<PathBuf>,

        #[arg(long, default_value = "10")]
        max_depth: usize,
    },
    /// Delete a package's seed data
    Clean {
        #[arg(default_value = ".")]
        package: PathBuf,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum HubCommands {
    /// Register (or refresh) a repository
    Register { repo_id: String, path: PathBuf },
    /// Unregister a repository and its cross-repo edges
    Unregister { repo_id: String },
    /// List registered repositories
    List,
    /// Stamp a repo's sync state
    Sync { repo_id: String, manifest_hash: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("devac={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze {
            package,
            repo,
            branch,
            force,
            include_tests,
        } => commands::analyze(package, repo, branch, force, include_tests).await,
        Commands::Resolve { package, branch } => commands::resolve(package, branch).await,
        Commands::Query { sql, packages, branch } => commands::query(sql, packages, branch).await,
        Commands::Effects { package, branch } => commands::effects(package, branch).await,
        Commands::Status { packages, branch } => commands::status(packages, branch),
        Commands::Hub { workspace, command } => match command {
            HubCommands::Register { repo_id, path } => {
                commands::hub_register(workspace, repo_id, path)
            }
            HubCommands::Unregister { repo_id } => commands::hub_unregister(workspace, repo_id),
            HubCommands::List => commands::hub_list(workspace),
            HubCommands::Sync { repo_id, manifest_hash } => {
                commands::hub_sync(workspace, repo_id, manifest_hash)
            }
        },
        Commands::Affected {
            workspace,
            entities,
            file,
            repo_path,
            max_depth,
        } => commands::affected(workspace, entities, file, repo_path, max_depth),
        Commands::Clean { package } => commands::clean(package),
        Commands::Version => {
            println!("devac v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
