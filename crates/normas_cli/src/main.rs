//! Normas CLI - command-line interface for the SAIJ mirror.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use normas::source::{Jurisdiccion, Provincia, TipoNorma};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "normas")]
#[command(version)]
#[command(about = "Incremental mirror of the SAIJ legal norms corpus")]
#[command(
    long_about = "Normas keeps a local, file-based mirror of Argentine legal norms published \
on SAIJ (www.saij.gob.ar). Each norm is stored as its canonical JSON payload plus a rendered \
Markdown page, and re-runs only download what changed."
)]
#[command(after_long_help = r#"EXAMPLES
    Mirror every national law into ./normas:
        $ normas sync --tipo ley --jurisdiccion nacional --dir normas

    Mirror provincial decrees for Santa Fe:
        $ normas sync --tipo decreto --provincia "santa fe" --dir normas

    Narrow a sync with an extra facet filter:
        $ normas sync --tipo ley --filtro "Estado de Vigencia=Vigente, de alcance general"

    Resume an interrupted sync without re-discovering:
        $ normas sync --tipo ley --resume

    Fetch a single norm by id or natural key:
        $ normas fetch 123456789-0abc-defg-g56-78000scanyel --dir normas

CONFIGURATION
    Normas reads configuration from:
      1. ~/.config/normas/config.toml (or $XDG_CONFIG_HOME/normas/config.toml)
      2. ./normas.toml in the current directory
      3. Environment variables (NORMAS_* prefix, e.g., NORMAS_SYNC_DIRECTORY)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    NORMAS_SAIJ_BASE_URL      Service origin (default: https://www.saij.gob.ar)
    NORMAS_SYNC_DIRECTORY     Target directory for mirrored documents
    NORMAS_SYNC_CONCURRENCY   Worker count (default: one per core)
    NORMAS_SYNC_PAGE_SIZE     Search page size (default: 100)
    NORMAS_SYNC_MAX_ATTEMPTS  Attempts per document before it is poisoned (default: 5)
    CI                        When set, discovery checkpoints are disabled
"#)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a slice of the corpus into the local mirror
    Sync(SyncArgs),
    /// Fetch a single document by id
    Fetch {
        /// Document id: the SAIJ UUID or a natural key (e.g. LNS0005978)
        id: String,

        /// Target directory (default from config or ./normas)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

/// Options for the sync command.
#[derive(Debug, Clone, clap::Args)]
struct SyncArgs {
    /// Norm kind: ley, decreto, resolucion, disposicion, decision, acordada
    #[arg(short = 't', long)]
    tipo: Option<TipoNorma>,

    /// Jurisdiction: nacional, internacional, provincial, federal
    #[arg(short = 'j', long)]
    jurisdiccion: Option<Jurisdiccion>,

    /// Province, for provincial-jurisdiction norms
    #[arg(short = 'p', long)]
    provincia: Option<Provincia>,

    /// Additional facet filter (repeatable)
    #[arg(short = 'f', long = "filtro", value_name = "NAME=VALUE", value_parser = parse_filter)]
    filtros: Vec<(String, String)>,

    /// Target directory (default from config or ./normas)
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Write the run report to this Markdown file
    #[arg(long, value_name = "FILE")]
    changelog: Option<PathBuf>,

    /// Append to the changelog instead of overwriting it
    #[arg(long, requires = "changelog")]
    appendlog: bool,

    /// Skip this many documents from the start
    #[arg(long)]
    skip: Option<u64>,

    /// Process at most this many documents
    #[arg(long)]
    top: Option<usize>,

    /// Rewrite documents even when the stored copy is current
    #[arg(long)]
    force: bool,

    /// Resume from the checkpoint saved by a previous run
    #[arg(long)]
    resume: bool,

    /// Process documents one at a time
    #[arg(long)]
    serial: bool,
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    shutdown::setup_shutdown_handler();

    let cli = Cli::parse();

    // Initialize tracing for non-TTY mode (structured logging), or when
    // verbose output was asked for explicitly
    if cli.verbose || !Term::stdout().is_term() {
        let default_filter = if cli.verbose {
            "normas=debug,normas_cli=debug"
        } else {
            "normas=info,normas_cli=info"
        };
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new(default_filter),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();

    match cli.command {
        Commands::Sync(args) => commands::sync::handle_sync(args, &config).await?,
        Commands::Fetch { id, dir } => commands::fetch::handle_fetch(&id, dir, &config).await?,
    }

    Ok(())
}
