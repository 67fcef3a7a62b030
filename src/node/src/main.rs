//! CretoAI Node - identity management CLI
//!
//! - `init`   create a repository with a fresh identity
//! - `rotate` replace the active identity, archiving the old key
//! - `id`     print the active peer id
//! - `keys`   list keystore entries
//!
//! Logs go to stderr; stdout only carries command output.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cretoai_crypto::keys::Identity;
use cretoai_node::rotate::{RotateOptions, Rotation, DEFAULT_ALGORITHM, DEFAULT_BITS};
use cretoai_node::DEFAULT_LABEL;
use cretoai_repo::fsrepo::{CONFIG_FILE, KEYSTORE_DIR};
use cretoai_repo::{resolve_repo_path, Config, FsKeystore, FsRepo, IdentitySection, Keystore};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CretoAI Node CLI
#[derive(Parser)]
#[command(name = "cretoai-node")]
#[command(about = "CretoAI Node - repository and identity management")]
#[command(version)]
struct Cli {
    /// Repository directory (defaults to ~/.cretoai)
    #[arg(long, env = "CRETOAI_PATH", global = true)]
    repo: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a repository with a freshly generated identity
    Init {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Generate a new identity and archive the current one in the keystore
    Rotate {
        #[command(flatten)]
        key: KeyArgs,

        /// Keystore name prefix for the archived key
        #[arg(long, default_value = DEFAULT_LABEL)]
        label: String,
    },

    /// Print the active peer id
    Id,

    /// List keystore entries
    Keys,
}

#[derive(clap::Args)]
struct KeyArgs {
    /// Key algorithm (ed25519, rsa)
    #[arg(short, long, default_value = DEFAULT_ALGORITHM)]
    algorithm: String,

    /// Key size in bits (rsa only)
    #[arg(short, long, default_value_t = DEFAULT_BITS)]
    bits: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .with_line_number(true)
        .init();

    let repo_path = resolve_repo_path(cli.repo.as_deref())?;

    match cli.command {
        Command::Init { key } => init(&repo_path, &key),
        Command::Rotate { key, label } => rotate(&repo_path, key, label),
        Command::Id => print_id(&repo_path),
        Command::Keys => list_keys(&repo_path),
    }
}

fn init(repo_path: &Path, key: &KeyArgs) -> Result<()> {
    if FsRepo::is_initialized(repo_path) {
        bail!("repository already initialized at {}", repo_path.display());
    }

    let identity = Identity::generate(&key.algorithm, key.bits, &mut io::stderr())
        .context("Failed to generate identity")?;
    let section = IdentitySection::from_identity(&identity).context("Failed to encode identity")?;

    FsRepo::init(repo_path, &Config::new(section))
        .with_context(|| format!("Failed to initialize repository at {}", repo_path.display()))?;

    println!("{}", identity.peer_id);
    Ok(())
}

fn rotate(repo_path: &Path, key: KeyArgs, label: String) -> Result<()> {
    let options = RotateOptions {
        algorithm: key.algorithm,
        bits: key.bits,
        label,
    };
    // Bad parameters would otherwise fail after the old key is archived
    options.validate().context("Invalid key parameters")?;

    let outcome = Rotation::new(options)
        .run(repo_path, &mut io::stderr())
        .map_err(|e| {
            error!(category = e.category(), stage = %e.stage, "rotation failed");
            e
        })?;

    info!("old key archived as {}", outcome.archived_as);
    println!("{}", outcome.new_peer_id);
    Ok(())
}

fn print_id(repo_path: &Path) -> Result<()> {
    // Read-only; works while the node holds the repo lock
    let config = Config::load(repo_path.join(CONFIG_FILE))?;
    let peer_id = config.identity.peer_id().context("Config holds an invalid peer id")?;
    println!("{}", peer_id);
    Ok(())
}

fn list_keys(repo_path: &Path) -> Result<()> {
    if !FsRepo::is_initialized(repo_path) {
        bail!("no repository found at {}", repo_path.display());
    }

    let keystore = FsKeystore::open(repo_path.join(KEYSTORE_DIR)).context("Failed to open keystore")?;
    for name in keystore.list()? {
        println!("{}", name);
    }
    Ok(())
}
