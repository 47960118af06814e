//! plcnet CLI: generate PLC block networks and drive an engineering session.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use commands::SessionOptions;
use manifest::PlcnetManifest;

#[derive(Parser)]
#[command(name = "plcnet", version, about = "Declarative PLC network generation")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new plcnet project
    Init {
        /// Project directory name
        name: String,
    },
    /// Load and validate a project configuration
    Check {
        /// Project file (default: [project] config from plcnet.toml)
        config: Option<PathBuf>,
    },
    /// Print the interchange document of one block
    Encode {
        /// Project file (default: [project] config from plcnet.toml)
        config: Option<PathBuf>,
        /// Program block to encode
        #[arg(long)]
        block: String,
        /// Device holding the block (required with several devices)
        #[arg(long)]
        device: Option<String>,
    },
    /// Generate and import every program block
    Build {
        /// Project file (default: [project] config from plcnet.toml)
        config: Option<PathBuf>,
        /// Session root directory (overrides plcnet.toml)
        #[arg(long)]
        session: Option<PathBuf>,
        /// Per-call timeout in seconds (overrides plcnet.toml)
        #[arg(long)]
        timeout: Option<u64>,
        /// Skip blocks recorded in the checkpoint of a previous run
        #[arg(long)]
        resume: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&name),

        Commands::Check { config } => {
            let (manifest, project_dir) = load_manifest(&cwd)?;
            commands::check::run(&config_path(config, &manifest, &project_dir))
        }

        Commands::Encode { config, block, device } => {
            let (manifest, project_dir) = load_manifest(&cwd)?;
            let config = config_path(config, &manifest, &project_dir);
            commands::encode::run(&project_dir, &manifest, &config, &block, device.as_deref())
        }

        Commands::Build {
            config,
            session,
            timeout,
            resume,
        } => {
            let (manifest, project_dir) = load_manifest(&cwd)?;
            let config = config_path(config, &manifest, &project_dir);
            let options = SessionOptions {
                root: session.as_deref(),
                timeout_secs: timeout,
            };
            commands::build::run(&project_dir, &manifest, &config, &options, resume)
        }
    }
}

/// The nearest `plcnet.toml` and its directory, or defaults rooted at `cwd`.
fn load_manifest(cwd: &Path) -> anyhow::Result<(PlcnetManifest, PathBuf)> {
    match PlcnetManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((manifest, dir)),
        None => Ok((PlcnetManifest::default(), cwd.to_path_buf())),
    }
}

fn config_path(explicit: Option<PathBuf>, manifest: &PlcnetManifest, project_dir: &Path) -> PathBuf {
    explicit.unwrap_or_else(|| manifest.config_path(project_dir))
}
