use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use telegate_auth::{compute_token, recover_salt, Authenticator};
use telegate_runtime::callables::ChannelListExtractor;
use telegate_runtime::config::Config;
use telegate_runtime::engine::chromium::{find_chromium, ChromiumEngine};
use telegate_runtime::pattern::UrlPattern;
use telegate_runtime::session::Orchestrator;
use telegate_runtime::store::JsonStore;

#[derive(Parser)]
#[command(
    name = "telegate",
    about = "Telegate — STB login automation and EPG capture",
    version,
    after_help = "Run 'telegate <command> --help' for details on each command."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a login session and capture channel/EPG data
    Run {
        /// Session config file (YAML)
        #[arg(long, short)]
        config: PathBuf,
        /// Override the configured output path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Run the browser with a visible window
        #[arg(long)]
        headed: bool,
    },
    /// Validate a session config without launching a browser
    Check {
        /// Session config file (YAML)
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Report browser discovery and environment status
    Doctor,
    /// Brute-force the numeric salt behind a captured auth_info blob
    RecoverSalt {
        /// Session config file (YAML)
        #[arg(long, short)]
        config: PathBuf,
        /// Session token the blob was produced for
        #[arg(long)]
        token: String,
        /// Captured auth_info hex blob
        #[arg(long)]
        ciphertext: String,
        /// Salt digit count to search
        #[arg(long, default_value = "8")]
        max_digits: u32,
        /// Try unpadded salts instead of zero-padded ones
        #[arg(long)]
        no_pad: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            config,
            output,
            headed,
        } => run(config, output, headed).await,
        Commands::Check { config } => check(config),
        Commands::Doctor => doctor(),
        Commands::RecoverSalt {
            config,
            token,
            ciphertext,
            max_digits,
            no_pad,
        } => recover(config, token, ciphertext, max_digits, !no_pad),
    }
}

async fn run(config_path: PathBuf, output: Option<PathBuf>, headed: bool) -> Result<()> {
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if headed {
        config.browser.headless = false;
    }
    let output_path = output.unwrap_or_else(|| config.output.path.clone());

    let engine = Arc::new(ChromiumEngine::new()?);
    let mut orchestrator = Orchestrator::new(engine, config);
    let outcome = orchestrator.run(&ChannelListExtractor).await?;

    let mut store = JsonStore::open(&output_path)?;
    store.merge(&outcome.data);
    store.save()?;

    info!(
        end_url = %outcome.end_url,
        channels = orchestrator.context().channel_count(),
        output = %output_path.display(),
        "session complete"
    );
    Ok(())
}

fn check(config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let credential = config.credential.to_credential()?;
    let token = compute_token(&credential, config.auth.method, config.auth.salt.as_deref())?;
    let start_url = config.start_url(&token)?;
    UrlPattern::new(&config.browser.end_url)?;
    // Exercise the envelope path the login page will hit at runtime.
    Authenticator::new(
        credential.with_token("probe")?,
        config.auth.method,
        config.auth.salt.clone(),
    )?
    .auth_info()?;

    println!("config ok: start URL resolves to {start_url}");
    Ok(())
}

fn doctor() -> Result<()> {
    match find_chromium() {
        Some(path) => println!("browser: {}", path.display()),
        None => println!("browser: not found (set TELEGATE_BROWSER or install Chromium)"),
    }
    Ok(())
}

fn recover(
    config_path: PathBuf,
    token: String,
    ciphertext: String,
    max_digits: u32,
    zero_pad: bool,
) -> Result<()> {
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let credential = config.credential.to_credential()?.with_token(&token)?;

    info!(max_digits, zero_pad, "searching salt space");
    let matches = recover_salt(&credential, &ciphertext, max_digits, zero_pad)?;
    if matches.is_empty() {
        println!("no salt matched");
    } else {
        for salt in matches {
            if zero_pad {
                println!("salt: {salt:0width$}", width = max_digits as usize);
            } else {
                println!("salt: {salt}");
            }
        }
    }
    Ok(())
}
