//! DEX Browser Agent CLI
//!
//! Command-line interface for running a trading agent against its browser.

use clap::{Parser, Subcommand};
use dex_browser_agent::browser::ReadinessProbe;
use dex_browser_agent::{
    AgentRunner, Config, ProfileRegistry, Result, RuntimeEnv, TickerBook, DEFAULT_AGENT_ID,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dex-agent")]
#[command(about = "LLM-driven DEX trading agent operating a browser wallet")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one trading round for an agent
    Run {
        /// Agent ID
        #[arg(default_value = DEFAULT_AGENT_ID)]
        agent: String,

        /// Start the agent's browser before connecting
        #[arg(long)]
        launch: bool,

        /// Stop after the decision, don't swap
        #[arg(long)]
        dry_run: bool,
    },

    /// Wait until an agent's browser answers on its debugging port
    Probe {
        /// Agent ID
        #[arg(default_value = DEFAULT_AGENT_ID)]
        agent: String,
    },

    /// List agent profiles
    Profiles,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(cli.log_json.then(|| fmt::layer().json()))
        .with((!cli.log_json).then(|| fmt::layer()))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let tickers = TickerBook::listed();
    let profiles = registry(&config, &tickers)?;

    match cli.command {
        Commands::Run {
            agent,
            launch,
            dry_run,
        } => {
            let env = run_env(&profiles, &agent, |name| std::env::var(name).ok())?;
            let outcome = AgentRunner::new(config, profiles, tickers, env)
                .with_launch(launch)
                .with_dry_run(dry_run)
                .run(&agent)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Probe { agent } => {
            let profile = profiles.get(&agent)?;
            let probe = ReadinessProbe::for_port(&config, profile.port)?;
            probe.wait_until_ready().await?;
            println!("{} is ready at {}", profile.id, probe.url());
        }
        Commands::Profiles => {
            for profile in profiles.iter() {
                println!(
                    "{:<8} port {:<5} {:<16} invested {}",
                    profile.id, profile.port, profile.profile, profile.invested
                );
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Profiles from the config file, or the built-in ones
fn registry(config: &Config, tickers: &TickerBook) -> Result<ProfileRegistry> {
    match &config.profiles {
        Some(profiles) => ProfileRegistry::new(profiles.clone()),
        None => Ok(ProfileRegistry::builtin(tickers)),
    }
}

/// Environment for a run; an unknown agent is reported before missing variables
fn run_env<F>(profiles: &ProfileRegistry, agent: &str, lookup: F) -> Result<RuntimeEnv>
where
    F: Fn(&str) -> Option<String>,
{
    profiles.get(agent)?;
    RuntimeEnv::from_lookup(lookup)
}
