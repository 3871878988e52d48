use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use macrolens::core::correlation::Strength;
use macrolens::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for macrolens::AppCommand {
    fn from(cmd: Commands) -> macrolens::AppCommand {
        match cmd {
            Commands::Snapshot => macrolens::AppCommand::Snapshot,
            Commands::Correlate { min_strength } => {
                macrolens::AppCommand::Correlate { min_strength }
            }
            Commands::Health { watch } => macrolens::AppCommand::Health { watch },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display the current value of every tracked indicator
    Snapshot,
    /// Compute pairwise correlations across tracked indicators
    Correlate {
        /// Keep only pairs at least this strong (very-weak..very-strong)
        #[arg(long)]
        min_strength: Option<Strength>,
    },
    /// Probe data providers and display the status board
    Health {
        /// Keep probing on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => macrolens::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = macrolens::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
providers:
  fred:
    base_url: "https://api.stlouisfed.org"
    # api_key: "..."   # or set the FRED_API_KEY environment variable
  quotes:
    base_url: "https://query1.finance.yahoo.com"

probe_interval_minutes: 30
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
