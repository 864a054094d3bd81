//! keyguard-sim - replay lock-screen scripts
//!
//! Usage:
//!   keyguard-sim run scripts/pin_unlock.toml
//!   keyguard-sim run scripts/launch_occlusion.toml --json
//!   keyguard-sim default-config --format toml

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use keyguard_core::KeyguardConfig;
use keyguard_sim::{Script, Simulation};

#[derive(Parser)]
#[command(name = "keyguard-sim")]
#[command(about = "Replay scripted lock-screen events and report collaborator calls")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script
    Run {
        /// Script file (TOML)
        script: PathBuf,

        /// Timing and scrim configuration (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Produce frames at wall-clock pace
        #[arg(long)]
        realtime: bool,
    },

    /// Print the default configuration
    DefaultConfig {
        #[arg(short, long, value_enum, default_value_t = Format::Toml)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Toml,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "keyguard_sim=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            config,
            json,
            realtime,
        } => {
            info!("keyguard-sim v{}", env!("CARGO_PKG_VERSION"));

            let config = match config {
                Some(path) => KeyguardConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => KeyguardConfig::default(),
            };
            let script = Script::load(&script)
                .with_context(|| format!("Failed to load script {}", script.display()))?;

            let sim = Simulation::new(&config, &script.setup);
            let report = if realtime {
                sim.run_realtime(&script).await
            } else {
                sim.run(&script)
            };

            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report);
            }
        }

        Commands::DefaultConfig { format } => {
            let config = KeyguardConfig::default();
            match format {
                Format::Toml => print!("{}", config.to_toml()?),
                Format::Json => println!("{}", serde_json::to_string_pretty(&config)?),
            }
        }
    }

    Ok(())
}
