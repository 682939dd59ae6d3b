use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::{ConstraintsArgs, QuantizeArgs, ReplayArgs, ValidateArgs};

#[derive(Parser)]
#[command(name = "quantgate")]
#[command(about = "Exchange quantization, order validation and position replay", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: PathBuf,

    /// Instruments-info JSON dump to use instead of running offline
    #[arg(long, global = true, env = "QUANTGATE_METADATA")]
    metadata: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved constraints for one or more symbols
    Constraints(ConstraintsArgs),
    /// Snap a price and quantity onto a symbol's grid
    Quantize(QuantizeArgs),
    /// Quantize and check an order against a symbol's limits
    Validate(ValidateArgs),
    /// Replay a JSON-lines file of fills and ticks through the position ledger
    Replay(ReplayArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = quantgate_core::ConfigLoader::load_from(&cli.config)?;
    let ctx = commands::Context::new(config, cli.metadata.as_deref())?;

    match cli.command {
        Commands::Constraints(args) => commands::run_constraints(&ctx, args).await?,
        Commands::Quantize(args) => commands::run_quantize(&ctx, args).await?,
        Commands::Validate(args) => commands::run_validate(&ctx, args).await?,
        Commands::Replay(args) => commands::run_replay(&ctx, args).await?,
    }

    Ok(())
}
