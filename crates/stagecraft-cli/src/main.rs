//! stagecraft CLI tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stagecraft")]
#[command(about = "Synthesize staged deployment topologies", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the region configuration (.json or .kdl)
    #[arg(env = "STAGECRAFT_CONFIG", default_value = "stagecraft.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the deployment template
    Synth {
        #[command(flatten)]
        config: ConfigArgs,
        /// Write the template to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Emit compact JSON
        #[arg(long)]
        compact: bool,
        /// Skip region-wide collision validation
        #[arg(long)]
        no_validate: bool,
    },
    /// Validate a configuration and print the template digest
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show the order resources will be created in
    Plan {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// List every resource of the template
    List {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Synth {
            config,
            out,
            compact,
            no_validate,
        } => {
            commands::synth::run(&config.config, out.as_deref(), compact, !no_validate)?;
        }
        Commands::Validate { config } => {
            commands::validate(&config.config)?;
        }
        Commands::Plan { config } => {
            commands::plan::run(&config.config)?;
        }
        Commands::List { config } => {
            commands::list(&config.config)?;
        }
    }

    Ok(())
}
