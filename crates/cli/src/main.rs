mod commands;
mod logging;

use clap::{Parser, Subcommand};
use commands::migrate::{self, Settings};
use logging::{init_logging, LogFormat, LoggingConfig};
use rung_migrate::{MigrationRequest, CONFIG_FILE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rung")]
#[command(about = "Apply, revert and inspect ordered schema migrations")]
#[command(version)]
struct Cli {
    /// Path to the project configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Database URL (overrides the configured environment variable)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Show debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configuration file and migrations directory
    Init,

    /// Create a new migration file
    Create {
        /// Migration name
        name: String,
    },

    /// Apply pending migrations
    Up {
        /// Number of migrations to apply (0 = all)
        #[arg(default_value_t = 0)]
        count: usize,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Revert applied migrations, most recent first
    Down {
        /// Number of migrations to revert (0 = all)
        #[arg(default_value_t = 1)]
        count: usize,

        #[command(flatten)]
        flags: RunFlags,
    },

    /// Show applied, pending and out-of-order migrations
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct RunFlags {
    /// Update the ledger without running the migrations
    #[arg(long)]
    fake: bool,

    /// Apply pending migrations older than the newest applied one
    #[arg(long)]
    allow_out_of_order: bool,
}

impl RunFlags {
    fn request(&self, request: MigrationRequest) -> MigrationRequest {
        request
            .fake(self.fake)
            .allow_out_of_order(self.allow_out_of_order)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .verbose(cli.verbose)
        .format(cli.log_format);
    if let Err(e) = init_logging(&logging) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let settings = Settings::load(&cli.config, cli.database_url)?;

    match cli.command {
        Commands::Init => {
            migrate::init(&settings.root).await?;
        }
        Commands::Create { name } => {
            migrate::create(&settings, &name).await?;
        }
        Commands::Up { count, flags } => {
            migrate::run(&settings, flags.request(MigrationRequest::apply(count))).await?;
        }
        Commands::Down { count, flags } => {
            migrate::run(&settings, flags.request(MigrationRequest::revert(count))).await?;
        }
        Commands::Status { json } => {
            migrate::status(&settings, json).await?;
        }
    }

    Ok(())
}
