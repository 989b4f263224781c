use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recsched::config::Config;
use recsched::error::categorize;

mod commands;

use commands::{DeviceCommand, EntryArgs};

#[derive(Parser)]
#[command(
    name = "recsched",
    version,
    about = "Unattended recording scheduler for network encoders",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./recsched.toml, then RECSCHED_* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted
    Run,

    /// Schedule a recording
    Add {
        /// Device name
        #[arg(short, long)]
        device: String,

        /// Start time (09:30, 0930, 930)
        #[arg(short, long)]
        start: String,

        /// Duration (1.5, 1:30, 90m)
        #[arg(short = 'l', long)]
        duration: String,

        /// Program label
        #[arg(short, long)]
        name: String,

        /// Date (YYYY-MM-DD or MM.DD.YYYY); today if omitted
        #[arg(long)]
        date: Option<String>,
    },

    /// Change a scheduled recording
    Edit {
        /// Entry id, id prefix or label
        entry: String,

        #[command(flatten)]
        changes: EntryArgs,
    },

    /// Delete a recording that has not started
    Remove {
        /// Entry id, id prefix or label
        entry: String,
    },

    /// Show the schedule
    List {
        /// Only entries of this device
        #[arg(short, long)]
        device: Option<String>,

        /// Include ended and stopped entries
        #[arg(short, long)]
        all: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check a window for conflicts without scheduling it
    Check {
        #[arg(short, long)]
        device: String,

        #[arg(short, long)]
        start: String,

        #[arg(short = 'l', long)]
        duration: String,

        #[arg(long)]
        date: Option<String>,

        /// Entry to ignore, as when editing it
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Query device status
    Status {
        /// Device name; all devices if omitted
        device: Option<String>,
    },

    /// Start recording on a device now
    Start {
        device: String,

        /// Label of the synthesized entry
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Stop the recording running on a device
    Stop { device: String },

    /// Capture a preview image from a device
    Snapshot { device: String },

    /// Manage configured devices
    Devices {
        #[command(subcommand)]
        command: DeviceCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Initialize tracing/logging
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&format, &config.logging.level, cli.verbose)?;

    tracing::debug!(
        schedule = %config.paths.schedule_file.display(),
        devices = %config.paths.device_file.display(),
        "recsched starting"
    );

    let result = dispatch(cli.command, &config).await;
    if let Err(err) = &result {
        tracing::error!(category = %categorize(err), error = %format!("{err:#}"), "Command failed");
    }
    result
}

async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run => commands::run(config).await?,
        Commands::Add {
            device,
            start,
            duration,
            name,
            date,
        } => commands::add(config, device, &start, &duration, name, date.as_deref()).await?,
        Commands::Edit { entry, changes } => commands::edit(config, &entry, changes).await?,
        Commands::Remove { entry } => commands::remove(config, &entry).await?,
        Commands::List { device, all, json } => {
            commands::list(config, device.as_deref(), all, json).await?
        }
        Commands::Check {
            device,
            start,
            duration,
            date,
            exclude,
        } => {
            commands::check(
                config,
                &device,
                &start,
                &duration,
                date.as_deref(),
                exclude.as_deref(),
            )
            .await?
        }
        Commands::Status { device } => commands::status(config, device.as_deref()).await?,
        Commands::Start { device, name } => {
            commands::start(config, &device, name.as_deref()).await?
        }
        Commands::Stop { device } => commands::stop(config, &device).await?,
        Commands::Snapshot { device } => commands::snapshot(config, &device).await?,
        Commands::Devices { command } => commands::devices(config, command).await?,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("recsched=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new(format!("recsched={level},warn"))
        }
    });

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .init();
        }
    }

    Ok(())
}
