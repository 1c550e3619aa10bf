mod classify;
mod commands;
mod duration;
mod models;
mod paginate;
mod paths;
mod quota;
mod report;
mod status;
mod store;
#[cfg(test)]
mod testing;
mod youtube;
mod youtube_api;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ytlog", version, about = "Log YouTube channel and video stats to local tables")]
struct Cli {
    /// Show debug logs on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a channel's newest uploads to the record table
    Record {
        /// Channel URL, ID, @handle, or name
        channel: String,
        /// How many recent uploads to look at (at most 50)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Log a single video to the record table
    Video {
        /// YouTube URL, short link, or video ID
        input: String,
    },

    /// Take a channel snapshot and log it to the status table
    Status {
        /// Channel URL, ID, @handle, or name
        channel: String,
        /// Also print the labeled and numeric reports
        #[arg(long)]
        text: bool,
        /// Write the numeric report to this file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Preview only; do not append to the status table
        #[arg(long)]
        no_append: bool,
    },

    /// Run status (and optionally record) for every routine channel
    Routine {
        /// Also log recent uploads of each channel
        #[arg(long)]
        record: bool,
    },

    /// Print a table as tab-separated values
    #[command(alias = "show")]
    Table {
        /// Table name, e.g. "record" or "status"
        name: String,
        /// Only the last N rows (the header is always printed)
        #[arg(long, value_name = "N")]
        tail: Option<usize>,
    },

    /// Show the estimated API quota spent since the last reset
    Quota {
        /// Reset the counter to zero
        #[arg(long)]
        reset: bool,
    },

    /// Verify the API key and that tables can be written
    Check,

    /// Set a config value
    Config { key: String, value: String },

    /// Show data paths and settings
    Info,
}

fn init_tracing(verbose: u8) {
    let fallback = if verbose > 0 { "ytlog=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Record { channel, limit } => commands::record(&channel, limit),
        Commands::Video { input } => commands::video(&input),
        Commands::Status {
            channel,
            text,
            out,
            no_append,
        } => commands::status(&channel, text, out.as_deref(), no_append),
        Commands::Routine { record } => commands::routine(record),
        Commands::Table { name, tail } => commands::table(&name, tail),
        Commands::Quota { reset } => commands::quota(reset),
        Commands::Check => commands::check(),
        Commands::Config { key, value } => commands::config(&key, &value),
        Commands::Info => commands::info(),
    }
}
