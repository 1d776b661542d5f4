//! Reelweave CLI: select clips, weave timelines, render, and export.
//!
//! Usage:
//!   reelweave select <CHANNEL> <TOPIC>   Pick unused clips from a topic
//!   reelweave compile <CHANNEL> <CLIPS>  Weave clips into a render spec
//!   reelweave render <SPEC>              Render a spec with ffmpeg
//!   reelweave xmeml <SPEC>               Export a spec as an XMEML sequence
//!   reelweave validate <CHANNEL>         Check a channel's configuration
//!   reelweave history <CHANNEL>          List past renders of a channel
//!   reelweave check                      Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelweave_common::config::AppConfig;
use reelweave_common::error::RenderError;

mod commands;

#[derive(Parser)]
#[command(
    name = "reelweave",
    about = "Weave short clips into branded channel videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/reelweave/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Weave clips into a render spec for a channel
    Compile {
        /// Channel name
        channel: String,

        /// Source clips, in playback order
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        /// Directory for the rendered video (defaults to the configured output dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Where to write the render spec (defaults to the output path with .json)
        #[arg(long)]
        spec_out: Option<PathBuf>,

        /// Drop the source clips' own audio
        #[arg(long)]
        mute_sources: bool,
    },

    /// Render a spec to video
    Render {
        /// Path to the render spec JSON
        spec: PathBuf,

        /// Print the ffmpeg commands instead of running them
        #[arg(long)]
        dry_run: bool,

        /// Record the render in this channel's history and used-clip ledger
        #[arg(long)]
        channel: Option<String>,
    },

    /// Export a spec as an XMEML (Final Cut Pro 7) sequence
    Xmeml {
        /// Path to the render spec JSON
        spec: PathBuf,

        /// Output file (defaults to the render spec's output path with .xml)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sequence name
        #[arg(long)]
        name: Option<String>,
    },

    /// Validate a channel's configuration and assets
    Validate {
        /// Channel name
        channel: String,
    },

    /// Check system capabilities
    Check,

    /// Randomly select unused clips from a topic
    Select {
        /// Channel name
        channel: String,

        /// Topic directory under the clip library
        topic: String,

        /// Total duration to reach (seconds)
        #[arg(long, default_value = "600")]
        target_secs: f64,

        /// Seed for a reproducible selection
        #[arg(long)]
        seed: Option<u64>,

        /// Print only the selected paths, one per line
        #[arg(long)]
        paths_only: bool,
    },

    /// List past renders of a channel
    History {
        /// Channel name
        channel: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    reelweave_common::logging::init_logging(&logging);

    let result = match cli.command {
        Commands::Compile {
            channel,
            clips,
            out_dir,
            spec_out,
            mute_sources,
        } => commands::compile::run(&config, channel, clips, out_dir, spec_out, !mute_sources),
        Commands::Render {
            spec,
            dry_run,
            channel,
        } => commands::render::run(&config, spec, dry_run, channel).await,
        Commands::Xmeml { spec, output, name } => commands::xmeml::run(&config, spec, output, name),
        Commands::Validate { channel } => commands::validate::run(&config, channel),
        Commands::Check => commands::check::run(&config),
        Commands::Select {
            channel,
            topic,
            target_secs,
            seed,
            paths_only,
        } => commands::select::run(&config, channel, topic, target_secs, seed, paths_only),
        Commands::History { channel } => commands::history::run(&config, channel),
    };

    // A failed encoder run exits with the encoder's own status.
    if let Err(err) = &result {
        if let Some(code) = err.downcast_ref::<RenderError>().and_then(RenderError::exit_code) {
            eprintln!("Error: {err}");
            std::process::exit(code);
        }
    }
    result
}
