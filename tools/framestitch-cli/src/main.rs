//! framestitch CLI: stitch a directory of frames plus an audio source into one video.
//!
//! Usage:
//!   framestitch stitch -i <DIR> -a <FILE> -o <FILE> --batch-size <N>
//!   framestitch plan -i <DIR> --batch-size <N>    Show the batch layout without encoding
//!   framestitch probe <FILE>                      Show frame/audio stream counts
//!   framestitch check                             Check for ffmpeg and ffprobe

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "framestitch",
    about = "Stitch image sequences into video, in batches",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode frames in batches, concatenate, and mux in audio
    Stitch {
        /// Input directory of images to stitch together
        #[arg(short = 'i', long)]
        image_input: PathBuf,

        /// File providing the audio track (may have no audio stream)
        #[arg(short = 'a', long)]
        audio_input: PathBuf,

        /// Output video path (overwritten if present)
        #[arg(short, long)]
        output: PathBuf,

        /// Frames per batch
        #[arg(long)]
        batch_size: usize,

        /// Frame rate [default: from config, 24]
        #[arg(long)]
        framerate: Option<u32>,

        /// Extension used for staged frames [default: from config, jpg]
        #[arg(long)]
        image_suffix: Option<String>,

        /// h264 constant rate factor, 0-51, lower is higher quality [default: from config, 23]
        #[arg(long)]
        crf: Option<u8>,

        /// Batches encoded concurrently [default: from config, 1]
        #[arg(long)]
        workers: Option<usize>,

        /// Directory to create the staging root in [default: system temp dir]
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show how a directory would be split into batches
    Plan {
        /// Input directory of images
        #[arg(short = 'i', long)]
        image_input: PathBuf,

        /// Frames per batch
        #[arg(long)]
        batch_size: usize,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show stream structure of a media file
    Probe {
        /// Path to the media file
        path: PathBuf,
    },

    /// Check external tool availability
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = framestitch_common::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    framestitch_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Stitch {
            image_input,
            audio_input,
            output,
            batch_size,
            framerate,
            image_suffix,
            crf,
            workers,
            staging_dir,
            report,
        } => {
            commands::stitch::run(
                commands::stitch::StitchOptions {
                    image_input,
                    audio_input,
                    output,
                    batch_size,
                    framerate,
                    image_suffix,
                    crf,
                    workers,
                    staging_dir,
                    report,
                },
                &config,
            )
            .await
        }
        Commands::Plan {
            image_input,
            batch_size,
            json,
        } => commands::plan::run(image_input, batch_size, json),
        Commands::Probe { path } => commands::probe::run(path),
        Commands::Check => commands::check::run(),
    }
}
