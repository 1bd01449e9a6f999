use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hevc-batch")]
#[command(version)]
#[command(about = "Batch HEVC transcoder with hardware encoder detection", long_about = None)]
pub struct Cli {
    /// Directory to scan for video files (overrides config)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Directory to write encoded files to (overrides config)
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// CRF / constant-quality value, 0-51
    #[arg(short, long)]
    pub quality: Option<u32>,

    /// x265 preset name (ultrafast .. placebo)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Encoder backend: auto, nvenc, qsv, amf or x265
    #[arg(short, long)]
    pub encoder: Option<String>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Write every output directly into OUTPUT instead of mirroring subdirectories
    #[arg(long)]
    pub flatten: bool,

    /// Keep the source container instead of writing .mkv
    #[arg(long)]
    pub keep_extension: bool,

    /// Encode even when an up-to-date output already exists
    #[arg(long)]
    pub reencode_existing: bool,

    /// Skip sources that are already HEVC
    #[arg(long)]
    pub skip_hevc: bool,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Probe hardware encoders and show which backend would be used
    Detect,

    /// Probe a video file for its duration and video codec
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Show ffmpeg commands without executing, applying the same skip rules as a run
    DryRun,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
