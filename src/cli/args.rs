//! Command line argument parsing

use crate::download::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// dlmux - download the best video and audio tracks and mux them into one file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the manifest JSON describing the available streams
    pub manifest: PathBuf,

    /// Player script containing the descrambling routine (path or URL)
    #[arg(short, long, value_name = "PATH_OR_URL")]
    pub player: Option<String>,

    /// Output directory for downloaded files
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Chunk size in bytes for ranged fetches
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Maximum in-flight range fetches per track
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Seconds to wait for the merge before falling back to separate files
    #[arg(long, value_name = "SECONDS", default_value_t = 25)]
    pub merge_timeout: u64,

    /// Path to the ffmpeg binary used for muxing
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// List available streams and exit
    #[arg(short, long)]
    pub list: bool,

    /// Disable progress output
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    Quiet,
    Normal,
    Verbose,
}

impl Args {
    /// Get the merge deadline as a Duration
    pub fn merge_deadline(&self) -> Duration {
        Duration::from_secs(self.merge_timeout)
    }

    /// Resolve the effective verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Whether progress bars should be drawn
    pub fn show_progress(&self) -> bool {
        !self.no_progress && self.verbosity_level() != VerbosityLevel::Quiet
    }
}
