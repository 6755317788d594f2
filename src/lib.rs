//! # dlmux - adaptive track downloader and muxer
//!
//! Downloads the video-only and audio-only tracks of a media resource as
//! independent byte streams, each reassembled from many parallel ranged
//! fetches, then muxes them into a single file with an external merger,
//! falling back to separate track files when merging fails or times out.
//!
//! ## Features
//!
//! - Bounded-concurrency chunked downloading with live progress
//! - Signature descrambling extracted from an obfuscated player script
//! - Best-quality video/audio stream selection
//! - ffmpeg-backed muxing with a deadline and a defined fallback
//!
//! ## Example
//!
//! ```rust,no_run
//! use dlmux::{FfmpegMerger, Manifest, MergePipeline, select_audio, select_video};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manifest = Manifest::parse(&std::fs::read_to_string("player.json")?)?;
//!     let video = select_video(manifest.adaptive_streams())?;
//!     let audio = select_audio(manifest.adaptive_streams())?;
//!
//!     let pipeline = MergePipeline::new(FfmpegMerger::default());
//!     let outcome = pipeline.run(video, audio, None, |_, _| {}).await?;
//!     println!("merged: {}", outcome.is_merged());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod decipher;
pub mod download;
pub mod error;
pub mod merge;
pub mod utils;

// Re-export main types
pub use core::{
    select_audio, select_video, Manifest, MergeOutcome, MergePipeline, ProgressSnapshot,
    StreamDescriptor, Track,
};
pub use decipher::{compile, extract, DecipherRoutine, Extraction};
pub use download::{ChunkPlan, ChunkScheduler};
pub use error::DlmuxError;
pub use merge::{FfmpegMerger, Merger};

/// Result type alias for dlmux operations
pub type Result<T> = std::result::Result<T, DlmuxError>;
