//! Core functionality for dlmux

pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod select;

pub use manifest::{Manifest, StreamDescriptor};
pub use pipeline::{MergeOutcome, MergePipeline, Track, DEFAULT_MERGE_DEADLINE};
pub use progress::{format_bytes, ProgressSnapshot};
pub use select::{select_audio, select_video};
