//! Command line interface for dlmux

pub mod args;
pub mod output;

pub use args::{Args, VerbosityLevel};
pub use output::{DownloadDisplay, OutputFormatter};
