//! Output formatting and progress display

use crate::cli::args::VerbosityLevel;
use crate::core::progress::{format_bytes, ProgressSnapshot};
use crate::core::{Manifest, StreamDescriptor, Track};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Output formatter for dlmux
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{}", message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "ok:".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print every stream the manifest lists, muxed first.
    pub fn print_stream_list(&self, manifest: &Manifest) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        println!("{}", manifest.title.bold());
        if !manifest.muxed_streams().is_empty() {
            println!("{}", "muxed streams:".bold());
            for stream in manifest.muxed_streams() {
                println!("  {}", format_stream_row(stream));
            }
        }
        if !manifest.adaptive_streams().is_empty() {
            println!("{}", "adaptive streams:".bold());
            for stream in manifest.adaptive_streams() {
                println!("  {}", format_stream_row(stream));
            }
        }
    }
}

/// One listing row: label, mime type, size, and bitrate for audio rows.
fn format_stream_row(stream: &StreamDescriptor) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(label) = &stream.quality_label {
        parts.push(label.clone());
    } else if let Some(quality) = &stream.quality {
        parts.push(quality.clone());
    }
    parts.push(stream.mime_type.clone());
    parts.push(format_bytes(stream.content_length));
    if stream.is_audio() {
        if let Some(bitrate) = stream.bitrate {
            parts.push(format!("{} kbps", bitrate / 1000));
        }
    }
    parts.join(" | ")
}

/// Two live progress bars, one per track.
pub struct DownloadDisplay {
    multi: MultiProgress,
    video: ProgressBar,
    audio: ProgressBar,
}

impl DownloadDisplay {
    /// Create the display; `hidden` suppresses all drawing.
    pub fn new(video_total: u64, audio_total: u64, hidden: bool) -> Self {
        let multi = MultiProgress::new();
        if hidden {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }

        let style = ProgressStyle::default_bar()
            .template("{prefix:>5} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("#>-");

        let video = multi.add(ProgressBar::new(video_total));
        video.set_style(style.clone());
        video.set_prefix("video");

        let audio = multi.add(ProgressBar::new(audio_total));
        audio.set_style(style);
        audio.set_prefix("audio");

        Self {
            multi,
            video,
            audio,
        }
    }

    /// Update the bar for one track from a progress snapshot.
    pub fn update(&self, track: Track, snapshot: ProgressSnapshot) {
        let bar = match track {
            Track::Video => &self.video,
            Track::Audio => &self.audio,
        };
        bar.set_position(snapshot.loaded);
        bar.set_message(snapshot.speed_string());
    }

    /// Finish both bars and clear the display.
    pub fn finish(&self) {
        self.video.finish_and_clear();
        self.audio.finish_and_clear();
        let _ = self.multi.clear();
    }
}
