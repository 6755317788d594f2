//! Error types for dlmux

use thiserror::Error;

/// Main error type for dlmux operations
#[derive(Debug, Error)]
pub enum DlmuxError {
    #[error("decipher extraction failed: {pattern} not found in program text")]
    Extraction {
        /// Which of the textual patterns was missing
        pattern: &'static str,
        /// The unmodified program text, kept for manual inspection
        source_text: String,
    },

    #[error("decipher compilation failed: {0}")]
    Compilation(String),

    #[error("range request returned status {0}")]
    RangeStatus(reqwest::StatusCode),

    #[error("range starting at {start} returned {actual} bytes, expected {expected}")]
    RangeMismatch {
        start: u64,
        expected: u64,
        actual: u64,
    },

    #[error("download aborted: {0}")]
    DownloadAborted(#[source] Box<DlmuxError>),

    #[error("no suitable video stream found")]
    NoVideoStream,

    #[error("no suitable audio stream found")]
    NoAudioStream,

    #[error("merge failed: {0}")]
    Merge(String),

    #[error("downloads are not available for live streams")]
    LiveStream,

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("parse error: {0}")]
    Parse(#[from] std::num::ParseIntError),

    #[error("generic error: {0}")]
    Generic(String),
}

impl DlmuxError {
    /// Check if the error is fatal for the whole request, as opposed to
    /// one the pipeline absorbs into a fallback outcome.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DlmuxError::Merge(_))
    }

    /// Check if the error came out of the decipher subsystem.
    pub fn is_decipher_error(&self) -> bool {
        matches!(
            self,
            DlmuxError::Extraction { .. } | DlmuxError::Compilation(_)
        )
    }
}
