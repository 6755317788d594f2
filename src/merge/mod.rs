//! External muxing collaborator
//!
//! The merger is a black box: two container-wrapped single-track buffers
//! in, one muxed buffer out, or an error. The pipeline treats any failure
//! as non-fatal and falls back to delivering the raw tracks.

use crate::error::DlmuxError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::debug;

/// Merge a video-only and an audio-only track into one muxed container.
#[async_trait]
pub trait Merger: Send + Sync {
    async fn merge(&self, video: Bytes, audio: Bytes) -> Result<Bytes, DlmuxError>;
}

/// Muxes tracks by shelling out to ffmpeg with stream copy.
#[derive(Debug, Clone)]
pub struct FfmpegMerger {
    ffmpeg: PathBuf,
}

impl FfmpegMerger {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Default for FfmpegMerger {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Merger for FfmpegMerger {
    async fn merge(&self, video: Bytes, audio: Bytes) -> Result<Bytes, DlmuxError> {
        let scratch = tempfile::tempdir()?;
        let video_path = scratch.path().join("video.mp4");
        let audio_path = scratch.path().join("audio.mp4");
        let output_path = scratch.path().join("output.mp4");

        tokio::fs::write(&video_path, &video).await?;
        tokio::fs::write(&audio_path, &audio).await?;

        debug!(ffmpeg = %self.ffmpeg.display(), "running merge");
        let output = tokio::process::Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(&video_path)
            .arg("-i")
            .arg(&audio_path)
            .args(["-c", "copy"])
            .arg(&output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DlmuxError::Merge(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DlmuxError::Merge(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim_end()
            )));
        }

        let merged = tokio::fs::read(&output_path).await?;
        debug!(bytes = merged.len(), "merge produced muxed output");
        Ok(Bytes::from(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ffmpeg_binary_is_a_merge_error() {
        let merger = FfmpegMerger::new("/nonexistent/ffmpeg-binary");
        let err = tokio_test::block_on(
            merger.merge(Bytes::from_static(b"v"), Bytes::from_static(b"a")),
        )
        .unwrap_err();
        assert!(matches!(err, DlmuxError::Merge(_)));
    }
}
