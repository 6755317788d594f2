//! Stream selection over parsed descriptors

use crate::core::manifest::StreamDescriptor;
use crate::error::DlmuxError;
use regex::Regex;

/// Resolution and frame rate parsed from a quality label like "1080p60".
fn parse_quality_label(label: &str) -> Option<(u32, u32)> {
    // Labels follow `<digits>p<optional digits>`; a missing frame rate
    // means the default 30.
    let re = Regex::new(r"(\d+)p(\d*)").ok()?;
    let caps = re.captures(label)?;
    let resolution = caps.get(1)?.as_str().parse().ok()?;
    let fps = match caps.get(2) {
        Some(m) if !m.as_str().is_empty() => m.as_str().parse().ok()?,
        _ => 30,
    };
    Some((resolution, fps))
}

/// Pick the best video-only stream: highest resolution, frame rate as the
/// tie-break.
pub fn select_video(streams: &[StreamDescriptor]) -> Result<&StreamDescriptor, DlmuxError> {
    streams
        .iter()
        .filter(|s| {
            s.mime_type.contains("video/mp4") || s.mime_type.contains("video/webm")
        })
        .filter_map(|s| {
            let label = s.quality_label.as_deref()?;
            parse_quality_label(label).map(|rank| (rank, s))
        })
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, s)| s)
        .ok_or(DlmuxError::NoVideoStream)
}

/// Pick the audio-only stream: first `audio/mp4` descriptor.
pub fn select_audio(streams: &[StreamDescriptor]) -> Result<&StreamDescriptor, DlmuxError> {
    streams
        .iter()
        .find(|s| s.mime_type.contains("audio/mp4"))
        .ok_or(DlmuxError::NoAudioStream)
}
