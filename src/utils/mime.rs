//! MIME type utilities for determining file extensions

/// Get the file extension for a stream's MIME type.
///
/// Manifest MIME types carry a codecs suffix (`video/mp4; codecs="..."`),
/// so only the part before any `;` is considered.
pub fn ext_from_mime(mime_type: &str) -> &'static str {
    let base = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match base {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/3gpp" => "3gp",

        "audio/mp4" => "m4a",
        "audio/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/opus" => "opus",

        _ => "bin",
    }
}
