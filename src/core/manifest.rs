//! Manifest model: the structured response describing available streams

use crate::decipher::DecipherRoutine;
use crate::error::DlmuxError;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

/// Metadata for one selectable encoded track.
///
/// Immutable after construction; the descrambled signature is the only
/// derived field and is computed at most once.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Fetch target; may already carry a partial query string
    pub url: String,
    /// MIME type, e.g. `video/mp4; codecs="avc1.640028"`
    pub mime_type: String,
    /// Fine-grained label, e.g. "1080p60"
    pub quality_label: Option<String>,
    /// Coarse label, e.g. "hd1080"
    pub quality: Option<String>,
    /// Bits per second
    pub bitrate: Option<u64>,
    /// Total byte size of the track
    pub content_length: u64,
    /// Query-string keys from the embedded cipher blob, present only when
    /// the stream URL requires a descrambled signature (`s` = scrambled
    /// value, `sp` = parameter name to append the plaintext under)
    pub cipher_params: Option<HashMap<String, String>>,
    descrambled: OnceLock<String>,
}

impl StreamDescriptor {
    /// Whether fetching this stream requires a descrambled signature.
    pub fn needs_descrambling(&self) -> bool {
        self.cipher_params
            .as_ref()
            .is_some_and(|p| p.contains_key("s"))
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }

    /// The URL to fetch ranges from, with the descrambled signature
    /// appended when the stream calls for one.
    ///
    /// The plaintext signature is derived on first use and reused for the
    /// descriptor's lifetime.
    pub fn resolved_url(&self, routine: Option<&DecipherRoutine>) -> Result<Url, DlmuxError> {
        let mut url = Url::parse(&self.url)?;
        if let Some(params) = &self.cipher_params {
            if let Some(scrambled) = params.get("s") {
                let routine = routine.ok_or_else(|| {
                    DlmuxError::Compilation(
                        "stream requires signature descrambling but no routine is available"
                            .to_string(),
                    )
                })?;
                let plaintext = self.descrambled.get_or_init(|| routine.apply(scrambled));
                let key = params.get("sp").map(String::as_str).unwrap_or("signature");
                url.query_pairs_mut().append_pair(key, plaintext);
                debug!(param = key, "appended descrambled signature");
            }
        }
        Ok(url)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawFormat {
    url: Option<String>,
    mime_type: Option<String>,
    quality_label: Option<String>,
    quality: Option<String>,
    bitrate: Option<u64>,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    content_length: Option<u64>,
    #[serde(alias = "cipher")]
    signature_cipher: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawStreamingData {
    formats: Vec<RawFormat>,
    adaptive_formats: Vec<RawFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawVideoDetails {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPlayabilityStatus {
    live_streamability: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawManifest {
    streaming_data: Option<RawStreamingData>,
    video_details: Option<RawVideoDetails>,
    playability_status: Option<RawPlayabilityStatus>,
}

/// The parsed manifest: title, liveness, and both stream lists.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Resource title, used for suggested filenames
    pub title: String,
    /// Whether the resource is a live stream (not downloadable)
    pub is_live: bool,
    muxed: Vec<StreamDescriptor>,
    adaptive: Vec<StreamDescriptor>,
}

impl Manifest {
    /// Parse a manifest from its JSON text.
    pub fn parse(json: &str) -> Result<Self, DlmuxError> {
        let raw: RawManifest = serde_json::from_str(json)?;
        let streaming = raw.streaming_data.unwrap_or_default();

        let muxed = collect_descriptors(streaming.formats);
        let adaptive = collect_descriptors(streaming.adaptive_formats);
        if muxed.is_empty() && adaptive.is_empty() {
            return Err(DlmuxError::Manifest(
                "manifest contains no usable streams".to_string(),
            ));
        }

        let title = raw
            .video_details
            .and_then(|d| d.title)
            .unwrap_or_else(|| "video".to_string());
        let is_live = raw
            .playability_status
            .map(|s| s.live_streamability.is_some())
            .unwrap_or(false);

        debug!(
            muxed = muxed.len(),
            adaptive = adaptive.len(),
            is_live,
            "parsed manifest"
        );
        Ok(Self {
            title,
            is_live,
            muxed,
            adaptive,
        })
    }

    /// Combined (video+audio) streams, if the manifest lists any.
    pub fn muxed_streams(&self) -> &[StreamDescriptor] {
        &self.muxed
    }

    /// Single-track streams the download pipeline selects from.
    pub fn adaptive_streams(&self) -> &[StreamDescriptor] {
        &self.adaptive
    }

    /// Fail for resources the pipeline cannot download.
    pub fn ensure_downloadable(&self) -> Result<(), DlmuxError> {
        if self.is_live {
            return Err(DlmuxError::LiveStream);
        }
        Ok(())
    }
}

fn collect_descriptors(raw: Vec<RawFormat>) -> Vec<StreamDescriptor> {
    raw.into_iter().filter_map(descriptor_from_raw).collect()
}

fn descriptor_from_raw(raw: RawFormat) -> Option<StreamDescriptor> {
    let mut url = raw.url;
    let mut cipher_params = None;

    if let Some(blob) = raw.signature_cipher {
        let params: HashMap<String, String> = url::form_urlencoded::parse(blob.as_bytes())
            .into_owned()
            .collect();
        // The blob carries the real fetch URL alongside the cipher keys.
        if let Some(embedded) = params.get("url") {
            url = Some(embedded.clone());
        }
        cipher_params = Some(params);
    }

    let mime_type = raw.mime_type?;
    let Some(url) = url else {
        warn!(mime = %mime_type, "skipping stream without a URL");
        return None;
    };
    let Some(content_length) = raw.content_length else {
        warn!(mime = %mime_type, "skipping stream without a content length");
        return None;
    };

    Some(StreamDescriptor {
        url,
        mime_type,
        quality_label: raw.quality_label,
        quality: raw.quality,
        bitrate: raw.bitrate,
        content_length,
        cipher_params,
        descrambled: OnceLock::new(),
    })
}

/// Accept `"12345"` as well as `12345`; real manifests use the former.
fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        Number(u64),
        Text(String),
    }

    match Option::<Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n)),
        Some(Value::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
