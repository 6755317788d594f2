//! Download-and-merge orchestration

use crate::core::manifest::StreamDescriptor;
use crate::core::progress::ProgressSnapshot;
use crate::decipher::DecipherRoutine;
use crate::download::ChunkScheduler;
use crate::error::DlmuxError;
use crate::merge::Merger;
use bytes::Bytes;
use futures::future::try_join;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default deadline for the external merge step.
pub const DEFAULT_MERGE_DEADLINE: Duration = Duration::from_secs(25);

/// Which track a progress snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Video,
    Audio,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Video => write!(f, "video"),
            Track::Audio => write!(f, "audio"),
        }
    }
}

/// Terminal result of the pipeline.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    /// The merger produced a single muxed buffer
    Merged(Bytes),
    /// The merger failed or the deadline fired; both raw tracks survive
    Unmerged { video: Bytes, audio: Bytes },
}

impl MergeOutcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged(_))
    }
}

/// Runs two chunked downloads concurrently, then races the external merge
/// against a deadline.
///
/// Download failures propagate; merge failures never do. They resolve to
/// the [`MergeOutcome::Unmerged`] fallback so already-downloaded work is
/// not discarded.
pub struct MergePipeline<M> {
    scheduler: ChunkScheduler,
    merger: Arc<M>,
    merge_deadline: Duration,
}

impl<M: Merger + 'static> MergePipeline<M> {
    pub fn new(merger: M) -> Self {
        Self {
            scheduler: ChunkScheduler::new(reqwest::Client::new()),
            merger: Arc::new(merger),
            merge_deadline: DEFAULT_MERGE_DEADLINE,
        }
    }

    /// Replace the default scheduler (chunk size, concurrency, client).
    pub fn with_scheduler(mut self, scheduler: ChunkScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set the merge deadline.
    pub fn with_merge_deadline(mut self, deadline: Duration) -> Self {
        self.merge_deadline = deadline;
        self
    }

    /// Download both tracks and attempt the merge.
    ///
    /// `routine` descrambles stream signatures where a descriptor calls for
    /// it; resolution happens before any chunk is scheduled. Progress is
    /// reported per track through `on_progress`.
    pub async fn run<F>(
        &self,
        video: &StreamDescriptor,
        audio: &StreamDescriptor,
        routine: Option<&DecipherRoutine>,
        on_progress: F,
    ) -> Result<MergeOutcome, DlmuxError>
    where
        F: Fn(Track, ProgressSnapshot) + Send + Sync,
    {
        let video_url = video.resolved_url(routine)?;
        let audio_url = audio.resolved_url(routine)?;

        // Either download failing aborts the whole pipeline: try_join drops
        // the sibling future, which tears down its outstanding chunk tasks.
        let (video_bytes, audio_bytes) = try_join(
            self.scheduler.download(video_url, video.content_length, |s| {
                on_progress(Track::Video, s)
            }),
            self.scheduler.download(audio_url, audio.content_length, |s| {
                on_progress(Track::Audio, s)
            }),
        )
        .await?;
        let video_bytes = Bytes::from(video_bytes);
        let audio_bytes = Bytes::from(audio_bytes);

        info!(
            video = video_bytes.len(),
            audio = audio_bytes.len(),
            "both tracks downloaded, handing to merger"
        );

        // The deadline only decides which outcome is returned. A merge that
        // loses the race keeps running detached and its result is dropped.
        let merger = Arc::clone(&self.merger);
        let merge_task = tokio::spawn({
            let video = video_bytes.clone();
            let audio = audio_bytes.clone();
            async move { merger.merge(video, audio).await }
        });

        match tokio::time::timeout(self.merge_deadline, merge_task).await {
            Ok(Ok(Ok(merged))) => Ok(MergeOutcome::Merged(merged)),
            Ok(Ok(Err(err))) => {
                warn!(error = %err, "merge failed, delivering raw tracks");
                Ok(MergeOutcome::Unmerged {
                    video: video_bytes,
                    audio: audio_bytes,
                })
            }
            Ok(Err(join_err)) => {
                warn!(error = %join_err, "merge task died, delivering raw tracks");
                Ok(MergeOutcome::Unmerged {
                    video: video_bytes,
                    audio: audio_bytes,
                })
            }
            Err(_) => {
                warn!(
                    deadline_secs = self.merge_deadline.as_secs_f64(),
                    "merge deadline elapsed, delivering raw tracks"
                );
                Ok(MergeOutcome::Unmerged {
                    video: video_bytes,
                    audio: audio_bytes,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::Manifest;
    use crate::core::select::{select_audio, select_video};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const VIDEO_BODY: &[u8] = b"VIDEOBYTES";
    const AUDIO_BODY: &[u8] = b"AUD!";

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Hang,
    }

    struct StubMerger(Behavior);

    #[async_trait]
    impl Merger for StubMerger {
        async fn merge(&self, video: Bytes, audio: Bytes) -> Result<Bytes, DlmuxError> {
            match self.0 {
                Behavior::Succeed => {
                    let mut out = video.to_vec();
                    out.extend_from_slice(&audio);
                    Ok(Bytes::from(out))
                }
                Behavior::Fail => Err(DlmuxError::Merge("stub merger refused".to_string())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(video)
                }
            }
        }
    }

    fn two_track_manifest(base: &str) -> Manifest {
        Manifest::parse(&format!(
            r#"{{
                "videoDetails": {{ "title": "clip" }},
                "streamingData": {{ "adaptiveFormats": [
                    {{ "mimeType": "video/mp4", "qualityLabel": "720p",
                       "contentLength": "10", "url": "{base}/video" }},
                    {{ "mimeType": "audio/mp4",
                       "contentLength": "4", "url": "{base}/audio" }}
                ] }}
            }}"#
        ))
        .unwrap()
    }

    async fn mock_tracks(server: &mut mockito::Server) -> (mockito::Mock, mockito::Mock) {
        let video = server
            .mock("GET", "/video")
            .match_header("range", "bytes=0-")
            .with_status(206)
            .with_body(VIDEO_BODY)
            .create_async()
            .await;
        let audio = server
            .mock("GET", "/audio")
            .match_header("range", "bytes=0-")
            .with_status(206)
            .with_body(AUDIO_BODY)
            .create_async()
            .await;
        (video, audio)
    }

    fn pipeline(merger: StubMerger) -> MergePipeline<StubMerger> {
        MergePipeline::new(merger).with_merge_deadline(Duration::from_millis(200))
    }

    async fn run_against(
        server: &mockito::Server,
        pipeline: &MergePipeline<StubMerger>,
    ) -> Result<MergeOutcome, DlmuxError> {
        let manifest = two_track_manifest(&server.url());
        let video = select_video(manifest.adaptive_streams()).unwrap();
        let audio = select_audio(manifest.adaptive_streams()).unwrap();
        pipeline.run(video, audio, None, |_, _| {}).await
    }

    #[tokio::test]
    async fn test_successful_merge() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_tracks(&mut server).await;

        let outcome = run_against(&server, &pipeline(StubMerger(Behavior::Succeed)))
            .await
            .unwrap();
        match outcome {
            MergeOutcome::Merged(bytes) => {
                assert_eq!(&bytes[..], b"VIDEOBYTESAUD!");
            }
            other => panic!("expected merged outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_merge_error_falls_back_to_raw_tracks() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_tracks(&mut server).await;

        let outcome = run_against(&server, &pipeline(StubMerger(Behavior::Fail)))
            .await
            .unwrap();
        match outcome {
            MergeOutcome::Unmerged { video, audio } => {
                assert_eq!(&video[..], VIDEO_BODY);
                assert_eq!(&audio[..], AUDIO_BODY);
            }
            other => panic!("expected unmerged outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_merge_timeout_falls_back_to_raw_tracks() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_tracks(&mut server).await;

        // Failure and timeout share the fallback path.
        let outcome = run_against(&server, &pipeline(StubMerger(Behavior::Hang)))
            .await
            .unwrap();
        match outcome {
            MergeOutcome::Unmerged { video, audio } => {
                assert_eq!(&video[..], VIDEO_BODY);
                assert_eq!(&audio[..], AUDIO_BODY);
            }
            other => panic!("expected unmerged outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _video = server
            .mock("GET", "/video")
            .with_status(404)
            .create_async()
            .await;
        let _audio = server
            .mock("GET", "/audio")
            .match_header("range", "bytes=0-")
            .with_status(206)
            .with_body(AUDIO_BODY)
            .create_async()
            .await;

        let err = run_against(&server, &pipeline(StubMerger(Behavior::Succeed)))
            .await
            .unwrap_err();
        assert!(matches!(err, DlmuxError::DownloadAborted(_)));
    }

    #[tokio::test]
    async fn test_progress_is_tagged_per_track() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_tracks(&mut server).await;

        let manifest = two_track_manifest(&server.url());
        let video = select_video(manifest.adaptive_streams()).unwrap();
        let audio = select_audio(manifest.adaptive_streams()).unwrap();

        let seen = Mutex::new(Vec::new());
        pipeline(StubMerger(Behavior::Succeed))
            .run(video, audio, None, |track, snapshot| {
                seen.lock().unwrap().push((track, snapshot.loaded, snapshot.total));
            })
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert!(seen.contains(&(Track::Video, 10, 10)));
        assert!(seen.contains(&(Track::Audio, 4, 4)));
    }
}
