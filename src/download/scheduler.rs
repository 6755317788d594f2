//! Bounded-concurrency chunked download into a pre-sized buffer

use crate::core::progress::ProgressSnapshot;
use crate::download::plan::{ChunkPlan, ChunkSpan};
use crate::download::range::fetch_range;
use crate::error::DlmuxError;
use bytes::Bytes;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: u64 = 65536;

/// Default number of in-flight range fetches per scheduler.
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Downloads one resource as many concurrent ranged fetches, reassembled
/// into a single contiguous buffer.
///
/// Chunk completion order is unspecified; the buffer is byte-exact anyway
/// because every chunk owns a disjoint offset range. The first chunk
/// failure aborts the whole download; there is no partial result.
#[derive(Debug, Clone)]
pub struct ChunkScheduler {
    client: Client,
    chunk_size: u64,
    concurrency: usize,
}

impl ChunkScheduler {
    /// Create a scheduler with the default chunk size and concurrency cap.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the chunk size in bytes (minimum 1).
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the in-flight fetch cap (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Download `total` bytes from `url`, invoking `on_progress` after
    /// every completed chunk.
    ///
    /// The URL must already carry any required descrambled signature.
    pub async fn download<F>(
        &self,
        url: Url,
        total: u64,
        on_progress: F,
    ) -> Result<Vec<u8>, DlmuxError>
    where
        F: Fn(ProgressSnapshot) + Send + Sync,
    {
        let started = Instant::now();
        on_progress(ProgressSnapshot {
            loaded: 0,
            total,
            bytes_per_second: 0.0,
        });

        let plan = ChunkPlan::build(total, self.chunk_size);
        debug!(url = %url, total, chunks = plan.len(), "starting chunked download");

        let mut buffer = vec![0u8; total as usize];
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let cancel = CancellationToken::new();
        let mut tasks: JoinSet<Result<Option<(ChunkSpan, Bytes)>, DlmuxError>> = JoinSet::new();

        for &span in plan.spans() {
            let client = self.client.clone();
            let url = url.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => return Ok(None),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return Ok(None),
                    },
                };
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                let bytes = fetch_range(&client, &url, span).await?;
                Ok(Some((span, bytes)))
            });
        }

        let mut loaded: u64 = 0;
        let mut first_error: Option<DlmuxError> = None;
        let fail = |err: DlmuxError,
                        first_error: &mut Option<DlmuxError>,
                        tasks: &mut JoinSet<_>| {
            if first_error.is_none() {
                warn!(error = %err, "chunk failed, aborting download");
                *first_error = Some(err);
                cancel.cancel();
                tasks.abort_all();
            }
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Some((span, bytes)))) => {
                    let expected = span.expected_len(total);
                    if bytes.len() as u64 != expected {
                        fail(
                            DlmuxError::RangeMismatch {
                                start: span.start,
                                expected,
                                actual: bytes.len() as u64,
                            },
                            &mut first_error,
                            &mut tasks,
                        );
                        continue;
                    }
                    let start = span.start as usize;
                    buffer[start..start + bytes.len()].copy_from_slice(&bytes);
                    loaded += expected;
                    let elapsed = started.elapsed().as_secs_f64().max(0.001);
                    on_progress(ProgressSnapshot {
                        loaded,
                        total,
                        bytes_per_second: loaded as f64 / elapsed,
                    });
                }
                Ok(Ok(None)) => {}
                Ok(Err(err)) => fail(err, &mut first_error, &mut tasks),
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => fail(
                    DlmuxError::Generic(format!("chunk task failed: {join_err}")),
                    &mut first_error,
                    &mut tasks,
                ),
            }
        }

        match first_error {
            // The whole result is void on partial failure.
            Some(err) => Err(DlmuxError::DownloadAborted(Box::new(err))),
            None => Ok(buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn scheduler_for(server: &mockito::Server) -> (ChunkScheduler, Url) {
        let scheduler = ChunkScheduler::new(Client::new())
            .with_chunk_size(4)
            .with_concurrency(3);
        let url = Url::parse(&format!("{}/track", server.url())).unwrap();
        (scheduler, url)
    }

    #[tokio::test]
    async fn test_reassembles_regardless_of_completion_order() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for (range, body) in [("bytes=0-3", "ABCD"), ("bytes=4-7", "EFGH"), ("bytes=8-", "IJ")] {
            mocks.push(
                server
                    .mock("GET", "/track")
                    .match_header("range", range)
                    .with_status(206)
                    .with_body(body)
                    .create_async()
                    .await,
            );
        }

        let (scheduler, url) = scheduler_for(&server);
        let snapshots = Mutex::new(Vec::new());
        let buffer = scheduler
            .download(url, 10, |snapshot| {
                snapshots.lock().unwrap().push(snapshot);
            })
            .await
            .unwrap();

        assert_eq!(buffer, b"ABCDEFGHIJ");

        let snapshots = snapshots.into_inner().unwrap();
        assert_eq!(snapshots.first().unwrap().loaded, 0);
        assert_eq!(snapshots.last().unwrap().loaded, 10);
        assert!(snapshots.windows(2).all(|w| w[0].loaded <= w[1].loaded));
        assert!(snapshots.iter().all(|s| s.total == 10));
    }

    #[tokio::test]
    async fn test_chunk_failure_aborts_whole_download() {
        let mut server = mockito::Server::new_async().await;
        let _ok_head = server
            .mock("GET", "/track")
            .match_header("range", "bytes=0-3")
            .with_status(206)
            .with_body("ABCD")
            .create_async()
            .await;
        let _failing = server
            .mock("GET", "/track")
            .match_header("range", "bytes=4-7")
            .with_status(500)
            .create_async()
            .await;
        let _ok_tail = server
            .mock("GET", "/track")
            .match_header("range", "bytes=8-")
            .with_status(206)
            .with_body("IJ")
            .create_async()
            .await;

        let (scheduler, url) = scheduler_for(&server);
        let err = scheduler.download(url, 10, |_| {}).await.unwrap_err();

        match err {
            DlmuxError::DownloadAborted(inner) => {
                assert!(matches!(*inner, DlmuxError::RangeStatus(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_short_chunk_body_aborts() {
        let mut server = mockito::Server::new_async().await;
        let _short = server
            .mock("GET", "/track")
            .match_header("range", "bytes=0-")
            .with_status(206)
            .with_body("AB")
            .create_async()
            .await;

        let (scheduler, url) = scheduler_for(&server);
        let err = scheduler.download(url, 4, |_| {}).await.unwrap_err();

        match err {
            DlmuxError::DownloadAborted(inner) => match *inner {
                DlmuxError::RangeMismatch {
                    start,
                    expected,
                    actual,
                } => {
                    assert_eq!(start, 0);
                    assert_eq!(expected, 4);
                    assert_eq!(actual, 2);
                }
                other => panic!("unexpected inner error: {other}"),
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_resource_yields_empty_buffer() {
        let server = mockito::Server::new_async().await;
        let (scheduler, url) = scheduler_for(&server);

        let snapshots = Mutex::new(Vec::new());
        let buffer = scheduler
            .download(url, 0, |snapshot| {
                snapshots.lock().unwrap().push(snapshot);
            })
            .await
            .unwrap();

        assert!(buffer.is_empty());
        // Only the initial zero snapshot is emitted.
        assert_eq!(snapshots.into_inner().unwrap().len(), 1);
    }
}
