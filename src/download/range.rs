//! Single byte-range fetch primitive

use crate::download::plan::ChunkSpan;
use crate::error::DlmuxError;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

/// Fetch one byte range `[span.start, span.end)` of `url`.
///
/// The request carries a `Range: bytes=<start>-<end-1>` header, open-ended
/// when the span has no end. Transport failures and non-success statuses
/// are errors; retry policy is the caller's concern (there is none: a
/// failed chunk aborts the whole download).
pub async fn fetch_range(client: &Client, url: &Url, span: ChunkSpan) -> Result<Bytes, DlmuxError> {
    let range_header = match span.end {
        Some(end) => format!("bytes={}-{}", span.start, end - 1),
        None => format!("bytes={}-", span.start),
    };
    debug!(url = %url, range = %range_header, "fetching range");

    let response = client
        .get(url.clone())
        .header("Range", range_header)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() && status != StatusCode::PARTIAL_CONTENT {
        return Err(DlmuxError::RangeStatus(status));
    }

    Ok(response.bytes().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_bounded_range() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/track")
            .match_header("range", "bytes=4-7")
            .with_status(206)
            .with_body("EFGH")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/track", server.url())).unwrap();
        let span = ChunkSpan { start: 4, end: Some(8) };
        let bytes = fetch_range(&Client::new(), &url, span).await.unwrap();

        assert_eq!(&bytes[..], b"EFGH");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_open_ended_range() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/track")
            .match_header("range", "bytes=8-")
            .with_status(206)
            .with_body("IJ")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/track", server.url())).unwrap();
        let span = ChunkSpan { start: 8, end: None };
        let bytes = fetch_range(&Client::new(), &url, span).await.unwrap();

        assert_eq!(&bytes[..], b"IJ");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/track")
            .with_status(403)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/track", server.url())).unwrap();
        let span = ChunkSpan { start: 0, end: Some(4) };
        let err = fetch_range(&Client::new(), &url, span).await.unwrap_err();

        assert!(matches!(
            err,
            DlmuxError::RangeStatus(StatusCode::FORBIDDEN)
        ));
    }
}
