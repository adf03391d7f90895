//! Video generation providers.

mod kie;
mod sora;

pub use kie::{KieModel, KieProvider, KieProviderBuilder};
pub use sora::{SoraModel, SoraProvider, SoraProviderBuilder};

use crate::error::{ClipForgeError, Result};
use std::time::Duration;

/// Upper bound for fetching one finished artifact.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Sends `request` and collects the body, stopping as soon as it exceeds `limit` bytes.
pub(crate) async fn download_capped(request: reqwest::RequestBuilder, limit: u64) -> Result<Vec<u8>> {
    let mut response = request.timeout(DOWNLOAD_TIMEOUT).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ClipForgeError::Download {
            status: status.as_u16(),
            message: "Failed to download video".into(),
        });
    }

    if let Some(len) = response.content_length() {
        if len > limit {
            return Err(ClipForgeError::PayloadTooLarge { size: len, limit });
        }
    }

    let mut data = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let size = (data.len() + chunk.len()) as u64;
        if size > limit {
            return Err(ClipForgeError::PayloadTooLarge { size, limit });
        }
        data.extend_from_slice(&chunk);
    }

    Ok(data)
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use crate::testing::spawn_fake_api;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use std::io::Cursor;
    use tokio_util::io::ReaderStream;

    /// A chunked body: no `Content-Length`, `len` bytes in 256-byte pieces.
    fn streamed(len: usize) -> Body {
        Body::from_stream(ReaderStream::with_capacity(Cursor::new(vec![7u8; len]), 256))
    }

    fn app() -> Router {
        Router::new()
            .route("/small", get(|| async { vec![7u8; 64] }))
            .route("/large", get(|| async { vec![7u8; 4096] }))
            .route("/streamed-small", get(|| async { streamed(512) }))
            .route("/streamed-large", get(|| async { streamed(4096) }))
            .route(
                "/missing",
                get(|| async { (axum::http::StatusCode::NOT_FOUND, "gone") }),
            )
    }

    #[tokio::test]
    async fn test_download_within_limit() {
        let base = spawn_fake_api(app()).await;
        let client = reqwest::Client::new();

        let data = download_capped(client.get(format!("{base}/small")), 100)
            .await
            .unwrap();
        assert_eq!(data.len(), 64);
    }

    #[tokio::test]
    async fn test_download_rejects_by_content_length() {
        let base = spawn_fake_api(app()).await;
        let client = reqwest::Client::new();

        let err = download_capped(client.get(format!("{base}/large")), 1024)
            .await
            .unwrap_err();
        match err {
            ClipForgeError::PayloadTooLarge { size, limit } => {
                assert_eq!(size, 4096);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streamed_download_within_limit() {
        let base = spawn_fake_api(app()).await;
        let client = reqwest::Client::new();

        let data = download_capped(client.get(format!("{base}/streamed-small")), 1024)
            .await
            .unwrap();
        assert_eq!(data.len(), 512);
    }

    #[tokio::test]
    async fn test_streamed_download_stops_past_limit() {
        let base = spawn_fake_api(app()).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{base}/streamed-large"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.content_length(), None);

        let err = download_capped(client.get(format!("{base}/streamed-large")), 1024)
            .await
            .unwrap_err();
        match err {
            ClipForgeError::PayloadTooLarge { size, limit } => {
                assert!(size > 1024);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_non_success() {
        let base = spawn_fake_api(app()).await;
        let client = reqwest::Client::new();

        let err = download_capped(client.get(format!("{base}/missing")), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipForgeError::Download { status: 404, .. }));
    }
}
