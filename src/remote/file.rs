use std::sync::Arc;

use bytes::Bytes;

use super::RemoteClient;
use crate::error::ArchiveError;

/// A random-access view of a remote object served with range support.
/// This allows us to read specific parts of large archives without downloading everything.
pub struct RemoteFile {
    client: Arc<RemoteClient>,
    url: String,
    /// Total size of the object, discovered once via HEAD
    size: u64,
}

impl RemoteFile {
    /// Probe `url` for its size and build a handle around it
    pub async fn open(client: Arc<RemoteClient>, url: String) -> Result<Self, ArchiveError> {
        let size = client.content_length(&url).await?;
        Ok(RemoteFile { client, url, size })
    }

    /// Get the total size of the object
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read a specific range of bytes
    pub async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes, ArchiveError> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        if offset + length > self.size {
            return Err(ArchiveError::RangeOutOfBounds {
                offset,
                length,
                size: self.size,
            });
        }

        self.client
            .get_range(&self.url, offset, offset + length - 1)
            .await
    }

    /// Read the last N bytes of the object (useful for the zip trailer)
    pub async fn read_tail(&self, length: u64) -> Result<Bytes, ArchiveError> {
        let actual_length = length.min(self.size);
        let offset = self.size - actual_length;
        self.read_range(offset, actual_length).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use tokio::sync::oneshot;

    use super::*;
    use crate::error::ArchiveError;

    #[derive(Clone)]
    struct TestState {
        bytes: Arc<Vec<u8>>,
        supports_ranges: bool,
    }

    async fn head_handler(State(state): State<TestState>) -> impl IntoResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(&state.bytes.len().to_string()).expect("valid content length"),
        );
        (StatusCode::OK, headers)
    }

    fn parse_range(headers: &HeaderMap, len: usize) -> Option<(usize, usize)> {
        let range = headers.get(header::RANGE)?.to_str().ok()?;
        let suffix = range.strip_prefix("bytes=")?;
        let (start, end) = suffix.split_once('-')?;
        let start = start.parse::<usize>().ok()?;
        let end = end.parse::<usize>().ok()?.min(len.saturating_sub(1));
        if start > end || start >= len {
            return None;
        }
        Some((start, end))
    }

    async fn get_handler(State(state): State<TestState>, headers: HeaderMap) -> impl IntoResponse {
        if state.supports_ranges
            && let Some((start, end)) = parse_range(&headers, state.bytes.len())
        {
            let chunk = state.bytes[start..=end].to_vec();
            return (StatusCode::PARTIAL_CONTENT, chunk).into_response();
        }
        (StatusCode::OK, state.bytes.to_vec()).into_response()
    }

    async fn start_server(bytes: Vec<u8>, supports_ranges: bool) -> (String, oneshot::Sender<()>) {
        let state = TestState {
            bytes: Arc::new(bytes),
            supports_ranges,
        };
        let app = Router::new()
            .route("/file", get(get_handler).head(head_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let addr = listener.local_addr().expect("get local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve test app");
        });

        (format!("http://{addr}/file"), shutdown_tx)
    }

    async fn open_test_file(url: &str) -> RemoteFile {
        let client = Arc::new(RemoteClient::new(None, false).expect("build client"));
        RemoteFile::open(client, url.to_string())
            .await
            .expect("open remote file")
    }

    #[tokio::test]
    async fn probes_size_and_reads_ranges() {
        let (url, shutdown) = start_server(b"0123456789abcdef".to_vec(), true).await;

        let file = open_test_file(&url).await;
        assert_eq!(file.size(), 16);

        let chunk = file.read_range(2, 4).await.expect("range read");
        assert_eq!(&chunk[..], b"2345");

        let tail = file.read_tail(4).await.expect("tail read");
        assert_eq!(&tail[..], b"cdef");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn slices_full_body_when_server_ignores_range() {
        let (url, shutdown) = start_server(b"0123456789abcdef".to_vec(), false).await;

        let file = open_test_file(&url).await;
        let chunk = file.read_range(4, 3).await.expect("range read");
        assert_eq!(&chunk[..], b"456");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn rejects_out_of_bounds_reads() {
        let (url, shutdown) = start_server(b"abcdef".to_vec(), true).await;

        let file = open_test_file(&url).await;
        let err = file.read_range(4, 10).await.expect_err("must be rejected");
        assert!(matches!(err, ArchiveError::RangeOutOfBounds { .. }));

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn zero_length_reads_skip_the_network() {
        let (url, shutdown) = start_server(b"abcdef".to_vec(), true).await;

        let file = open_test_file(&url).await;
        let chunk = file.read_range(3, 0).await.expect("empty read");
        assert!(chunk.is_empty());

        let _ = shutdown.send(());
    }
}
