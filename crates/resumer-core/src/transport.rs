//! Network interface used by the transfer engine
//!
//! The engine only needs two calls: a metadata probe that yields the total
//! length, and a ranged GET that yields a byte stream starting at some offset.
//! `HttpTransport` implements both on top of reqwest.

use crate::error::TransferError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, StatusCode};
use resumer_types::Settings;
use std::time::Duration;
use tracing::{debug, info};

/// Response body of a ranged transfer request
pub struct RangedBody {
    /// Offset of the first byte in `stream`, as honored by the server
    pub start: u64,
    pub stream: BoxStream<'static, std::io::Result<Bytes>>,
}

impl std::fmt::Debug for RangedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedBody")
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

/// Network collaborator of the transfer engine
#[async_trait]
pub trait Transport: Send + Sync {
    /// Total content length of `url` in bytes
    async fn probe(&self, url: &str) -> Result<u64, TransferError>;

    /// Open a body stream for `url` beginning at `offset`
    async fn fetch_from(&self, url: &str, offset: u64) -> Result<RangedBody, TransferError>;
}

/// reqwest-backed transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the HTTP client from settings
    pub fn new(settings: &Settings) -> Result<Self, TransferError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Partial GET fallback for servers whose HEAD is useless
    async fn probe_with_get(&self, url: &str) -> Result<u64, TransferError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| TransferError::Probe(e.to_string()))?;
        let status = response.status();
        debug!("Partial GET probe status: {}", status);

        let total = if status == StatusCode::PARTIAL_CONTENT {
            ContentRange::from_headers(response.headers()).and_then(|r| r.total)
        } else if status.is_success() {
            // Server ignored the range and would send everything
            content_length(response.headers())
        } else {
            return Err(TransferError::Probe(format!("server answered {}", status)));
        };

        match total {
            Some(len) if len > 0 => Ok(len),
            _ => Err(TransferError::ZeroLength),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self, url: &str) -> Result<u64, TransferError> {
        info!("Probing URL: {}", url);

        match self.client.head(url).send().await {
            Ok(response) if response.status().is_success() => {
                if let Some(len) = content_length(response.headers()).filter(|len| *len > 0) {
                    return Ok(len);
                }
                debug!("HEAD carried no usable Content-Length, trying partial GET");
            }
            Ok(response) => {
                debug!("HEAD answered {}, trying partial GET", response.status());
            }
            Err(e) => {
                debug!("HEAD failed: {}, trying partial GET", e);
            }
        }

        self.probe_with_get(url).await
    }

    async fn fetch_from(&self, url: &str, offset: u64) -> Result<RangedBody, TransferError> {
        let mut request = self.client.get(url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", offset));
        }
        debug!("Requesting {} from byte {}", url, offset);

        let response = request.send().await?;
        let status = response.status();

        let start = if status == StatusCode::PARTIAL_CONTENT {
            ContentRange::from_headers(response.headers())
                .map(|r| r.start)
                .ok_or_else(|| TransferError::UnsupportedRange {
                    requested: offset,
                    status: "206 without Content-Range".to_string(),
                })?
        } else if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(TransferError::UnsupportedRange {
                requested: offset,
                status: status.to_string(),
            });
        } else {
            response.error_for_status_ref()?;
            0
        };

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(body_error))
            .boxed();

        Ok(RangedBody { start, stream })
    }
}

/// Parsed `Content-Range: bytes <start>-<end>/<total>` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    /// None when the server sent `*`
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes")?.trim_start();
        let (range, total) = rest.split_once('/')?;
        let (start, end) = range.split_once('-')?;
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse().ok()?),
        };

        Some(Self {
            start: start.trim().parse().ok()?,
            end: end.trim().parse().ok()?,
            total,
        })
    }

    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse)
    }
}

/// Keep reqwest timeouts recognizable once the body is read as `AsyncRead`
fn body_error(e: reqwest::Error) -> std::io::Error {
    if e.is_timeout() {
        std::io::Error::new(std::io::ErrorKind::TimedOut, e)
    } else {
        std::io::Error::other(e)
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use resumer_types::FailureKind;

    fn transport() -> HttpTransport {
        HttpTransport::new(&Settings::default()).unwrap()
    }

    async fn collect(body: RangedBody) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stream = body.stream;
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(
            ContentRange::parse("bytes 0-0/1234"),
            Some(ContentRange { start: 0, end: 0, total: Some(1234) })
        );
        assert_eq!(
            ContentRange::parse("bytes 100-199/*"),
            Some(ContentRange { start: 100, end: 199, total: None })
        );
        assert_eq!(ContentRange::parse("items 0-1/2"), None);
        assert_eq!(ContentRange::parse("bytes */500"), None);
    }

    #[tokio::test]
    async fn body_timeouts_stay_timeouts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/slow");
                then.status(200)
                    .body("late")
                    .delay(Duration::from_secs(5));
            })
            .await;

        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let err = client.get(server.url("/slow")).send().await.unwrap_err();
        assert!(err.is_timeout());

        let io = body_error(err);
        assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);
        assert_eq!(TransferError::Stream(io).kind(), FailureKind::Timeout);
    }

    #[tokio::test]
    async fn probe_falls_back_to_partial_get() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/file.bin");
                then.status(405);
            })
            .await;
        let ranged = server
            .mock_async(|when, then| {
                when.method(GET).path("/file.bin").header("range", "bytes=0-0");
                then.status(206)
                    .header("content-range", "bytes 0-0/1234")
                    .body("a");
            })
            .await;

        let len = transport().probe(&server.url("/file.bin")).await.unwrap();
        assert_eq!(len, 1234);
        ranged.assert_async().await;
    }

    #[tokio::test]
    async fn probe_rejects_missing_resource() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/missing.bin");
                then.status(404);
            })
            .await;

        let err = transport().probe(&server.url("/missing.bin")).await.unwrap_err();
        assert!(matches!(err, TransferError::Probe(_)));
    }

    #[tokio::test]
    async fn fetch_from_reports_honored_offset() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/data").header("range", "bytes=10-");
                then.status(206)
                    .header("content-range", "bytes 10-19/20")
                    .body("0123456789");
            })
            .await;

        let body = transport().fetch_from(&server.url("/data"), 10).await.unwrap();
        assert_eq!(body.start, 10);
        assert_eq!(collect(body).await, b"0123456789");
    }

    #[tokio::test]
    async fn fetch_from_detects_ignored_range() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/data");
                then.status(200).body("full body");
            })
            .await;

        let body = transport().fetch_from(&server.url("/data"), 4).await.unwrap();
        assert_eq!(body.start, 0);
        assert_eq!(collect(body).await, b"full body");
    }

    #[tokio::test]
    async fn fetch_from_maps_unsatisfiable_range() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/data");
                then.status(416).header("content-range", "bytes */20");
            })
            .await;

        let err = transport().fetch_from(&server.url("/data"), 50).await.unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedRange { requested: 50, .. }));
    }
}
