//! HTTP client for the engine release index.

use crate::config::{ReleaseIndex, RetryConfig, BUNDLE_TAG_PREFIX};
use futures_util::StreamExt;
use qlscan_core::{Platform, ProgressSink, QlscanError, Result};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Default timeout for metadata requests (bundle downloads are not time-limited)
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(15);

/// Default connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Subset of the release API response we care about
#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Client for the release index: latest-version lookups and bundle downloads
#[derive(Clone)]
pub struct ReleaseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    index: ReleaseIndex,
    retry_config: RetryConfig,
    api_timeout: Duration,
}

/// Failure of a single download attempt
enum AttemptError {
    /// Worth another attempt (transport error, 5xx)
    Retryable(String),
    /// Retrying cannot help (4xx, local IO)
    Fatal(QlscanError),
}

impl ReleaseClient {
    /// Create a client against the public release index
    pub fn new() -> Result<Self> {
        ReleaseClientBuilder::new().build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> ReleaseClientBuilder {
        ReleaseClientBuilder::new()
    }

    /// Release index this client talks to
    #[must_use]
    pub fn index(&self) -> &ReleaseIndex {
        &self.inner.index
    }

    /// Look up the version of the latest published bundle
    ///
    /// Every failure is reported as `QlscanError::VersionResolution` so
    /// callers can fall back to a default version.
    pub async fn latest_version(&self) -> Result<String> {
        let url = &self.inner.index.latest_url;
        debug!(url = %url, "GET latest release");

        let response = self
            .inner
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.inner.api_timeout)
            .send()
            .await
            .map_err(|e| QlscanError::VersionResolution(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QlscanError::VersionResolution(format!(
                "{url} answered HTTP {status}"
            )));
        }

        let release: LatestRelease = response
            .json()
            .await
            .map_err(|e| QlscanError::VersionResolution(format!("unexpected response from {url}: {e}")))?;

        parse_bundle_tag(&release.tag_name).ok_or_else(|| {
            QlscanError::VersionResolution(format!(
                "release tag `{}` is not a bundle tag",
                release.tag_name
            ))
        })
    }

    /// Stream a bundle into a temporary file inside `dest_dir`
    ///
    /// The returned file is deleted when dropped, so a failed or abandoned
    /// install never leaves an archive behind.
    pub async fn download_bundle(
        &self,
        version: &str,
        platform: Platform,
        dest_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<NamedTempFile> {
        let url = self.inner.index.bundle_url(version, platform)?;
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| QlscanError::io(dest_dir, e))?;

        let retry = &self.inner.retry_config;
        let mut attempt = 0;
        loop {
            match self.download_once(&url, platform, dest_dir, progress).await {
                Ok(file) => return Ok(file),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(reason)) if attempt < retry.max_retries => {
                    let backoff = retry.backoff_for(attempt);
                    warn!(url = %url, attempt, reason = %reason, ?backoff, "download failed, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(AttemptError::Retryable(reason)) => {
                    return Err(QlscanError::Download { url, reason });
                }
            }
        }
    }

    async fn download_once(
        &self,
        url: &str,
        platform: Platform,
        dest_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<NamedTempFile, AttemptError> {
        info!(url = %url, "downloading engine bundle");

        let response = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError::Retryable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(QlscanError::Download {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            }));
        }

        let temp = tempfile::Builder::new()
            .prefix(".bundle-")
            .suffix(&format!(".{}", platform.archive_format().extension()))
            .tempfile_in(dest_dir)
            .map_err(|e| AttemptError::Fatal(QlscanError::io(dest_dir, e)))?;
        let handle = temp
            .as_file()
            .try_clone()
            .map_err(|e| AttemptError::Fatal(QlscanError::io(temp.path(), e)))?;
        let mut out = tokio::fs::File::from_std(handle);

        let total = response.content_length();
        progress.start(total);
        let streamed = stream_body(response, &mut out, temp.path(), progress).await;
        progress.finish();
        let received = streamed?;

        if let Some(expected) = total {
            if received != expected {
                return Err(AttemptError::Retryable(format!(
                    "transfer truncated: {received} of {expected} bytes"
                )));
            }
        }

        debug!(path = %temp.path().display(), bytes = received, "bundle downloaded");
        Ok(temp)
    }
}

async fn stream_body(
    response: reqwest::Response,
    out: &mut tokio::fs::File,
    path: &Path,
    progress: &dyn ProgressSink,
) -> std::result::Result<u64, AttemptError> {
    let mut received: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AttemptError::Retryable(e.to_string()))?;
        out.write_all(&chunk)
            .await
            .map_err(|e| AttemptError::Fatal(QlscanError::io(path, e)))?;
        received += chunk.len() as u64;
        progress.advance(received);
    }
    out.flush()
        .await
        .map_err(|e| AttemptError::Fatal(QlscanError::io(path, e)))?;
    Ok(received)
}

/// Extract the version from a `codeql-bundle-v<version>` tag
#[must_use]
pub fn parse_bundle_tag(tag: &str) -> Option<String> {
    tag.trim()
        .strip_prefix(BUNDLE_TAG_PREFIX)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Builder for configuring a [`ReleaseClient`]
pub struct ReleaseClientBuilder {
    index: ReleaseIndex,
    api_timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
    retry_config: RetryConfig,
}

impl Default for ReleaseClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseClientBuilder {
    /// Create a builder for the public release index
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: ReleaseIndex::default(),
            api_timeout: DEFAULT_API_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("qlscan/{}", env!("CARGO_PKG_VERSION")),
            retry_config: RetryConfig::default(),
        }
    }

    /// Set the release index (useful for testing)
    #[must_use]
    pub fn index(mut self, index: ReleaseIndex) -> Self {
        self.index = index;
        self
    }

    /// Set the timeout for metadata requests
    #[must_use]
    pub const fn api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set retry configuration
    #[must_use]
    pub const fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ReleaseClient> {
        let http = HttpClient::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| QlscanError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(ReleaseClient {
            inner: Arc::new(ClientInner {
                http,
                index: self.index,
                retry_config: self.retry_config,
                api_timeout: self.api_timeout,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlscan_core::NoProgress;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ReleaseClient {
        ReleaseClient::builder()
            .index(ReleaseIndex::at(&server.uri()))
            .retry(RetryConfig::none())
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        total: AtomicU64,
        last: AtomicU64,
        calls: AtomicU64,
    }

    impl ProgressSink for Recorder {
        fn start(&self, total: Option<u64>) {
            self.total.store(total.unwrap_or(0), Ordering::SeqCst);
        }

        fn advance(&self, received: u64) {
            self.last.store(received, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn finish(&self) {}
    }

    #[test]
    fn test_parse_bundle_tag() {
        assert_eq!(parse_bundle_tag("codeql-bundle-v2.22.2"), Some("2.22.2".into()));
        assert_eq!(parse_bundle_tag("codeql-bundle-v"), None);
        assert_eq!(parse_bundle_tag("v3.0.0"), None);
    }

    #[tokio::test]
    async fn test_latest_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"tag_name": "codeql-bundle-v2.23.0"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let version = client_for(&server).latest_version().await.unwrap();
        assert_eq!(version, "2.23.0");
    }

    #[tokio::test]
    async fn test_latest_version_failure_is_recoverable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).latest_version().await.unwrap_err();
        assert!(matches!(err, QlscanError::VersionResolution(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_download_reports_progress() {
        let server = MockServer::start().await;
        let body = vec![7u8; 64 * 1024];
        Mock::given(method("GET"))
            .and(path("/download/codeql-bundle-v1.2.3/codeql-bundle-linux64.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let file = client_for(&server)
            .download_bundle("1.2.3", Platform::Linux64, dir.path(), &recorder)
            .await
            .unwrap();

        assert_eq!(std::fs::read(file.path()).unwrap(), body);
        assert_eq!(recorder.total.load(Ordering::SeqCst), body.len() as u64);
        assert_eq!(recorder.last.load(Ordering::SeqCst), body.len() as u64);
        assert!(recorder.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_download_not_found_leaves_nothing_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = client_for(&server)
            .download_bundle("9.9.9", Platform::Linux64, dir.path(), &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, QlscanError::Download { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let client = ReleaseClient::builder()
            .index(ReleaseIndex::at(&server.uri()))
            .retry(RetryConfig::new().max_retries(1).initial_backoff(Duration::from_millis(1)))
            .build()
            .unwrap();

        let dir = TempDir::new().unwrap();
        let err = client
            .download_bundle("1.0.0", Platform::Win64, dir.path(), &NoProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("502"));
    }
}
