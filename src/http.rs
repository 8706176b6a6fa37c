//! Bounded HTTP transport shared by all provider adapters.
//!
//! Two timeout tiers exist: a short one for ordinary cloud metadata/content
//! calls and a longer one for every Overleaf bridge call (the bridge runs
//! real git operations server-side). The batch-hash fan-out has its own
//! bound, strictly longer than a single request, applied around the join in
//! [`join_hash_batch`]. No retries happen at this layer.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::contract::ProviderError;

/// Single-request timeout for cloud provider calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall bound on the batch-hash fan-out join.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Single-request timeout for Overleaf bridge calls.
pub const BRIDGE_TIMEOUT: Duration = Duration::from_secs(40);

/// A fully buffered HTTP response. Adapters branch on `status` before
/// touching the body, so the two travel together.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal outbound HTTP seam. Real traffic goes through [`HttpTransport`];
/// tests inject a `MockTransport` and assert on call counts.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<HttpResponse, ProviderError>;

    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: serde_json::Value,
    ) -> Result<HttpResponse, ProviderError>;
}

/// reqwest-backed transport with a fixed per-request timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<HttpResponse, ProviderError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(format!("failed to read response body: {e}")))?
            .to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<HttpResponse, ProviderError> {
        tracing::debug!(url = %url, "outbound GET");
        let mut request = self.client.get(url);
        for (name, value) in &headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("GET {url} failed: {e}")))?;
        Self::read(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: serde_json::Value,
    ) -> Result<HttpResponse, ProviderError> {
        tracing::debug!(url = %url, "outbound POST");
        let mut request = self.client.post(url).json(&body);
        for (name, value) in &headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("POST {url} failed: {e}")))?;
        Self::read(response).await
    }
}

/// Parse a response body as JSON without panicking on garbage.
pub fn parse_json(body: &[u8]) -> Result<serde_json::Value, ProviderError> {
    serde_json::from_slice(body).map_err(|e| {
        let preview: String = String::from_utf8_lossy(body).chars().take(120).collect();
        ProviderError::Malformed(format!("invalid JSON ({e}): {preview}"))
    })
}

/// Percent-encode one URL component. Encodes `/`, so GitLab project ids
/// (`owner%2Frepo`) and in-repo file paths come out as single path segments.
pub fn encode_path(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Percent-encode a repo-relative path while keeping `/` separators, for
/// APIs that take the path as nested URL segments (GitHub contents).
pub fn encode_path_segments(path: &str) -> String {
    path.split('/').map(encode_path).collect::<Vec<_>>().join("/")
}

/// Join concurrent per-path hash lookups under [`BATCH_TIMEOUT`].
///
/// Each task resolves to `(path, Option<hash>)`; a task that already mapped
/// its own failure to `None` cannot sink the batch. An elapsed timeout fails
/// the whole call instead of returning a partial map.
pub async fn join_hash_batch<I, Fut>(
    tasks: I,
) -> Result<HashMap<String, Option<String>>, ProviderError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = (String, Option<String>)>,
{
    match tokio::time::timeout(BATCH_TIMEOUT, futures::future::join_all(tasks)).await {
        Ok(pairs) => Ok(pairs.into_iter().collect()),
        Err(_) => Err(ProviderError::BatchTimeout(BATCH_TIMEOUT)),
    }
}
