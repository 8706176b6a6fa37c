// The batch bound must fail the whole call rather than hand back a partial
// map; a partial map would read as "the missing files are unchanged".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use textrack_core::contract::{Provider, ProviderError};
use textrack_core::github::GitHubProvider;
use textrack_core::http::{HttpResponse, Transport, BATCH_TIMEOUT, REQUEST_TIMEOUT};

/// Transport whose every request hangs well past the batch bound.
struct HungTransport;

#[async_trait]
impl Transport for HungTransport {
    async fn get(
        &self,
        _url: &str,
        _headers: Vec<(String, String)>,
    ) -> Result<HttpResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok(HttpResponse {
            status: 200,
            body: b"{\"sha\":\"late\"}".to_vec(),
        })
    }

    async fn post_json(
        &self,
        _url: &str,
        _headers: Vec<(String, String)>,
        _body: serde_json::Value,
    ) -> Result<HttpResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok(HttpResponse {
            status: 200,
            body: Vec::new(),
        })
    }
}

#[test]
fn batch_bound_is_strictly_longer_than_a_single_request() {
    assert!(BATCH_TIMEOUT > REQUEST_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn overrunning_batch_fails_whole_call_without_partial_map() {
    let provider = GitHubProvider::new(None, Arc::new(HungTransport));
    let paths = vec!["main.tex".to_string(), "refs.bib".to_string()];

    let err = provider
        .fetch_file_hash_batch("ada", "thesis", "main", &paths)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::BatchTimeout(_)));
}
