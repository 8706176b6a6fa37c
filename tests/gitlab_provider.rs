use std::sync::Arc;

use textrack_core::contract::{ChangedFiles, Provider, ProviderError};
use textrack_core::gitlab::GitLabProvider;
use textrack_core::http::{HttpResponse, MockTransport};

fn ok(body: impl Into<Vec<u8>>) -> Result<HttpResponse, ProviderError> {
    Ok(HttpResponse {
        status: 200,
        body: body.into(),
    })
}

fn status(code: u16) -> Result<HttpResponse, ProviderError> {
    Ok(HttpResponse {
        status: code,
        body: Vec::new(),
    })
}

fn cloud(transport: MockTransport) -> GitLabProvider {
    GitLabProvider::cloud(Some("glpat-test".to_string()), Arc::new(transport))
}

#[tokio::test]
async fn project_id_is_urlencoded_including_subgroups() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .withf(|url, _| url == "https://gitlab.com/api/v4/projects/lab%2Fpapers%2Fthesis")
        .times(1)
        .returning(|_, _| {
            ok(serde_json::json!({
                "path": "thesis",
                "path_with_namespace": "lab/papers/thesis",
                "default_branch": "main",
                "description": "",
                "visibility": "private"
            })
            .to_string())
        });

    let info = cloud(transport)
        .fetch_repository_info("lab/papers", "thesis")
        .await
        .unwrap();
    assert_eq!(info.full_name.as_deref(), Some("lab/papers/thesis"));
    assert!(info.is_private);
    // Empty descriptions collapse to None.
    assert_eq!(info.description, None);
}

#[tokio::test]
async fn latest_commit_short_circuits_via_branch_endpoint() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .withf(|url, _| url.contains("/repository/branches/main"))
        .times(1)
        .returning(|_, _| {
            ok(serde_json::json!({ "commit": { "id": "abc123" } }).to_string())
        });

    let commit = cloud(transport)
        .fetch_latest_commit("ada", "thesis", "main", Some("abc123"))
        .await
        .unwrap();
    assert!(commit.unchanged);
    assert_eq!(commit.sha, "abc123");
}

#[tokio::test]
async fn latest_commit_fetches_metadata_when_head_moved() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .withf(|url, _| url.contains("/repository/branches/"))
        .times(1)
        .returning(|_, _| {
            ok(serde_json::json!({ "commit": { "id": "def456" } }).to_string())
        });
    transport
        .expect_get()
        .withf(|url, _| url.contains("/repository/commits/"))
        .times(1)
        .returning(|_, _| {
            ok(serde_json::json!({
                "id": "def456",
                "message": "Fix bibliography",
                "committed_date": "2024-05-02T08:30:00Z"
            })
            .to_string())
        });

    let commit = cloud(transport)
        .fetch_latest_commit("ada", "thesis", "main", Some("abc123"))
        .await
        .unwrap();
    assert!(!commit.unchanged);
    assert_eq!(commit.sha, "def456");
    assert_eq!(commit.date.as_deref(), Some("2024-05-02T08:30:00Z"));
}

#[tokio::test]
async fn quick_check_failure_falls_through_to_full_fetch() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .withf(|url, _| url.contains("/repository/branches/"))
        .times(1)
        .returning(|_, _| Err(ProviderError::Network("timeout".to_string())));
    transport
        .expect_get()
        .withf(|url, _| url.contains("/repository/commits/"))
        .times(1)
        .returning(|_, _| ok(serde_json::json!({ "id": "def456", "message": "m" }).to_string()));

    let commit = cloud(transport)
        .fetch_latest_commit("ada", "thesis", "main", Some("abc123"))
        .await
        .unwrap();
    assert_eq!(commit.sha, "def456");
}

#[tokio::test]
async fn deleted_file_raises_file_not_found_with_path() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .withf(|url, _| url.contains("/repository/files/chapters%2Fold.tex/raw"))
        .times(1)
        .returning(|_, _| status(404));

    let err = cloud(transport)
        .fetch_file_content("ada", "thesis", "main", "chapters/old.tex")
        .await
        .unwrap_err();
    assert!(err.is_file_not_found());
    match err {
        ProviderError::FileNotFound { file_path, .. } => {
            assert_eq!(file_path, "chapters/old.tex")
        }
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn self_hosted_unauthorized_names_the_instance() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .withf(|url, _| url.starts_with("https://gitlab.uni.edu/api/v4/"))
        .times(1)
        .returning(|_, _| status(401));

    let provider = GitLabProvider::self_hosted(
        "https://gitlab.uni.edu",
        "uni-gitlab",
        "glpat-stale",
        Arc::new(transport),
    );
    let err = provider
        .fetch_repository_info("ada", "thesis")
        .await
        .unwrap_err();
    match err {
        ProviderError::Api(message) => {
            assert!(message.contains("uni-gitlab"));
            assert!(message.contains("personal access token"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(provider.name(), "GitLab (uni-gitlab)");
}

#[tokio::test]
async fn compare_timeout_collapses_to_unavailable() {
    let mut transport = MockTransport::new();
    transport.expect_get().times(1).returning(|_, _| {
        ok(serde_json::json!({
            "compare_timeout": true,
            "diffs": [{ "new_path": "main.tex" }]
        })
        .to_string())
    });

    let result = cloud(transport)
        .fetch_changed_files("ada", "thesis", "abc", "def")
        .await;
    assert!(result.is_unavailable());
}

#[tokio::test]
async fn compare_includes_old_paths_of_renames() {
    let mut transport = MockTransport::new();
    transport.expect_get().times(1).returning(|_, _| {
        ok(serde_json::json!({
            "diffs": [
                { "new_path": "chapters/intro.tex", "old_path": "intro.tex", "renamed_file": true },
                { "new_path": "main.tex", "old_path": "main.tex", "renamed_file": false }
            ]
        })
        .to_string())
    });

    let result = cloud(transport)
        .fetch_changed_files("ada", "thesis", "abc", "def")
        .await;
    assert_eq!(
        result,
        ChangedFiles::Complete(vec![
            "chapters/intro.tex".to_string(),
            "intro.tex".to_string(),
            "main.tex".to_string(),
        ])
    );
}

#[tokio::test]
async fn file_hash_prefers_content_sha_and_falls_back_to_blob_id() {
    let mut transport = MockTransport::new();
    transport
        .expect_get()
        .withf(|url, _| url.contains("main.tex"))
        .times(1)
        .returning(|_, _| {
            ok(serde_json::json!({ "content_sha256": "c256", "blob_id": "b1" }).to_string())
        });
    transport
        .expect_get()
        .withf(|url, _| url.contains("refs.bib"))
        .times(1)
        .returning(|_, _| ok(serde_json::json!({ "blob_id": "b2" }).to_string()));

    let provider = cloud(transport);
    let first = provider
        .fetch_file_hash("ada", "thesis", "main", "main.tex")
        .await
        .unwrap();
    let second = provider
        .fetch_file_hash("ada", "thesis", "main", "refs.bib")
        .await
        .unwrap();
    assert_eq!(first, "c256");
    assert_eq!(second, "b2");
}

#[tokio::test]
async fn tree_listing_paginates_and_omits_sizes() {
    let mut transport = MockTransport::new();
    for (page, count) in [(1usize, 100usize), (2, 30)] {
        let start = (page - 1) * 100;
        let entries: Vec<serde_json::Value> = (start..start + count)
            .map(|i| {
                serde_json::json!({
                    "name": format!("f{i}.tex"),
                    "path": format!("f{i}.tex"),
                    "type": "blob"
                })
            })
            .collect();
        transport
            .expect_get()
            .withf(move |url, _| url.contains(&format!("&page={page}")))
            .times(1)
            .returning(move |_, _| ok(serde_json::Value::Array(entries.clone()).to_string()));
    }

    let entries = cloud(transport)
        .list_files("ada", "thesis", "main", None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 130);
    assert!(entries.iter().all(|e| e.size.is_none()));
}
