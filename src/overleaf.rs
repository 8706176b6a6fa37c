//! Overleaf adapter.
//!
//! Overleaf projects are never called directly: every operation forwards to
//! the compile-bridge service, which performs the real git work server-side
//! and answers over four endpoints (`/git/refs`, `/git/tree`, `/git/file`,
//! `/git/file-hash`). Because the bridge clones and reads actual
//! repositories, its transport is constructed with the long
//! [`crate::http::BRIDGE_TIMEOUT`] rather than the cloud request timeout.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::contract::{
    BridgeAuth, ChangedFiles, CommitInfo, EntryKind, FileEntry, Provider, ProviderError,
    RepositoryInfo,
};
use crate::http::{parse_json, HttpResponse, Transport};
use crate::interpret::{describe_api_failure, ApiFailure};

pub struct OverleafProvider {
    bridge_base_url: String,
    auth: BridgeAuth,
    transport: Arc<dyn Transport>,
}

impl OverleafProvider {
    pub fn new(
        bridge_base_url: impl Into<String>,
        auth: BridgeAuth,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            bridge_base_url: bridge_base_url.into(),
            auth,
            transport,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.bridge_base_url.trim_end_matches('/'))
    }

    /// The project id doubles as the repository name; its git remote lives
    /// under git.overleaf.com.
    fn git_url(project_id: &str) -> String {
        format!("https://git.overleaf.com/{project_id}")
    }

    fn base_body(&self, project_id: &str) -> serde_json::Value {
        json!({
            "gitUrl": Self::git_url(project_id),
            "auth": {
                "username": self.auth.username,
                "password": self.auth.password,
            },
        })
    }

    async fn post(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<HttpResponse, ProviderError> {
        self.transport
            .post_json(&self.endpoint(endpoint), Vec::new(), body)
            .await
    }

    fn api_error(&self, status: u16, owner: &str, repo: &str) -> ProviderError {
        ProviderError::Api(describe_api_failure(
            "Overleaf",
            &ApiFailure {
                status,
                owner,
                repo,
                // Overleaf is unreachable without stored git credentials.
                has_token: true,
                instance_name: None,
            },
        ))
    }

    /// The bridge reports a missing path either as a plain 404 or as an
    /// error payload carrying a not-found marker.
    fn is_file_not_found(response: &HttpResponse) -> bool {
        if response.status == 404 {
            return true;
        }
        !response.is_success() && response.body_text().to_lowercase().contains("not found")
    }
}

#[async_trait]
impl Provider for OverleafProvider {
    fn name(&self) -> String {
        "Overleaf".to_string()
    }

    async fn fetch_repository_info(
        &self,
        _owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo, ProviderError> {
        let response = self.post("/git/refs", self.base_body(repo)).await?;
        if !response.is_success() {
            return Err(self.api_error(response.status, "overleaf", repo));
        }
        let json = parse_json(&response.body)?;
        Ok(RepositoryInfo {
            name: repo.to_string(),
            full_name: None,
            default_branch: json
                .get("defaultBranch")
                .and_then(|v| v.as_str())
                .unwrap_or("master")
                .to_string(),
            description: None,
            // Overleaf projects are always private to their collaborators.
            is_private: true,
        })
    }

    async fn fetch_latest_commit<'a>(
        &self,
        _owner: &str,
        repo: &str,
        branch: &str,
        known_sha: Option<&'a str>,
    ) -> Result<CommitInfo, ProviderError> {
        let mut body = self.base_body(repo);
        body["branch"] = json!(branch);
        if let Some(known) = known_sha {
            body["knownSha"] = json!(known);
        }
        let response = self.post("/git/refs", body).await?;
        if !response.is_success() {
            return Err(self.api_error(response.status, "overleaf", repo));
        }
        let json = parse_json(&response.body)?;
        // The unchanged decision is made by the bridge, which already knows
        // the head SHA after its server-side fetch.
        let unchanged = json
            .get("unchanged")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if unchanged {
            if let Some(known) = known_sha {
                debug!(repo, branch, "bridge reports head unchanged");
                return Ok(CommitInfo::unchanged(known));
            }
        }
        let sha = json
            .get("sha")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Malformed("refs response without sha".to_string()))?
            .to_string();
        Ok(CommitInfo {
            sha,
            message: json
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            date: json.get("date").and_then(|v| v.as_str()).map(str::to_string),
            unchanged: false,
        })
    }

    async fn fetch_file_content(
        &self,
        _owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let mut body = self.base_body(repo);
        body["ref"] = json!(branch);
        body["path"] = json!(path);
        let response = self.post("/git/file", body).await?;
        if Self::is_file_not_found(&response) {
            return Err(ProviderError::FileNotFound {
                file_path: path.to_string(),
                provider: self.name(),
            });
        }
        if !response.is_success() {
            return Err(self.api_error(response.status, "overleaf", repo));
        }
        Ok(response.body)
    }

    async fn list_files<'a>(
        &self,
        _owner: &str,
        repo: &str,
        branch: &str,
        path: Option<&'a str>,
    ) -> Result<Vec<FileEntry>, ProviderError> {
        let mut body = self.base_body(repo);
        body["ref"] = json!(branch);
        if let Some(dir) = path {
            body["path"] = json!(dir);
        }
        let response = self.post("/git/tree", body).await?;
        if !response.is_success() {
            return Err(self.api_error(response.status, "overleaf", repo));
        }
        let json = parse_json(&response.body)?;
        let entries = json
            .get("entries")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::Malformed("tree response without entries".to_string()))?
            .iter()
            .filter_map(parse_entry)
            .collect::<Vec<_>>();
        debug!(repo, count = entries.len(), "listed bridge tree");
        Ok(entries)
    }

    /// Diffing is not supported through the bridge; callers fall back to
    /// rechecking every tracked file, same as a failed cloud diff.
    async fn fetch_changed_files(
        &self,
        _owner: &str,
        _repo: &str,
        _base_sha: &str,
        _head_sha: &str,
    ) -> ChangedFiles {
        ChangedFiles::Unavailable
    }

    async fn fetch_file_hash(
        &self,
        _owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<String, ProviderError> {
        let mut body = self.base_body(repo);
        body["ref"] = json!(branch);
        body["path"] = json!(path);
        let response = self.post("/git/file-hash", body).await?;
        if Self::is_file_not_found(&response) {
            return Err(ProviderError::FileNotFound {
                file_path: path.to_string(),
                provider: self.name(),
            });
        }
        if !response.is_success() {
            return Err(self.api_error(response.status, "overleaf", repo));
        }
        let json = parse_json(&response.body)?;
        json.get("hash")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed("file-hash response without hash".to_string()))
    }

    async fn fetch_file_hash_batch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        paths: &[String],
    ) -> Result<HashMap<String, Option<String>>, ProviderError> {
        let tasks = paths.iter().map(|path| {
            let path = path.clone();
            async move {
                let hash = self.fetch_file_hash(owner, repo, branch, &path).await.ok();
                (path, hash)
            }
        });
        crate::http::join_hash_batch(tasks).await
    }
}

fn parse_entry(value: &serde_json::Value) -> Option<FileEntry> {
    let kind = match value.get("type").and_then(|v| v.as_str())? {
        "file" => EntryKind::File,
        "dir" => EntryKind::Dir,
        _ => return None,
    };
    Some(FileEntry {
        name: value.get("name").and_then(|v| v.as_str())?.to_string(),
        path: value.get("path").and_then(|v| v.as_str())?.to_string(),
        kind,
        size: value.get("size").and_then(|v| v.as_u64()),
    })
}
