//! GitLab adapter (REST v4), covering gitlab.com and self-hosted instances.
//!
//! Self-hosted is a parameterization, not a separate implementation: the
//! base URL and an instance name come from the matched [`GitLabInstance`]
//! and only affect URLs and error wording.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{
    ChangedFiles, CommitInfo, EntryKind, FileEntry, Provider, ProviderError, RepositoryInfo,
};
use crate::http::{encode_path, parse_json, Transport};
use crate::interpret::{describe_api_failure, ApiFailure};

const CLOUD_BASE: &str = "https://gitlab.com";
const PAGE_SIZE: usize = 100;

pub struct GitLabProvider {
    base_url: String,
    instance_name: Option<String>,
    token: Option<String>,
    transport: Arc<dyn Transport>,
}

impl GitLabProvider {
    /// Adapter for gitlab.com. The token is optional so public repositories
    /// can be previewed before signing in.
    pub fn cloud(token: Option<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: CLOUD_BASE.to_string(),
            instance_name: None,
            token,
            transport,
        }
    }

    /// Adapter for a registered self-hosted instance. Self-hosted always has
    /// a token; the instance stores one at registration time.
    pub fn self_hosted(
        base_url: impl Into<String>,
        instance_name: impl Into<String>,
        token: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            instance_name: Some(instance_name.into()),
            token: Some(token.into()),
            transport,
        }
    }

    fn api_base(&self) -> String {
        format!("{}/api/v4", self.base_url.trim_end_matches('/'))
    }

    fn project_id(owner: &str, repo: &str) -> String {
        encode_path(&format!("{owner}/{repo}"))
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), "textrack".to_string())];
        if let Some(token) = &self.token {
            headers.push(("PRIVATE-TOKEN".to_string(), token.clone()));
        }
        headers
    }

    fn api_error(&self, status: u16, owner: &str, repo: &str) -> ProviderError {
        ProviderError::Api(describe_api_failure(
            "GitLab",
            &ApiFailure {
                status,
                owner,
                repo,
                has_token: self.token.is_some(),
                instance_name: self.instance_name.as_deref(),
            },
        ))
    }

    /// Phase one of the SHA short-circuit: the branch endpoint carries the
    /// head commit id and is cheaper than commit metadata plus diff stats.
    /// Failures collapse to `None` and the full fetch decides.
    async fn try_quick_check(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        known_sha: &str,
    ) -> Option<CommitInfo> {
        let url = format!(
            "{}/projects/{}/repository/branches/{}",
            self.api_base(),
            Self::project_id(owner, repo),
            encode_path(branch)
        );
        let response = self.transport.get(&url, self.headers()).await.ok()?;
        if !response.is_success() {
            debug!(status = response.status, owner, repo, "quick head check failed");
            return None;
        }
        let json = parse_json(&response.body).ok()?;
        let head_sha = json
            .get("commit")
            .and_then(|c| c.get("id"))
            .and_then(|v| v.as_str())?;
        if head_sha == known_sha {
            debug!(owner, repo, branch, "branch head unchanged");
            Some(CommitInfo::unchanged(known_sha))
        } else {
            None
        }
    }
}

#[async_trait]
impl Provider for GitLabProvider {
    fn name(&self) -> String {
        match &self.instance_name {
            Some(instance) => format!("GitLab ({instance})"),
            None => "GitLab".to_string(),
        }
    }

    async fn fetch_repository_info(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo, ProviderError> {
        let url = format!("{}/projects/{}", self.api_base(), Self::project_id(owner, repo));
        let response = self.transport.get(&url, self.headers()).await?;
        if !response.is_success() {
            return Err(self.api_error(response.status, owner, repo));
        }
        let json = parse_json(&response.body)?;
        Ok(RepositoryInfo {
            name: json
                .get("path")
                .and_then(|v| v.as_str())
                .unwrap_or(repo)
                .to_string(),
            full_name: json
                .get("path_with_namespace")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            default_branch: json
                .get("default_branch")
                .and_then(|v| v.as_str())
                .unwrap_or("main")
                .to_string(),
            description: json
                .get("description")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            is_private: json
                .get("visibility")
                .and_then(|v| v.as_str())
                .map(|v| v != "public")
                .unwrap_or(true),
        })
    }

    async fn fetch_latest_commit<'a>(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        known_sha: Option<&'a str>,
    ) -> Result<CommitInfo, ProviderError> {
        if let Some(known) = known_sha {
            if let Some(unchanged) = self.try_quick_check(owner, repo, branch, known).await {
                return Ok(unchanged);
            }
        }

        let url = format!(
            "{}/projects/{}/repository/commits/{}",
            self.api_base(),
            Self::project_id(owner, repo),
            encode_path(branch)
        );
        let response = self.transport.get(&url, self.headers()).await?;
        if !response.is_success() {
            return Err(self.api_error(response.status, owner, repo));
        }
        let json = parse_json(&response.body)?;
        let sha = json
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Malformed("commit response without id".to_string()))?
            .to_string();
        Ok(CommitInfo {
            sha,
            message: json
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            date: json
                .get("committed_date")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            unchanged: false,
        })
    }

    async fn fetch_file_content(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        let url = format!(
            "{}/projects/{}/repository/files/{}/raw?ref={}",
            self.api_base(),
            Self::project_id(owner, repo),
            encode_path(path),
            encode_path(branch)
        );
        let response = self.transport.get(&url, self.headers()).await?;
        if response.status == 404 {
            return Err(ProviderError::FileNotFound {
                file_path: path.to_string(),
                provider: self.name(),
            });
        }
        if !response.is_success() {
            return Err(self.api_error(response.status, owner, repo));
        }
        Ok(response.body)
    }

    async fn list_files<'a>(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: Option<&'a str>,
    ) -> Result<Vec<FileEntry>, ProviderError> {
        let mut entries = Vec::new();
        let mut page = 1usize;
        loop {
            let mut url = format!(
                "{}/projects/{}/repository/tree?ref={}&per_page={PAGE_SIZE}&page={page}",
                self.api_base(),
                Self::project_id(owner, repo),
                encode_path(branch)
            );
            if let Some(dir) = path {
                url.push_str(&format!("&path={}", encode_path(dir)));
            }
            let response = self.transport.get(&url, self.headers()).await?;
            if !response.is_success() {
                return Err(self.api_error(response.status, owner, repo));
            }
            let json = parse_json(&response.body)?;
            let array = json.as_array().ok_or_else(|| {
                ProviderError::Malformed("expected a tree listing".to_string())
            })?;
            let page_len = array.len();
            entries.extend(array.iter().filter_map(parse_entry));
            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        debug!(owner, repo, count = entries.len(), "listed tree");
        Ok(entries)
    }

    async fn fetch_changed_files(
        &self,
        owner: &str,
        repo: &str,
        base_sha: &str,
        head_sha: &str,
    ) -> ChangedFiles {
        let url = format!(
            "{}/projects/{}/repository/compare?from={}&to={}",
            self.api_base(),
            Self::project_id(owner, repo),
            encode_path(base_sha),
            encode_path(head_sha)
        );
        let response = match self.transport.get(&url, self.headers()).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                debug!(status = response.status, owner, repo, "compare unavailable");
                return ChangedFiles::Unavailable;
            }
            Err(e) => {
                debug!(error = ?e, owner, repo, "compare request failed");
                return ChangedFiles::Unavailable;
            }
        };
        let json = match parse_json(&response.body) {
            Ok(json) => json,
            Err(_) => return ChangedFiles::Unavailable,
        };
        // A timed-out server-side compare yields a partial diff; partial is
        // as useless as none.
        if json
            .get("compare_timeout")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return ChangedFiles::Unavailable;
        }
        let diffs = match json.get("diffs").and_then(|v| v.as_array()) {
            Some(diffs) => diffs,
            None => return ChangedFiles::Unavailable,
        };
        let mut paths = Vec::with_capacity(diffs.len());
        for diff in diffs {
            if let Some(new_path) = diff.get("new_path").and_then(|v| v.as_str()) {
                paths.push(new_path.to_string());
            }
            let renamed = diff
                .get("renamed_file")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if renamed {
                if let Some(old_path) = diff.get("old_path").and_then(|v| v.as_str()) {
                    paths.push(old_path.to_string());
                }
            }
        }
        ChangedFiles::Complete(paths)
    }

    async fn fetch_file_hash(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/projects/{}/repository/files/{}?ref={}",
            self.api_base(),
            Self::project_id(owner, repo),
            encode_path(path),
            encode_path(branch)
        );
        let response = self.transport.get(&url, self.headers()).await?;
        if response.status == 404 {
            return Err(ProviderError::FileNotFound {
                file_path: path.to_string(),
                provider: self.name(),
            });
        }
        if !response.is_success() {
            return Err(self.api_error(response.status, owner, repo));
        }
        let json = parse_json(&response.body)?;
        json.get("content_sha256")
            .or_else(|| json.get("blob_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed("file response without hash".to_string()))
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
        "blob" => EntryKind::File,
        "tree" => EntryKind::Dir,
        _ => return None,
    };
    Some(FileEntry {
        name: value.get("name").and_then(|v| v.as_str())?.to_string(),
        path: value.get("path").and_then(|v| v.as_str())?.to_string(),
        kind,
        // The tree endpoint does not report sizes.
        size: None,
    })
}
