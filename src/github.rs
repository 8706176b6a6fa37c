//! GitHub adapter (api.github.com REST v3).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{
    ChangedFiles, CommitInfo, EntryKind, FileEntry, Provider, ProviderError, RepositoryInfo,
};
use crate::http::{encode_path, encode_path_segments, parse_json, Transport};
use crate::interpret::{describe_api_failure, ApiFailure};

const API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;

/// GitHub's compare endpoint lists at most this many files; a diff that hits
/// the cap may be truncated and cannot be trusted.
const COMPARE_FILE_CAP: usize = 300;

pub struct GitHubProvider {
    token: Option<String>,
    transport: Arc<dyn Transport>,
}

impl GitHubProvider {
    pub fn new(token: Option<String>, transport: Arc<dyn Transport>) -> Self {
        Self { token, transport }
    }

    fn headers(&self, accept: &str) -> Vec<(String, String)> {
        let mut headers = vec![
            ("User-Agent".to_string(), "textrack".to_string()),
            ("Accept".to_string(), accept.to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    fn api_error(&self, status: u16, owner: &str, repo: &str) -> ProviderError {
        ProviderError::Api(describe_api_failure(
            "GitHub",
            &ApiFailure {
                status,
                owner,
                repo,
                has_token: self.token.is_some(),
                instance_name: None,
            },
        ))
    }

    /// Phase one of the SHA short-circuit: ask for just the head SHA via the
    /// `vnd.github.sha` media type. Any failure falls through to the full
    /// fetch, so errors collapse to `None` here.
    async fn try_quick_check(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        known_sha: &str,
    ) -> Option<CommitInfo> {
        let url = format!(
            "{API_BASE}/repos/{owner}/{repo}/commits/{}",
            encode_path(branch)
        );
        let response = self
            .transport
            .get(&url, self.headers("application/vnd.github.sha"))
            .await
            .ok()?;
        if !response.is_success() {
            debug!(status = response.status, owner, repo, "quick head check failed");
            return None;
        }
        let head_sha = response.body_text().trim().to_string();
        if head_sha == known_sha {
            debug!(owner, repo, branch, "branch head unchanged");
            Some(CommitInfo::unchanged(known_sha))
        } else {
            None
        }
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn name(&self) -> String {
        "GitHub".to_string()
    }

    async fn fetch_repository_info(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo, ProviderError> {
        let url = format!("{API_BASE}/repos/{owner}/{repo}");
        let response = self
            .transport
            .get(&url, self.headers("application/vnd.github+json"))
            .await?;
        if !response.is_success() {
            return Err(self.api_error(response.status, owner, repo));
        }
        let json = parse_json(&response.body)?;
        Ok(RepositoryInfo {
            name: json
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(repo)
                .to_string(),
            full_name: json
                .get("full_name")
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
                .map(str::to_string),
            is_private: json
                .get("private")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
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
            "{API_BASE}/repos/{owner}/{repo}/commits/{}",
            encode_path(branch)
        );
        let response = self
            .transport
            .get(&url, self.headers("application/vnd.github+json"))
            .await?;
        if !response.is_success() {
            return Err(self.api_error(response.status, owner, repo));
        }
        let json = parse_json(&response.body)?;
        let sha = json
            .get("sha")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Malformed("commit response without sha".to_string()))?
            .to_string();
        let commit = json.get("commit");
        Ok(CommitInfo {
            sha,
            message: commit
                .and_then(|c| c.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            date: commit
                .and_then(|c| c.get("committer"))
                .or_else(|| commit.and_then(|c| c.get("author")))
                .and_then(|p| p.get("date"))
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
            "{API_BASE}/repos/{owner}/{repo}/contents/{}?ref={}",
            encode_path_segments(path),
            encode_path(branch)
        );
        // The raw media type skips the base64 inflation of the JSON shape.
        let response = self
            .transport
            .get(&url, self.headers("application/vnd.github.raw"))
            .await?;
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
        let dir = path.unwrap_or("");
        let mut entries = Vec::new();
        let mut page = 1usize;
        loop {
            let url = format!(
                "{API_BASE}/repos/{owner}/{repo}/contents/{}?ref={}&per_page={PAGE_SIZE}&page={page}",
                encode_path_segments(dir),
                encode_path(branch)
            );
            let response = self
                .transport
                .get(&url, self.headers("application/vnd.github+json"))
                .await?;
            if !response.is_success() {
                return Err(self.api_error(response.status, owner, repo));
            }
            let json = parse_json(&response.body)?;
            let array = json.as_array().ok_or_else(|| {
                ProviderError::Malformed("expected a directory listing".to_string())
            })?;
            let page_len = array.len();
            entries.extend(array.iter().filter_map(parse_entry));
            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        debug!(owner, repo, dir, count = entries.len(), "listed directory");
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
            "{API_BASE}/repos/{owner}/{repo}/compare/{}...{}",
            encode_path(base_sha),
            encode_path(head_sha)
        );
        let response = match self
            .transport
            .get(&url, self.headers("application/vnd.github+json"))
            .await
        {
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
        let files = match json.get("files").and_then(|v| v.as_array()) {
            Some(files) => files,
            None => return ChangedFiles::Unavailable,
        };
        if files.len() >= COMPARE_FILE_CAP {
            return ChangedFiles::Unavailable;
        }
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            if let Some(filename) = file.get("filename").and_then(|v| v.as_str()) {
                paths.push(filename.to_string());
            }
            if let Some(previous) = file.get("previous_filename").and_then(|v| v.as_str()) {
                paths.push(previous.to_string());
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
            "{API_BASE}/repos/{owner}/{repo}/contents/{}?ref={}",
            encode_path_segments(path),
            encode_path(branch)
        );
        let response = self
            .transport
            .get(&url, self.headers("application/vnd.github+json"))
            .await?;
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
        json.get("sha")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed("content response without sha".to_string()))
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
