//! # contract: the uniform source-control provider interface
//!
//! This module defines the single trait ([`Provider`]) every hosting backend
//! adapter implements, the canonical value types those adapters return, and
//! the error taxonomy shared across the crate.
//!
//! ## Interface & Extensibility
//! - Implement [`Provider`] to add a new hosting backend.
//! - All methods are async; adapters are immutable once constructed (token
//!   and base URL are fixed at construction), so a single instance can serve
//!   concurrent calls without shared mutable state.
//! - Construction goes through [`crate::factory::ProviderFactory`] so callers
//!   never branch on provider kind themselves.
//!
//! ## Mocking & Testing
//! - [`Provider`] and [`CredentialSource`] are annotated for `mockall` so the
//!   sync orchestrator and this crate's own tests can generate deterministic
//!   mocks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Canonical commit snapshot returned by every adapter.
///
/// When `unchanged` is true the caller's previously known SHA is still the
/// branch head: `sha` equals that known SHA and `message`/`date` carry no
/// information, because the heavier metadata fetch was skipped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub date: Option<String>,
    pub unchanged: bool,
}

impl CommitInfo {
    /// Short-circuit result for a head that still matches the known SHA.
    pub fn unchanged(sha: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            message: String::new(),
            date: None,
            unchanged: true,
        }
    }
}

/// Read-only repository snapshot. Never cached by this crate.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub full_name: Option<String>,
    pub default_branch: String,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing. `path` is the canonical identifier used
/// for all downstream hash and diff lookups; `size` is best-effort (GitLab's
/// tree listing omits it).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
}

/// Outcome of a commit-range diff.
///
/// `Unavailable` means "no information", not "no changes": the provider
/// failed, truncated the diff, or does not support diffing at all. Callers
/// must fall back to rechecking every tracked file individually instead of
/// trusting an incomplete list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangedFiles {
    Complete(Vec<String>),
    Unavailable,
}

impl ChangedFiles {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ChangedFiles::Unavailable)
    }
}

/// A caller-registered self-hosted GitLab deployment. Read-only input to
/// resolution; this crate never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GitLabInstance {
    pub name: String,
    pub base_url: String,
    pub token: String,
}

/// Git credentials for the Overleaf compile bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeAuth {
    pub username: String,
    pub password: String,
}

/// Whose credentials a resolution should use: the interactive caller's, or
/// an explicit user's (background/headless contexts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerScope {
    Current,
    User(String),
}

/// Error taxonomy for resolution and provider calls.
///
/// `FileNotFound` is deliberately distinct from `Api`: a tracked file that
/// vanished upstream lets the caller offer "stop tracking this file", while
/// other failures only warrant a generic banner or re-authentication prompt.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("unrecognised repository URL: {0}")]
    InvalidUrl(String),

    #[error("missing credentials for {provider}")]
    MissingCredentials { provider: &'static str },

    #[error("no configured GitLab instance matches {base_url}; it may have been removed")]
    SelfHostedInstanceNotFound { base_url: String },

    #[error("{file_path} was not found on {provider}")]
    FileNotFound {
        file_path: String,
        provider: String,
    },

    /// A provider rejected the request; the message is already
    /// audience-appropriate (see [`crate::interpret`]).
    #[error("{0}")]
    Api(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("hash batch did not complete within {0:?}")]
    BatchTimeout(Duration),

    #[error("unexpected response body: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn is_file_not_found(&self) -> bool {
        matches!(self, ProviderError::FileNotFound { .. })
    }
}

/// Uniform access contract for one hosting backend.
///
/// Implemented by [`crate::github::GitHubProvider`],
/// [`crate::gitlab::GitLabProvider`] (cloud and self-hosted) and
/// [`crate::overleaf::OverleafProvider`]. Callers obtain an instance from
/// the factory and treat all three identically.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Display name used in error messages ("GitHub", "GitLab (work)", ...).
    fn name(&self) -> String;

    /// Fetch the repository metadata snapshot.
    async fn fetch_repository_info(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryInfo, ProviderError>;

    /// Fetch the latest commit on `branch`.
    ///
    /// With `known_sha` supplied, a lightweight head lookup runs first; when
    /// the head still equals `known_sha` the result is
    /// [`CommitInfo::unchanged`] and the full metadata fetch is skipped.
    async fn fetch_latest_commit<'a>(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        known_sha: Option<&'a str>,
    ) -> Result<CommitInfo, ProviderError>;

    /// Fetch raw file bytes at `path` on `branch`. A deleted or renamed path
    /// yields [`ProviderError::FileNotFound`].
    async fn fetch_file_content(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Vec<u8>, ProviderError>;

    /// List one directory level, paginating transparently; callers never see
    /// partial pages.
    async fn list_files<'a>(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: Option<&'a str>,
    ) -> Result<Vec<FileEntry>, ProviderError>;

    /// Best-effort diff between two commits. Infallible by contract: any
    /// failure or truncation collapses to [`ChangedFiles::Unavailable`].
    async fn fetch_changed_files(
        &self,
        owner: &str,
        repo: &str,
        base_sha: &str,
        head_sha: &str,
    ) -> ChangedFiles;

    /// Content-identity hash for one path (cheap unchanged-file detection
    /// without downloading content).
    async fn fetch_file_hash(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<String, ProviderError>;

    /// Concurrent per-path hash lookup. One failed path yields `None` for
    /// that key only; exceeding the batch timeout fails the whole call, so
    /// a partial map is never mistaken for "these files are unchanged".
    async fn fetch_file_hash_batch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        paths: &[String],
    ) -> Result<HashMap<String, Option<String>>, ProviderError>;
}

/// Token/credential retrieval, supplied by the settings/session collaborator.
///
/// The scope argument selects between the interactive caller's credentials
/// and an explicit user id (background refresh). Absent credentials are
/// `Ok(None)`, not an error; the factory decides whether that is fatal.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn github_token(&self, scope: &CallerScope) -> Result<Option<String>, ProviderError>;

    async fn gitlab_token(&self, scope: &CallerScope) -> Result<Option<String>, ProviderError>;

    async fn overleaf_login(&self, scope: &CallerScope)
        -> Result<Option<BridgeAuth>, ProviderError>;
}
