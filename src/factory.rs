//! Provider factory: the single place adapters are constructed.
//!
//! Given a raw repository URL, the caller's registered self-hosted
//! instances and a credential source, [`ProviderFactory`] resolves which
//! adapter to build and with which token/base-URL pair. Callers hold the
//! returned `Box<dyn Provider>` and never branch on provider kind
//! themselves.

use std::sync::Arc;

use tracing::info;

use crate::contract::{CallerScope, CredentialSource, GitLabInstance, Provider, ProviderError};
use crate::github::GitHubProvider;
use crate::gitlab::GitLabProvider;
use crate::http::{HttpTransport, Transport, BRIDGE_TIMEOUT, REQUEST_TIMEOUT};
use crate::overleaf::OverleafProvider;
use crate::resolve::{classify, ProviderKind, RepoUrl};

/// An adapter ready for use, plus the coordinates it was resolved for.
pub struct ResolvedRepository {
    pub provider: Box<dyn Provider>,
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Debug for ResolvedRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedRepository")
            .field("provider", &self.provider.name())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish()
    }
}

pub struct ProviderFactory {
    bridge_base_url: String,
    cloud_transport: Arc<dyn Transport>,
    bridge_transport: Arc<dyn Transport>,
}

impl ProviderFactory {
    /// Build a factory with real HTTP transports: the short request timeout
    /// for cloud APIs and the long one for the compile bridge.
    pub fn new(bridge_base_url: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            bridge_base_url: bridge_base_url.into(),
            cloud_transport: Arc::new(HttpTransport::new(REQUEST_TIMEOUT)?),
            bridge_transport: Arc::new(HttpTransport::new(BRIDGE_TIMEOUT)?),
        })
    }

    /// Test seam: inject transports instead of opening sockets.
    pub fn with_transports(
        bridge_base_url: impl Into<String>,
        cloud_transport: Arc<dyn Transport>,
        bridge_transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            bridge_base_url: bridge_base_url.into(),
            cloud_transport,
            bridge_transport,
        }
    }

    /// Resolve a raw URL into a ready adapter.
    ///
    /// Fails with `InvalidUrl` when the URL cannot be classified,
    /// `SelfHostedInstanceNotFound` when a self-hosted instance was removed
    /// after the repository was registered, and `MissingCredentials` when
    /// Overleaf credentials are absent. Cloud tokens are optional (public
    /// repositories work without one).
    pub async fn resolve(
        &self,
        url: &str,
        instances: &[GitLabInstance],
        credentials: &dyn CredentialSource,
        scope: &CallerScope,
    ) -> Result<ResolvedRepository, ProviderError> {
        let parsed =
            classify(url, instances).ok_or_else(|| ProviderError::InvalidUrl(url.to_string()))?;
        self.resolve_classified(&parsed, instances, credentials, scope)
            .await
    }

    /// Resolve an already-classified URL, e.g. one persisted when the
    /// repository was first registered.
    pub async fn resolve_classified(
        &self,
        parsed: &RepoUrl,
        instances: &[GitLabInstance],
        credentials: &dyn CredentialSource,
        scope: &CallerScope,
    ) -> Result<ResolvedRepository, ProviderError> {
        let provider: Box<dyn Provider> = match parsed.kind {
            ProviderKind::GitHub => {
                let token = credentials.github_token(scope).await?;
                Box::new(GitHubProvider::new(token, self.cloud_transport.clone()))
            }
            ProviderKind::GitLab => {
                let token = credentials.gitlab_token(scope).await?;
                Box::new(GitLabProvider::cloud(token, self.cloud_transport.clone()))
            }
            ProviderKind::GitLabSelfHosted => {
                // The instance may have been deleted since the repository
                // was registered; that must fail loudly, never silently
                // fall back to gitlab.com.
                let base_url = parsed.instance_base_url.clone().unwrap_or_default();
                let instance = instances
                    .iter()
                    .find(|instance| instance.base_url == base_url)
                    .ok_or(ProviderError::SelfHostedInstanceNotFound {
                        base_url: base_url.clone(),
                    })?;
                Box::new(GitLabProvider::self_hosted(
                    instance.base_url.clone(),
                    instance.name.clone(),
                    instance.token.clone(),
                    self.cloud_transport.clone(),
                ))
            }
            ProviderKind::Overleaf => {
                let auth = credentials
                    .overleaf_login(scope)
                    .await?
                    .ok_or(ProviderError::MissingCredentials {
                        provider: "Overleaf",
                    })?;
                Box::new(OverleafProvider::new(
                    self.bridge_base_url.clone(),
                    auth,
                    self.bridge_transport.clone(),
                ))
            }
        };
        info!(
            provider = %provider.name(),
            owner = %parsed.owner,
            repo = %parsed.repo,
            "resolved repository"
        );
        Ok(ResolvedRepository {
            provider,
            owner: parsed.owner.clone(),
            repo: parsed.repo.clone(),
        })
    }

    /// Credential-free resolution for public-repository preview, used before
    /// a user has authenticated. Only the two cloud providers work without
    /// credentials; self-hosted and Overleaf yield `None`.
    pub fn resolve_public(
        &self,
        url: &str,
        instances: &[GitLabInstance],
    ) -> Option<ResolvedRepository> {
        let parsed = classify(url, instances)?;
        let provider: Box<dyn Provider> = match parsed.kind {
            ProviderKind::GitHub => {
                Box::new(GitHubProvider::new(None, self.cloud_transport.clone()))
            }
            ProviderKind::GitLab => {
                Box::new(GitLabProvider::cloud(None, self.cloud_transport.clone()))
            }
            ProviderKind::GitLabSelfHosted | ProviderKind::Overleaf => return None,
        };
        Some(ResolvedRepository {
            provider,
            owner: parsed.owner,
            repo: parsed.repo,
        })
    }
}
