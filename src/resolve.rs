//! URL classification: raw repository URL → provider kind plus coordinates.
//!
//! Pure string work, no I/O. Overleaf shapes are recognised first because
//! their paths do not follow `/owner/repo`; self-hosted GitLab instances are
//! tested before the cloud hosts so a registered deployment is never
//! mistaken for gitlab.com. Unrecognised URLs classify to `None`, never an
//! error; raising is the factory's job.

use crate::contract::GitLabInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    GitHub,
    GitLab,
    GitLabSelfHosted,
    Overleaf,
}

/// A classified repository URL. `instance_base_url` is set only for
/// self-hosted GitLab and carries the configured base URL of the matched
/// instance, exactly as registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrl {
    pub kind: ProviderKind,
    pub owner: String,
    pub repo: String,
    pub instance_base_url: Option<String>,
}

/// Classify `url` against the known hosts and the caller's configured
/// self-hosted instances. When several instance base URLs prefix-match the
/// URL, the longest match wins.
pub fn classify(url: &str, instances: &[GitLabInstance]) -> Option<RepoUrl> {
    let normalized = normalize(url);
    if normalized.is_empty() {
        return None;
    }

    if let Some(repo_url) = classify_overleaf(&normalized) {
        return Some(repo_url);
    }

    if let Some(repo_url) = classify_self_hosted(&normalized, instances) {
        return Some(repo_url);
    }

    let (host, path) = split_host(&normalized)?;
    match host {
        "github.com" => {
            let segments = path_segments(path);
            if segments.len() < 2 {
                return None;
            }
            Some(RepoUrl {
                kind: ProviderKind::GitHub,
                owner: segments[0].to_string(),
                repo: strip_git_suffix(segments[1]).to_string(),
                instance_base_url: None,
            })
        }
        "gitlab.com" => {
            let (owner, repo) = split_gitlab_path(path)?;
            Some(RepoUrl {
                kind: ProviderKind::GitLab,
                owner,
                repo,
                instance_base_url: None,
            })
        }
        _ => None,
    }
}

/// Strip scheme, leading `www.`, trailing slash and surrounding whitespace.
fn normalize(url: &str) -> String {
    let mut s = url.trim();
    if let Some(rest) = s.strip_prefix("https://") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("http://") {
        s = rest;
    }
    let s = s.strip_prefix("www.").unwrap_or(s);
    s.trim_end_matches('/').to_string()
}

fn split_host(normalized: &str) -> Option<(&str, &str)> {
    match normalized.find('/') {
        Some(idx) => Some((&normalized[..idx], &normalized[idx + 1..])),
        None => Some((normalized, "")),
    }
}

fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn strip_git_suffix(segment: &str) -> &str {
    segment.strip_suffix(".git").unwrap_or(segment)
}

/// Two accepted Overleaf shapes: `overleaf.com/project/<id>` and
/// `git.overleaf.com/<id>`. The project id stands in for the repo name;
/// the owner slot is fixed since Overleaf has no owner/repo hierarchy.
fn classify_overleaf(normalized: &str) -> Option<RepoUrl> {
    let (host, path) = split_host(normalized)?;
    let segments = path_segments(path);
    let project_id = match host {
        "overleaf.com" if segments.len() == 2 && segments[0] == "project" => segments[1],
        "git.overleaf.com" if segments.len() == 1 => strip_git_suffix(segments[0]),
        _ => return None,
    };
    if project_id.is_empty() {
        return None;
    }
    Some(RepoUrl {
        kind: ProviderKind::Overleaf,
        owner: "overleaf".to_string(),
        repo: project_id.to_string(),
        instance_base_url: None,
    })
}

fn classify_self_hosted(normalized: &str, instances: &[GitLabInstance]) -> Option<RepoUrl> {
    let mut best: Option<(&GitLabInstance, String)> = None;
    for instance in instances {
        let base = normalize(&instance.base_url);
        if base.is_empty() {
            continue;
        }
        let rest = match normalized.strip_prefix(&base) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => continue,
        };
        let longer = match &best {
            Some((current, _)) => base.len() > normalize(&current.base_url).len(),
            None => true,
        };
        if longer {
            best = Some((instance, rest.to_string()));
        }
    }
    let (instance, rest) = best?;
    let (owner, repo) = split_gitlab_path(rest.trim_start_matches('/'))?;
    Some(RepoUrl {
        kind: ProviderKind::GitLabSelfHosted,
        owner,
        repo,
        instance_base_url: Some(instance.base_url.clone()),
    })
}

/// GitLab project paths may span subgroups; everything before the last
/// segment is the owner. Viewer suffixes (`/-/tree/main`, ...) are cut.
fn split_gitlab_path(path: &str) -> Option<(String, String)> {
    let path = match path.find("/-/") {
        Some(idx) => &path[..idx],
        None => path,
    };
    let segments = path_segments(path);
    if segments.len() < 2 {
        return None;
    }
    let repo = strip_git_suffix(segments[segments.len() - 1]).to_string();
    let owner = segments[..segments.len() - 1].join("/");
    Some((owner, repo))
}
