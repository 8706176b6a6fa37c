//! Shared HTTP-status → user-facing message policy.
//!
//! Every adapter routes its non-2xx statuses through [`describe_api_failure`]
//! instead of wording errors ad hoc, so the same status reads the same way
//! regardless of which backend produced it. The mapping is pure.

/// Context for interpreting a failed provider response.
#[derive(Debug, Clone, Copy)]
pub struct ApiFailure<'a> {
    pub status: u16,
    pub owner: &'a str,
    pub repo: &'a str,
    pub has_token: bool,
    /// Set for self-hosted GitLab so the message can point at the specific
    /// instance whose token went stale.
    pub instance_name: Option<&'a str>,
}

/// Map a failed response to one human-readable, provider-aware message.
///
/// Wording rules:
/// - 401: credential invalid or expired. Self-hosted names the instance and
///   suggests re-entering a personal access token.
/// - 403: access denied; differs on whether a token was present.
/// - 404: without a token this hints at signing in, with a token it hints at
///   checking access. Unauthenticated callers are never told whether a
///   private repository exists.
/// - anything else: generic provider API error carrying the status.
pub fn describe_api_failure(provider: &str, failure: &ApiFailure<'_>) -> String {
    let repo_ref = format!("{}/{}", failure.owner, failure.repo);
    match failure.status {
        401 => match failure.instance_name {
            Some(instance) => format!(
                "Your token for {instance} was rejected. Open the instance settings and \
                 re-enter a personal access token for {instance}."
            ),
            None => format!(
                "{provider} rejected your credentials. Please sign in to {provider} again."
            ),
        },
        403 => {
            if failure.has_token {
                format!(
                    "Your {provider} account does not have access to {repo_ref}. \
                     Ask the repository owner for access."
                )
            } else {
                format!(
                    "{provider} denied access to {repo_ref}. Sign in to {provider} to \
                     access restricted repositories."
                )
            }
        }
        404 => {
            if failure.has_token {
                format!(
                    "{repo_ref} was not found on {provider}. Check that the repository \
                     still exists and that your account has access to it."
                )
            } else {
                format!(
                    "{repo_ref} was not found on {provider}. If it is a private \
                     repository, sign in to {provider} first."
                )
            }
        }
        status => format!("{provider} API error (HTTP {status})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(status: u16, has_token: bool, instance_name: Option<&'static str>) -> ApiFailure<'static> {
        ApiFailure {
            status,
            owner: "ada",
            repo: "thesis",
            has_token,
            instance_name,
        }
    }

    #[test]
    fn unauthorized_names_self_hosted_instance() {
        let message = describe_api_failure("GitLab", &failure(401, true, Some("uni-gitlab")));
        assert!(message.contains("uni-gitlab"));
        assert!(message.contains("personal access token"));
    }

    #[test]
    fn unauthorized_on_cloud_asks_to_sign_in_again() {
        let message = describe_api_failure("GitHub", &failure(401, true, None));
        assert!(message.contains("sign in to GitHub again"));
        assert!(!message.contains("personal access token"));
    }

    #[test]
    fn not_found_wording_depends_on_token_presence() {
        let without_token = describe_api_failure("GitHub", &failure(404, false, None));
        let with_token = describe_api_failure("GitHub", &failure(404, true, None));
        assert!(without_token.contains("sign in"));
        assert!(with_token.contains("access"));
        assert_ne!(without_token, with_token);
    }

    #[test]
    fn the_four_credential_wordings_are_distinct() {
        let messages = [
            describe_api_failure("GitLab", &failure(401, true, Some("uni-gitlab"))),
            describe_api_failure("GitLab", &failure(401, true, None)),
            describe_api_failure("GitLab", &failure(404, false, None)),
            describe_api_failure("GitLab", &failure(404, true, None)),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn forbidden_wording_depends_on_token_presence() {
        let with_token = describe_api_failure("GitHub", &failure(403, true, None));
        let without_token = describe_api_failure("GitHub", &failure(403, false, None));
        assert!(with_token.contains("does not have access"));
        assert!(without_token.contains("Sign in"));
    }

    #[test]
    fn other_statuses_produce_generic_api_error() {
        let message = describe_api_failure("GitHub", &failure(502, true, None));
        assert_eq!(message, "GitHub API error (HTTP 502)");
    }
}
