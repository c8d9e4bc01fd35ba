use thiserror::Error;

/// One organization's external fetch failed. Isolated, logged, counted;
/// the cycle continues with the remaining organizations.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("organization '{0}' not found on GitHub")]
    OrgNotFound(String),

    #[error("fetch for '{org}' timed out after {seconds}s")]
    Timeout { org: String, seconds: u64 },
}

impl FetchError {
    /// Map octocrab errors, pulling 404s out into the dedicated variant so
    /// callers can tell a misconfigured slug from a flaky network.
    pub(crate) fn from_api(org: &str, err: octocrab::Error) -> Self {
        if let octocrab::Error::GitHub { ref source, .. } = err {
            if source.status_code.as_u16() == 404 {
                return FetchError::OrgNotFound(org.to_string());
            }
        }
        FetchError::Api(err)
    }
}
