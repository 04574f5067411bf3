//! Error types shared by the CI client, the content source and the orchestrator.

/// Reasons a dispatch request did not start a remote job.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No credential was supplied. Raised before any network call.
    #[error("no access token configured")]
    CredentialMissing,

    /// The CI system refused the credential.
    #[error("access token rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The CI system answered with a non-2xx status.
    #[error("dispatch rejected: {status} {reason}")]
    RemoteRejected { status: u16, reason: String },

    /// The request could not complete.
    #[error("dispatch request failed: {0}")]
    NetworkFailure(#[from] reqwest::Error),
}

/// Failures reading a remote JSON document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request for {resource} failed: {source}")]
    Network {
        resource: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{resource} returned HTTP {status}")]
    Status { resource: &'static str, status: u16 },

    #[error("{resource} could not be decoded: {source}")]
    Decode {
        resource: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Every data set failed during one refresh.
    #[error("no data set could be refreshed")]
    Unavailable,
}

impl FetchError {
    pub fn resource(&self) -> Option<&'static str> {
        match self {
            FetchError::Network { resource, .. }
            | FetchError::Status { resource, .. }
            | FetchError::Decode { resource, .. } => Some(resource),
            FetchError::Unavailable => None,
        }
    }
}
