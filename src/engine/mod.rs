//! Remote job dispatch and status monitoring.

mod github;
mod poller;
mod session;

pub use github::GitHubClient;
pub use session::SessionHandle;

use crate::error::{DispatchError, FetchError};
use crate::event_log::EventLog;
use crate::model::{Accepted, DashboardConfig, JobRef, JobRun, LogEvent, PollSession, SessionState};
use crate::storage::CredentialStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The CI system's job endpoints.
#[async_trait]
pub trait CiApi: Send + Sync {
    /// Ask the CI system to start `job`. No run id comes back.
    async fn dispatch(&self, credential: &str, job: &JobRef) -> Result<Accepted, DispatchError>;

    /// Most recent run of the repository, if any.
    async fn latest_run(&self, credential: &str) -> Result<Option<JobRun>, FetchError>;
}

/// Dispatch `job` and log the outcome. An empty credential fails before any
/// request is made and is not logged.
pub async fn trigger<A: CiApi + ?Sized>(
    api: &A,
    credential: &str,
    job: &JobRef,
    log: &EventLog,
) -> Result<Accepted, DispatchError> {
    if credential.trim().is_empty() {
        return Err(DispatchError::CredentialMissing);
    }
    match api.dispatch(credential, job).await {
        Ok(accepted) => {
            log.record(&LogEvent::DispatchAccepted);
            Ok(accepted)
        }
        Err(e) => {
            log.record(&LogEvent::DispatchFailed(e.to_string()));
            Err(e)
        }
    }
}

/// One dispatch-and-poll cycle.
pub struct JobMonitor<A: ?Sized> {
    api: Arc<A>,
    job: JobRef,
    max_attempts: u32,
    interval: Duration,
    log: EventLog,
    credentials: Option<CredentialStore>,
}

impl<A: CiApi + ?Sized> JobMonitor<A> {
    pub fn new(api: Arc<A>, cfg: &DashboardConfig, log: EventLog) -> Self {
        Self {
            api,
            job: cfg.job_ref(),
            max_attempts: cfg.max_attempts,
            interval: cfg.poll_interval,
            log,
            credentials: None,
        }
    }

    /// Persist the credential once a dispatch has been accepted.
    pub fn remember_credential(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Run the cycle to a terminal state, publishing every transition on `progress`.
    pub async fn run(
        self,
        credential: String,
        progress: watch::Sender<PollSession>,
    ) -> SessionState {
        let mut session = PollSession::new(self.max_attempts, self.interval);
        session.begin_dispatch();
        progress.send_replace(session.clone());
        self.log.record(&LogEvent::DispatchRequested {
            job: self.job.clone(),
        });

        if trigger(&*self.api, &credential, &self.job, &self.log)
            .await
            .is_err()
        {
            session.dispatch_failed();
            progress.send_replace(session.clone());
            return session.state;
        }

        if let Some(store) = &self.credentials {
            if let Err(e) = store.save(&credential) {
                tracing::warn!(error = %e, "failed to persist access token");
            }
        }

        session.dispatch_accepted();
        progress.send_replace(session.clone());
        poller::poll_until_settled(&*self.api, &credential, &mut session, &self.log, &progress).await
    }
}
