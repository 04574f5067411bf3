//! Dashboard session controller.
//!
//! Owns the credential, the event log, the shared data snapshot and at most
//! one dispatch-and-poll session for the lifetime of one monitor session.

use super::refresh::Refresher;
use crate::content::ContentSource;
use crate::engine::{CiApi, JobMonitor, SessionHandle};
use crate::error::{DispatchError, FetchError};
use crate::event_log::EventLog;
use crate::model::{DashboardConfig, DataSnapshot, LogEvent, PollSession, SessionState};
use crate::storage::CredentialStore;
use std::sync::Arc;
use tokio::sync::watch;

pub struct Dashboard<A: ?Sized, S: ?Sized> {
    cfg: DashboardConfig,
    ci: Arc<A>,
    refresher: Refresher<S>,
    log: EventLog,
    store: Option<CredentialStore>,
    credential: Option<String>,
    session: Option<SessionHandle>,
}

impl<A, S> Dashboard<A, S>
where
    A: CiApi + ?Sized + 'static,
    S: ContentSource + ?Sized + 'static,
{
    /// Reads the stored credential once, if a store is given.
    pub fn new(
        cfg: DashboardConfig,
        ci: Arc<A>,
        content: Arc<S>,
        store: Option<CredentialStore>,
    ) -> Self {
        let log = EventLog::new();
        let credential = store.as_ref().and_then(|s| match s.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored access token");
                None
            }
        });
        Self {
            refresher: Refresher::new(content, log.clone()),
            cfg,
            ci,
            log,
            store,
            credential,
            session: None,
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn set_credential(&mut self, token: impl Into<String>) {
        let token = token.into().trim().to_string();
        self.credential = (!token.is_empty()).then_some(token);
    }

    /// Start a new dispatch-and-poll session, cancelling any previous one.
    ///
    /// Without a credential nothing happens and `CredentialMissing` is
    /// returned; the previous session, if any, keeps running.
    pub fn start_dispatch(&mut self) -> Result<(), DispatchError> {
        let credential = match self.credential.as_deref() {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => return Err(DispatchError::CredentialMissing),
        };

        if let Some(previous) = self.session.take() {
            if !previous.is_finished() {
                previous.cancel();
                tracing::debug!("cancelled previous poll session");
            }
        }

        let (progress_tx, progress_rx) = watch::channel(PollSession::new(
            self.cfg.max_attempts,
            self.cfg.poll_interval,
        ));
        let mut monitor = JobMonitor::new(self.ci.clone(), &self.cfg, self.log.clone());
        if let Some(store) = &self.store {
            monitor = monitor.remember_credential(store.clone());
        }
        let refresher = self.refresher.clone();
        let log = self.log.clone();
        let settle_delay = self.cfg.settle_delay;

        self.session = Some(SessionHandle::spawn(progress_rx, async move {
            let state = monitor.run(credential, progress_tx).await;
            if state == SessionState::Succeeded {
                // Give the published files time to propagate before re-fetching.
                log.record(&LogEvent::RefreshScheduled {
                    delay: settle_delay,
                });
                tokio::time::sleep(settle_delay).await;
                if let Err(e) = refresher.refresh().await {
                    tracing::warn!(error = %e, "refresh after successful run failed");
                }
            }
            state
        }));
        Ok(())
    }

    pub fn session_state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(SessionHandle::state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn session_progress(&self) -> Option<PollSession> {
        self.session.as_ref().map(SessionHandle::progress)
    }

    /// Wait for the active session, including its follow-up refresh.
    pub async fn wait_for_session(&mut self) -> SessionState {
        match self.session.as_mut() {
            Some(handle) => handle.join().await,
            None => SessionState::Idle,
        }
    }

    pub async fn refresh(&self) -> Result<(), FetchError> {
        self.refresher.refresh().await
    }

    /// Refresh unless a refresh has already been applied, e.g. by a session
    /// that succeeded. Fails when no data could be fetched at all.
    pub async fn ensure_data(&self) -> Result<(), FetchError> {
        if self.refresher.snapshot().refreshed_at.is_some() {
            return Ok(());
        }
        self.refresh().await
    }

    pub fn snapshot(&self) -> DataSnapshot {
        self.refresher.snapshot()
    }

    /// Cancel the active session. Called when the monitor goes away.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.session.take() {
            handle.cancel();
        }
    }
}
