use crate::model::{PollSession, SessionState};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a spawned dispatch-and-poll session.
///
/// The session task is aborted by [`SessionHandle::cancel`] and when the
/// handle is dropped, so a session never outlives its owner.
pub struct SessionHandle {
    progress: watch::Receiver<PollSession>,
    task: JoinHandle<SessionState>,
    outcome: Option<SessionState>,
}

impl SessionHandle {
    pub fn spawn<F>(progress: watch::Receiver<PollSession>, session: F) -> Self
    where
        F: Future<Output = SessionState> + Send + 'static,
    {
        Self {
            progress,
            task: tokio::spawn(session),
            outcome: None,
        }
    }

    /// Latest published progress.
    pub fn progress(&self) -> PollSession {
        self.progress.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.progress.borrow().state
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session task to end. A cancelled session reports the last
    /// state it published.
    pub async fn join(&mut self) -> SessionState {
        if let Some(state) = self.outcome {
            return state;
        }
        let state = match (&mut self.task).await {
            Ok(state) => state,
            Err(e) => {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "poll session task failed");
                }
                self.state()
            }
        };
        self.outcome = Some(state);
        state
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
