use crate::records::{ResearchMap, StockRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub content_root: String,
    pub ci_root: String,
    pub workflow_id: String,
    pub git_ref: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl DashboardConfig {
    pub fn job_ref(&self) -> JobRef {
        JobRef {
            workflow_id: self.workflow_id.clone(),
            git_ref: self.git_ref.clone(),
        }
    }
}

/// Which remote workflow to run, and on which branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub workflow_id: String,
    pub git_ref: String,
}

/// The CI system queued the dispatch. No run id is known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    #[serde(other)]
    Other,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Other => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl Conclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Cancelled => "cancelled",
            Conclusion::Unknown => "unknown",
        }
    }
}

/// One remote execution as reported by the CI system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    #[serde(default)]
    pub id: Option<u64>,
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
}

impl JobRun {
    /// Conclusion of a completed run. A completed run without one is `Unknown`.
    pub fn settled(&self) -> Option<Conclusion> {
        match self.status {
            RunStatus::Completed => Some(self.conclusion.unwrap_or(Conclusion::Unknown)),
            _ => None,
        }
    }
}

/// Body of `GET {ci_root}/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunsPage {
    #[serde(default)]
    pub workflow_runs: Vec<JobRun>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Dispatching,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Succeeded | SessionState::Failed | SessionState::TimedOut
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Dispatching => "dispatching",
            SessionState::Polling => "polling",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
            SessionState::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

/// Bounded polling state machine. Transitions that do not apply to the
/// current state are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSession {
    pub state: SessionState,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollSession {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            attempt_count: 0,
            max_attempts,
            interval,
        }
    }

    pub fn begin_dispatch(&mut self) {
        if self.state == SessionState::Idle || self.state.is_terminal() {
            self.state = SessionState::Dispatching;
            self.attempt_count = 0;
        }
    }

    pub fn dispatch_accepted(&mut self) {
        if self.state == SessionState::Dispatching {
            self.state = SessionState::Polling;
            self.attempt_count = 0;
        }
    }

    pub fn dispatch_failed(&mut self) {
        if self.state == SessionState::Dispatching {
            self.state = SessionState::Failed;
        }
    }

    /// Count one poll tick. Returns `false` once the ceiling is passed, after
    /// moving to `TimedOut`.
    pub fn next_attempt(&mut self) -> bool {
        if self.state != SessionState::Polling {
            return false;
        }
        self.attempt_count += 1;
        if self.attempt_count > self.max_attempts {
            self.state = SessionState::TimedOut;
            return false;
        }
        true
    }

    /// Apply the latest observed run and return the resulting state.
    pub fn observe(&mut self, run: &JobRun) -> SessionState {
        if self.state == SessionState::Polling {
            match run.settled() {
                Some(Conclusion::Success) => self.state = SessionState::Succeeded,
                Some(_) => self.state = SessionState::Failed,
                None => {}
            }
        }
        self.state
    }
}

/// Structured events appended to the event log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Message(String),
    DispatchRequested { job: JobRef },
    DispatchAccepted,
    DispatchFailed(String),
    PollStatus {
        attempt: u32,
        status: RunStatus,
        conclusion: Option<Conclusion>,
    },
    JobSucceeded,
    JobFailed { conclusion: Conclusion },
    PollTimedOut { attempts: u32 },
    RefreshScheduled { delay: Duration },
    FetchPartialFailure { resource: &'static str, detail: String },
    RefreshCompleted { stocks: usize, categories: usize },
    RefreshFailed,
}

impl LogEvent {
    /// Render a human-readable message for the log.
    pub fn to_message(&self) -> String {
        match self {
            LogEvent::Message(msg) => msg.clone(),
            LogEvent::DispatchRequested { job } => format!(
                "Requesting workflow {} on {}",
                job.workflow_id, job.git_ref
            ),
            LogEvent::DispatchAccepted => {
                "Dispatch accepted, waiting for the run to start (usually 10-20s)".to_string()
            }
            LogEvent::DispatchFailed(detail) => format!("Dispatch failed: {detail}"),
            LogEvent::PollStatus {
                attempt,
                status,
                conclusion,
            } => format!(
                "Poll {attempt}: {} ({})",
                status.as_str(),
                conclusion.map(Conclusion::as_str).unwrap_or("running")
            ),
            LogEvent::JobSucceeded => "Run succeeded, refreshing data".to_string(),
            LogEvent::JobFailed { conclusion } => format!(
                "Run finished with conclusion {}, check the Actions tab",
                conclusion.as_str()
            ),
            LogEvent::PollTimedOut { attempts } => format!(
                "Stopped monitoring after {attempts} polls, verify the run manually"
            ),
            LogEvent::RefreshScheduled { delay } => format!(
                "Refresh scheduled in {}",
                humantime::format_duration(*delay)
            ),
            LogEvent::FetchPartialFailure { resource, detail } => {
                format!("Could not refresh {resource}: {detail}")
            }
            LogEvent::RefreshCompleted { stocks, categories } => format!(
                "Data refreshed: {stocks} stocks, {categories} research categories"
            ),
            LogEvent::RefreshFailed => "Data refresh failed, keeping previous data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStatus {
    #[serde(default)]
    pub last_updated: String,
}

/// Everything the presentation layer reads. Replaced wholesale, never patched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataSnapshot {
    pub stocks: Vec<StockRecord>,
    pub research: ResearchMap,
    pub last_updated: Option<String>,
    pub refreshed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: RunStatus, conclusion: Option<Conclusion>) -> JobRun {
        JobRun {
            id: Some(1),
            status,
            conclusion,
        }
    }

    fn polling(max: u32) -> PollSession {
        let mut s = PollSession::new(max, Duration::from_secs(5));
        s.begin_dispatch();
        s.dispatch_accepted();
        s
    }

    #[test]
    fn dispatch_transitions() {
        let mut s = PollSession::new(3, Duration::from_secs(5));
        assert_eq!(s.state, SessionState::Idle);
        s.begin_dispatch();
        assert_eq!(s.state, SessionState::Dispatching);
        s.dispatch_failed();
        assert_eq!(s.state, SessionState::Failed);

        // Terminal states can start a new cycle.
        s.begin_dispatch();
        s.dispatch_accepted();
        assert_eq!(s.state, SessionState::Polling);
        assert_eq!(s.attempt_count, 0);
    }

    #[test]
    fn attempts_past_ceiling_time_out() {
        let mut s = polling(2);
        assert!(s.next_attempt());
        assert!(s.next_attempt());
        assert!(!s.next_attempt());
        assert_eq!(s.state, SessionState::TimedOut);
        assert_eq!(s.attempt_count, 3);
        assert!(!s.next_attempt());
        assert_eq!(s.attempt_count, 3);
    }

    #[test]
    fn observe_settles_on_completion_only() {
        let mut s = polling(5);
        assert_eq!(
            s.observe(&run(RunStatus::InProgress, None)),
            SessionState::Polling
        );
        assert_eq!(s.observe(&run(RunStatus::Queued, None)), SessionState::Polling);
        assert_eq!(
            s.observe(&run(RunStatus::Completed, Some(Conclusion::Success))),
            SessionState::Succeeded
        );
        // Terminal: later observations change nothing.
        assert_eq!(
            s.observe(&run(RunStatus::Completed, Some(Conclusion::Failure))),
            SessionState::Succeeded
        );

        let mut s = polling(5);
        assert_eq!(
            s.observe(&run(RunStatus::Completed, Some(Conclusion::Cancelled))),
            SessionState::Failed
        );

        let mut s = polling(5);
        assert_eq!(
            s.observe(&run(RunStatus::Completed, None)),
            SessionState::Failed
        );
    }

    #[test]
    fn job_run_decodes_unknown_values() {
        let r: JobRun =
            serde_json::from_str(r#"{"id": 7, "status": "waiting", "conclusion": null}"#).unwrap();
        assert_eq!(r.status, RunStatus::Other);
        assert_eq!(r.settled(), None);

        let r: JobRun =
            serde_json::from_str(r#"{"id": 7, "status": "completed", "conclusion": "timed_out"}"#)
                .unwrap();
        assert_eq!(r.settled(), Some(Conclusion::Unknown));
    }
}
