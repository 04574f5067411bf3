//! Scripted fakes of the CI system and the content source.

use crate::content::ContentSource;
use crate::engine::CiApi;
use crate::error::{DispatchError, FetchError};
use crate::model::{Accepted, Conclusion, DashboardConfig, DataStatus, JobRef, JobRun, RunStatus};
use crate::records::{RawStockRecord, ResearchMap};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) fn test_config() -> DashboardConfig {
    DashboardConfig {
        content_root: "http://content.invalid".into(),
        ci_root: "http://ci.invalid".into(),
        workflow_id: "daily_scrape.yml".into(),
        git_ref: "main".into(),
        poll_interval: Duration::from_millis(2),
        max_attempts: 30,
        settle_delay: Duration::from_millis(2),
        request_timeout: Duration::from_secs(1),
        user_agent: "stockbot-monitor-test".into(),
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PollReply {
    Run(RunStatus, Option<Conclusion>),
    Empty,
    Error,
}

/// Answers polls from a script, then repeats `fallback` forever.
pub(crate) struct ScriptedCi {
    reject_status: Option<u16>,
    script: Mutex<VecDeque<PollReply>>,
    fallback: PollReply,
    dispatches: AtomicUsize,
    polls: Mutex<Vec<String>>,
}

impl ScriptedCi {
    pub fn new(script: Vec<PollReply>, fallback: PollReply) -> Self {
        Self {
            reject_status: None,
            script: Mutex::new(script.into()),
            fallback,
            dispatches: AtomicUsize::new(0),
            polls: Mutex::new(Vec::new()),
        }
    }

    /// Every dispatch fails with `status`; 401/403 map to `Unauthorized`.
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_status: Some(status),
            ..Self::new(vec![], PollReply::Empty)
        }
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub fn polls_with(&self, credential: &str) -> usize {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == credential)
            .count()
    }

    pub fn clear_polls(&self) {
        self.polls.lock().unwrap().clear();
    }
}

#[async_trait]
impl CiApi for ScriptedCi {
    async fn dispatch(&self, _credential: &str, _job: &JobRef) -> Result<Accepted, DispatchError> {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        match self.reject_status {
            None => Ok(Accepted),
            Some(status @ (401 | 403)) => Err(DispatchError::Unauthorized { status }),
            Some(status) => Err(DispatchError::RemoteRejected {
                status,
                reason: "Scripted".into(),
            }),
        }
    }

    async fn latest_run(&self, credential: &str) -> Result<Option<JobRun>, FetchError> {
        self.polls.lock().unwrap().push(credential.to_string());
        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match reply {
            PollReply::Run(status, conclusion) => Ok(Some(JobRun {
                id: Some(1),
                status,
                conclusion,
            })),
            PollReply::Empty => Ok(None),
            PollReply::Error => Err(FetchError::Status {
                resource: "workflow runs",
                status: 502,
            }),
        }
    }
}

/// Serves fixed documents; a `None` slot fails with HTTP 500.
#[derive(Default)]
pub(crate) struct ScriptedContent {
    pub stocks: Mutex<Option<Vec<RawStockRecord>>>,
    pub research: Mutex<Option<ResearchMap>>,
    pub status: Mutex<Option<DataStatus>>,
    stock_fetches: AtomicUsize,
}

impl ScriptedContent {
    pub fn with_stocks(json: &str) -> Self {
        let content = Self::default();
        *content.stocks.lock().unwrap() = Some(serde_json::from_str(json).unwrap());
        content
    }

    pub fn stock_fetches(&self) -> usize {
        self.stock_fetches.load(Ordering::SeqCst)
    }
}

fn scripted<T: Clone>(slot: &Mutex<Option<T>>, resource: &'static str) -> Result<T, FetchError> {
    slot.lock()
        .unwrap()
        .clone()
        .ok_or(FetchError::Status {
            resource,
            status: 500,
        })
}

#[async_trait]
impl ContentSource for ScriptedContent {
    async fn fetch_stocks(&self) -> Result<Vec<RawStockRecord>, FetchError> {
        self.stock_fetches.fetch_add(1, Ordering::SeqCst);
        scripted(&self.stocks, "stocks")
    }

    async fn fetch_research(&self) -> Result<ResearchMap, FetchError> {
        scripted(&self.research, "research")
    }

    async fn fetch_status(&self) -> Result<DataStatus, FetchError> {
        scripted(&self.status, "status")
    }
}
