//! Data refresh.
//!
//! Fetches every published document, normalizes the stock records and swaps
//! the results into the shared snapshot slot.

use crate::content::ContentSource;
use crate::error::FetchError;
use crate::event_log::EventLog;
use crate::model::{DataSnapshot, LogEvent};
use crate::records::normalize_batch;
use std::sync::Arc;
use tokio::sync::watch;

pub struct Refresher<S: ?Sized> {
    source: Arc<S>,
    slot: Arc<watch::Sender<DataSnapshot>>,
    log: EventLog,
}

impl<S: ?Sized> Clone for Refresher<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            slot: self.slot.clone(),
            log: self.log.clone(),
        }
    }
}

impl<S: ContentSource + ?Sized> Refresher<S> {
    pub fn new(source: Arc<S>, log: EventLog) -> Self {
        let (slot, _) = watch::channel(DataSnapshot::default());
        Self {
            source,
            slot: Arc::new(slot),
            log,
        }
    }

    pub fn snapshot(&self) -> DataSnapshot {
        self.slot.borrow().clone()
    }

    /// Fetch and apply every data set. A failed fetch keeps the previous value
    /// for that part and is logged; the call fails only when nothing could be
    /// fetched.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let (stocks, research, status) = tokio::join!(
            self.source.fetch_stocks(),
            self.source.fetch_research(),
            self.source.fetch_status(),
        );
        let stocks = self.keep(stocks);
        let research = self.keep(research);
        let status = self.keep(status);

        if stocks.is_none() && research.is_none() && status.is_none() {
            self.log.record(&LogEvent::RefreshFailed);
            return Err(FetchError::Unavailable);
        }

        let stocks = stocks.map(|raw| normalize_batch(&raw));
        let refreshed_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into());

        let mut counts = (0, 0);
        self.slot.send_modify(|snap| {
            if let Some(stocks) = stocks {
                snap.stocks = stocks;
            }
            if let Some(research) = research {
                snap.research = research;
            }
            if let Some(status) = status {
                snap.last_updated = Some(status.last_updated);
            }
            snap.refreshed_at = Some(refreshed_at);
            counts = (snap.stocks.len(), snap.research.len());
        });

        self.log.record(&LogEvent::RefreshCompleted {
            stocks: counts.0,
            categories: counts.1,
        });
        Ok(())
    }

    fn keep<T>(&self, fetched: Result<T, FetchError>) -> Option<T> {
        match fetched {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "data fetch failed");
                self.log.record(&LogEvent::FetchPartialFailure {
                    resource: e.resource().unwrap_or("data"),
                    detail: e.to_string(),
                });
                None
            }
        }
    }
}
