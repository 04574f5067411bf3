use super::CiApi;
use crate::event_log::EventLog;
use crate::model::{Conclusion, LogEvent, PollSession, SessionState};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Poll the latest run on `session.interval` until it completes or the
/// attempt ceiling is passed. The first poll happens one interval after the
/// call. Query failures are skipped; only the ceiling ends a session early.
pub(crate) async fn poll_until_settled<A: CiApi + ?Sized>(
    api: &A,
    credential: &str,
    session: &mut PollSession,
    log: &EventLog,
    progress: &watch::Sender<PollSession>,
) -> SessionState {
    // `interval_at` panics on a zero period.
    let period = session.interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !session.next_attempt() {
            if session.state == SessionState::TimedOut {
                log.record(&LogEvent::PollTimedOut {
                    attempts: session.max_attempts,
                });
            }
            progress.send_replace(session.clone());
            return session.state;
        }
        progress.send_replace(session.clone());
        let attempt = session.attempt_count;

        let run = match api.latest_run(credential).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                tracing::debug!(attempt, "no workflow runs reported yet");
                continue;
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "status query failed, retrying next tick");
                continue;
            }
        };

        let state = session.observe(&run);
        progress.send_replace(session.clone());
        match state {
            SessionState::Succeeded => {
                log.record(&LogEvent::JobSucceeded);
                return state;
            }
            SessionState::Failed => {
                log.record(&LogEvent::JobFailed {
                    conclusion: run.settled().unwrap_or(Conclusion::Unknown),
                });
                return state;
            }
            _ => {
                log.record(&LogEvent::PollStatus {
                    attempt,
                    status: run.status,
                    conclusion: run.conclusion,
                });
            }
        }
    }
}
