use crate::content::HttpContentSource;
use crate::engine::GitHubClient;
use crate::model::{DashboardConfig, DataSnapshot};
use crate::orchestrator::Dashboard;
use crate::records::{filter_market, SortDirection, SortKey, SortState};
use crate::storage::CredentialStore;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "stockbot-monitor",
    version,
    about = "Show the StockBot market data set and trigger its scraping workflow"
)]
pub struct Cli {
    /// Root URL the data files are published under
    #[arg(
        long,
        default_value = "https://raw.githubusercontent.com/hoonnamkoong/stockbot/main"
    )]
    pub content_root: String,

    /// GitHub Actions API root of the repository
    #[arg(
        long,
        default_value = "https://api.github.com/repos/hoonnamkoong/stockbot/actions"
    )]
    pub ci_root: String,

    /// Workflow file to dispatch
    #[arg(long, default_value = "daily_scrape.yml")]
    pub workflow: String,

    /// Branch or tag the workflow runs on
    #[arg(long, default_value = "main")]
    pub git_ref: String,

    /// Trigger the workflow, watch it, and refresh when it succeeds
    #[arg(long)]
    pub dispatch: bool,

    /// GitHub access token (stored after an accepted dispatch)
    #[arg(long)]
    pub token: Option<String>,

    /// Delete the stored access token
    #[arg(long)]
    pub forget_token: bool,

    /// Spacing between status polls
    #[arg(long, default_value = "5s")]
    pub poll_interval: humantime::Duration,

    /// Polls before giving up on a run
    #[arg(long, default_value_t = 30)]
    pub max_attempts: u32,

    /// Wait between a successful run and the data refresh
    #[arg(long, default_value = "3s")]
    pub settle_delay: humantime::Duration,

    /// Timeout for each HTTP request
    #[arg(long, default_value = "10s")]
    pub request_timeout: humantime::Duration,

    /// Column to sort the stock table by
    #[arg(long, value_enum, default_value_t = SortKey::RecentPostCount)]
    pub sort: SortKey,

    /// Sort direction
    #[arg(long, value_enum, default_value_t = SortDirection::Desc)]
    pub order: SortDirection,

    /// Only show one market (e.g. KOSPI, KOSDAQ); ALL shows every market
    #[arg(long)]
    pub market: Option<String>,

    /// Show research reports instead of stocks; optionally one category
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub research: Option<String>,

    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Build a `DashboardConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> DashboardConfig {
    DashboardConfig {
        content_root: args.content_root.clone(),
        ci_root: args.ci_root.clone(),
        workflow_id: args.workflow.clone(),
        git_ref: args.git_ref.clone(),
        poll_interval: Duration::from(args.poll_interval),
        max_attempts: args.max_attempts,
        settle_delay: Duration::from(args.settle_delay),
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("stockbot-monitor/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Apply `--market`, `--sort` and `--order` to the stock list.
fn shape_snapshot(mut snapshot: DataSnapshot, args: &Cli) -> (DataSnapshot, SortState) {
    let sort = SortState {
        key: args.sort,
        direction: args.order,
    };
    snapshot.stocks = sort.apply(&filter_market(&snapshot.stocks, args.market.as_deref()));
    (snapshot, sort)
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let store = CredentialStore::default_location()?;
    if args.forget_token {
        store.clear().context("failed to delete stored access token")?;
    }

    let ci = Arc::new(GitHubClient::new(&cfg)?);
    let content = Arc::new(HttpContentSource::new(&cfg)?);
    let mut dashboard = Dashboard::new(cfg, ci, content, Some(store));
    if let Some(token) = args.token.as_deref() {
        dashboard.set_credential(token);
    }

    if args.dispatch && dashboard.credential().is_none() {
        anyhow::bail!("no access token: pass --token once, it is stored after an accepted dispatch");
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let mut log_rx = dashboard.log().subscribe();
    let log_tx = out_tx.clone();
    let log_forwarder = tokio::spawn(async move {
        while let Some(entry) = log_rx.recv().await {
            let _ = log_tx.send(OutputLine::Stderr(entry.display_line()));
        }
    });

    if args.dispatch {
        dashboard.start_dispatch()?;
        tokio::select! {
            _ = dashboard.wait_for_session() => {}
            _ = tokio::signal::ctrl_c() => {
                let state = dashboard.session_state();
                dashboard.shutdown();
                let _ = out_tx.send(OutputLine::Stderr(format!("Monitoring cancelled ({state})")));
            }
        }
        if let Some(progress) = dashboard.session_progress() {
            tracing::debug!(
                state = %progress.state,
                attempts = progress.attempt_count,
                "poll session ended"
            );
        }
    }

    // Covers a dispatch that ended without data as well as no dispatch at all.
    dashboard.ensure_data().await.context("failed to load data")?;

    let (snapshot, sort) = shape_snapshot(dashboard.snapshot(), &args);

    if args.json {
        let out = serde_json::to_string_pretty(&snapshot)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = match args.research.as_deref() {
            Some(category) => crate::text_summary::build_research_summary(
                &snapshot,
                Some(category).filter(|c| !c.is_empty()),
            )?,
            None => crate::text_summary::build_stock_summary(&snapshot, &snapshot.stocks, sort),
        };
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    dashboard.shutdown();
    drop(dashboard);
    // The forwarder ends once the last log handle is gone.
    let _ = tokio::time::timeout(Duration::from_secs(1), log_forwarder).await;
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
