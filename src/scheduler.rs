//! Crawl scheduling, single-flight admission and cancellation.
//!
//! One tokio worker task owns the trigger loop. It sleeps until the next
//! interval deadline or until a command arrives on its channel. Both the
//! timer and [`CrawlScheduler::run_now`] go through the same admission
//! check under the state mutex, so at most one crawl is ever in flight.
//!
//! A crawl body runs in its own spawned task. Whatever way it ends (normal
//! completion, cancellation, error or panic) the scheduler runs the same
//! cleanup: running and stop flags cleared, current root cleared,
//! completion time and summary recorded.
//!
//! The crawl itself is supplied through [`CrawlJob`]; the production job
//! is [`CrawlPipeline`](crate::pipeline::CrawlPipeline).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CrawlerConfig;
use crate::progress::{CrawlEvent, ProgressReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    Idle,
    Running,
    StopRequested,
}

/// Outcome of a completed (or abandoned) crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files_processed: u64,
    pub documents_submitted: u64,
    pub roots_completed: u64,
    pub roots_failed: u64,
    pub cancelled: bool,
    /// Set when the run ended through an error or panic at the outer boundary.
    pub error: Option<String>,
}

impl RunSummary {
    fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
            files_processed: 0,
            documents_submitted: 0,
            roots_completed: 0,
            roots_failed: 0,
            cancelled: false,
            error: None,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Snapshot of scheduler state for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStatus {
    pub phase: CrawlPhase,
    pub is_running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub files_processed: u64,
    pub current_path: Option<String>,
    pub completed_runs: u64,
    pub last_summary: Option<RunSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunNowOutcome {
    Started,
    AlreadyRunning,
    SchedulerStopped,
}

/// Handed to every [`CrawlRun::crawl_root`] call.
#[derive(Clone)]
pub struct RunContext {
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressReporter>,
}

impl RunContext {
    /// A context that is never cancelled and reports nowhere.
    pub fn detached() -> Self {
        Self {
            cancel: CancellationToken::new(),
            progress: Arc::new(crate::progress::NoProgress),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// What one root contributed to a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RootReport {
    pub root: String,
    pub files_scanned: u64,
    pub documents_submitted: u64,
    pub documents_indexed: u64,
    /// The root was abandoned because cancellation was requested.
    pub cancelled: bool,
}

/// Factory for crawl runs. One [`CrawlRun`] is created per crawl.
#[async_trait]
pub trait CrawlJob: Send + Sync + 'static {
    async fn begin(&self) -> Result<Box<dyn CrawlRun>>;
}

/// State for one crawl, driven root by root.
#[async_trait]
pub trait CrawlRun: Send {
    async fn crawl_root(&mut self, root: &Path, ctx: &RunContext) -> Result<RootReport>;

    /// Called once after the last root, also when the run was cancelled.
    async fn finish(&mut self, summary: &RunSummary) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub roots: Vec<PathBuf>,
    pub interval: Duration,
    pub crawl_on_start: bool,
}

impl SchedulerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            roots: config.roots.clone(),
            interval: config.interval(),
            crawl_on_start: config.crawl_on_start,
        }
    }
}

#[derive(Default)]
struct State {
    running: bool,
    /// An [`ExclusiveGuard`] is alive; crawls are not admitted.
    held: bool,
    stop_requested: bool,
    stopped: bool,
    cancel: Option<CancellationToken>,
    current_path: Option<String>,
    files_processed: u64,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    last_summary: Option<RunSummary>,
}

enum Admission {
    Admitted(CancellationToken),
    Busy,
    Stopped,
}

struct Shared {
    state: Mutex<State>,
    completed: watch::Sender<u64>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // State is plain data; a panic while holding the lock cannot leave it torn.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn try_admit(&self) -> Admission {
        let mut state = self.lock();
        if state.stopped {
            return Admission::Stopped;
        }
        if state.running || state.held {
            return Admission::Busy;
        }
        let token = CancellationToken::new();
        state.running = true;
        state.stop_requested = false;
        state.files_processed = 0;
        state.cancel = Some(token.clone());
        Admission::Admitted(token)
    }

    /// Undo an admission whose run never started.
    fn release_unstarted(&self) {
        let mut state = self.lock();
        state.running = false;
        state.stop_requested = false;
        state.cancel = None;
    }

    fn set_current_path(&self, path: Option<String>) {
        self.lock().current_path = path;
    }

    fn set_next_run(&self, deadline: Option<Instant>) {
        let next = deadline.map(|d| {
            let remaining = d.saturating_duration_since(Instant::now());
            Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_default()
        });
        self.lock().next_run = next;
    }

    fn files_processed(&self) -> u64 {
        self.lock().files_processed
    }

    fn finish_run(&self, summary: RunSummary) {
        {
            let mut state = self.lock();
            state.running = false;
            state.stop_requested = false;
            state.cancel = None;
            state.current_path = None;
            state.last_run = Some(summary.finished_at);
            state.last_summary = Some(summary);
        }
        self.completed.send_modify(|n| *n += 1);
    }
}

/// Keeps crawls from being admitted until dropped.
///
/// Obtained from [`CrawlScheduler::try_exclusive`] for maintenance that must
/// not interleave with a crawl, such as clearing the index and snapshot.
pub struct ExclusiveGuard {
    shared: Arc<Shared>,
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        self.shared.lock().held = false;
    }
}

/// Bumps the status counter before forwarding to the configured reporter.
struct StateProgress {
    shared: Arc<Shared>,
    forward: Arc<dyn ProgressReporter>,
}

impl ProgressReporter for StateProgress {
    fn report(&self, event: &CrawlEvent<'_>) {
        if let CrawlEvent::FileProcessed { .. } = event {
            self.shared.lock().files_processed += 1;
        }
        self.forward.report(event);
    }
}

enum Command {
    Run(CancellationToken),
    Shutdown,
}

pub struct CrawlScheduler {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CrawlScheduler {
    /// Starts the worker loop. Must be called inside a tokio runtime.
    pub fn spawn(
        job: Arc<dyn CrawlJob>,
        settings: SchedulerSettings,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let (completed, _) = watch::channel(0u64);
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            completed,
        });
        let (tx, rx) = mpsc::channel(8);
        let worker = Worker {
            shared: shared.clone(),
            job,
            roots: settings.roots.into(),
            interval: settings.interval.max(Duration::from_millis(1)),
            progress,
        };
        let handle = tokio::spawn(worker.run(rx, settings.crawl_on_start));
        Self {
            shared,
            commands: tx,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Requests an immediate crawl unless one is already in flight.
    pub fn run_now(&self) -> RunNowOutcome {
        let token = match self.shared.try_admit() {
            Admission::Admitted(token) => token,
            Admission::Busy => return RunNowOutcome::AlreadyRunning,
            Admission::Stopped => return RunNowOutcome::SchedulerStopped,
        };
        if self.commands.try_send(Command::Run(token)).is_err() {
            self.shared.release_unstarted();
            return RunNowOutcome::SchedulerStopped;
        }
        RunNowOutcome::Started
    }

    /// Signals the in-flight crawl to stop. Returns `false` when idle.
    ///
    /// The crawl notices between files and between roots; an extraction
    /// already in progress is not interrupted.
    pub fn stop_current(&self) -> bool {
        let mut state = self.shared.lock();
        if !state.running {
            return false;
        }
        if !state.stop_requested {
            state.stop_requested = true;
            if let Some(token) = &state.cancel {
                token.cancel();
            }
            info!("crawl stop requested");
        }
        true
    }

    pub fn status(&self) -> CrawlStatus {
        let state = self.shared.lock();
        let phase = match (state.running, state.stop_requested) {
            (false, _) => CrawlPhase::Idle,
            (true, false) => CrawlPhase::Running,
            (true, true) => CrawlPhase::StopRequested,
        };
        CrawlStatus {
            phase,
            is_running: state.running,
            last_run: state.last_run,
            next_run: state.next_run,
            files_processed: state.files_processed,
            current_path: state.current_path.clone(),
            completed_runs: *self.shared.completed.borrow(),
            last_summary: state.last_summary.clone(),
        }
    }

    /// Blocks crawl admission while the returned guard lives, or `None` if a
    /// crawl is running or another guard is held.
    pub fn try_exclusive(&self) -> Option<ExclusiveGuard> {
        let mut state = self.shared.lock();
        if state.running || state.held {
            return None;
        }
        state.held = true;
        Some(ExclusiveGuard {
            shared: self.shared.clone(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Resolves once at least `n` crawls have finished since spawn.
    pub async fn wait_for_completed_runs(&self, n: u64) {
        let mut rx = self.shared.completed.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Cancels any running crawl, stops the worker and waits for both.
    pub async fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            state.stopped = true;
            if let Some(token) = &state.cancel {
                token.cancel();
            }
        }
        let _ = self.commands.send(Command::Shutdown).await;
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduler worker ended abnormally");
            }
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    job: Arc<dyn CrawlJob>,
    roots: Arc<[PathBuf]>,
    interval: Duration,
    progress: Arc<dyn ProgressReporter>,
}

impl Worker {
    async fn run(self, mut commands: mpsc::Receiver<Command>, crawl_on_start: bool) {
        let mut deadline = if crawl_on_start {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        self.shared.set_next_run(Some(deadline));
        let mut current: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    deadline = Instant::now() + self.interval;
                    self.shared.set_next_run(Some(deadline));
                    match self.shared.try_admit() {
                        Admission::Admitted(token) => current = Some(self.launch(token)),
                        Admission::Busy => debug!("interval tick skipped; scheduler busy"),
                        Admission::Stopped => break,
                    }
                }
                cmd = commands.recv() => match cmd {
                    Some(Command::Run(token)) => current = Some(self.launch(token)),
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        commands.close();
        while let Ok(cmd) = commands.try_recv() {
            if let Command::Run(_) = cmd {
                self.shared.release_unstarted();
            }
        }
        if let Some(handle) = current {
            let _ = handle.await;
        }
        self.shared.set_next_run(None);
        debug!("scheduler worker stopped");
    }

    fn launch(&self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(execute(
            self.shared.clone(),
            self.job.clone(),
            self.roots.clone(),
            self.progress.clone(),
            token,
        ))
    }
}

async fn execute(
    shared: Arc<Shared>,
    job: Arc<dyn CrawlJob>,
    roots: Arc<[PathBuf]>,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
) {
    let started_at = Utc::now();
    let clock = std::time::Instant::now();
    info!(roots = roots.len(), "crawl started");

    let ctx = RunContext {
        cancel,
        progress: Arc::new(StateProgress {
            shared: shared.clone(),
            forward: progress,
        }),
    };
    let body = tokio::spawn(run_roots(shared.clone(), job, roots, ctx, started_at));

    let summary = match body.await {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            error!(error = %e, "crawl failed");
            abandoned(&shared, started_at, e.to_string())
        }
        Err(e) => {
            error!(error = %e, panicked = e.is_panic(), "crawl task died");
            abandoned(&shared, started_at, e.to_string())
        }
    };

    info!(
        duration_ms = clock.elapsed().as_millis() as u64,
        files_processed = summary.files_processed,
        roots_completed = summary.roots_completed,
        roots_failed = summary.roots_failed,
        cancelled = summary.cancelled,
        "crawl finished"
    );
    shared.finish_run(summary);
}

fn abandoned(shared: &Shared, started_at: DateTime<Utc>, error: String) -> RunSummary {
    let mut summary = RunSummary::started(started_at);
    summary.files_processed = shared.files_processed();
    summary.finished_at = Utc::now();
    summary.error = Some(error);
    summary
}

async fn run_roots(
    shared: Arc<Shared>,
    job: Arc<dyn CrawlJob>,
    roots: Arc<[PathBuf]>,
    ctx: RunContext,
    started_at: DateTime<Utc>,
) -> Result<RunSummary> {
    let mut run = job.begin().await?;
    let mut summary = RunSummary::started(started_at);

    for root in roots.iter() {
        if ctx.is_cancelled() {
            info!(root = %root.display(), "crawl cancelled; remaining roots skipped");
            break;
        }
        shared.set_current_path(Some(root.display().to_string()));
        match run.crawl_root(root, &ctx).await {
            Ok(report) if report.cancelled => {
                info!(root = %root.display(), "root abandoned on stop request");
                summary.documents_submitted += report.documents_submitted;
                break;
            }
            Ok(report) => {
                summary.roots_completed += 1;
                summary.documents_submitted += report.documents_submitted;
            }
            Err(e) => {
                summary.roots_failed += 1;
                warn!(root = %root.display(), error = %e, "root failed; continuing");
            }
        }
    }

    summary.cancelled = ctx.is_cancelled();
    summary.files_processed = shared.files_processed();
    summary.finished_at = Utc::now();
    if let Err(e) = run.finish(&summary).await {
        error!(error = %e, "failed to finalize crawl");
        summary.error = Some(e.to_string());
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    #[derive(Clone, Copy)]
    enum Behavior {
        Quick,
        WaitForCancel,
        FailOn(&'static str),
        Panic,
    }

    struct TestJob {
        behavior: Behavior,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    impl TestJob {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
                finished: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    struct TestRun {
        behavior: Behavior,
        active: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CrawlJob for TestJob {
        async fn begin(&self) -> Result<Box<dyn CrawlRun>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(TestRun {
                behavior: self.behavior,
                active: self.active.clone(),
                finished: self.finished.clone(),
            }))
        }
    }

    #[async_trait]
    impl CrawlRun for TestRun {
        async fn crawl_root(&mut self, root: &Path, ctx: &RunContext) -> Result<RootReport> {
            let name = root.display().to_string();
            ctx.progress.report(&CrawlEvent::FileProcessed {
                root: &name,
                processed: 1,
            });
            match self.behavior {
                Behavior::Quick => tokio::time::sleep(Duration::from_millis(20)).await,
                Behavior::WaitForCancel => {
                    tokio::select! {
                        _ = ctx.cancel.cancelled() => {
                            self.active.fetch_sub(1, Ordering::SeqCst);
                            return Ok(RootReport { root: name, cancelled: true, ..Default::default() });
                        }
                        _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                    }
                }
                Behavior::FailOn(bad) if name.ends_with(bad) => bail!("cannot read {name}"),
                Behavior::FailOn(_) => {}
                Behavior::Panic => panic!("decoder blew up"),
            }
            Ok(RootReport {
                root: name,
                files_scanned: 1,
                ..Default::default()
            })
        }

        async fn finish(&mut self, _summary: &RunSummary) -> Result<()> {
            if !matches!(self.behavior, Behavior::WaitForCancel) {
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn settings(roots: &[&str], interval: Duration, crawl_on_start: bool) -> SchedulerSettings {
        SchedulerSettings {
            roots: roots.iter().map(PathBuf::from).collect(),
            interval,
            crawl_on_start,
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    async fn wait_runs(s: &CrawlScheduler, n: u64) {
        timeout(Duration::from_secs(10), s.wait_for_completed_runs(n))
            .await
            .expect("crawl did not finish in time");
    }

    #[tokio::test]
    async fn run_now_is_single_flight() {
        let job = TestJob::new(Behavior::Quick);
        let s = CrawlScheduler::spawn(
            job.clone(),
            settings(&["/r1", "/r2"], HOUR, false),
            Arc::new(NoProgress),
        );
        assert_eq!(s.run_now(), RunNowOutcome::Started);
        assert_eq!(s.run_now(), RunNowOutcome::AlreadyRunning);
        assert!(s.is_running());
        wait_runs(&s, 1).await;

        let status = s.status();
        assert_eq!(status.phase, CrawlPhase::Idle);
        assert!(status.current_path.is_none());
        assert!(status.last_run.is_some());
        assert_eq!(status.files_processed, 2);
        let summary = status.last_summary.unwrap();
        assert_eq!(summary.roots_completed, 2);
        assert!(!summary.cancelled);
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);

        assert_eq!(s.run_now(), RunNowOutcome::Started);
        wait_runs(&s, 2).await;
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
        s.shutdown().await;
    }

    #[tokio::test]
    async fn stop_cancels_remaining_roots() {
        let job = TestJob::new(Behavior::WaitForCancel);
        let s = CrawlScheduler::spawn(
            job.clone(),
            settings(&["/a", "/b", "/c"], HOUR, false),
            Arc::new(NoProgress),
        );
        assert!(!s.stop_current());
        assert_eq!(s.run_now(), RunNowOutcome::Started);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(s.stop_current());
        assert_eq!(s.status().phase, CrawlPhase::StopRequested);
        wait_runs(&s, 1).await;

        let status = s.status();
        assert!(!status.is_running);
        assert_eq!(status.phase, CrawlPhase::Idle);
        let summary = status.last_summary.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.roots_completed, 0);
        assert_eq!(job.finished.load(Ordering::SeqCst), 1);
        s.shutdown().await;
    }

    #[tokio::test]
    async fn interval_triggers_repeated_crawls() {
        let job = TestJob::new(Behavior::Quick);
        let s = CrawlScheduler::spawn(
            job.clone(),
            settings(&["/r"], Duration::from_millis(50), false),
            Arc::new(NoProgress),
        );
        assert!(s.status().next_run.is_some());
        wait_runs(&s, 2).await;
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
        s.shutdown().await;
        assert!(s.status().next_run.is_none());
        assert_eq!(s.run_now(), RunNowOutcome::SchedulerStopped);
    }

    #[tokio::test]
    async fn exclusive_guard_blocks_interval_and_manual_runs() {
        let job = TestJob::new(Behavior::Quick);
        let s = CrawlScheduler::spawn(
            job.clone(),
            settings(&["/r"], Duration::from_millis(20), false),
            Arc::new(NoProgress),
        );
        let guard = s.try_exclusive().unwrap();
        assert!(s.try_exclusive().is_none());
        assert_eq!(s.run_now(), RunNowOutcome::AlreadyRunning);

        // Several interval deadlines pass while the guard is held.
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(job.max_active.load(Ordering::SeqCst), 0);
        assert_eq!(s.status().completed_runs, 0);

        drop(guard);
        wait_runs(&s, 1).await;
        s.shutdown().await;
    }

    #[tokio::test]
    async fn exclusive_guard_is_refused_while_crawling() {
        let job = TestJob::new(Behavior::WaitForCancel);
        let s = CrawlScheduler::spawn(job, settings(&["/r"], HOUR, false), Arc::new(NoProgress));
        assert_eq!(s.run_now(), RunNowOutcome::Started);
        assert!(s.try_exclusive().is_none());
        s.stop_current();
        wait_runs(&s, 1).await;
        assert!(s.try_exclusive().is_some());
        s.shutdown().await;
    }

    #[tokio::test]
    async fn crawl_on_start_runs_immediately() {
        let job = TestJob::new(Behavior::Quick);
        let s = CrawlScheduler::spawn(job, settings(&["/r"], HOUR, true), Arc::new(NoProgress));
        wait_runs(&s, 1).await;
        s.shutdown().await;
    }

    #[tokio::test]
    async fn failing_root_does_not_stop_the_others() {
        let job = TestJob::new(Behavior::FailOn("bad"));
        let s = CrawlScheduler::spawn(
            job,
            settings(&["/good1", "/bad", "/good2"], HOUR, false),
            Arc::new(NoProgress),
        );
        assert_eq!(s.run_now(), RunNowOutcome::Started);
        wait_runs(&s, 1).await;
        let summary = s.status().last_summary.unwrap();
        assert_eq!(summary.roots_completed, 2);
        assert_eq!(summary.roots_failed, 1);
        assert!(summary.error.is_none());
        s.shutdown().await;
    }

    #[tokio::test]
    async fn panic_in_crawl_returns_to_idle() {
        let job = TestJob::new(Behavior::Panic);
        let s = CrawlScheduler::spawn(job, settings(&["/r"], HOUR, false), Arc::new(NoProgress));
        assert_eq!(s.run_now(), RunNowOutcome::Started);
        wait_runs(&s, 1).await;

        let status = s.status();
        assert_eq!(status.phase, CrawlPhase::Idle);
        assert!(status.current_path.is_none());
        assert!(status.last_summary.unwrap().error.is_some());
        assert_eq!(s.run_now(), RunNowOutcome::Started);
        wait_runs(&s, 2).await;
        s.shutdown().await;
    }
}
