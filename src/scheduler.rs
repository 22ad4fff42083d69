//! Periodic scheduler loop: materializes due recurring tasks and sweeps
//! overdue instances into penalized completed records.
//!
//! One tick runs to completion before the next is scheduled; the period is
//! self-correcting (sleep = interval minus tick elapsed) so slow ticks do
//! not accumulate drift or overlap.

use crate::clock::Clock;
use crate::db::Database;
use crate::error::ErrorKind;
use crate::types::CompletedTask;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Runtime knobs for the loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between tick starts.
    pub tick_interval: Duration,
    /// Max due tasks considered per tick.
    pub due_batch_size: usize,
    /// Max overdue instances swept per tick.
    pub overdue_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            due_batch_size: 100,
            overdue_batch_size: 100,
        }
    }
}

/// Side-effect hook fired after an overdue instance has been durably closed.
/// Delivery is best-effort and runs outside the conversion transaction.
pub trait OverdueNotifier: Send + Sync {
    fn overdue_closed(&self, record: &CompletedTask);
}

/// Default notifier: log and move on.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl OverdueNotifier for LogNotifier {
    fn overdue_closed(&self, record: &CompletedTask) {
        info!(
            task_id = %record.task_id,
            person = %record.responsible_person_id,
            penalty = record.penalty,
            "task overdue, penalty applied"
        );
    }
}

/// What one tick did. Returned from [`Scheduler::run_tick`] so tests and
/// callers can observe outcomes without scraping logs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub materialized: usize,
    pub penalised: usize,
    pub skipped_open: usize,
    pub skipped_no_candidates: usize,
    pub errors: usize,
}

// Loop states. An explicit tristate rather than a bool so a stop request
// issued mid-tick is distinguishable from a loop that has already exited.
const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
const STOP_REQUESTED: u8 = 2;

/// The periodic driver. Construct once at startup, share via `Arc`.
pub struct Scheduler {
    db: Database,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    notifier: Arc<dyn OverdueNotifier>,
    state: AtomicU8,
    shutdown: Notify,
}

impl Scheduler {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self::with_notifier(db, clock, config, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        db: Database,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
        notifier: Arc<dyn OverdueNotifier>,
    ) -> Self {
        Self {
            db,
            clock,
            config,
            notifier,
            state: AtomicU8::new(STOPPED),
            shutdown: Notify::new(),
        }
    }

    /// Whether the loop is currently running (or stop-requested but not yet
    /// exited).
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) != STOPPED
    }

    /// Start the loop. Idempotent: returns `None` if already running.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self
            .state
            .compare_exchange(STOPPED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("scheduler already running, start ignored");
            return None;
        }

        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            "scheduler started"
        );

        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run().await }))
    }

    /// Request a stop. The in-flight tick (if any) completes; only the next
    /// tick is prevented.
    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(RUNNING, STOP_REQUESTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.shutdown.notify_waiters();
        }
    }

    async fn run(&self) {
        loop {
            let tick_started = std::time::Instant::now();
            let now = self.clock.now_ms();
            let report = self.run_tick(now);

            if report != TickReport::default() {
                info!(
                    materialized = report.materialized,
                    penalised = report.penalised,
                    skipped_open = report.skipped_open,
                    skipped_no_candidates = report.skipped_no_candidates,
                    errors = report.errors,
                    "tick complete"
                );
            }

            // Stop is observed between ticks, never mid-tick.
            if self.state.load(Ordering::SeqCst) == STOP_REQUESTED {
                break;
            }

            let wait = self
                .config
                .tick_interval
                .saturating_sub(tick_started.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.notified() => {}
            }

            if self.state.load(Ordering::SeqCst) == STOP_REQUESTED {
                break;
            }
        }

        self.state.store(STOPPED, Ordering::SeqCst);
        info!("scheduler stopped");
    }

    /// Run one tick at the given instant. Public so tests (and one-shot
    /// maintenance commands) can drive the phases without the timer.
    pub fn run_tick(&self, now: i64) -> TickReport {
        let mut report = TickReport::default();
        self.materialization_phase(now, &mut report);
        self.overdue_phase(now, &mut report);
        report
    }

    /// Phase (a): create instances for tasks whose next_scheduler_date has
    /// passed. One bad task never blocks the rest of the batch.
    fn materialization_phase(&self, now: i64, report: &mut TickReport) {
        let due = match self.db.due_recurring_tasks(now, self.config.due_batch_size) {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "due-task query failed, skipping materialization phase");
                report.errors += 1;
                return;
            }
        };

        for task in due {
            match self.db.materialize_for_task(&task, now) {
                Ok(instance) => {
                    debug!(
                        task_id = %task.id,
                        instance_id = %instance.id,
                        assignee = %instance.responsible_person_id,
                        due = instance.due_date,
                        "materialized instance"
                    );
                    report.materialized += 1;
                }
                Err(e) if e.kind == ErrorKind::Conflict => {
                    // Already-open instance; the marker stays put and the
                    // task is reconsidered once the instance closes.
                    debug!(task_id = %task.id, "open instance exists, not double-scheduling");
                    report.skipped_open += 1;
                }
                Err(e) if e.kind == ErrorKind::NoCandidates => {
                    warn!(
                        task_id = %task.id,
                        group_id = %task.responsible_group_id,
                        "responsible group empty, will retry next tick"
                    );
                    report.skipped_no_candidates += 1;
                }
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "materialization failed");
                    report.errors += 1;
                }
            }
        }
    }

    /// Phase (b): close instances past their due date as penalized records.
    fn overdue_phase(&self, now: i64, report: &mut TickReport) {
        let overdue = match self
            .db
            .overdue_scheduled_tasks(now, self.config.overdue_batch_size)
        {
            Ok(overdue) => overdue,
            Err(e) => {
                warn!(error = %e, "overdue query failed, skipping overdue phase");
                report.errors += 1;
                return;
            }
        };

        for instance in overdue {
            match self
                .db
                .close_scheduled_as_completed(&instance.id, now, true)
            {
                Ok(record) => {
                    report.penalised += 1;
                    self.notifier.overdue_closed(&record);
                }
                Err(e) => {
                    warn!(
                        instance_id = %instance.id,
                        error = %e,
                        "overdue conversion failed, instance retried next tick"
                    );
                    report.errors += 1;
                }
            }
        }
    }
}
