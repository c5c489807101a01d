use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::types::DataType;

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        columns: usize,
    },
    ThrottleWaited {
        duration: Duration,
    },
    ColumnStarted {
        index: usize,
        name: String,
        rows: usize,
    },
    ColumnFinished {
        index: usize,
        name: String,
        data_type: DataType,
    },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
///
/// Called from worker threads; implementations must be cheap and thread-safe.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { columns } => {
                debug!(columns, "table inference started");
            }
            ExecutionEvent::ThrottleWaited { duration } => {
                debug!(?duration, "column waited for an inference slot");
            }
            ExecutionEvent::ColumnStarted { index, name, rows } => {
                debug!(index, column = %name, rows, "column inference started");
            }
            ExecutionEvent::ColumnFinished {
                index,
                name,
                data_type,
            } => {
                debug!(index, column = %name, %data_type, "column inference finished");
            }
            ExecutionEvent::RunFinished { elapsed, metrics } => {
                info!(?elapsed, %metrics, "table inference finished");
            }
        }
    }
}

/// Real-time metrics for an inference run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    cells_processed: AtomicU64,
    columns_started: AtomicU64,
    columns_finished: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_columns: AtomicUsize,
    max_active_columns: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.cells_processed.store(0, Ordering::SeqCst);
        self.columns_started.store(0, Ordering::SeqCst);
        self.columns_finished.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_columns.store(0, Ordering::SeqCst);
        self.max_active_columns.store(0, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub(crate) fn on_column_start(&self) {
        let _ = self.columns_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_columns.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_active_columns.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn on_column_end(&self, cells: usize) {
        let _ = self.cells_processed.fetch_add(cells as u64, Ordering::SeqCst);
        let _ = self.columns_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_columns.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_throttle_wait(&self, d: Duration) {
        let _ = self
            .throttle_wait_ns
            .fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            cells_processed: self.cells_processed.load(Ordering::SeqCst),
            columns_started: self.columns_started.load(Ordering::SeqCst),
            columns_finished: self.columns_finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_columns: self.max_active_columns.load(Ordering::SeqCst),
        }
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub cells_processed: u64,
    pub columns_started: u64,
    pub columns_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_columns: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, cells_processed={}, columns={}/{}, max_active_columns={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.cells_processed,
            self.columns_finished,
            self.columns_started,
            self.max_active_columns,
            self.throttle_wait,
            self.elapsed
        )
    }
}
