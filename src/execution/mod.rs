//! Parallel table inference with configurable parallelism.
//!
//! This module sits "above" [`crate::inference`] and provides:
//!
//! - Column-parallel inference on a dedicated rayon pool (one task per column)
//! - Throttling of in-flight columns on top of the pool size
//! - Real-time metrics + observer hooks for monitoring
//!
//! Results are gathered in completion order, tagged with their original column index, and
//! placed back by that index. The output is identical to [`crate::inference::infer_table`].

mod observer;
mod semaphore;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::InferenceOptions;
use crate::error::ExecutionError;
use crate::inference::infer_column;
use crate::types::{Column, Table};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    TracingExecutionObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on columns being inferred at the same time.
    pub max_in_flight_columns: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_parallelism();
        Self {
            num_threads: Some(n),
            max_in_flight_columns: n,
        }
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// An inferred column carrying the index it came from.
struct TaggedColumn {
    index: usize,
    column: Column,
}

/// Runs column inference on a fixed-size worker pool.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails if `max_in_flight_columns == 0`, `num_threads == Some(0)`, or the pool cannot be
    /// built.
    pub fn new(opts: ExecutionOptions) -> Result<Self, ExecutionError> {
        if opts.max_in_flight_columns == 0 {
            return Err(ExecutionError::InvalidOptions {
                message: "max_in_flight_columns must be > 0".to_string(),
            });
        }
        if opts.num_threads == Some(0) {
            return Err(ExecutionError::InvalidOptions {
                message: "num_threads must be > 0 when set".to_string(),
            });
        }

        let n_threads = opts.num_threads.unwrap_or_else(available_parallelism);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("infer-worker-{i}"))
            .build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Infer every column of `table` in parallel.
    ///
    /// Column order, column count and row count of the result equal the input's.
    pub fn infer_table(&self, table: &Table, opts: &InferenceOptions) -> Table {
        self.pool.install(|| self.infer_table_impl(table, opts))
    }

    fn infer_table_impl(&self, table: &Table, opts: &InferenceOptions) -> Table {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            columns: table.column_count(),
        });

        let sem = Semaphore::new(self.opts.max_in_flight_columns);
        let (tx, rx) = mpsc::channel::<TaggedColumn>();

        table
            .columns()
            .par_iter()
            .enumerate()
            .for_each_with(tx, |tx, (index, column)| {
                let (_permit, waited) = sem.acquire();
                if waited > Duration::ZERO {
                    self.metrics.on_throttle_wait(waited);
                    self.emit(ExecutionEvent::ThrottleWaited { duration: waited });
                }

                self.metrics.on_column_start();
                self.emit(ExecutionEvent::ColumnStarted {
                    index,
                    name: column.name.clone(),
                    rows: column.len(),
                });

                let inferred = infer_column(column, opts);

                self.emit(ExecutionEvent::ColumnFinished {
                    index,
                    name: inferred.name.clone(),
                    data_type: inferred.data_type,
                });
                self.metrics.on_column_end(column.len());

                // The receiver outlives the parallel loop, so sending cannot fail.
                let _ = tx.send(TaggedColumn {
                    index,
                    column: inferred,
                });
            });

        let mut slots: Vec<Option<Column>> = vec![None; table.column_count()];
        for tagged in rx {
            slots[tagged.index] = Some(tagged.column);
        }
        let columns = slots
            .into_iter()
            .zip(table.columns())
            .map(|(slot, original)| slot.unwrap_or_else(|| original.clone()))
            .collect();
        let out = Table::from_columns_unchecked(columns);

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });

        out
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionEngine, ExecutionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::InferenceOptions;
    use crate::error::ExecutionError;
    use crate::execution::{ExecutionEvent, ExecutionObserver};
    use crate::inference;
    use crate::types::Table;

    fn wide_table(columns: usize) -> Table {
        let cols: Vec<(String, Vec<Option<&str>>)> = (0..columns)
            .map(|i| {
                let values = match i % 4 {
                    0 => vec![Some("1"), Some("2"), Some("3"), Some("4")],
                    1 => vec![Some("yes"), Some("no"), Some("yes"), Some("no")],
                    2 => vec![Some("10/11/12"), Some("2020-01-01"), None, Some("1 Jan 2001")],
                    _ => vec![Some("ann"), Some("bob"), Some("cy"), Some("dee")],
                };
                (format!("c{i}"), values)
            })
            .collect();
        Table::from_text_columns(cols).unwrap()
    }

    /// Tracks concurrently running columns; sleeps on start so columns overlap.
    struct ConcurrencyObserver {
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl ConcurrencyObserver {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            }
        }
        fn max(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }
    }

    impl ExecutionObserver for ConcurrencyObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::ColumnStarted { .. } => {
                    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(2));
                }
                ExecutionEvent::ColumnFinished { .. } => {
                    let _ = self.active.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn zero_in_flight_is_rejected() {
        let err = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(2),
            max_in_flight_columns: 0,
        })
        .err()
        .unwrap();
        assert!(matches!(err, ExecutionError::InvalidOptions { .. }));
    }

    #[test]
    fn parallel_matches_sequential() {
        let table = wide_table(24);
        let opts = InferenceOptions::default();
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_columns: 4,
        })
        .unwrap();

        let parallel = engine.infer_table(&table, &opts);
        let sequential = inference::infer_table(&table, &opts);
        assert_eq!(parallel, sequential);
        assert_eq!(engine.infer_table(&table, &opts), parallel);
    }

    #[test]
    fn columns_run_concurrently() {
        let table = wide_table(32);
        let observer = Arc::new(ConcurrencyObserver::new());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_columns: 4,
        })
        .unwrap()
        .with_observer(obs_trait);

        let out = engine.infer_table(&table, &InferenceOptions::default());
        assert_eq!(out.column_count(), 32);
        assert!(observer.max() > 1);
    }

    #[test]
    fn max_in_flight_columns_throttles_concurrency() {
        let table = wide_table(20);
        let observer = Arc::new(ConcurrencyObserver::new());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_columns: 1,
        })
        .unwrap()
        .with_observer(obs_trait);

        let out = engine.infer_table(&table, &InferenceOptions::default());
        assert_eq!(out.column_count(), 20);
        assert_eq!(observer.max(), 1);
    }

    #[test]
    fn metrics_are_available_after_run() {
        let table = wide_table(12);
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_columns: 1,
        })
        .unwrap()
        .with_observer(Arc::new(ConcurrencyObserver::new()));
        let metrics = engine.metrics();

        let _ = engine.infer_table(&table, &InferenceOptions::default());

        let snap = metrics.snapshot();
        assert_eq!(snap.columns_started, 12);
        assert_eq!(snap.columns_finished, 12);
        assert_eq!(snap.cells_processed, 12 * 4);
        assert_eq!(snap.max_active_columns, 1);
        assert!(snap.throttle_wait > Duration::ZERO);
        assert!(snap.elapsed.is_some());
    }
}
