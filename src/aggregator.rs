//! Concurrent fan-in of per-document extraction.
//!
//! This module runs one extraction task per input document:
//! - **Bounded concurrency**: a semaphore caps how many documents are parsed at once
//! - **Blocking work off the async workers**: parsing runs on the blocking pool
//! - **Single merge region**: the shared record set is locked only for the append
//! - **Soft deadline**: the aggregator stops waiting when the deadline passes and
//!   hands off what has been merged; in-flight tasks are left to finish on their own
//!
//! Once the record set has been handed off the shared collection is closed, so a
//! task that finishes late drops its records instead of appending them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{ConvertError, ExtractResult, Result};
use crate::extractor::Record;

/// Default wall-clock budget for the whole extraction phase
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// Records gathered from every document, in no particular document order
pub type RecordSet = Vec<Record>;

/// Anything that can turn one document path into records
#[cfg_attr(test, mockall::automock)]
pub trait RecordSource: Send + Sync {
    fn extract(&self, path: &Path) -> ExtractResult<Vec<Record>>;
}

/// Aggregation configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    /// Time after which the aggregator stops waiting for tasks
    pub deadline: Duration,
    /// Maximum number of documents extracted at once
    pub max_concurrent_extractions: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            max_concurrent_extractions: num_cpus::get(),
        }
    }
}

/// Counters describing one aggregation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// Number of documents submitted
    pub files: usize,
    /// Documents whose result was merged before hand-off (failures included)
    pub completed: usize,
    /// Documents that could not be read or parsed
    pub failed: usize,
    /// Records merged before hand-off
    pub records: usize,
}

/// Result of one aggregation run
#[derive(Debug)]
pub struct Aggregation {
    pub records: RecordSet,
    pub timed_out: bool,
    pub stats: AggregateStats,
    pub duration: Duration,
    late: Arc<AtomicUsize>,
}

impl Aggregation {
    /// Tasks that finished after the hand-off and whose records were dropped so far
    pub fn late_arrivals(&self) -> usize {
        self.late.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct SharedRecords {
    records: RecordSet,
    stats: AggregateStats,
    closed: bool,
}

fn lock(shared: &Mutex<SharedRecords>) -> MutexGuard<'_, SharedRecords> {
    // Appends are all-or-nothing, so a poisoned lock still guards consistent data.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs a [`RecordSource`] over many documents concurrently and merges the results
pub struct ParallelAggregator {
    source: Arc<dyn RecordSource>,
    config: AggregatorConfig,
}

impl ParallelAggregator {
    pub fn new(source: Arc<dyn RecordSource>, config: AggregatorConfig) -> Self {
        Self { source, config }
    }

    /// Extract every document and merge the records, waiting at most for the deadline
    pub async fn run(&self, paths: Vec<PathBuf>) -> Result<Aggregation> {
        let start = Instant::now();
        let total_files = paths.len();
        let shared = Arc::new(Mutex::new(SharedRecords::default()));
        let late = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(Semaphore::new(
            self.config.max_concurrent_extractions.max(1),
        ));

        info!(files = total_files, "extracting documents");

        let tasks: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let source = Arc::clone(&self.source);
                let shared = Arc::clone(&shared);
                let late = Arc::clone(&late);
                let semaphore = Arc::clone(&semaphore);

                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|_| {
                        ConvertError::Concurrency {
                            details: "Failed to acquire extraction semaphore".to_string(),
                        }
                    })?;

                    let task_path = path.clone();
                    let task_shared = Arc::clone(&shared);
                    let task_late = Arc::clone(&late);
                    let joined = tokio::task::spawn_blocking(move || {
                        let result = source.extract(&task_path);
                        merge(&task_shared, &task_late, &task_path, result);
                    })
                    .await;

                    // A panicking extractor counts as a failed document.
                    if let Err(e) = joined {
                        warn!(file = %path.display(), error = %e, "extraction task panicked");
                        let mut state = lock(&shared);
                        if !state.closed {
                            state.stats.completed += 1;
                            state.stats.failed += 1;
                        }
                    }

                    Ok::<(), ConvertError>(())
                })
            })
            .collect();

        let timed_out = match tokio::time::timeout(self.config.deadline, try_join_all(tasks)).await
        {
            Ok(joined) => {
                let task_results = joined.map_err(|e| ConvertError::Concurrency {
                    details: format!("Task join error: {}", e),
                })?;
                for result in task_results {
                    result?;
                }
                false
            }
            Err(_) => {
                warn!(
                    deadline = ?self.config.deadline,
                    "deadline elapsed, continuing with partial results"
                );
                true
            }
        };

        let mut state = lock(&shared);
        state.closed = true;
        let records = std::mem::take(&mut state.records);
        let mut stats = state.stats;
        drop(state);

        stats.files = total_files;
        info!(
            completed = stats.completed,
            failed = stats.failed,
            records = stats.records,
            "extraction finished"
        );

        Ok(Aggregation {
            records,
            timed_out,
            stats,
            duration: start.elapsed(),
            late,
        })
    }
}

/// Append one document's result to the shared set under the lock
fn merge(
    shared: &Mutex<SharedRecords>,
    late: &AtomicUsize,
    path: &Path,
    result: ExtractResult<Vec<Record>>,
) {
    let (records, failed) = match result {
        Ok(records) => (records, false),
        Err(e) => {
            warn!(error = %e, "skipping document");
            (Vec::new(), true)
        }
    };

    let mut state = lock(shared);
    if state.closed {
        late.fetch_add(1, Ordering::SeqCst);
        debug!(file = %path.display(), "dropping result that arrived after hand-off");
        return;
    }

    state.stats.completed += 1;
    if failed {
        state.stats.failed += 1;
    }
    state.stats.records += records.len();
    state.records.extend(records);
    debug!(file = %path.display(), total = state.records.len(), "merged document");
}
