//! Main processing pipeline.
//!
//! Turns a line source into an input-ordered sequence of created records,
//! running the existence-check and create stages with bounded concurrency
//! and graceful shutdown.
//!
//! # Architecture
//!
//! Lines are pulled one at a time, only while stage slots are free, and
//! parsed inline. Each parsed record is tagged with its input index and
//! dispatched into the check stage; records the store does not yet know
//! flow on into the create stage. Completions arrive out of order and are
//! reassembled by the index-keyed collector, so output order never depends
//! on store latency. Failures at every stage boundary go through the
//! supervision policy: per-item failures are logged and dropped, anything
//! else ends the run without delivering a partial result.

mod collector;

use futures::stream::{FuturesUnordered, StreamExt};
use snafu::prelude::*;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::emit;
use crate::error::{
    LookupSnafu, PipelineError, SourceSnafu, StoreError, TaskJoinSnafu, TimeoutSnafu,
};
use crate::metrics::events::{
    ActiveCalls, CheckCompleted, CreateCompleted, FailureStage, ItemFailed, LinesRead,
    RecordProcessed, RecordStatus, Stage,
};
use crate::record::Record;
use crate::source::LineSource;
use crate::store::{RecordLookup, RecordWriter};
use crate::supervision::{self, Directive};

use collector::OrderedCollector;

/// Statistics about the pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines_read: usize,
    pub records_created: usize,
    pub records_existing: usize,
    pub items_skipped: usize,
}

/// Successful run outcome: surviving records in input order, plus counters.
#[derive(Debug)]
pub struct PipelineOutput {
    pub records: Vec<Record>,
    pub stats: PipelineStats,
}

/// Existence check result for one in-flight record.
struct CheckOutcome {
    index: u64,
    record: Record,
    exists: bool,
}

/// Create result for one in-flight record.
struct CreateOutcome {
    index: u64,
    record: Record,
}

/// Future type for existence-check operations.
type CheckFuture = Pin<Box<dyn Future<Output = Result<CheckOutcome, PipelineError>> + Send>>;

/// Future type for create operations.
type CreateFuture = Pin<Box<dyn Future<Output = Result<CreateOutcome, PipelineError>> + Send>>;

/// Main processing pipeline.
pub struct Pipeline<S> {
    source: S,
    lookup: Arc<dyn RecordLookup>,
    writer: Arc<dyn RecordWriter>,
    config: PipelineConfig,
    shutdown: CancellationToken,
}

impl<S: LineSource> Pipeline<S> {
    /// Create a pipeline with its own shutdown token.
    pub fn new(
        source: S,
        lookup: Arc<dyn RecordLookup>,
        writer: Arc<dyn RecordWriter>,
        config: PipelineConfig,
    ) -> Self {
        Self::with_shutdown(source, lookup, writer, config, CancellationToken::new())
    }

    /// Create a pipeline wired to an external shutdown token.
    pub fn with_shutdown(
        source: S,
        lookup: Arc<dyn RecordLookup>,
        writer: Arc<dyn RecordWriter>,
        config: PipelineConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            lookup,
            writer,
            config,
            shutdown,
        }
    }

    /// Run the pipeline to completion.
    ///
    /// Completes successfully only when the source is exhausted and every
    /// in-flight call has finished without a fatal failure. On a fatal
    /// failure the collected records are discarded and the error is
    /// returned; in-flight calls are dropped, and no new work is started.
    pub async fn run(mut self) -> Result<PipelineOutput, PipelineError> {
        let concurrency = self.config.concurrency;
        let mut checks: FuturesUnordered<CheckFuture> = FuturesUnordered::new();
        let mut creates: FuturesUnordered<CreateFuture> = FuturesUnordered::new();
        // Records that cleared the check stage and are waiting for a
        // create slot. Bounded: the pull gate keeps it at stage width.
        let mut ready_to_create: VecDeque<(u64, Record)> = VecDeque::new();
        let mut collector = OrderedCollector::new();
        let mut stats = PipelineStats::default();
        let mut next_index: u64 = 0;
        let mut source_done = false;

        info!(concurrency, "Starting pipeline");

        loop {
            // Promote waiting records into the create stage as slots free up.
            while creates.len() < concurrency {
                let Some((index, record)) = ready_to_create.pop_front() else {
                    break;
                };
                debug!(index, id = record.id, "Dispatching create");
                creates.push(spawn_create(self.writer.clone(), index, record));
            }

            // Pull lines while the check stage has free slots. Parsing is
            // synchronous and consumes no slot.
            while !source_done
                && checks.len() < concurrency
                && ready_to_create.len() < concurrency
            {
                let line = tokio::select! {
                    biased;

                    _ = self.shutdown.cancelled() => {
                        info!("Shutdown requested, stopping pipeline");
                        return Err(PipelineError::Interrupted);
                    }

                    line = self.source.next_line() => line.context(SourceSnafu)?,
                };

                let Some(line) = line else {
                    source_done = true;
                    break;
                };

                let index = next_index;
                next_index += 1;
                stats.lines_read += 1;
                emit!(LinesRead { count: 1 });

                match line.parse::<Record>() {
                    Ok(record) => {
                        debug!(index, id = record.id, "Dispatching existence check");
                        checks.push(spawn_check(self.lookup.clone(), index, record));
                    }
                    Err(source) => {
                        let failure = PipelineError::Parse { source };
                        self.handle_item_failure(failure, FailureStage::Parse, &mut stats)?;
                    }
                }
            }

            if source_done && checks.is_empty() && creates.is_empty() && ready_to_create.is_empty()
            {
                break;
            }

            emit!(ActiveCalls {
                stage: Stage::Check,
                count: checks.len(),
            });
            emit!(ActiveCalls {
                stage: Stage::Create,
                count: creates.len(),
            });

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping pipeline");
                    return Err(PipelineError::Interrupted);
                }

                Some(result) = checks.next(), if !checks.is_empty() => {
                    match result {
                        Ok(CheckOutcome { index, record, exists: true }) => {
                            debug!(index, id = record.id, "Record already exists, dropping");
                            stats.records_existing += 1;
                            emit!(RecordProcessed { status: RecordStatus::Existing });
                        }
                        Ok(CheckOutcome { index, record, exists: false }) => {
                            ready_to_create.push_back((index, record));
                        }
                        Err(failure) => {
                            self.handle_item_failure(failure, FailureStage::Check, &mut stats)?;
                        }
                    }
                }

                Some(result) = creates.next(), if !creates.is_empty() => {
                    match result {
                        Ok(CreateOutcome { index, record }) => {
                            debug!(index, id = record.id, "Record created");
                            stats.records_created += 1;
                            emit!(RecordProcessed { status: RecordStatus::Created });
                            collector.insert(index, record);
                        }
                        Err(failure) => {
                            self.handle_item_failure(failure, FailureStage::Create, &mut stats)?;
                        }
                    }
                }
            }
        }

        info!(
            lines = stats.lines_read,
            created = stats.records_created,
            existing = stats.records_existing,
            skipped = stats.items_skipped,
            "Pipeline complete"
        );

        debug_assert_eq!(collector.len(), stats.records_created);

        Ok(PipelineOutput {
            records: collector.into_ordered(),
            stats,
        })
    }

    /// Run the pipeline under a wall-clock budget.
    ///
    /// Expiry is a fatal failure: no partial result is returned.
    pub async fn run_with_timeout(self, timeout: Duration) -> Result<PipelineOutput, PipelineError> {
        let seconds = timeout.as_secs();
        match tokio::time::timeout(timeout, self.run()).await {
            Ok(result) => result,
            Err(_) => TimeoutSnafu { seconds }.fail(),
        }
    }

    /// Route a failed item through the supervision policy.
    fn handle_item_failure(
        &self,
        failure: PipelineError,
        stage: FailureStage,
        stats: &mut PipelineStats,
    ) -> Result<(), PipelineError> {
        emit!(ItemFailed { stage });
        match supervision::classify(&failure) {
            Directive::Resume => {
                warn!(stage = stage.as_str(), error = %failure, "Skipping failed item");
                stats.items_skipped += 1;
                emit!(RecordProcessed {
                    status: RecordStatus::Skipped
                });
                Ok(())
            }
            Directive::Abort => {
                error!(stage = stage.as_str(), error = %failure, "Fatal failure, aborting run");
                Err(failure)
            }
        }
    }
}

/// Spawn an existence check, tagging the outcome with the input index.
fn spawn_check(lookup: Arc<dyn RecordLookup>, index: u64, record: Record) -> CheckFuture {
    Box::pin(async move {
        let id = record.id;
        let (record, result) = tokio::spawn(async move {
            let start = Instant::now();
            let result = lookup.exists(record.id).await;
            emit!(CheckCompleted {
                duration: start.elapsed()
            });
            (record, result)
        })
        .await
        .context(TaskJoinSnafu)?;

        let exists = result.context(LookupSnafu { id })?;
        Ok(CheckOutcome {
            index,
            record,
            exists,
        })
    })
}

/// Spawn a create call, tagging the outcome with the input index.
///
/// A store rejection becomes a per-record create failure carrying the
/// original record; any other store error is fatal.
fn spawn_create(writer: Arc<dyn RecordWriter>, index: u64, record: Record) -> CreateFuture {
    Box::pin(async move {
        let result = tokio::spawn(async move {
            let start = Instant::now();
            let id = record.id;
            let result = match writer.create(record.clone()).await {
                Ok(created) => Ok(created),
                Err(StoreError::Rejected { reason, .. }) => {
                    Err(PipelineError::Create { record, reason })
                }
                Err(source) => Err(PipelineError::Store { id, source }),
            };
            emit!(CreateCompleted {
                duration: start.elapsed()
            });
            result
        })
        .await
        .context(TaskJoinSnafu)?;

        let record = result?;
        Ok(CreateOutcome { index, record })
    })
}

/// Run a pipeline over the given source and store, with signal-driven
/// graceful shutdown and the configured wall-clock budget.
pub async fn run_pipeline<S: LineSource>(
    source: S,
    lookup: Arc<dyn RecordLookup>,
    writer: Arc<dyn RecordWriter>,
    config: PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    let shutdown = CancellationToken::new();

    // Cancel the run on SIGINT/SIGTERM/SIGQUIT
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            crate::signal::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let timeout_secs = config.timeout_secs;
    let pipeline = Pipeline::with_shutdown(source, lookup, writer, config, shutdown);

    match timeout_secs {
        Some(seconds) => {
            pipeline
                .run_with_timeout(Duration::from_secs(seconds))
                .await
        }
        None => pipeline.run().await,
    }
}
