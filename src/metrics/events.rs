//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when input lines are read.
pub struct LinesRead {
    pub count: u64,
}

impl InternalEvent for LinesRead {
    fn emit(self) {
        trace!(count = self.count, "Lines read");
        counter!("sleet_lines_read_total").increment(self.count);
    }
}

/// Final disposition of one input item.
#[derive(Debug, Clone, Copy)]
pub enum RecordStatus {
    /// Created in the store and included in the output.
    Created,
    /// Already present in the store; dropped from the output.
    Existing,
    /// Dropped by the supervision policy.
    Skipped,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Created => "created",
            RecordStatus::Existing => "existing",
            RecordStatus::Skipped => "skipped",
        }
    }
}

/// Event emitted when an input item reaches its final disposition.
pub struct RecordProcessed {
    pub status: RecordStatus,
}

impl InternalEvent for RecordProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Record processed");
        counter!("sleet_records_processed_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Stage at which an item failure occurred.
#[derive(Debug, Clone, Copy)]
pub enum FailureStage {
    Parse,
    Check,
    Create,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Parse => "parse",
            FailureStage::Check => "check",
            FailureStage::Create => "create",
        }
    }
}

/// Event emitted when an item fails at a stage.
pub struct ItemFailed {
    pub stage: FailureStage,
}

impl InternalEvent for ItemFailed {
    fn emit(self) {
        trace!(stage = self.stage.as_str(), "Item failed");
        counter!("sleet_items_failed_total", "stage" => self.stage.as_str()).increment(1);
    }
}

/// Asynchronous pipeline stages.
#[derive(Debug, Clone, Copy)]
pub enum Stage {
    Check,
    Create,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Check => "check",
            Stage::Create => "create",
        }
    }
}

/// Event tracking the number of in-flight calls in a stage.
pub struct ActiveCalls {
    pub stage: Stage,
    pub count: usize,
}

impl InternalEvent for ActiveCalls {
    fn emit(self) {
        gauge!("sleet_active_calls", "stage" => self.stage.as_str()).set(self.count as f64);
    }
}

/// Event emitted when an existence check completes.
pub struct CheckCompleted {
    pub duration: Duration,
}

impl InternalEvent for CheckCompleted {
    fn emit(self) {
        histogram!("sleet_check_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a create call completes.
pub struct CreateCompleted {
    pub duration: Duration,
}

impl InternalEvent for CreateCompleted {
    fn emit(self) {
        histogram!("sleet_create_duration_seconds").record(self.duration.as_secs_f64());
    }
}
