//! Error types for sleet using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;

use crate::record::Record;

// ============ Parse Errors ============

/// Errors produced while parsing an input line into a [`Record`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ParseError {
    /// Line does not match the `id:name:content` grammar.
    #[snafu(display("Malformed line {line:?}: expected id:name:content"))]
    Malformed { line: String },

    /// The id group matched but does not fit in an i64.
    #[snafu(display("Record id out of range in line {line:?}"))]
    IdOutOfRange {
        line: String,
        source: std::num::ParseIntError,
    },
}

impl ParseError {
    /// The raw input line that failed to parse.
    pub fn line(&self) -> &str {
        match self {
            ParseError::Malformed { line } => line,
            ParseError::IdOutOfRange { line, .. } => line,
        }
    }
}

// ============ Store Errors ============

/// Errors returned by the remote record store collaborators.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// The store refused to create the record.
    #[snafu(display("Store rejected record {id}: {reason}"))]
    Rejected { id: i64, reason: String },

    /// The store could not be reached or answered out of protocol.
    #[snafu(display("Store unavailable: {message}"))]
    Unavailable { message: String },
}

impl StoreError {
    /// True when the store refused the record itself rather than failing
    /// to answer at all.
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreError::Rejected { .. })
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Concurrency of zero would never dispatch any work.
    #[snafu(display("Concurrency must be at least 1"))]
    ZeroConcurrency,

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
///
/// The supervision policy classifies these: `Parse` and `Create` are
/// per-item conditions the run recovers from, everything else ends it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// An input line failed to parse.
    #[snafu(display("Parse failure"))]
    Parse { source: ParseError },

    /// The store rejected a record during creation.
    #[snafu(display("Create failure for record {}: {reason}", record.id))]
    Create { record: Record, reason: String },

    /// The existence check failed for a record.
    #[snafu(display("Existence check failed for record {id}"))]
    Lookup { id: i64, source: StoreError },

    /// Record creation failed for a reason other than rejection.
    #[snafu(display("Store error while creating record {id}"))]
    Store { id: i64, source: StoreError },

    /// The line source failed to produce the next line.
    #[snafu(display("Failed to read input"))]
    Source { source: std::io::Error },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Address parsing error.
    #[snafu(display("Failed to parse metrics address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Task join error.
    #[snafu(display("Task join error"))]
    TaskJoin { source: tokio::task::JoinError },

    /// The run exceeded its wall-clock budget.
    #[snafu(display("Pipeline timed out after {seconds}s"))]
    Timeout { seconds: u64 },

    /// A shutdown signal interrupted the run.
    #[snafu(display("Pipeline interrupted before completion"))]
    Interrupted,
}
