//! sleet: A library for loading line-delimited records into a record store.
//!
//! This library provides a bounded-concurrency pipeline that parses
//! `id:name:content` lines, checks each record against a store, and
//! creates the ones the store does not yet have, preserving input order
//! in the output regardless of call completion order.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sleet::{MemoryLineSource, MemoryStore, PipelineConfig, run_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sleet::error::PipelineError> {
//!     let source = MemoryLineSource::new(["1:a:data-a", "2:b:data-b"]);
//!     let store = Arc::new(MemoryStore::new());
//!     let output = run_pipeline(source, store.clone(), store, PipelineConfig::default()).await?;
//!     println!("Created {} records", output.records.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod signal;
pub mod source;
pub mod store;
pub mod supervision;

// Re-export main types
pub use config::{Config, PipelineConfig};
pub use pipeline::{Pipeline, PipelineOutput, PipelineStats, run_pipeline};
pub use record::Record;
pub use source::{FileLineSource, LineSource, MemoryLineSource};
pub use store::{MemoryStore, RecordLookup, RecordWriter};
