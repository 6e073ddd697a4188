//! Ports for the remote record store.
//!
//! The pipeline never sees a wire format; it consumes these two
//! capabilities and nothing else. Both are invoked at most once per
//! record within a single run.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::Record;

/// Existence check keyed by record id.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Whether a record with this id already exists in the store.
    async fn exists(&self, id: i64) -> Result<bool, StoreError>;
}

/// Record creation.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Persist a record, returning the accepted form.
    ///
    /// Only called for records whose existence check returned false.
    /// A [`StoreError::Rejected`] is a per-record refusal; any other
    /// error means the store itself is unhealthy.
    async fn create(&self, record: Record) -> Result<Record, StoreError>;
}
