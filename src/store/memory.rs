//! In-memory record store.
//!
//! Stands in for the remote service in the CLI and in tests. Supports an
//! injected per-call latency so concurrency behavior can be exercised
//! without a network.

use async_trait::async_trait;
use snafu::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{RejectedSnafu, StoreError};
use crate::record::Record;

use super::{RecordLookup, RecordWriter};

/// A record store backed by a process-local map.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<i64, Record>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a remote round-trip of the given duration on every call.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            latency: Some(latency),
        }
    }

    /// Pre-populate the store, marking those ids as already existing.
    pub async fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut map = self.records.lock().await;
        for record in records {
            map.insert(record.id, record);
        }
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    async fn simulate_round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RecordLookup for MemoryStore {
    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        self.simulate_round_trip().await;
        Ok(self.records.lock().await.contains_key(&id))
    }
}

#[async_trait]
impl RecordWriter for MemoryStore {
    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        self.simulate_round_trip().await;
        let mut map = self.records.lock().await;
        ensure!(
            !map.contains_key(&record.id),
            RejectedSnafu {
                id: record.id,
                reason: "record already exists",
            }
        );
        debug!(id = record.id, name = %record.name, "Created record");
        map.insert(record.id, record.clone());
        Ok(record)
    }
}
