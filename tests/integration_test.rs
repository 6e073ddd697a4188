//! Integration tests for sleet

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sleet::error::{PipelineError, StoreError};
use sleet::{MemoryLineSource, MemoryStore, Pipeline, PipelineConfig, Record};
use sleet::{RecordLookup, RecordWriter};

/// Store double with scripted existence answers and per-id create latency.
struct ScriptedStore {
    exists_fn: fn(i64) -> bool,
    create_delay: fn(i64) -> Duration,
}

impl ScriptedStore {
    fn new(exists_fn: fn(i64) -> bool) -> Self {
        Self {
            exists_fn,
            create_delay: |_| Duration::ZERO,
        }
    }

    fn with_create_delay(mut self, create_delay: fn(i64) -> Duration) -> Self {
        self.create_delay = create_delay;
        self
    }
}

#[async_trait]
impl RecordLookup for ScriptedStore {
    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        Ok((self.exists_fn)(id))
    }
}

#[async_trait]
impl RecordWriter for ScriptedStore {
    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        tokio::time::sleep((self.create_delay)(record.id)).await;
        Ok(record)
    }
}

/// Writer double that records which ids reach the create stage.
#[derive(Default)]
struct RecordingWriter {
    created_ids: Mutex<Vec<i64>>,
}

#[async_trait]
impl RecordWriter for RecordingWriter {
    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        self.created_ids.lock().unwrap().push(record.id);
        Ok(record)
    }
}

/// Lookup double that fails with a transport error for one id.
struct FlakyLookup {
    fail_id: i64,
}

#[async_trait]
impl RecordLookup for FlakyLookup {
    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        if id == self.fail_id {
            return Err(StoreError::Unavailable {
                message: "connection refused".to_string(),
            });
        }
        Ok(false)
    }
}

/// Writer double that rejects one id and accepts the rest.
struct RejectingWriter {
    reject_id: i64,
}

#[async_trait]
impl RecordWriter for RejectingWriter {
    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        if record.id == self.reject_id {
            return Err(StoreError::Rejected {
                id: record.id,
                reason: "schema validation failed".to_string(),
            });
        }
        Ok(record)
    }
}

/// Writer double that fails with a transport error for one id.
struct BrokenWriter {
    fail_id: i64,
}

#[async_trait]
impl RecordWriter for BrokenWriter {
    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        if record.id == self.fail_id {
            return Err(StoreError::Unavailable {
                message: "broken pipe".to_string(),
            });
        }
        Ok(record)
    }
}

/// Store double tracking the maximum number of concurrent create calls.
#[derive(Default)]
struct GaugedStore {
    current: AtomicUsize,
    max: AtomicUsize,
}

#[async_trait]
impl RecordLookup for GaugedStore {
    async fn exists(&self, _id: i64) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[async_trait]
impl RecordWriter for GaugedStore {
    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(record)
    }
}

fn lines(input: &[&str]) -> MemoryLineSource {
    MemoryLineSource::new(input.iter().copied())
}

fn config(concurrency: usize) -> PipelineConfig {
    PipelineConfig {
        concurrency,
        timeout_secs: None,
    }
}

fn ids(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| r.id).collect()
}

mod ordering_tests {
    use super::*;

    #[tokio::test]
    async fn test_output_order_survives_reversed_completion() {
        // Later lines finish their create calls first; the collector must
        // still emit them in input order.
        let store = Arc::new(
            ScriptedStore::new(|_| false)
                .with_create_delay(|id| Duration::from_millis(((9 - id).max(0) * 10) as u64)),
        );
        let input = [
            "1:a:data-1",
            "2:b:data-2",
            "3:c:data-3",
            "4:d:data-4",
            "5:e:data-5",
            "6:f:data-6",
            "7:g:data-7",
            "8:h:data-8",
        ];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store, config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(ids(&output.records), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_output_order_survives_scattered_completion() {
        let store = Arc::new(
            ScriptedStore::new(|_| false)
                .with_create_delay(|id| Duration::from_millis(((id * 7919) % 5) as u64 * 10)),
        );
        let input = [
            "10:a:x", "11:b:x", "12:c:x", "13:d:x", "14:e:x", "15:f:x",
        ];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store, config(3));
        let output = pipeline.run().await.unwrap();

        assert_eq!(ids(&output.records), vec![10, 11, 12, 13, 14, 15]);
    }

    #[tokio::test]
    async fn test_survivor_order_with_interleaved_existing_records() {
        // Even ids exist and drop out; the odd survivors keep their
        // relative order despite reversed create latency.
        let store = Arc::new(
            ScriptedStore::new(|id| id % 2 == 0)
                .with_create_delay(|id| Duration::from_millis(((9 - id).max(0) * 10) as u64)),
        );
        let input = [
            "1:a:x", "2:b:x", "3:c:x", "4:d:x", "5:e:x", "6:f:x", "7:g:x", "8:h:x",
        ];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store, config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(ids(&output.records), vec![1, 3, 5, 7]);
        assert_eq!(output.stats.records_existing, 4);
    }
}

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_even_ids_exist_odd_ids_are_created() {
        let store = Arc::new(ScriptedStore::new(|id| id % 2 == 0));
        let input = ["1:a:data-a", "2:b:data-b", "3:c:data-c", "4:d:data-d"];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store, config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(
            output.records,
            vec![
                Record::new(1, "a", "data-a"),
                Record::new(3, "c", "data-c"),
            ]
        );
        assert_eq!(output.stats.records_created, 2);
        assert_eq!(output.stats.records_existing, 2);
    }

    #[tokio::test]
    async fn test_malformed_line_mixed_with_existing_records() {
        // Line 3 is malformed (no second colon after the id group); ids 2
        // and 4 already exist; only record 1 survives to the output.
        let store = Arc::new(ScriptedStore::new(|id| id % 2 == 0));
        let input = ["1:a:data-a", "2:b:data-b", "3-c:data-c", "4:d:data-d"];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store, config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(output.records, vec![Record::new(1, "a", "data-a")]);
        assert_eq!(output.stats.items_skipped, 1);
        assert_eq!(output.stats.records_existing, 2);
    }

    #[tokio::test]
    async fn test_existing_record_never_reaches_creator() {
        let lookup = Arc::new(ScriptedStore::new(|id| id <= 2));
        let writer = Arc::new(RecordingWriter::default());
        let input = ["1:a:x", "2:b:x", "3:c:x", "4:d:x"];

        let pipeline = Pipeline::new(lines(&input), lookup, writer.clone(), config(4));
        let output = pipeline.run().await.unwrap();

        let mut created = writer.created_ids.lock().unwrap().clone();
        created.sort_unstable();
        assert_eq!(created, vec![3, 4]);
        assert_eq!(ids(&output.records), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_yield_a_single_record() {
        // The second occurrence either sees exists == true or races into
        // the create stage and is rejected; both are per-item skips.
        let store = Arc::new(MemoryStore::new());
        let input = ["5:x:first", "5:x:second"];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store.clone(), config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].id, 5);
        assert_eq!(output.stats.records_created, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_file_source_end_to_end() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1:a:data-a").unwrap();
        writeln!(file, "2:b:data-b").unwrap();
        writeln!(file, "not a record").unwrap();
        writeln!(file, "3:c:data-c").unwrap();

        let source = sleet::FileLineSource::open(file.path()).await.unwrap();
        let store = Arc::new(MemoryStore::new());

        let pipeline = Pipeline::new(source, store.clone(), store.clone(), config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(ids(&output.records), vec![1, 2, 3]);
        assert_eq!(output.stats.items_skipped, 1);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_seeded_store_short_circuits_existing_ids() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed([Record::new(2, "b", "old"), Record::new(4, "d", "old")])
            .await;
        let input = ["1:a:new", "2:b:new", "3:c:new", "4:d:new"];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store.clone(), config(2));
        let output = pipeline.run().await.unwrap();

        assert_eq!(ids(&output.records), vec![1, 3]);
        assert_eq!(output.stats.records_existing, 2);
        assert_eq!(store.len().await, 4);
    }
}

mod supervision_tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_line_is_skipped_and_run_succeeds() {
        let store = Arc::new(ScriptedStore::new(|_| false));
        let input = ["1:a:x", "not-a-record", "3:c:x", "4:d:x"];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store, config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(ids(&output.records), vec![1, 3, 4]);
        assert_eq!(output.stats.items_skipped, 1);
        assert_eq!(output.stats.lines_read, 4);
    }

    #[tokio::test]
    async fn test_create_rejection_is_skipped_and_run_succeeds() {
        let lookup = Arc::new(ScriptedStore::new(|_| false));
        let writer = Arc::new(RejectingWriter { reject_id: 2 });
        let input = ["1:a:x", "2:b:x", "3:c:x"];

        let pipeline = Pipeline::new(lines(&input), lookup, writer, config(4));
        let output = pipeline.run().await.unwrap();

        assert_eq!(ids(&output.records), vec![1, 3]);
        assert_eq!(output.stats.items_skipped, 1);
    }

    #[tokio::test]
    async fn test_lookup_transport_failure_aborts_the_run() {
        let lookup = Arc::new(FlakyLookup { fail_id: 3 });
        let writer = Arc::new(RecordingWriter::default());
        let input = ["1:a:x", "2:b:x", "3:c:x", "4:d:x"];

        let pipeline = Pipeline::new(lines(&input), lookup, writer, config(4));
        let error = pipeline.run().await.unwrap_err();

        assert!(matches!(error, PipelineError::Lookup { id: 3, .. }));
    }

    #[tokio::test]
    async fn test_abort_discards_records_collected_before_the_failure() {
        // Records 1 and 2 complete their creates before the check for
        // id 4 fails; the run still reports failure, not a partial list.
        let lookup = Arc::new(FlakyLookup { fail_id: 4 });
        let writer = Arc::new(RecordingWriter::default());
        let input = ["1:a:x", "2:b:x", "3:c:x", "4:d:x"];

        let pipeline = Pipeline::new(lines(&input), lookup, writer, config(1));
        let result = pipeline.run().await;

        assert!(matches!(result, Err(PipelineError::Lookup { id: 4, .. })));
    }

    #[tokio::test]
    async fn test_create_transport_failure_aborts_the_run() {
        let lookup = Arc::new(ScriptedStore::new(|_| false));
        let writer = Arc::new(BrokenWriter { fail_id: 2 });
        let input = ["1:a:x", "2:b:x", "3:c:x"];

        let pipeline = Pipeline::new(lines(&input), lookup, writer, config(4));
        let error = pipeline.run().await.unwrap_err();

        assert!(matches!(error, PipelineError::Store { id: 2, .. }));
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_stage_respects_the_concurrency_bound() {
        let store = Arc::new(GaugedStore::default());
        let input: Vec<String> = (1..=12).map(|i| format!("{i}:r{i}:payload")).collect();

        let pipeline = Pipeline::new(
            MemoryLineSource::new(input),
            store.clone(),
            store.clone(),
            config(3),
        );
        let output = pipeline.run().await.unwrap();

        assert_eq!(output.records.len(), 12);
        assert!(
            store.max.load(Ordering::SeqCst) <= 3,
            "create stage exceeded its concurrency bound: {}",
            store.max.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_timeout_is_a_fatal_failure() {
        let store = Arc::new(MemoryStore::with_latency(Duration::from_secs(5)));
        let input = ["1:a:x", "2:b:x"];

        let pipeline = Pipeline::new(lines(&input), store.clone(), store, config(2));
        let error = pipeline
            .run_with_timeout(Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(error, PipelineError::Timeout { .. }));
    }
}
