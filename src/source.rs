//! Line sources feeding the pipeline.
//!
//! A source is a lazy, finite, non-restartable sequence of text lines.
//! The pipeline pulls lines one at a time, only as fast as it has free
//! concurrency slots, so a source is never asked to buffer ahead.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// Pull-based supplier of input lines.
#[async_trait]
pub trait LineSource: Send {
    /// The next line, or `None` once the source is exhausted.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Reads a file incrementally, one line per pull.
pub struct FileLineSource {
    lines: Lines<BufReader<File>>,
}

impl FileLineSource {
    /// Open a file for line-by-line reading.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

#[async_trait]
impl LineSource for FileLineSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}

/// Serves lines from memory; used by tests and demos.
pub struct MemoryLineSource {
    lines: std::vec::IntoIter<String>,
}

impl MemoryLineSource {
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .map(Into::into)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }
}

#[async_trait]
impl LineSource for MemoryLineSource {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.next())
    }
}
