//! The record data model and line parser.
//!
//! Input arrives as `id:name:content` lines. Parsing is pure and cheap,
//! so the pipeline runs it inline without occupying a concurrency slot.

use regex::Regex;
use snafu::prelude::*;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{IdOutOfRangeSnafu, MalformedSnafu, ParseError};

/// Grammar for one input line: digits, colon, word characters, colon,
/// arbitrary trailing content (possibly empty, possibly more colons).
static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\w+):(.*)$").expect("line grammar regex is valid"));

/// The structured unit produced from one input line.
///
/// Immutable once constructed; identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub content: String,
}

impl Record {
    pub fn new(id: i64, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
        }
    }
}

impl FromStr for Record {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let captures = LINE_RE.captures(line).context(MalformedSnafu { line })?;

        // The regex only admits digits here; conversion fails solely on
        // i64 overflow, which must be a clean parse failure.
        let id: i64 = captures[1].parse().context(IdOutOfRangeSnafu { line })?;

        Ok(Record {
            id,
            name: captures[2].to_string(),
            content: captures[3].to_string(),
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.id, self.name, self.content)
    }
}
