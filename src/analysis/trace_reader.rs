//! CSV trace parsing.
//!
//! Reads rows of the form `nodeid, event, name, payloadsize, time`. The
//! header row is skipped without being checked and surrounding whitespace
//! of every field is trimmed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use super::types::*;

/// Positional layout of a trace row
#[derive(Debug, Deserialize)]
struct TraceRow {
    nodeid: u32,
    event: EventKind,
    name: String,
    payloadsize: u64,
    time: SimTime,
}

/// Streaming reader over trace events
pub struct TraceReader<R: Read> {
    inner: csv::Reader<R>,
}

impl TraceReader<BufReader<File>> {
    /// Open a trace file
    pub fn open(path: &Path) -> Result<Self, CorrelateError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::with_capacity(64 * 1024, file)))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn from_reader(reader: R) -> Self {
        let inner = csv::ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self { inner }
    }

    /// Iterate over the events in file order
    pub fn events(&mut self) -> impl Iterator<Item = Result<TraceEvent, CorrelateError>> + '_ {
        self.inner.records().map(|result| {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row: TraceRow = record.deserialize(None)?;
            Ok(TraceEvent {
                line,
                node_id: row.nodeid,
                kind: row.event,
                name: row.name,
                payload_size: row.payloadsize,
                time: row.time,
            })
        })
    }
}
