//! Latency log output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::types::LatencyLine;

/// Header of the latency log
pub const LATENCY_HEADER: &str = "srcid dstid timesent timerecv latency flowcls";

/// Destination for latency log rows
pub trait LatencySink {
    fn record(&mut self, line: &LatencyLine) -> io::Result<()>;
}

impl LatencySink for Vec<LatencyLine> {
    fn record(&mut self, line: &LatencyLine) -> io::Result<()> {
        self.push(line.clone());
        Ok(())
    }
}

/// Whitespace-delimited latency log with its header already written
pub struct LatencyWriter<W: Write> {
    out: W,
    rows: u64,
}

impl LatencyWriter<BufWriter<File>> {
    /// Create (or truncate) the log at `path`
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> LatencyWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", LATENCY_HEADER)?;
        Ok(Self { out, rows: 0 })
    }

    /// Rows written, header excluded
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<W: Write> LatencySink for LatencyWriter<W> {
    fn record(&mut self, line: &LatencyLine) -> io::Result<()> {
        writeln!(self.out, "{}", line)?;
        self.rows += 1;
        Ok(())
    }
}
