//! Trace correlation for NDN simulation runs.
//!
//! This module pairs `recv` events with their originating `sent` events,
//! aggregates per-class delivery metrics and writes the latency and summary
//! tables.

pub mod types;
pub mod classifier;
pub mod trace_reader;
pub mod latency_log;
pub mod correlator;
pub mod report;

pub use types::*;
pub use classifier::FlowClassifier;
pub use trace_reader::TraceReader;
pub use latency_log::{LatencySink, LatencyWriter};
pub use correlator::{CorrelationOutcome, Correlator};
pub use report::{generate_json_report, write_summary};
