//! Core data types for trace correlation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation timestamp in seconds since the start of the run
pub type SimTime = f64;

/// Event column of a trace row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A node emitted a named packet
    Sent,
    /// A node received a named packet
    Recv,
    /// Anything else the simulator logged; classified, then ignored
    #[serde(other)]
    Other,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Sent => write!(f, "sent"),
            EventKind::Recv => write!(f, "recv"),
            EventKind::Other => write!(f, "other"),
        }
    }
}

/// A single trace row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Line in the input file, 1-based, header included
    pub line: u64,
    pub node_id: u32,
    pub kind: EventKind,
    pub name: String,
    pub payload_size: u64,
    pub time: SimTime,
}

/// One correlated sent/recv pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    pub sender_id: u32,
    pub receiver_id: u32,
    pub time_sent: SimTime,
    pub time_recv: SimTime,
    pub latency: SimTime,
    pub flow_class: String,
}

impl fmt::Display for LatencyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:.9} {:.9} {:.9} {}",
            self.sender_id,
            self.receiver_id,
            self.time_sent,
            self.time_recv,
            self.latency,
            self.flow_class
        )
    }
}

/// A row of the latency log
#[derive(Debug, Clone, PartialEq)]
pub enum LatencyLine {
    /// Correlated delivery
    Delivery(LatencyRecord),
    /// Aggregation plus compute hop of a group, labelled with the group
    EndToEnd { label: String, latency: SimTime },
    /// Synthetic row standing in for a lost message
    Loss { label: String, latency: SimTime },
}

impl fmt::Display for LatencyLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatencyLine::Delivery(record) => write!(f, "{}", record),
            LatencyLine::EndToEnd { label, latency } | LatencyLine::Loss { label, latency } => {
                write!(f, "{} {:.6}", label, latency)
            }
        }
    }
}

/// Delivered and lost totals of one flow class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounters {
    pub recv_count: u64,
    pub recv_size: u64,
    pub loss_count: u64,
    pub loss_size: u64,
}

/// A row of the summary metrics table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub flow_class: String,
    #[serde(flatten)]
    pub counters: ClassCounters,
}

impl SummaryRecord {
    pub fn new(flow_class: &str, counters: ClassCounters) -> Self {
        Self {
            flow_class: flow_class.to_string(),
            counters,
        }
    }
}

impl fmt::Display for SummaryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.flow_class,
            self.counters.recv_count,
            self.counters.recv_size,
            self.counters.loss_count,
            self.counters.loss_size
        )
    }
}

/// Counters describing a correlation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationStats {
    pub rows: u64,
    pub sends: u64,
    pub receives: u64,
    pub matched_receives: u64,
    /// Receives with no pending send; skipped
    pub unmatched_receives: u64,
    pub other_events: u64,
    pub end_to_end_records: u64,
    pub loss_records: u64,
}

/// Fatal errors of a correlation run
#[derive(Debug, thiserror::Error)]
pub enum CorrelateError {
    #[error("Unclassified name: '{name}' (line {line})")]
    UnclassifiedName { name: String, line: u64 },

    #[error("Duplicate outstanding send for '{name}' (line {line})")]
    DuplicateSend { name: String, line: u64 },

    #[error("Malformed trace row: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run metadata for the JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub analysis_timestamp: String,
    pub input: String,
    pub latency_log: String,
    pub metrics_log: String,
    pub loss_detection: bool,
}

/// Everything a run produced, in serializable form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub stats: CorrelationStats,
    pub summary: Vec<SummaryRecord>,
}
