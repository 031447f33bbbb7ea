//! Sent/recv correlation.
//!
//! A single forward pass over the trace. Every `sent` opens a pending entry
//! keyed by content name, every `recv` is matched against it to compute a
//! latency. Pending entries are never consumed: one request may be
//! delivered to many receivers.

use std::collections::HashMap;
use std::time::Duration;

use log::debug;

use crate::config::FlowConfig;

use super::classifier::FlowClassifier;
use super::latency_log::LatencySink;
use super::types::*;

/// A `sent` awaiting its deliveries
#[derive(Debug, Clone)]
struct PendingEntry {
    class: usize,
    sent_at: SimTime,
    payload_size: u64,
    outstanding: u32,
    sender_id: u32,
    deliveries: u32,
    first_delivery: Option<SimTime>,
}

/// Group resolved against the catalogue
#[derive(Debug, Clone)]
struct ChainLink {
    label: String,
    aggregate: Option<usize>,
    compute: Option<usize>,
}

/// Per-class counters and statistics of a finished pass
#[derive(Debug, Clone)]
pub struct CorrelationOutcome {
    /// One record per catalogue entry, in catalogue order
    pub classes: Vec<SummaryRecord>,
    pub stats: CorrelationStats,
}

impl CorrelationOutcome {
    pub fn counters(&self, label: &str) -> Option<&ClassCounters> {
        self.classes
            .iter()
            .find(|r| r.flow_class == label)
            .map(|r| &r.counters)
    }
}

/// Correlator state for one trace
pub struct Correlator {
    classifier: FlowClassifier,
    pubsub: Option<usize>,
    chains: Vec<ChainLink>,
    loss_timeout: Option<Duration>,
    pending: HashMap<String, PendingEntry>,
    counters: Vec<ClassCounters>,
    /// Aggregation latencies seen at a node, per chain, not yet forwarded
    agg_queue: HashMap<(u32, usize), Vec<SimTime>>,
    /// Aggregation latencies carried by a compute-hop name
    carried: HashMap<String, Vec<SimTime>>,
    stats: CorrelationStats,
}

impl Correlator {
    pub fn new(config: &FlowConfig) -> Self {
        let classifier = FlowClassifier::new(&config.flow_types);
        let pubsub = config
            .pubsub
            .as_deref()
            .and_then(|label| classifier.index_of(label));
        let chains = config
            .groups
            .iter()
            .map(|group| ChainLink {
                label: group.label.clone(),
                aggregate: classifier.index_of(&group.aggregate),
                compute: classifier.index_of(&group.compute),
            })
            .collect();
        let counters = vec![ClassCounters::default(); config.flow_types.len()];

        Self {
            classifier,
            pubsub,
            chains,
            loss_timeout: config.loss_timeout,
            pending: HashMap::new(),
            counters,
            agg_queue: HashMap::new(),
            carried: HashMap::new(),
            stats: CorrelationStats::default(),
        }
    }

    /// Number of names with a pending entry
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one event; latency rows go to `sink`
    pub fn process<S: LatencySink>(
        &mut self,
        event: &TraceEvent,
        sink: &mut S,
    ) -> Result<(), CorrelateError> {
        self.stats.rows += 1;
        let class = self.classifier.classify_event(event)?;

        match event.kind {
            EventKind::Sent => self.on_sent(event, class),
            EventKind::Recv => self.on_recv(event, class, sink),
            EventKind::Other => {
                self.stats.other_events += 1;
                Ok(())
            }
        }
    }

    fn on_sent(&mut self, event: &TraceEvent, class: usize) -> Result<(), CorrelateError> {
        self.stats.sends += 1;

        let entry = PendingEntry {
            class,
            sent_at: event.time,
            payload_size: event.payload_size,
            outstanding: 1,
            sender_id: event.node_id,
            deliveries: 0,
            first_delivery: None,
        };

        // pub/sub names are re-sent by many sources; the latest send wins
        if Some(class) == self.pubsub {
            self.pending.insert(event.name.clone(), entry);
        } else if self.pending.contains_key(&event.name) {
            return Err(CorrelateError::DuplicateSend {
                name: event.name.clone(),
                line: event.line,
            });
        } else {
            self.pending.insert(event.name.clone(), entry);
        }

        for (chain_idx, chain) in self.chains.iter().enumerate() {
            if chain.compute == Some(class) {
                let queued = self
                    .agg_queue
                    .remove(&(event.node_id, chain_idx))
                    .unwrap_or_default();
                self.carried.insert(event.name.clone(), queued);
            }
        }

        Ok(())
    }

    fn on_recv<S: LatencySink>(
        &mut self,
        event: &TraceEvent,
        class: usize,
        sink: &mut S,
    ) -> Result<(), CorrelateError> {
        self.stats.receives += 1;

        let Some(entry) = self.pending.get_mut(&event.name) else {
            self.stats.unmatched_receives += 1;
            debug!(
                "No pending send for '{}' received by node {} (line {})",
                event.name, event.node_id, event.line
            );
            return Ok(());
        };

        entry.deliveries += 1;
        if entry.first_delivery.is_none() {
            entry.first_delivery = Some(event.time);
        }
        let (sender_id, sent_at, payload_size) = (entry.sender_id, entry.sent_at, entry.payload_size);

        let latency = event.time - sent_at;
        let counters = &mut self.counters[class];
        counters.recv_count += 1;
        counters.recv_size += payload_size;
        self.stats.matched_receives += 1;

        sink.record(&LatencyLine::Delivery(LatencyRecord {
            sender_id,
            receiver_id: event.node_id,
            time_sent: sent_at,
            time_recv: event.time,
            latency,
            flow_class: self.classifier.label(class).to_string(),
        }))?;

        for (chain_idx, chain) in self.chains.iter().enumerate() {
            if chain.aggregate == Some(class) {
                self.agg_queue
                    .entry((event.node_id, chain_idx))
                    .or_default()
                    .push(latency);
            }
            if chain.compute == Some(class) {
                if let Some(agg_latencies) = self.carried.get(&event.name) {
                    for agg_latency in agg_latencies {
                        sink.record(&LatencyLine::EndToEnd {
                            label: chain.label.clone(),
                            latency: latency + agg_latency,
                        })?;
                        self.stats.end_to_end_records += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// Close the pass. Loss detection runs here when a timeout is configured.
    pub fn finish(mut self) -> CorrelationOutcome {
        let undelivered = self.pending.values().filter(|e| e.deliveries == 0).count();
        debug!(
            "{} pending names, {} never delivered",
            self.pending.len(),
            undelivered
        );

        if let Some(timeout) = self.loss_timeout {
            let limit = timeout.as_secs_f64();
            for entry in self.pending.values() {
                if Some(entry.class) == self.pubsub {
                    continue;
                }
                let lost = match entry.first_delivery {
                    Some(t) => t - entry.sent_at > limit,
                    None => true,
                };
                if lost {
                    let counters = &mut self.counters[entry.class];
                    counters.loss_count += u64::from(entry.outstanding);
                    counters.loss_size += entry.payload_size;
                }
            }
            debug!(
                "Loss detection over {} pending entries with timeout {:?}",
                self.pending.len(),
                timeout
            );
        }

        let classes = self
            .classifier
            .labels()
            .zip(self.counters.iter())
            .map(|(label, counters)| SummaryRecord::new(label, *counters))
            .collect();

        CorrelationOutcome {
            classes,
            stats: self.stats,
        }
    }
}
