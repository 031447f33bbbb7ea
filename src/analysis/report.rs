//! Summary table, synthetic loss rows and run reports.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use color_eyre::eyre::{bail, Context, Result};

use crate::config::{FlowConfig, FlowGroup};

use super::correlator::CorrelationOutcome;
use super::latency_log::LatencySink;
use super::types::*;

/// Header of the summary metrics table
pub const SUMMARY_HEADER: &str = "flowcls recvcnt recvsize losscnt losssize";

/// Totals of a two-stage group.
///
/// Delivery and loss count are taken at the compute hop, where the flow
/// terminates; lost bytes add up over both hops. Members missing from the
/// catalogue contribute zero.
pub fn group_total(outcome: &CorrelationOutcome, group: &FlowGroup) -> SummaryRecord {
    let aggregate = outcome.counters(&group.aggregate).copied().unwrap_or_default();
    let compute = outcome.counters(&group.compute).copied().unwrap_or_default();

    SummaryRecord::new(
        &group.label,
        ClassCounters {
            recv_count: compute.recv_count,
            recv_size: compute.recv_size,
            loss_count: compute.loss_count,
            loss_size: aggregate.loss_size + compute.loss_size,
        },
    )
}

/// Per-class rows in catalogue order followed by one row per group
pub fn summary_rows(outcome: &CorrelationOutcome, config: &FlowConfig) -> Vec<SummaryRecord> {
    let mut rows = outcome.classes.clone();
    rows.extend(config.groups.iter().map(|group| group_total(outcome, group)));
    rows
}

/// Write the summary metrics table
pub fn write_summary(rows: &[SummaryRecord], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create summary file {}", output_path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{}", SUMMARY_HEADER)?;
    for row in rows {
        writeln!(out, "{}", row)?;
    }
    out.flush()
        .with_context(|| format!("Failed to write summary file {}", output_path.display()))?;

    log::info!("Summary written to {} ({} rows)", output_path.display(), rows.len());
    Ok(())
}

/// Re-read a summary file and append synthetic loss rows to `sink`.
///
/// Every row whose label is in `labels` yields `losscnt` rows carrying the
/// placeholder latency. Returns the number of rows appended.
pub fn append_loss_rows<S: LatencySink>(
    summary_path: &Path,
    labels: &[String],
    placeholder_latency: SimTime,
    sink: &mut S,
) -> Result<u64> {
    let file = File::open(summary_path)
        .with_context(|| format!("Failed to reopen summary file {}", summary_path.display()))?;
    let reader = BufReader::new(file);

    let mut appended = 0;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(label) = fields.first() else {
            continue;
        };
        if !labels.iter().any(|l| l == label) {
            continue;
        }

        let Some(loss_count) = fields.get(3) else {
            bail!(
                "Summary row {} of {} has no loss count",
                i + 1,
                summary_path.display()
            );
        };
        let loss_count: u64 = loss_count.parse().with_context(|| {
            format!("Invalid loss count '{}' on summary row {}", loss_count, i + 1)
        })?;

        for _ in 0..loss_count {
            sink.record(&LatencyLine::Loss {
                label: label.to_string(),
                latency: placeholder_latency,
            })?;
        }
        appended += loss_count;
    }

    if appended > 0 {
        log::info!("Appended {} synthetic loss rows", appended);
    }
    Ok(appended)
}

/// Generate JSON report
pub fn generate_json_report(report: &RunReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(report: &RunReport) {
    println!("\n=== TRACE CORRELATION SUMMARY ===\n");
    println!("Input: {}", report.metadata.input);
    println!("Rows: {}", report.stats.rows);
    println!(
        "Sends: {}  Receives: {} ({} matched, {} unmatched)",
        report.stats.sends,
        report.stats.receives,
        report.stats.matched_receives,
        report.stats.unmatched_receives
    );
    if report.stats.end_to_end_records > 0 {
        println!("End-to-end records: {}", report.stats.end_to_end_records);
    }

    println!("\n{:<10} {:>10} {:>12} {:>10} {:>12}", "Class", "Delivered", "Bytes", "Lost", "Bytes");
    for row in &report.summary {
        println!(
            "{:<10} {:>10} {:>12} {:>10} {:>12}",
            row.flow_class,
            row.counters.recv_count,
            row.counters.recv_size,
            row.counters.loss_count,
            row.counters.loss_size
        );
    }

    println!("\nLatency log: {}", report.metadata.latency_log);
    println!("Metrics log: {}", report.metadata.metrics_log);
    println!();
}
