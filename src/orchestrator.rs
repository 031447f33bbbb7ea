//! Run orchestrator.
//!
//! Drives a full correlation run: opens the trace and the latency log,
//! feeds every event through the correlator, writes the summary table,
//! appends synthetic loss rows and optionally the JSON report.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Result, WrapErr};
use color_eyre::Report;
use log::{debug, info, warn};

use crate::analysis::report::{self, append_loss_rows, summary_rows};
use crate::analysis::{
    CorrelateError, CorrelationOutcome, Correlator, LatencyWriter, RunMetadata, RunReport,
    TraceReader,
};
use crate::config::FlowConfig;

/// Exit status for a successful run
pub const EXIT_OK: u8 = 0;
/// Exit status for I/O, CSV and configuration failures
pub const EXIT_FAILURE: u8 = 1;
/// Exit status when a content name matches no flow type
pub const EXIT_UNCLASSIFIED_NAME: u8 = 2;
/// Exit status when a non-pub/sub name is sent twice
pub const EXIT_DUPLICATE_SEND: u8 = 3;

/// Inputs and output locations of one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    /// Directory for the `lat_`/`met_` files; the input's directory if unset
    pub output_dir: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: None,
            report: None,
        }
    }
}

/// Latency and summary paths for `input`: `lat_<name>` and `met_<name>`
pub fn output_paths(input: &Path, output_dir: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("Input path has no file name: {}", input.display()))?;

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    Ok((
        dir.join(format!("lat_{}", file_name)),
        dir.join(format!("met_{}", file_name)),
    ))
}

/// Correlate one trace file and write all derived tables
pub fn run_trace(config: &FlowConfig, options: &RunOptions) -> Result<RunReport> {
    let (latency_path, metrics_path) = output_paths(&options.input, options.output_dir.as_deref())?;

    info!("Correlating trace: {}", options.input.display());
    info!("Latency log: {}", latency_path.display());
    info!("Metrics log: {}", metrics_path.display());

    if let Some(dir) = options.output_dir.as_deref() {
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("Failed to create output directory '{}'", dir.display()))?;
    }

    let mut reader = TraceReader::open(&options.input)
        .wrap_err_with(|| format!("Failed to open trace file '{}'", options.input.display()))?;
    let mut latency = LatencyWriter::create(&latency_path)
        .wrap_err_with(|| format!("Failed to create latency log '{}'", latency_path.display()))?;

    let outcome = match correlate(config, &mut reader, &mut latency) {
        Ok(outcome) => outcome,
        Err(err) => {
            drop(latency);
            remove_partial_outputs(&[latency_path.as_path()]);
            return Err(Report::new(err)
                .wrap_err(format!("Correlation of '{}' aborted", options.input.display())));
        }
    };

    let mut stats = outcome.stats.clone();
    if stats.unmatched_receives > 0 {
        warn!(
            "{} receives had no pending send and were skipped",
            stats.unmatched_receives
        );
    }
    info!(
        "Processed {} rows: {} sends, {} matched receives",
        stats.rows, stats.sends, stats.matched_receives
    );

    let rows = summary_rows(&outcome, config);
    let written = report::write_summary(&rows, &metrics_path).and_then(|()| {
        let loss_records = append_loss_rows(
            &metrics_path,
            &config.loss_labels,
            config.loss_placeholder_latency,
            &mut latency,
        )?;
        latency
            .flush()
            .wrap_err_with(|| format!("Failed to write latency log '{}'", latency_path.display()))?;
        Ok(loss_records)
    });
    stats.loss_records = match written {
        Ok(loss_records) => loss_records,
        Err(err) => {
            drop(latency);
            remove_partial_outputs(&[latency_path.as_path(), metrics_path.as_path()]);
            return Err(err);
        }
    };
    info!("Latency log written ({} rows)", latency.rows());

    let run_report = RunReport {
        metadata: RunMetadata {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            input: options.input.display().to_string(),
            latency_log: latency_path.display().to_string(),
            metrics_log: metrics_path.display().to_string(),
            loss_detection: config.loss_timeout.is_some(),
        },
        stats,
        summary: rows,
    };

    if let Some(ref report_path) = options.report {
        report::generate_json_report(&run_report, report_path)?;
    }

    Ok(run_report)
}

/// Remove the tables of a run that did not complete
fn remove_partial_outputs(paths: &[&Path]) {
    for path in paths {
        // a directory squatting on the output name is not ours to remove
        if !path.is_file() {
            continue;
        }
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial output {}: {}", path.display(), e);
        }
    }
}

/// The single forward pass
fn correlate<R: std::io::Read, W: std::io::Write>(
    config: &FlowConfig,
    reader: &mut TraceReader<R>,
    latency: &mut LatencyWriter<W>,
) -> Result<CorrelationOutcome, CorrelateError> {
    let mut correlator = Correlator::new(config);
    for event in reader.events() {
        correlator.process(&event?, latency)?;
    }
    debug!("End of trace, {} names still pending", correlator.pending_len());
    Ok(correlator.finish())
}

/// Exit status for a failed run
pub fn exit_code(report: &Report) -> u8 {
    for cause in report.chain() {
        match cause.downcast_ref::<CorrelateError>() {
            Some(CorrelateError::UnclassifiedName { .. }) => return EXIT_UNCLASSIFIED_NAME,
            Some(CorrelateError::DuplicateSend { .. }) => return EXIT_DUPLICATE_SEND,
            Some(_) => return EXIT_FAILURE,
            None => {}
        }
    }
    EXIT_FAILURE
}
