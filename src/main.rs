use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use ndntrace::analysis::report::print_summary;
use ndntrace::config::{self, FlowConfig};
use ndntrace::orchestrator::{self, RunOptions};

/// Latency and delivery post-processing for NDN simulation traces
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trace file (CSV: nodeid, event, name, payloadsize, time)
    input: PathBuf,

    /// Flow catalogue YAML file (built-in catalogue if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the lat_/met_ files (defaults to the input's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable loss detection: sends not delivered within this time are lost (e.g. "250ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    loss_timeout: Option<Duration>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not print the summary to stdout
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    // Initialize error handling
    if let Err(e) = color_eyre::install() {
        eprintln!("Failed to install error handler: {}", e);
        return ExitCode::from(orchestrator::EXIT_FAILURE);
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help and --version also arrive here
            let _ = err.print();
            return ExitCode::from(cli_exit_code(&err));
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    match run(args) {
        Ok(()) => ExitCode::from(orchestrator::EXIT_OK),
        Err(report) => {
            eprintln!("Error: {:?}", report);
            ExitCode::from(orchestrator::exit_code(&report))
        }
    }
}

/// Usage errors exit with `EXIT_FAILURE`, help and version output with `EXIT_OK`
fn cli_exit_code(err: &clap::Error) -> u8 {
    if err.use_stderr() {
        orchestrator::EXIT_FAILURE
    } else {
        orchestrator::EXIT_OK
    }
}

fn run(args: Args) -> Result<()> {
    let mut flow_config = match args.config {
        Some(ref path) => config::load_config(path)?,
        None => FlowConfig::default(),
    };
    if args.loss_timeout.is_some() {
        flow_config.loss_timeout = args.loss_timeout;
    }

    let options = RunOptions {
        output_dir: args.output_dir,
        report: args.report,
        ..RunOptions::new(args.input)
    };

    let report = orchestrator::run_trace(&flow_config, &options)?;

    if !args.quiet {
        print_summary(&report);
    }

    info!("Trace correlation completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["ndntrace", "trace.csv"]);

        assert_eq!(args.input, PathBuf::from("trace.csv"));
        assert!(args.config.is_none());
        assert!(args.output_dir.is_none());
        assert!(args.loss_timeout.is_none());
        assert_eq!(args.log_level, "info");
        assert!(!args.quiet);
    }

    #[test]
    fn test_loss_timeout_parsing() {
        let args = Args::parse_from([
            "ndntrace",
            "trace.csv",
            "--loss-timeout", "250ms",
            "--output-dir", "out",
            "-q",
        ]);

        assert_eq!(args.loss_timeout, Some(Duration::from_millis(250)));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert!(args.quiet);
    }

    #[test]
    fn test_input_is_required() {
        assert!(Args::try_parse_from(["ndntrace"]).is_err());
    }

    #[test]
    fn test_usage_errors_do_not_collide_with_trace_exit_codes() {
        let missing_input = Args::try_parse_from(["ndntrace"]).unwrap_err();
        assert_eq!(cli_exit_code(&missing_input), orchestrator::EXIT_FAILURE);

        let bad_timeout =
            Args::try_parse_from(["ndntrace", "trace.csv", "--loss-timeout", "xyz"]).unwrap_err();
        assert_eq!(cli_exit_code(&bad_timeout), orchestrator::EXIT_FAILURE);

        let unknown_flag = Args::try_parse_from(["ndntrace", "trace.csv", "--bogus"]).unwrap_err();
        assert_eq!(cli_exit_code(&unknown_flag), orchestrator::EXIT_FAILURE);
        assert_ne!(cli_exit_code(&unknown_flag), orchestrator::EXIT_UNCLASSIFIED_NAME);
    }

    #[test]
    fn test_help_and_version_exit_ok() {
        let help = Args::try_parse_from(["ndntrace", "--help"]).unwrap_err();
        assert_eq!(cli_exit_code(&help), orchestrator::EXIT_OK);

        let version = Args::try_parse_from(["ndntrace", "--version"]).unwrap_err();
        assert_eq!(cli_exit_code(&version), orchestrator::EXIT_OK);
    }
}
