//! # ndntrace - Latency and delivery post-processing for NDN simulation traces
//!
//! A simulation of the smart-grid communication network logs every named
//! packet a node emits (`sent`) or accepts (`recv`). This library turns
//! that trace into two tables:
//!
//! - `lat_<input>`: one row per correlated delivery with its latency
//! - `met_<input>`: delivered and lost counts and bytes per flow class
//!
//! ## Overview
//!
//! - `config`: Flow catalogue (name prefixes → flow types) and reporting options
//! - `analysis`: Classification, CSV parsing, correlation and reporting
//! - `orchestrator`: One full run from trace file to output tables
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ndntrace::config::FlowConfig;
//! use ndntrace::orchestrator::{run_trace, RunOptions};
//!
//! let report = run_trace(&FlowConfig::default(), &RunOptions::new("trace.csv"))?;
//! println!("{} matched receives", report.stats.matched_receives);
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Trace Format
//!
//! ```text
//! nodeid, event, name, payloadsize, time
//! 1, sent, /power/wac/phy1/10.0.0.2/2/0, 100, 0.000000000
//! 2, recv, /power/wac/phy1/10.0.0.2/2/0, 100, 0.050000000
//! ```
//!
//! ## Error Handling
//!
//! Library errors are typed (`CorrelateError`, `ValidationError`); runs
//! return `color_eyre::eyre::Result` with context attached.

pub mod analysis;
pub mod config;
pub mod orchestrator;
