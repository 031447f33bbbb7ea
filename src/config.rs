//! Flow catalogue configuration.
//!
//! The catalogue maps content-name prefixes to flow types and carries the
//! reporting knobs used after the correlation pass: group totals, the
//! labels that receive synthetic loss rows, the placeholder latency for
//! those rows and the optional loss timeout.
//!
//! ```yaml
//! flow_types:
//!   - label: WAC
//!     prefix: /power/wac/
//!   - label: PDC
//!     prefix: /power/pdc/
//! pubsub: DATA
//! groups:
//!   - label: PMU_TOT
//!     aggregate: PMU_AGG
//!     compute: PMU_COM
//! loss_timeout: 250ms
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Placeholder latency written for synthetic loss rows, in seconds
pub const DEFAULT_LOSS_PLACEHOLDER_LATENCY: f64 = 0.1;

/// A flow type and the name prefix that selects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowType {
    pub label: String,
    pub prefix: String,
}

impl FlowType {
    pub fn new(label: &str, prefix: &str) -> Self {
        Self {
            label: label.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

/// Two-stage flow reported under a single `_TOT` label.
///
/// `aggregate` is the field-to-aggregator hop, `compute` the
/// aggregator-to-compute hop that terminates the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowGroup {
    pub label: String,
    pub aggregate: String,
    pub compute: String,
}

impl FlowGroup {
    pub fn new(label: &str, aggregate: &str, compute: &str) -> Self {
        Self {
            label: label.to_string(),
            aggregate: aggregate.to_string(),
            compute: compute.to_string(),
        }
    }
}

/// Complete flow catalogue. Fields omitted from a YAML file keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Ordered prefix table; the first matching prefix wins
    pub flow_types: Vec<FlowType>,
    /// Label of the pub/sub flow whose pending entries may be overwritten
    pub pubsub: Option<String>,
    /// Group totals appended to the summary table
    pub groups: Vec<FlowGroup>,
    /// Summary labels that get synthetic loss rows in the latency log
    pub loss_labels: Vec<String>,
    /// Latency written on each synthetic loss row, in seconds
    pub loss_placeholder_latency: f64,
    /// Enables loss detection when set
    #[serde(with = "humantime_serde")]
    pub loss_timeout: Option<Duration>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            flow_types: vec![
                FlowType::new("WAC", "/power/wac/"),
                FlowType::new("PDC", "/power/pdc/"),
            ],
            pubsub: Some("DATA".to_string()),
            groups: vec![
                FlowGroup::new("PMU_TOT", "PMU_AGG", "PMU_COM"),
                FlowGroup::new("AMI_TOT", "AMI_AGG", "AMI_COM"),
            ],
            loss_labels: ["ERROR", "DATA", "PMU_TOT", "AMI_TOT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            loss_placeholder_latency: DEFAULT_LOSS_PLACEHOLDER_LATENCY,
            loss_timeout: None,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Flow catalogue is empty")]
    EmptyCatalogue,
    #[error("Flow type '{0}' has an empty prefix")]
    EmptyPrefix(String),
    #[error("Flow type label '{0}' is defined more than once")]
    DuplicateLabel(String),
    #[error("Group label '{0}' is already used by a flow type or another group")]
    GroupLabelConflict(String),
    #[error("Invalid placeholder latency: {0}")]
    InvalidPlaceholder(f64),
}

impl FlowConfig {
    /// Check the catalogue for errors that would make a run meaningless.
    ///
    /// References to labels outside the catalogue (pub/sub type, group
    /// members) are legal and only logged; they simply never match.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.flow_types.is_empty() {
            return Err(ValidationError::EmptyCatalogue);
        }

        let mut seen = HashSet::new();
        for flow in &self.flow_types {
            if flow.prefix.is_empty() {
                return Err(ValidationError::EmptyPrefix(flow.label.clone()));
            }
            if !seen.insert(flow.label.as_str()) {
                return Err(ValidationError::DuplicateLabel(flow.label.clone()));
            }
        }

        // group totals share the summary table with the flow types
        let mut group_labels = HashSet::new();
        for group in &self.groups {
            if seen.contains(group.label.as_str()) || !group_labels.insert(group.label.as_str()) {
                return Err(ValidationError::GroupLabelConflict(group.label.clone()));
            }
        }

        if !self.loss_placeholder_latency.is_finite() || self.loss_placeholder_latency < 0.0 {
            return Err(ValidationError::InvalidPlaceholder(self.loss_placeholder_latency));
        }

        if let Some(ref pubsub) = self.pubsub {
            if !seen.contains(pubsub.as_str()) {
                log::debug!("Pub/sub type '{}' is not in the flow catalogue", pubsub);
            }
        }
        for group in &self.groups {
            for member in [&group.aggregate, &group.compute] {
                if !seen.contains(member.as_str()) {
                    log::debug!(
                        "Group {} member '{}' is not in the flow catalogue, it will total zero",
                        group.label,
                        member
                    );
                }
            }
        }

        Ok(())
    }
}

/// Load and validate a flow catalogue from a YAML file
pub fn load_config(config_path: &Path) -> Result<FlowConfig> {
    info!("Loading flow catalogue from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file: {}", config_path.display()))?;

    let config: FlowConfig = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

    config.validate()?;

    let prefix_overlaps = overlapping_prefixes(&config.flow_types);
    for (earlier, later) in prefix_overlaps {
        warn!(
            "Flow type {} is shadowed by earlier type {} (prefix overlap)",
            later, earlier
        );
    }

    info!(
        "Loaded {} flow types, {} groups",
        config.flow_types.len(),
        config.groups.len()
    );

    Ok(config)
}

/// Pairs `(earlier, later)` where the earlier prefix already matches every
/// name the later prefix would
fn overlapping_prefixes(flow_types: &[FlowType]) -> Vec<(String, String)> {
    let mut overlaps = Vec::new();
    for (i, later) in flow_types.iter().enumerate() {
        if let Some(earlier) = flow_types[..i]
            .iter()
            .find(|e| later.prefix.starts_with(&e.prefix))
        {
            overlaps.push((earlier.label.clone(), later.label.clone()));
        }
    }
    overlaps
}
