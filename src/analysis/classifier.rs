//! Content-name classification into flow types.

use crate::config::FlowType;

use super::types::{CorrelateError, TraceEvent};

/// Ordered prefix table; first match wins
#[derive(Debug, Clone)]
pub struct FlowClassifier {
    flow_types: Vec<FlowType>,
}

impl FlowClassifier {
    pub fn new(flow_types: &[FlowType]) -> Self {
        Self {
            flow_types: flow_types.to_vec(),
        }
    }

    /// Index of the first flow type whose prefix starts `name`
    pub fn classify(&self, name: &str) -> Option<usize> {
        self.flow_types
            .iter()
            .position(|flow| name.starts_with(&flow.prefix))
    }

    /// Classify an event, failing with `UnclassifiedName` when nothing matches
    pub fn classify_event(&self, event: &TraceEvent) -> Result<usize, CorrelateError> {
        self.classify(&event.name)
            .ok_or_else(|| CorrelateError::UnclassifiedName {
                name: event.name.clone(),
                line: event.line,
            })
    }

    pub fn label(&self, index: usize) -> &str {
        &self.flow_types[index].label
    }

    /// Index of the flow type called `label`
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.flow_types.iter().position(|flow| flow.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.flow_types.iter().map(|flow| flow.label.as_str())
    }
}
