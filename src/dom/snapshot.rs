use crate::dom::element::{ElementFeatures, PageMetrics, RawElement};
use crate::error::{PageError, Result};
use serde::{Deserialize, Serialize};

/// Raw measurements of every element under `<body>`, in document order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    /// Document dimensions
    #[serde(flatten)]
    pub metrics: PageMetrics,

    /// Elements in the order their ids were assigned
    pub elements: Vec<RawElement>,
}

impl PageSnapshot {
    /// Decode the value returned by the in-page extraction call
    ///
    /// The runtime returns a JSON string rather than an object so the whole
    /// snapshot crosses the protocol boundary as one value.
    pub fn from_remote_value(value: Option<serde_json::Value>) -> Result<Self> {
        let value = value.ok_or_else(|| PageError::DomParseFailed("No value returned from extraction".to_string()))?;

        let json_str: String = serde_json::from_value(value)
            .map_err(|e| PageError::DomParseFailed(format!("Failed to get JSON string: {}", e)))?;

        Self::from_json(&json_str)
    }

    /// Parse a snapshot from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PageError::DomParseFailed(format!("Failed to parse snapshot JSON: {}", e)))
    }

    /// Number of elements captured
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Compute feature vectors; the id of each element is its position
    pub fn into_features(self) -> Vec<ElementFeatures> {
        let metrics = self.metrics;
        self.elements
            .iter()
            .enumerate()
            .map(|(id, raw)| ElementFeatures::from_raw(id as u32, raw, &metrics))
            .collect()
    }
}
