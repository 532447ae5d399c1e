//! DOM feature extraction and labeling
//!
//! This module provides the page-facing half of the pipeline:
//! - ElementFeatures: per-element layout/style feature vector
//! - SelectorPath: colon-delimited paths used to find ground-truth elements
//! - PageDriver: the narrow page interface the batch orchestrator talks to
//! - StaticPage: a browserless driver over parsed HTML

pub mod element;
pub mod selector;
pub mod snapshot;
pub mod static_page;

pub use element::{ElementFeatures, FEATURE_COUNT, FEATURE_NAMES, FeatureValue, PageMetrics, RawElement};
pub use selector::{DomScope, ID_ATTRIBUTE, LABEL_ATTRIBUTE, Label, SelectorPath, id_selector, resolve};
pub use snapshot::PageSnapshot;
pub use static_page::{StaticDocument, StaticPage};

use crate::error::Result;
use std::path::Path;

/// A single page reused across batch targets
pub trait PageDriver {
    /// Load a URL and make the extraction runtime available in it
    fn open(&mut self, url: &str) -> Result<()>;

    /// Stamp label markers on the elements the selector paths resolve to
    fn label_all(&mut self, labels: &[(SelectorPath, Label)]) -> Result<LabelReport>;

    /// Remove every label marker from the current page
    fn clear_labels(&mut self) -> Result<()>;

    /// Walk every element under `<body>`, assign ids and compute features
    fn extract_all(&mut self) -> Result<Vec<ElementFeatures>>;

    /// Save a full-page image with labeled elements outlined
    fn screenshot(&mut self, path: &Path) -> Result<()>;

    /// Release the page
    fn close(&mut self) -> Result<()>;
}

/// Outcome of a labeling pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelReport {
    /// Number of markers stamped
    pub stamped: usize,

    /// Paths that resolved to no element
    pub missed: Vec<String>,
}

impl LabelReport {
    /// True when every path resolved
    pub fn is_complete(&self) -> bool {
        self.missed.is_empty()
    }
}

/// Resolve each labeled path, keeping the order of `labels`
///
/// Returns the resolved nodes together with a report listing the misses;
/// `stamped` counts the resolved nodes.
pub fn resolve_labels<S: DomScope>(scope: &S, labels: &[(SelectorPath, Label)]) -> (Vec<(S::Node, Label)>, LabelReport) {
    let mut resolved = Vec::with_capacity(labels.len());
    let mut report = LabelReport::default();

    for (path, label) in labels {
        match resolve(path, scope) {
            Some(node) => resolved.push((node, *label)),
            None => {
                log::debug!("No element for {} path '{}'", label, path);
                report.missed.push(path.to_string());
            }
        }
    }

    report.stamped = resolved.len();
    (resolved, report)
}
