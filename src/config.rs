//! Site configuration and target selection

use crate::dom::{Label, SelectorPath};
use crate::error::{PageError, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One batch target as it appears in the sites file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    /// Target identifier, also used for screenshot names
    pub name: String,

    /// URL (or local file) of the page
    pub page: String,

    /// Selector path of the ground-truth title element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,

    /// Selector path of the ground-truth content element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_selector: Option<String>,
}

impl SiteConfig {
    /// Create an unlabeled target
    pub fn new(name: impl Into<String>, page: impl Into<String>) -> Self {
        Self { name: name.into(), page: page.into(), title_selector: None, content_selector: None }
    }

    /// Builder method: set both ground-truth selector paths
    pub fn with_selectors(mut self, title: impl Into<String>, content: impl Into<String>) -> Self {
        self.title_selector = Some(title.into());
        self.content_selector = Some(content.into());
        self
    }

    /// Ad-hoc target for a single page to predict, named after its URL
    pub fn for_url(url: &str) -> Self {
        let name: String = url.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
        Self::new(name, normalize_page_url(url))
    }

    /// Ground-truth `(path, label)` pairs for the selectors that are set
    pub fn label_pairs(&self) -> Vec<(SelectorPath, Label)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(title) = &self.title_selector {
            pairs.push((SelectorPath::parse(title), Label::Title));
        }
        if let Some(content) = &self.content_selector {
            pairs.push((SelectorPath::parse(content), Label::Content));
        }
        pairs
    }

    /// True when both ground-truth selectors are configured
    pub fn is_labeled(&self) -> bool {
        self.title_selector.is_some() && self.content_selector.is_some()
    }
}

/// Read a JSON array of site records, normalizing each page URL
pub fn load_sites(path: &Path) -> Result<Vec<SiteConfig>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PageError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e)))?;
    parse_sites(&content)
}

/// Parse site records from JSON text
pub fn parse_sites(json: &str) -> Result<Vec<SiteConfig>> {
    let mut sites: Vec<SiteConfig> =
        serde_json::from_str(json).map_err(|e| PageError::InvalidConfig(format!("Invalid sites file: {}", e)))?;

    for site in &mut sites {
        if site.page.trim().is_empty() {
            return Err(PageError::InvalidConfig(format!("Site '{}' has no page", site.name)));
        }
        site.page = normalize_page_url(&site.page);
    }

    Ok(sites)
}

/// Turn a page reference into a URL the browser can open
///
/// Existing local paths become absolute `file://` URLs, bare hosts get
/// `https://` (or `http://` for localhost). Anything with a scheme is kept.
pub fn normalize_page_url(page: &str) -> String {
    let page = page.trim();

    if page.contains("://") || page.starts_with("about:") || page.starts_with("data:") {
        return page.to_string();
    }

    let path = Path::new(page);
    if path.exists() {
        if let Ok(absolute) = std::fs::canonicalize(path) {
            return format!("file://{}", absolute.display());
        }
    }

    if page.starts_with("localhost") || page.starts_with("127.0.0.1") {
        format!("http://{}", page)
    } else {
        format!("https://{}", page)
    }
}

/// Which configured targets a run processes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetSelection {
    /// Every target
    #[default]
    All,

    /// The named target and every target after it
    BeginAt(String),

    /// Only the named targets
    Named(Vec<String>),
}

impl TargetSelection {
    /// Build a selection from a comma-separated list of names
    pub fn named_list(list: &str) -> Self {
        let names = list.split(',').map(str::trim).filter(|name| !name.is_empty()).map(String::from).collect();
        Self::Named(names)
    }
}

/// Apply a selection, keeping config order
///
/// For `Named`, the first config entry with each requested name is taken.
pub fn select_targets(sites: &[SiteConfig], selection: &TargetSelection) -> Vec<SiteConfig> {
    match selection {
        TargetSelection::All => sites.to_vec(),
        TargetSelection::BeginAt(name) => match sites.iter().position(|site| &site.name == name) {
            Some(start) => sites[start..].to_vec(),
            None => {
                log::warn!("No site named '{}' to begin at", name);
                Vec::new()
            }
        },
        TargetSelection::Named(names) => {
            let mut wanted: IndexSet<&str> = names.iter().map(String::as_str).collect();
            let mut selected = Vec::new();

            for site in sites {
                if wanted.shift_remove(site.name.as_str()) {
                    selected.push(site.clone());
                }
            }

            for missing in wanted {
                log::warn!("No site named '{}'", missing);
            }

            selected
        }
    }
}
