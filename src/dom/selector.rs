use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Attribute stamped on labeled elements
pub const LABEL_ATTRIBUTE: &str = "xDataCrawler";

/// Attribute carrying the per-page element id assigned during extraction
pub const ID_ATTRIBUTE: &str = "xDataCrawler-id";

/// Ground-truth label of an element
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Title,
    Content,
}

impl Label {
    /// Marker attribute value for this label
    pub fn marker(&self) -> &'static str {
        match self {
            Label::Title => "title",
            Label::Content => "content",
        }
    }

    /// Parse a marker attribute value
    pub fn from_marker(value: &str) -> Option<Self> {
        match value {
            "title" => Some(Label::Title),
            "content" => Some(Label::Content),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// One step of a selector path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Query all matches under the current element
    Css(String),
    /// Pick an element of the current result set
    Index(usize),
}

/// Colon-delimited sequence of CSS fragments and positional indices
///
/// `article:h1:1` selects the second `h1` inside the first `article`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPath {
    source: String,
    steps: Vec<Step>,
}

impl SelectorPath {
    /// Parse a selector path expression
    pub fn parse(expression: &str) -> Self {
        let steps = expression
            .split(':')
            .map(|step| {
                let step = step.trim();
                if step.is_empty() {
                    Step::Index(0)
                } else if let Ok(index) = step.parse::<usize>() {
                    Step::Index(index)
                } else {
                    Step::Css(step.to_string())
                }
            })
            .collect();

        Self { source: expression.to_string(), steps }
    }

    /// Path selecting the element stamped with the given extraction id
    pub fn for_id(id: u32) -> Self {
        Self::parse(&id_selector(id))
    }

    /// The original expression
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl FromStr for SelectorPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Document access needed to resolve selector paths
pub trait DomScope {
    /// Handle to one element
    type Node;

    /// The document body
    fn body(&self) -> Option<Self::Node>;

    /// All descendants of `scope` matching `css`, in document order
    fn query_all(&self, scope: &Self::Node, css: &str) -> crate::error::Result<Vec<Self::Node>>;
}

/// Resolve a selector path to a single element
///
/// Starts at `<body>` with the result set `[body]`. CSS steps replace the
/// result set with all matches under the current element and move to the
/// first match; index steps pick from the current result set. Any miss along
/// the way yields `None`.
pub fn resolve<S: DomScope>(path: &SelectorPath, scope: &S) -> Option<S::Node> {
    let mut results: Vec<S::Node> = scope.body().into_iter().collect();
    let mut current = if results.is_empty() { None } else { Some(0) };

    for step in path.steps() {
        match step {
            Step::Index(index) => {
                if *index >= results.len() {
                    return None;
                }
                current = Some(*index);
            }
            Step::Css(css) => {
                let scope_node = &results[current?];
                results = match scope.query_all(scope_node, css) {
                    Ok(matches) => matches,
                    Err(e) => {
                        log::debug!("Selector step '{}' of '{}' failed: {}", css, path, e);
                        return None;
                    }
                };
                current = if results.is_empty() { None } else { Some(0) };
            }
        }
    }

    current.map(|index| results.swap_remove(index))
}

/// Attribute-equality selector for an extraction id
pub fn id_selector(id: u32) -> String {
    format!("[{}='{}']", ID_ATTRIBUTE, id)
}

/// Inverse of [`id_selector`]
pub fn parse_id_selector(css: &str) -> Option<u32> {
    let inner = css.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (name, value) = inner.split_once('=')?;
    if name.trim() != ID_ATTRIBUTE {
        return None;
    }
    value.trim().trim_matches(|c| c == '\'' || c == '"').parse().ok()
}
