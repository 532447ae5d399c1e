use crate::dom::element::{ElementFeatures, PageMetrics, RawElement};
use crate::dom::selector::{DomScope, ID_ATTRIBUTE, LABEL_ATTRIBUTE, Label, SelectorPath, parse_id_selector};
use crate::dom::snapshot::PageSnapshot;
use crate::dom::{LabelReport, PageDriver, resolve_labels};
use crate::error::{PageError, Result};
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::path::Path;

// CSS initial values; there is no style engine behind a parsed document
const INITIAL_FONT_SIZE: &str = "16px";
const INITIAL_COLOR: &str = "rgb(0, 0, 0)";
const INITIAL_BACKGROUND: &str = "rgba(0, 0, 0, 0)";
const INITIAL_TEXT_ALIGN: &str = "start";
const INITIAL_BOX: &str = "0px";

/// A parsed HTML document with the attributes the pipeline stamps on it
///
/// The parse tree is immutable, so label markers and extraction ids are
/// kept in side tables and reported through [`StaticDocument::attribute`].
pub struct StaticDocument {
    html: Html,
    labels: HashMap<NodeId, Label>,
    ids: Vec<NodeId>,
}

impl StaticDocument {
    /// Parse a full HTML document
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
            labels: HashMap::new(),
            ids: Vec::new(),
        }
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    /// Attribute value of an element, including stamped markers and ids
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match name {
            LABEL_ATTRIBUTE => self.labels.get(&node).map(|label| label.marker().to_string()),
            ID_ATTRIBUTE => self.ids.iter().position(|id| *id == node).map(|id| id.to_string()),
            _ => self.element(node)?.value().attr(name).map(str::to_string),
        }
    }

    /// Stamp a label marker; the last label stamped on a node wins
    pub fn stamp_label(&mut self, node: NodeId, label: Label) {
        self.labels.insert(node, label);
    }

    /// Remove every label marker
    pub fn clear_labels(&mut self) {
        self.labels.clear();
    }

    /// Walk every element under `<body>` in document order, assigning ids
    pub fn snapshot(&mut self) -> PageSnapshot {
        let any = match Selector::parse("*") {
            Ok(selector) => selector,
            Err(_) => return PageSnapshot { metrics: PageMetrics::default(), elements: Vec::new() },
        };

        let Some(body) = self.body().and_then(|id| self.element(id)) else {
            return PageSnapshot { metrics: PageMetrics::default(), elements: Vec::new() };
        };

        let mut ids = Vec::new();
        let mut elements = Vec::new();
        for element in body.select(&any) {
            ids.push(element.id());
            elements.push(self.raw_element(element, &any));
        }
        self.ids = ids;

        PageSnapshot { metrics: PageMetrics::default(), elements }
    }

    fn raw_element(&self, element: ElementRef<'_>, any: &Selector) -> RawElement {
        let count_tag = |tag: &str| {
            element
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name().eq_ignore_ascii_case(tag))
                .count() as u32
        };

        RawElement {
            tag_name: element.value().name().to_ascii_uppercase(),
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            children: element.children().filter_map(ElementRef::wrap).count() as u32,
            descendants: element.select(any).count() as u32,
            link_count: count_tag("a"),
            paragraph_count: count_tag("p"),
            image_count: count_tag("img"),
            parent_count: parent_count(element),
            text: element.text().collect(),
            font_size: INITIAL_FONT_SIZE.to_string(),
            color: INITIAL_COLOR.to_string(),
            background_color: INITIAL_BACKGROUND.to_string(),
            text_align: INITIAL_TEXT_ALIGN.to_string(),
            margin_top: INITIAL_BOX.to_string(),
            margin_right: INITIAL_BOX.to_string(),
            margin_bottom: INITIAL_BOX.to_string(),
            margin_left: INITIAL_BOX.to_string(),
            padding_top: INITIAL_BOX.to_string(),
            padding_right: INITIAL_BOX.to_string(),
            padding_bottom: INITIAL_BOX.to_string(),
            padding_left: INITIAL_BOX.to_string(),
            label: self.labels.get(&element.id()).map(|label| label.marker().to_string()),
        }
    }

    fn is_within(&self, node: NodeId, scope: NodeId) -> bool {
        self.html
            .tree
            .get(node)
            .map(|node| node.ancestors().any(|ancestor| ancestor.id() == scope))
            .unwrap_or(false)
    }
}

/// Ancestor steps from the element up to `<body>`; `<body>` itself is 0
fn parent_count(element: ElementRef<'_>) -> u32 {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .position(|ancestor| ancestor.value().name() == "body")
        .map(|steps| steps as u32 + 1)
        .unwrap_or(0)
}

impl DomScope for StaticDocument {
    type Node = NodeId;

    fn body(&self) -> Option<NodeId> {
        let selector = Selector::parse("body").ok()?;
        self.html.select(&selector).next().map(|body| body.id())
    }

    fn query_all(&self, scope: &NodeId, css: &str) -> Result<Vec<NodeId>> {
        // Stamped ids only exist in the side table
        if let Some(id) = parse_id_selector(css) {
            return Ok(self
                .ids
                .get(id as usize)
                .copied()
                .filter(|node| self.is_within(*node, *scope))
                .into_iter()
                .collect());
        }

        let selector =
            Selector::parse(css).map_err(|e| PageError::InvalidConfig(format!("Invalid selector '{}': {:?}", css, e)))?;
        let element = self
            .element(*scope)
            .ok_or_else(|| PageError::DomParseFailed("Scope node is not an element".to_string()))?;

        Ok(element.select(&selector).map(|found| found.id()).collect())
    }
}

/// Browserless page driver over static HTML
///
/// Pages are either registered up front with [`StaticPage::with_page`] or
/// read from disk for `file://` URLs and plain paths. There is no layout, so
/// geometry is zero and styles are CSS initial values.
#[derive(Default)]
pub struct StaticPage {
    pages: HashMap<String, String>,
    current: Option<StaticDocument>,
}

impl StaticPage {
    /// Create an empty driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: serve `html` for `url`
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Register `html` for `url`
    pub fn add_page(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }

    /// The currently open document
    pub fn document(&self) -> Option<&StaticDocument> {
        self.current.as_ref()
    }

    fn current_mut(&mut self) -> Result<&mut StaticDocument> {
        self.current
            .as_mut()
            .ok_or_else(|| PageError::EvaluationFailed("No page is open".to_string()))
    }

    fn load(&self, url: &str) -> Result<String> {
        if let Some(html) = self.pages.get(url) {
            return Ok(html.clone());
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        if Path::new(path).is_file() {
            return Ok(std::fs::read_to_string(path)?);
        }

        Err(PageError::NavigationFailed(format!("No static content for {}", url)))
    }
}

impl PageDriver for StaticPage {
    fn open(&mut self, url: &str) -> Result<()> {
        let html = self.load(url)?;
        self.current = Some(StaticDocument::parse(&html));
        Ok(())
    }

    fn label_all(&mut self, labels: &[(SelectorPath, Label)]) -> Result<LabelReport> {
        let document = self.current_mut()?;
        let (resolved, report) = resolve_labels(&*document, labels);
        for (node, label) in resolved {
            document.stamp_label(node, label);
        }
        Ok(report)
    }

    fn clear_labels(&mut self) -> Result<()> {
        self.current_mut()?.clear_labels();
        Ok(())
    }

    fn extract_all(&mut self) -> Result<Vec<ElementFeatures>> {
        Ok(self.current_mut()?.snapshot().into_features())
    }

    fn screenshot(&mut self, path: &Path) -> Result<()> {
        Err(PageError::Unsupported(format!(
            "static pages cannot be rendered ({})",
            path.display()
        )))
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }
}
