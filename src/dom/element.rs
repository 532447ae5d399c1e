use crate::dom::selector::Label;
use serde::{Deserialize, Deserializer, Serialize};

/// Feature columns in the order they are written to datasets and classifier requests
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "tagName",
    "left",
    "top",
    "width",
    "height",
    "children",
    "textCount",
    "parentCount",
    "fontSize",
    "linkCount",
    "paragraphCount",
    "imageCount",
    "colorRed",
    "colorGreen",
    "colorBlue",
    "backgroundRed",
    "backgroundGreen",
    "backgroundBlue",
    "backgroundAlpha",
    "textAlign",
    "marginTop",
    "marginRight",
    "marginBottom",
    "marginLeft",
    "paddingTop",
    "paddingRight",
    "paddingBottom",
    "paddingLeft",
    "descendants",
    "relPosX",
    "relPosY",
];

/// Number of feature columns (tag name plus 30 measurements)
pub const FEATURE_COUNT: usize = 31;

/// Raw measurements of one element as read inside the rendered page
///
/// Style values are kept exactly as the browser reports them (`"16px"`,
/// `"rgba(0, 0, 0, 0)"`); turning them into numbers happens in
/// [`ElementFeatures::from_raw`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    /// Tag name as reported by the DOM (upper case for HTML elements)
    pub tag_name: String,

    /// Bounding rect left plus horizontal scroll offset
    #[serde(default = "nan", deserialize_with = "number_or_nan")]
    pub left: f64,

    /// Bounding rect top plus vertical scroll offset
    #[serde(default = "nan", deserialize_with = "number_or_nan")]
    pub top: f64,

    /// Rendered width including overflow
    #[serde(default = "nan", deserialize_with = "number_or_nan")]
    pub width: f64,

    /// Rendered height including overflow
    #[serde(default = "nan", deserialize_with = "number_or_nan")]
    pub height: f64,

    /// Direct element children
    #[serde(default)]
    pub children: u32,

    /// All nested elements regardless of depth
    #[serde(default)]
    pub descendants: u32,

    /// Descendant `<a>` elements
    #[serde(default)]
    pub link_count: u32,

    /// Descendant `<p>` elements
    #[serde(default)]
    pub paragraph_count: u32,

    /// Descendant `<img>` elements
    #[serde(default)]
    pub image_count: u32,

    /// Ancestor steps up to (excluding) `<body>`
    #[serde(default)]
    pub parent_count: u32,

    /// Full text content of the element
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub font_size: String,

    #[serde(default)]
    pub color: String,

    #[serde(default)]
    pub background_color: String,

    #[serde(default)]
    pub text_align: String,

    #[serde(default)]
    pub margin_top: String,
    #[serde(default)]
    pub margin_right: String,
    #[serde(default)]
    pub margin_bottom: String,
    #[serde(default)]
    pub margin_left: String,

    #[serde(default)]
    pub padding_top: String,
    #[serde(default)]
    pub padding_right: String,
    #[serde(default)]
    pub padding_bottom: String,
    #[serde(default)]
    pub padding_left: String,

    /// Value of the label marker attribute, if the element was labeled
    #[serde(default)]
    pub label: Option<String>,
}

/// Document-wide dimensions used to normalize element positions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub scroll_width: f64,
    pub scroll_height: f64,
}

/// Feature vector of one rendered element
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElementFeatures {
    /// Per-page id, stamped on the element so it can be selected again later
    pub id: u32,
    pub tag_name: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub children: u32,
    pub text_count: u32,
    pub parent_count: u32,
    pub font_size: f64,
    pub link_count: u32,
    pub paragraph_count: u32,
    pub image_count: u32,
    pub color_red: f64,
    pub color_green: f64,
    pub color_blue: f64,
    pub background_red: f64,
    pub background_green: f64,
    pub background_blue: f64,
    pub background_alpha: f64,
    pub text_align: String,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub padding_top: f64,
    pub padding_right: f64,
    pub padding_bottom: f64,
    pub padding_left: f64,
    pub descendants: u32,
    pub rel_pos_x: f64,
    pub rel_pos_y: f64,
    pub is_title: bool,
    pub is_content: bool,
}

/// A single feature column value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Text(&'a str),
    Count(u32),
    Number(f64),
}

impl ElementFeatures {
    /// Derive the feature vector from raw in-page measurements
    ///
    /// Malformed style values never fail the element; they become `NaN`.
    pub fn from_raw(id: u32, raw: &RawElement, page: &PageMetrics) -> Self {
        let color = parse_color(&raw.color);
        let background = parse_color(&raw.background_color);
        let label = raw.label.as_deref().and_then(Label::from_marker);

        Self {
            id,
            tag_name: raw.tag_name.clone(),
            left: raw.left,
            top: raw.top,
            width: raw.width,
            height: raw.height,
            children: raw.children,
            text_count: word_count(&raw.text),
            parent_count: raw.parent_count,
            font_size: parse_length(&raw.font_size),
            link_count: raw.link_count,
            paragraph_count: raw.paragraph_count,
            image_count: raw.image_count,
            color_red: color.red,
            color_green: color.green,
            color_blue: color.blue,
            background_red: background.red,
            background_green: background.green,
            background_blue: background.blue,
            background_alpha: background.alpha,
            text_align: raw.text_align.clone(),
            margin_top: parse_length(&raw.margin_top),
            margin_right: parse_length(&raw.margin_right),
            margin_bottom: parse_length(&raw.margin_bottom),
            margin_left: parse_length(&raw.margin_left),
            padding_top: parse_length(&raw.padding_top),
            padding_right: parse_length(&raw.padding_right),
            padding_bottom: parse_length(&raw.padding_bottom),
            padding_left: parse_length(&raw.padding_left),
            descendants: raw.descendants,
            rel_pos_x: ratio(raw.left, page.scroll_width),
            rel_pos_y: ratio(raw.top, page.scroll_height),
            is_title: label == Some(Label::Title),
            is_content: label == Some(Label::Content),
        }
    }

    /// Feature values in [`FEATURE_NAMES`] order
    pub fn values(&self) -> [FeatureValue<'_>; FEATURE_COUNT] {
        use FeatureValue::{Count, Number, Text};

        [
            Text(&self.tag_name),
            Number(self.left),
            Number(self.top),
            Number(self.width),
            Number(self.height),
            Count(self.children),
            Count(self.text_count),
            Count(self.parent_count),
            Number(self.font_size),
            Count(self.link_count),
            Count(self.paragraph_count),
            Count(self.image_count),
            Number(self.color_red),
            Number(self.color_green),
            Number(self.color_blue),
            Number(self.background_red),
            Number(self.background_green),
            Number(self.background_blue),
            Number(self.background_alpha),
            Text(&self.text_align),
            Number(self.margin_top),
            Number(self.margin_right),
            Number(self.margin_bottom),
            Number(self.margin_left),
            Number(self.padding_top),
            Number(self.padding_right),
            Number(self.padding_bottom),
            Number(self.padding_left),
            Count(self.descendants),
            Number(self.rel_pos_x),
            Number(self.rel_pos_y),
        ]
    }

    /// Label carried by this element, if any
    pub fn label(&self) -> Option<Label> {
        if self.is_title {
            Some(Label::Title)
        } else if self.is_content {
            Some(Label::Content)
        } else {
            None
        }
    }
}

/// RGBA components parsed from a computed colour string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

/// Count space-delimited tokens
///
/// Only the plain space character separates tokens; tabs and newlines stay
/// inside a token. Tokens that are empty after trimming are not counted.
pub fn word_count(text: &str) -> u32 {
    text.split(' ')
        .filter(|token| !token.trim_matches(is_js_whitespace).is_empty())
        .count() as u32
}

// Characters removed by JavaScript's String.prototype.trim (NEL is not one of them)
fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\x0B' | '\x0C' | '\r' | ' ' | '\u{a0}' | '\u{1680}' | '\u{2000}'..='\u{200a}'
            | '\u{2028}' | '\u{2029}' | '\u{202f}' | '\u{205f}' | '\u{3000}' | '\u{feff}'
    )
}

/// Parse `rgb(r, g, b)` / `rgba(r, g, b, a)` (or the space separated form)
///
/// Missing or unparseable components are `NaN`; alpha defaults to `1`.
pub fn parse_color(value: &str) -> Color {
    let inner = match (value.find('('), value.rfind(')')) {
        (Some(open), Some(close)) if open < close => &value[open + 1..close],
        _ => "",
    };

    let components: Vec<f64> = inner
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().unwrap_or(f64::NAN))
        .collect();

    let component = |index: usize| components.get(index).copied().unwrap_or(f64::NAN);

    Color {
        red: component(0),
        green: component(1),
        blue: component(2),
        alpha: components.get(3).copied().unwrap_or(1.0),
    }
}

/// Parse a computed length such as `"12.5px"`; anything else is `NaN`
pub fn parse_length(value: &str) -> f64 {
    value.replace("px", "").trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn ratio(position: f64, extent: f64) -> f64 {
    if extent == 0.0 || !extent.is_finite() { 0.0 } else { position / extent }
}

fn nan() -> f64 {
    f64::NAN
}

// JSON.stringify turns NaN into null
fn number_or_nan<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled(tag: &str) -> RawElement {
        RawElement {
            tag_name: tag.to_string(),
            left: 100.0,
            top: 50.0,
            width: 300.0,
            height: 40.0,
            children: 2,
            descendants: 5,
            link_count: 1,
            paragraph_count: 2,
            image_count: 0,
            parent_count: 3,
            text: "Breaking  news today".to_string(),
            font_size: "24px".to_string(),
            color: "rgb(10, 20, 30)".to_string(),
            background_color: "rgba(255, 255, 255, 0.5)".to_string(),
            text_align: "center".to_string(),
            margin_top: "8px".to_string(),
            margin_right: "0px".to_string(),
            margin_bottom: "8px".to_string(),
            margin_left: "0px".to_string(),
            padding_top: "1.5px".to_string(),
            padding_right: "2px".to_string(),
            padding_bottom: "3px".to_string(),
            padding_left: "4px".to_string(),
            label: None,
        }
    }

    #[test]
    fn test_word_count_splits_on_spaces_only() {
        assert_eq!(word_count("one two three"), 3);
        assert_eq!(word_count("  one   two  "), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("one\ttwo\nthree"), 1);
        assert_eq!(word_count("one\ttwo three"), 2);
        assert_eq!(word_count("\n \t "), 0);
    }

    #[test]
    fn test_word_count_trims_like_javascript() {
        assert_eq!(word_count("\u{85}"), 1);
        assert_eq!(word_count("a \u{85} b"), 3);
        assert_eq!(word_count("\u{a0} \u{2028} \u{3000} \u{feff}"), 0);
        assert_eq!(word_count("one\u{a0}two"), 1);
    }

    #[test]
    fn test_parse_color() {
        let color = parse_color("rgb(10, 20, 30)");
        assert_eq!((color.red, color.green, color.blue, color.alpha), (10.0, 20.0, 30.0, 1.0));

        let color = parse_color("rgba(0, 0, 0, 0)");
        assert_eq!(color.alpha, 0.0);

        let color = parse_color("rgb(1 2 3 / 0.25)");
        assert_eq!((color.red, color.green, color.blue, color.alpha), (1.0, 2.0, 3.0, 0.25));
    }

    #[test]
    fn test_parse_color_malformed() {
        let color = parse_color("transparent");
        assert!(color.red.is_nan());
        assert!(color.blue.is_nan());
        assert_eq!(color.alpha, 1.0);

        let color = parse_color("rgb(10, x, 30)");
        assert_eq!(color.red, 10.0);
        assert!(color.green.is_nan());
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length("16px"), 16.0);
        assert_eq!(parse_length("0.5px"), 0.5);
        assert_eq!(parse_length("-4px"), -4.0);
        assert!(parse_length("auto").is_nan());
        assert!(parse_length("").is_nan());
    }

    #[test]
    fn test_from_raw() {
        let page = PageMetrics { scroll_width: 1000.0, scroll_height: 500.0 };
        let features = ElementFeatures::from_raw(7, &styled("H1"), &page);

        assert_eq!(features.id, 7);
        assert_eq!(features.tag_name, "H1");
        assert_eq!(features.text_count, 3);
        assert_eq!(features.font_size, 24.0);
        assert_eq!(features.color_green, 20.0);
        assert_eq!(features.background_alpha, 0.5);
        assert_eq!(features.padding_top, 1.5);
        assert_eq!(features.rel_pos_x, 0.1);
        assert_eq!(features.rel_pos_y, 0.1);
        assert!(!features.is_title);
        assert!(!features.is_content);
    }

    #[test]
    fn test_relative_position_guards_zero_extent() {
        let features = ElementFeatures::from_raw(0, &styled("DIV"), &PageMetrics::default());
        assert_eq!(features.rel_pos_x, 0.0);
        assert_eq!(features.rel_pos_y, 0.0);
    }

    #[test]
    fn test_label_flags() {
        let page = PageMetrics::default();

        let mut raw = styled("H1");
        raw.label = Some("title".to_string());
        let features = ElementFeatures::from_raw(0, &raw, &page);
        assert!(features.is_title && !features.is_content);
        assert_eq!(features.label(), Some(Label::Title));

        raw.label = Some("content".to_string());
        let features = ElementFeatures::from_raw(0, &raw, &page);
        assert!(!features.is_title && features.is_content);

        raw.label = Some("other".to_string());
        let features = ElementFeatures::from_raw(0, &raw, &page);
        assert_eq!(features.label(), None);
    }

    #[test]
    fn test_malformed_style_keeps_element() {
        let mut raw = styled("DIV");
        raw.font_size = "medium".to_string();
        raw.margin_left = "auto".to_string();
        raw.color = "garbage".to_string();

        let features = ElementFeatures::from_raw(3, &raw, &PageMetrics::default());
        assert!(features.font_size.is_nan());
        assert!(features.margin_left.is_nan());
        assert!(features.color_red.is_nan());
        assert_eq!(features.margin_top, 8.0);
    }

    #[test]
    fn test_values_follow_feature_names() {
        let features = ElementFeatures::from_raw(0, &styled("P"), &PageMetrics::default());
        let values = features.values();

        assert_eq!(values.len(), FEATURE_NAMES.len());
        assert_eq!(values[0], FeatureValue::Text("P"));
        assert_eq!(values[6], FeatureValue::Count(3));
        assert_eq!(values[19], FeatureValue::Text("center"));
        assert_eq!(values[28], FeatureValue::Count(5));
    }

    #[test]
    fn test_raw_element_null_geometry() {
        let json = r#"{"tagName":"DIV","left":null,"top":12,"width":3,"height":4,"children":0}"#;
        let raw: RawElement = serde_json::from_str(json).unwrap();
        assert!(raw.left.is_nan());
        assert_eq!(raw.top, 12.0);
        assert_eq!(raw.label, None);
    }
}
