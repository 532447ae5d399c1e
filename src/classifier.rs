//! External classifier channel
//!
//! Each page is classified by a fresh subprocess. The request is a header
//! line (`crawlerId,<features>`) followed by one line per element; closing
//! stdin ends the request. The response is free text containing
//! `titles:[...]`/`contents:[...]` (or `title:[...]`/`content:[...]`) id lists.

use crate::dataset::push_feature_values;
use crate::dom::{ElementFeatures, FEATURE_NAMES, Label, SelectorPath};
use crate::error::{PageError, Result};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Name of the id column in classifier requests
pub const ID_COLUMN: &str = "crawlerId";

/// Marker pairs searched in the response, multi-id form first
const RESPONSE_MARKERS: [(&str, &str); 2] = [("titles:", "contents:"), ("title:", "content:")];

/// Element ids the classifier picked as title and content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prediction {
    pub titles: Vec<u32>,
    pub contents: Vec<u32>,
}

impl Prediction {
    /// First predicted title id
    pub fn title(&self) -> Option<u32> {
        self.titles.first().copied()
    }

    /// First predicted content id
    pub fn content(&self) -> Option<u32> {
        self.contents.first().copied()
    }

    /// Id selectors for every predicted element, for labeling the page
    pub fn label_pairs(&self) -> Vec<(SelectorPath, Label)> {
        let titles = self.titles.iter().map(|id| (SelectorPath::for_id(*id), Label::Title));
        let contents = self.contents.iter().map(|id| (SelectorPath::for_id(*id), Label::Content));
        titles.chain(contents).collect()
    }
}

/// Predicts title/content elements for one page
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, elements: &[ElementFeatures]) -> Result<Prediction>;
}

/// Build the request text sent on the classifier's stdin
///
/// Elements whose values cannot be formatted are left out (and logged).
pub fn encode_request(elements: &[ElementFeatures]) -> String {
    let mut request = String::from(ID_COLUMN);
    for name in FEATURE_NAMES {
        request.push(',');
        request.push_str(name);
    }
    request.push('\n');

    for features in elements {
        let mut line = features.id.to_string();
        match push_feature_values(&mut line, features) {
            Ok(()) => {
                request.push_str(&line);
                request.push('\n');
            }
            Err(e) => log::warn!("Leaving element out of classifier request: {}", e),
        }
    }

    request
}

/// Locate the title/content id lists in classifier output
pub fn parse_response(output: &str) -> Result<Prediction> {
    for (title_marker, content_marker) in RESPONSE_MARKERS {
        if let (Some(titles), Some(contents)) =
            (bracketed_after(output, title_marker), bracketed_after(output, content_marker))
        {
            return Ok(Prediction { titles: parse_ids(titles)?, contents: parse_ids(contents)? });
        }
    }

    Err(PageError::ResponseParseFailure(format!("no title/content id lists in {:?}", truncate(output, 200))))
}

fn bracketed_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let after_marker = text.find(marker)? + marker.len();
    let open = after_marker + text[after_marker..].find('[')?;
    let close = open + text[open..].find(']')?;
    Some(&text[open + 1..close])
}

// numpy prints either "[3,17]" or "[ 3 17]" depending on width
fn parse_ids(list: &str) -> Result<Vec<u32>> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<u32>()
                .map_err(|_| PageError::ResponseParseFailure(format!("'{}' is not an element id", token)))
        })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// How to start the classifier process
#[derive(Debug, Clone)]
pub struct ClassifierCommand {
    /// Program to execute
    pub program: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Bound on one request/response round trip
    pub timeout: Duration,
}

impl Default for ClassifierCommand {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["../classifier/predictor.py".to_string()],
            timeout: Duration::from_secs(120),
        }
    }
}

impl ClassifierCommand {
    /// Create a command with no arguments and the default timeout
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), ..Default::default() }
    }

    /// Builder method: add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builder method: set the round trip timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Classifier reached through a subprocess per page
#[derive(Debug, Clone, Default)]
pub struct SubprocessClassifier {
    command: ClassifierCommand,
}

impl SubprocessClassifier {
    pub fn new(command: ClassifierCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &ClassifierCommand {
        &self.command
    }

    async fn round_trip(&self, request: String) -> Result<Output> {
        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PageError::SubprocessFailure(format!("Failed to start {}: {}", self.command.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PageError::SubprocessFailure("Classifier stdin unavailable".to_string()))?;

        // Write while reading so a chatty classifier cannot fill its stdout pipe and stall
        let write = async move {
            let result = stdin.write_all(request.as_bytes()).await;
            drop(stdin);
            result
        };

        let (written, output) = tokio::join!(write, child.wait_with_output());
        if let Err(e) = written {
            log::debug!("Classifier stopped reading its input: {}", e);
        }

        output.map_err(|e| PageError::SubprocessFailure(format!("Failed to read classifier output: {}", e)))
    }
}

#[async_trait]
impl Classifier for SubprocessClassifier {
    async fn classify(&self, elements: &[ElementFeatures]) -> Result<Prediction> {
        let request = encode_request(elements);
        log::debug!("Sending {} elements to {}", elements.len(), self.command.program);

        let output = tokio::time::timeout(self.command.timeout, self.round_trip(request))
            .await
            .map_err(|_| PageError::SubprocessFailure(format!("No response within {:?}", self.command.timeout)))??;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(PageError::SubprocessFailure(format!("stderr: {}", stderr.trim())));
        }
        if !output.status.success() {
            return Err(PageError::SubprocessFailure(format!("exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        log::debug!("Classifier response: {}", stdout.trim());
        parse_response(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{PageMetrics, RawElement};

    fn element(id: u32) -> ElementFeatures {
        let raw = RawElement {
            tag_name: "DIV".to_string(),
            left: 0.0,
            top: 0.0,
            width: 10.0,
            height: 10.0,
            children: 0,
            descendants: 0,
            link_count: 0,
            paragraph_count: 0,
            image_count: 0,
            parent_count: 1,
            text: String::new(),
            font_size: "16px".to_string(),
            color: "rgb(0, 0, 0)".to_string(),
            background_color: "rgba(0, 0, 0, 0)".to_string(),
            text_align: "start".to_string(),
            margin_top: "0px".to_string(),
            margin_right: "0px".to_string(),
            margin_bottom: "0px".to_string(),
            margin_left: "0px".to_string(),
            padding_top: "0px".to_string(),
            padding_right: "0px".to_string(),
            padding_bottom: "0px".to_string(),
            padding_left: "0px".to_string(),
            label: Some("title".to_string()),
        };
        ElementFeatures::from_raw(id, &raw, &PageMetrics::default())
    }

    fn shell(script: &str) -> SubprocessClassifier {
        SubprocessClassifier::new(ClassifierCommand::new("sh").arg("-c").arg(script).timeout(Duration::from_secs(10)))
    }

    #[test]
    fn test_parse_single_id_response() {
        let prediction = parse_response("garbage title:[17] more garbage content:[42] tail").unwrap();
        assert_eq!(prediction.title(), Some(17));
        assert_eq!(prediction.content(), Some(42));
    }

    #[test]
    fn test_parse_multi_id_response() {
        let output = "loading model\ntitles: [ 3, 17]\ncontents: [42,\n 43 44]\n";
        let prediction = parse_response(output).unwrap();
        assert_eq!(prediction.titles, vec![3, 17]);
        assert_eq!(prediction.contents, vec![42, 43, 44]);
    }

    #[test]
    fn test_parse_empty_lists() {
        let prediction = parse_response("titles: []\ncontents: []").unwrap();
        assert!(prediction.titles.is_empty());
        assert_eq!(prediction.title(), None);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_response("nothing here"), Err(PageError::ResponseParseFailure(_))));
        assert!(matches!(parse_response("title:[1] only"), Err(PageError::ResponseParseFailure(_))));
        assert!(matches!(parse_response("title:[1 content:[2"), Err(PageError::ResponseParseFailure(_))));
        assert!(matches!(parse_response("title:[x] content:[2]"), Err(PageError::ResponseParseFailure(_))));
        assert!(matches!(parse_response("title:[-1] content:[2]"), Err(PageError::ResponseParseFailure(_))));
    }

    #[test]
    fn test_label_pairs() {
        let prediction = Prediction { titles: vec![1], contents: vec![5, 6] };
        let pairs = prediction.label_pairs();

        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0.as_str(), "[xDataCrawler-id='1']");
        assert_eq!(pairs[0].1, Label::Title);
        assert_eq!(pairs[2].0.as_str(), "[xDataCrawler-id='6']");
        assert_eq!(pairs[2].1, Label::Content);
    }

    #[test]
    fn test_encode_request() {
        let request = encode_request(&[element(0), element(1)]);
        let lines: Vec<&str> = request.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("crawlerId,tagName,left,"));
        assert_eq!(lines[0].split(',').count(), 1 + FEATURE_NAMES.len());
        assert!(lines[1].starts_with("0,DIV,"));
        assert!(lines[2].starts_with("1,DIV,"));
        assert_eq!(lines[2].split(',').count(), 1 + FEATURE_NAMES.len());
        // ground-truth flags never reach the classifier
        assert!(!request.contains("true"));
    }

    #[test]
    fn test_encode_request_skips_unformattable() {
        let mut bad = element(1);
        bad.text_align = "a\nb".to_string();
        let request = encode_request(&[element(0), bad]);
        assert_eq!(request.lines().count(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_round_trip() {
        let classifier = shell("read -r header; n=$(wc -l | tr -d ' '); echo \"titles: [$n]\"; echo 'contents: [0]'");
        let prediction = classifier.classify(&[element(0), element(1), element(2)]).await.unwrap();

        assert_eq!(prediction.titles, vec![3]);
        assert_eq!(prediction.contents, vec![0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_nonzero_exit() {
        let classifier = shell("cat > /dev/null; echo 'title:[1] content:[2]'; exit 3");
        let err = classifier.classify(&[element(0)]).await.unwrap_err();
        assert!(matches!(err, PageError::SubprocessFailure(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_stderr_is_failure() {
        let classifier = shell("cat > /dev/null; echo warning >&2; echo 'title:[1] content:[2]'");
        let err = classifier.classify(&[element(0)]).await.unwrap_err();
        assert!(matches!(err, PageError::SubprocessFailure(message) if message.contains("warning")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_subprocess_timeout() {
        let classifier = SubprocessClassifier::new(
            ClassifierCommand::new("sh").arg("-c").arg("sleep 5").timeout(Duration::from_millis(200)),
        );
        let err = classifier.classify(&[element(0)]).await.unwrap_err();
        assert!(matches!(err, PageError::SubprocessFailure(message) if message.contains("No response")));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let classifier = SubprocessClassifier::new(ClassifierCommand::new("definitely-not-a-classifier-binary"));
        let err = classifier.classify(&[element(0)]).await.unwrap_err();
        assert!(matches!(err, PageError::SubprocessFailure(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unparseable_response() {
        let classifier = shell("cat > /dev/null; echo 'no markers'");
        let err = classifier.classify(&[element(0)]).await.unwrap_err();
        assert!(matches!(err, PageError::ResponseParseFailure(_)));
    }
}
