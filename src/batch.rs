//! Batch orchestration
//!
//! Targets are processed strictly one after another on a single page. A
//! failing target is logged and recorded; the batch always moves on to the
//! next one and the page is released once the last target is done.

use crate::classifier::{Classifier, Prediction};
use crate::config::SiteConfig;
use crate::dataset::DatasetWriter;
use crate::dom::{ElementFeatures, PageDriver};
use crate::error::{PageError, Result};
use crate::screenshot::screenshot_path;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

/// What a run does with each target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Label with configured selectors and append rows to the dataset
    Collect,

    /// Classify unlabeled pages
    Predict,

    /// Classify labeled pages and score the predictions
    Test,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Collect => "collect",
            Mode::Predict => "predict",
            Mode::Test => "test",
        };
        f.write_str(name)
    }
}

/// Title/content match counts of a test run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Accuracy {
    pub title_matches: usize,
    pub content_matches: usize,

    /// Targets that were scored
    pub total: usize,
}

impl Accuracy {
    /// Count one scored target
    pub fn record(&mut self, title_match: bool, content_match: bool) {
        self.total += 1;
        self.title_matches += usize::from(title_match);
        self.content_matches += usize::from(content_match);
    }

    pub fn title_accuracy(&self) -> f64 {
        ratio(self.title_matches, self.total)
    }

    pub fn content_accuracy(&self) -> f64 {
        ratio(self.content_matches, self.total)
    }
}

fn ratio(matches: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { matches as f64 / total as f64 }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "title accuracy {:.3} ({}/{}), content accuracy {:.3} ({}/{})",
            self.title_accuracy(),
            self.title_matches,
            self.total,
            self.content_accuracy(),
            self.content_matches,
            self.total
        )
    }
}

/// A target that was skipped
#[derive(Debug)]
pub struct TargetFailure {
    pub name: String,
    pub error: PageError,
}

/// Summary of a finished run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Targets attempted, successful or not
    pub processed: usize,
    pub succeeded: usize,
    pub failures: Vec<TargetFailure>,

    /// Elements extracted over all successful targets
    pub elements: usize,
    pub rows_written: usize,

    /// Present for test runs
    pub accuracy: Option<Accuracy>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Default)]
struct TargetOutcome {
    elements: usize,
    rows_written: usize,
    score: Option<(bool, bool)>,
}

/// Runs a list of targets through one page, a classifier and a dataset sink
pub struct BatchRunner<P, C, W: Write> {
    page: P,
    classifier: Option<C>,
    dataset: Option<DatasetWriter<W>>,
    screenshot_dir: Option<PathBuf>,
}

impl<P: PageDriver, C: Classifier, W: Write> BatchRunner<P, C, W> {
    /// Create a runner over an already launched page
    pub fn new(page: P) -> Self {
        Self { page, classifier: None, dataset: None, screenshot_dir: None }
    }

    /// Builder method: classifier used by predict and test runs
    pub fn with_classifier(mut self, classifier: C) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Builder method: dataset written by collect runs
    pub fn with_dataset(mut self, dataset: DatasetWriter<W>) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Builder method: save an annotated screenshot per target into `dir`
    pub fn with_screenshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = Some(dir.into());
        self
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// Take back the dataset sink
    pub fn into_dataset(self) -> Option<DatasetWriter<W>> {
        self.dataset
    }

    /// Process every target in order
    ///
    /// Fails only when the mode's sink is missing; per-target errors end up
    /// in [`BatchReport::failures`].
    pub async fn run(&mut self, mode: Mode, targets: &[SiteConfig]) -> Result<BatchReport> {
        match mode {
            Mode::Collect if self.dataset.is_none() => {
                return Err(PageError::InvalidConfig("collect runs need a dataset output".to_string()));
            }
            Mode::Predict | Mode::Test if self.classifier.is_none() => {
                return Err(PageError::InvalidConfig(format!("{} runs need a classifier", mode)));
            }
            _ => {}
        }

        let mut report = BatchReport {
            accuracy: (mode == Mode::Test).then(Accuracy::default),
            ..Default::default()
        };

        for (index, target) in targets.iter().enumerate() {
            log::info!("[{}/{}] Starting {} ({})", index + 1, targets.len(), target.name, target.page);
            report.processed += 1;

            match self.process_target(mode, target).await {
                Ok(outcome) => {
                    report.succeeded += 1;
                    report.elements += outcome.elements;
                    report.rows_written += outcome.rows_written;
                    if let (Some(accuracy), Some((title, content))) = (report.accuracy.as_mut(), outcome.score) {
                        accuracy.record(title, content);
                    }
                }
                Err(e) => {
                    log::error!("Skipping {}: {}", target.name, e);
                    report.failures.push(TargetFailure { name: target.name.clone(), error: e });
                }
            }
        }

        if let Some(dataset) = self.dataset.as_mut() {
            if let Err(e) = dataset.flush() {
                log::error!("Failed to flush dataset: {}", e);
            }
        }

        if let Err(e) = self.page.close() {
            log::warn!("Failed to close page: {}", e);
        }

        log::info!(
            "Finished {} run: {} of {} targets succeeded",
            mode,
            report.succeeded,
            report.processed
        );
        if let Some(accuracy) = &report.accuracy {
            log::info!("{}", accuracy);
        }

        Ok(report)
    }

    async fn process_target(&mut self, mode: Mode, target: &SiteConfig) -> Result<TargetOutcome> {
        self.page.open(&target.page)?;

        match mode {
            Mode::Collect => self.collect(target),
            Mode::Predict => self.predict(target).await,
            Mode::Test => self.test(target).await,
        }
    }

    fn collect(&mut self, target: &SiteConfig) -> Result<TargetOutcome> {
        if !target.is_labeled() {
            log::warn!("{} has no title/content selectors; rows will be unlabeled", target.name);
        }

        let labels = target.label_pairs();
        if !labels.is_empty() {
            let report = self.page.label_all(&labels)?;
            for path in report.missed {
                log::warn!("{}: {}", target.name, PageError::SelectorMiss { path });
            }
        }

        let elements = self.page.extract_all()?;
        let dataset = self
            .dataset
            .as_mut()
            .ok_or_else(|| PageError::InvalidConfig("No dataset output".to_string()))?;
        let rows_written = dataset.write_rows(&target.name, &target.page, &elements);
        log::info!("{}: wrote {} of {} rows", target.name, rows_written, elements.len());

        self.save_screenshot(target);

        Ok(TargetOutcome { elements: elements.len(), rows_written, score: None })
    }

    async fn predict(&mut self, target: &SiteConfig) -> Result<TargetOutcome> {
        let elements = self.page.extract_all()?;
        let prediction = self.classify(&elements).await?;
        log::info!("{}: titles {:?}, contents {:?}", target.name, prediction.titles, prediction.contents);

        self.show_prediction(target, &prediction);

        Ok(TargetOutcome { elements: elements.len(), ..Default::default() })
    }

    async fn test(&mut self, target: &SiteConfig) -> Result<TargetOutcome> {
        for (selector, field) in [(&target.title_selector, "titleSelector"), (&target.content_selector, "contentSelector")] {
            if selector.is_none() {
                return Err(PageError::SelectorMiss { path: format!("<{} not set>", field) });
            }
        }

        let report = self.page.label_all(&target.label_pairs())?;
        if let Some(path) = report.missed.into_iter().next() {
            return Err(PageError::SelectorMiss { path });
        }

        let elements = self.page.extract_all()?;
        let true_titles: BTreeSet<u32> = elements.iter().filter(|e| e.is_title).map(|e| e.id).collect();
        let true_contents: BTreeSet<u32> = elements.iter().filter(|e| e.is_content).map(|e| e.id).collect();

        // A marker can be overwritten when both paths hit the same element
        for (ids, selector) in [(&true_titles, &target.title_selector), (&true_contents, &target.content_selector)] {
            if ids.is_empty() {
                return Err(PageError::SelectorMiss { path: selector.clone().unwrap_or_default() });
            }
        }

        let prediction = self.classify(&elements).await?;
        let title_match = prediction.titles.iter().copied().collect::<BTreeSet<_>>() == true_titles;
        let content_match = prediction.contents.iter().copied().collect::<BTreeSet<_>>() == true_contents;

        log::info!(
            "{}: title {} (expected {:?}, got {:?}), content {} (expected {:?}, got {:?})",
            target.name,
            verdict(title_match),
            true_titles,
            prediction.titles,
            verdict(content_match),
            true_contents,
            prediction.contents
        );

        self.show_prediction(target, &prediction);

        Ok(TargetOutcome { elements: elements.len(), rows_written: 0, score: Some((title_match, content_match)) })
    }

    async fn classify(&self, elements: &[ElementFeatures]) -> Result<Prediction> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| PageError::InvalidConfig("No classifier".to_string()))?;
        classifier.classify(elements).await
    }

    // Screenshots are best effort: problems are logged, never fail the target
    fn show_prediction(&mut self, target: &SiteConfig, prediction: &Prediction) {
        if self.screenshot_dir.is_none() {
            return;
        }

        let labeled = self
            .page
            .clear_labels()
            .and_then(|_| self.page.label_all(&prediction.label_pairs()));
        match labeled {
            Ok(report) => {
                for path in report.missed {
                    log::warn!("{}: predicted element {} not found", target.name, path);
                }
            }
            Err(e) => log::warn!("{}: cannot mark predicted elements: {}", target.name, e),
        }

        self.save_screenshot(target);
    }

    fn save_screenshot(&mut self, target: &SiteConfig) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };

        let path = screenshot_path(dir, &target.name);
        if let Err(e) = self.page.screenshot(&path) {
            log::warn!("{}: screenshot not saved: {}", target.name, e);
        }
    }
}

fn verdict(matched: bool) -> &'static str {
    if matched { "matched" } else { "missed" }
}
