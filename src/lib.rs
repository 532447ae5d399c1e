//! # page-features
//!
//! Renders web pages, computes a layout/style feature vector for every element
//! and uses those vectors to find the title and main content of a page.
//!
//! ## Features
//!
//! - **Feature Extraction**: Per-element geometry, structure, text and computed-style measurements
//! - **Selector Paths**: Colon-delimited CSS/index paths (`article:h1:1`) to mark ground truth
//! - **Dataset Output**: Labeled rows for training a title/content classifier
//! - **Classifier Channel**: Line protocol to an external predictor process
//! - **Batch Runs**: Collect, predict and test modes over a list of sites
//!
//! ## Command Line
//!
//! ```bash
//! # Build a labeled dataset from sites.json
//! cargo run -- -i sites.json -o out.csv
//!
//! # Ask the classifier about one page and save an annotated screenshot
//! cargo run -- -p https://example.com/story -t shots
//!
//! # Score the classifier against the labeled sites
//! cargo run -- --test -i sites.json
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use page_features::{BatchRunner, BrowserSession, DatasetWriter, LaunchOptions, Mode, SubprocessClassifier};
//! use std::path::Path;
//!
//! # async fn run() -> page_features::Result<()> {
//! let sites = page_features::config::load_sites(Path::new("sites.json"))?;
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let dataset = DatasetWriter::open(Path::new("out.csv"), false)?;
//!
//! let mut runner = BatchRunner::<_, SubprocessClassifier, _>::new(session).with_dataset(dataset);
//! let report = runner.run(Mode::Collect, &sites).await?;
//! println!("{} rows from {} sites", report.rows_written, report.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ### Without a Browser
//!
//! [`StaticPage`] parses HTML directly. It has no layout engine, so geometry
//! is zero and styles are CSS initial values, but structure, text and labels
//! behave as in Chrome:
//!
//! ```rust
//! use page_features::{Label, PageDriver, SelectorPath, StaticPage};
//!
//! # fn main() -> page_features::Result<()> {
//! let mut page = StaticPage::new().with_page("mem://story", "<body><h1>Hi</h1><p>Text</p></body>");
//! page.open("mem://story")?;
//! page.label_all(&[(SelectorPath::parse("h1"), Label::Title)])?;
//!
//! let features = page.extract_all()?;
//! assert!(features[0].is_title);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: Headless Chrome session and launch configuration
//! - [`dom`]: Feature vectors, selector paths and the page driver interface
//! - [`dataset`]: Dataset rows and the file writer
//! - [`classifier`]: External classifier protocol
//! - [`config`]: Sites file and target selection
//! - [`batch`]: Run orchestration
//! - [`screenshot`]: Outline annotation
//! - [`error`]: Error types and result aliases

pub mod batch;
pub mod browser;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod dom;
pub mod error;
pub mod screenshot;

pub use batch::{Accuracy, BatchReport, BatchRunner, Mode, TargetFailure};
pub use browser::{BrowserSession, ConnectionOptions, LaunchOptions, LoadSignal};
pub use classifier::{Classifier, ClassifierCommand, Prediction, SubprocessClassifier};
pub use config::{SiteConfig, TargetSelection};
pub use dataset::DatasetWriter;
pub use dom::{ElementFeatures, Label, LabelReport, PageDriver, SelectorPath, StaticPage};
pub use error::{PageError, Result};
