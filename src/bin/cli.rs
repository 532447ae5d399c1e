//! page-features command line
//!
//! Collects labeled datasets, asks the classifier about pages, or scores the
//! classifier against labeled sites.

use anyhow::{Context, bail};
use clap::Parser;
use page_features::browser::{ConnectionOptions, LaunchOptions, LoadSignal};
use page_features::config::{self, SiteConfig, TargetSelection};
use page_features::{BatchReport, BatchRunner, BrowserSession, ClassifierCommand, DatasetWriter, Mode,
                    SubprocessClassifier};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "page-features")]
#[command(version)]
#[command(about = "Extract element features from web pages and find their title and content", long_about = None)]
struct Cli {
    /// Sites file (JSON array of {name, page, titleSelector, contentSelector})
    #[arg(long, short = 'i', default_value = "sites.json")]
    input: PathBuf,

    /// Dataset file written in collect mode
    #[arg(long, short = 'o', default_value = "out.csv")]
    output: PathBuf,

    /// Append to the dataset instead of truncating it
    #[arg(long, short = 'a')]
    append: bool,

    /// Start at the named site
    #[arg(long, short = 'b', value_name = "NAME", conflicts_with = "sites")]
    begin: Option<String>,

    /// Only process these sites (comma separated)
    #[arg(long, short = 's', value_name = "NAMES")]
    sites: Option<String>,

    /// Predict a single page, or every site in the input file with "bulk"
    #[arg(long, short = 'p', value_name = "URL|bulk", conflicts_with = "test")]
    predict: Option<String>,

    /// Score the classifier against the labeled sites
    #[arg(long)]
    test: bool,

    /// Directory for annotated screenshots
    #[arg(long, short = 't', value_name = "DIR")]
    shots: Option<PathBuf>,

    /// Classifier program (default: python3 ../classifier/predictor.py)
    #[arg(long, value_name = "PROGRAM")]
    classifier: Option<String>,

    /// Extra classifier argument (repeatable)
    #[arg(long = "classifier-arg", value_name = "ARG", allow_hyphen_values = true)]
    classifier_args: Vec<String>,

    /// Seconds to wait for the classifier's answer
    #[arg(long, value_name = "SECS", default_value = "120")]
    classifier_timeout: u64,

    /// Seconds to wait for a page to load
    #[arg(long, value_name = "SECS", default_value = "60")]
    nav_timeout: u64,

    /// Load signals to wait for (repeatable)
    #[arg(long, value_enum, value_name = "SIGNAL")]
    wait_until: Vec<LoadSignal>,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// Path to custom browser executable
    #[arg(long, value_name = "PATH")]
    chrome_path: Option<PathBuf>,

    /// WebSocket endpoint of an already running browser
    #[arg(long, value_name = "URL")]
    ws_endpoint: Option<String>,

    /// Persistent browser profile directory
    #[arg(long, value_name = "DIR")]
    user_data_dir: Option<PathBuf>,

    /// Disable the Chrome sandbox (needed when running as root in containers)
    #[arg(long)]
    no_sandbox: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.test {
            Mode::Test
        } else if self.predict.is_some() {
            Mode::Predict
        } else {
            Mode::Collect
        }
    }

    fn selection(&self) -> TargetSelection {
        match (&self.begin, &self.sites) {
            (Some(name), _) => TargetSelection::BeginAt(name.clone()),
            (None, Some(list)) => TargetSelection::named_list(list),
            (None, None) => TargetSelection::All,
        }
    }

    fn targets(&self) -> anyhow::Result<Vec<SiteConfig>> {
        if let Some(url) = self.predict.as_deref().filter(|target| *target != "bulk") {
            return Ok(vec![SiteConfig::for_url(url)]);
        }

        let sites = config::load_sites(&self.input)?;
        let targets = config::select_targets(&sites, &self.selection());
        log::info!("Selected {} of {} sites from {}", targets.len(), sites.len(), self.input.display());
        Ok(targets)
    }

    fn classifier(&self) -> SubprocessClassifier {
        let mut command = match &self.classifier {
            Some(program) => ClassifierCommand::new(program),
            None => ClassifierCommand::default(),
        };
        command.args.extend(self.classifier_args.iter().cloned());
        SubprocessClassifier::new(command.timeout(Duration::from_secs(self.classifier_timeout)))
    }

    fn load_signals(&self) -> Vec<LoadSignal> {
        if self.wait_until.is_empty() {
            LaunchOptions::default().load_signals
        } else {
            self.wait_until.clone()
        }
    }

    fn session(&self) -> anyhow::Result<BrowserSession> {
        let navigation_timeout = Duration::from_secs(self.nav_timeout);

        if let Some(ws_url) = &self.ws_endpoint {
            eprintln!("Connecting to browser at {}", ws_url);
            let mut options = ConnectionOptions::new(ws_url).navigation_timeout(navigation_timeout);
            options.load_signals = self.load_signals();
            return Ok(BrowserSession::connect(options)?);
        }

        let mut options = LaunchOptions::new()
            .headless(!self.headed)
            .sandbox(!self.no_sandbox)
            .navigation_timeout(navigation_timeout)
            .load_signals(self.load_signals());
        if let Some(path) = &self.chrome_path {
            options = options.chrome_path(path);
        }
        if let Some(dir) = &self.user_data_dir {
            options = options.user_data_dir(dir);
        }

        eprintln!("Browser mode: {}", if options.headless { "headless" } else { "headed" });
        Ok(BrowserSession::launch(options)?)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mode = cli.mode();

    let targets = cli.targets()?;
    if targets.is_empty() {
        bail!("No sites selected from {}", cli.input.display());
    }

    let dataset = match mode {
        Mode::Collect => Some(
            DatasetWriter::open(&cli.output, cli.append)
                .with_context(|| format!("Cannot open dataset {}", cli.output.display()))?,
        ),
        _ => None,
    };

    let session = cli.session().context("Cannot start browser")?;

    let mut runner: BatchRunner<BrowserSession, SubprocessClassifier, File> =
        BatchRunner::new(session).with_classifier(cli.classifier());
    if let Some(dataset) = dataset {
        runner = runner.with_dataset(dataset);
    }
    if let Some(dir) = &cli.shots {
        runner = runner.with_screenshots(dir);
    }

    let report = runner.run(mode, &targets).await?;
    print_summary(mode, &report, &cli);

    Ok(())
}

fn print_summary(mode: Mode, report: &BatchReport, cli: &Cli) {
    println!("Processed {} targets: {} succeeded, {} failed", report.processed, report.succeeded, report.failed());
    for failure in &report.failures {
        println!("  {}: {}", failure.name, failure.error);
    }

    match mode {
        Mode::Collect => println!("Wrote {} rows to {}", report.rows_written, cli.output.display()),
        Mode::Predict => println!("Classified {} elements", report.elements),
        Mode::Test => {
            if let Some(accuracy) = &report.accuracy {
                println!("Title accuracy:   {:.3} ({}/{})", accuracy.title_accuracy(), accuracy.title_matches, accuracy.total);
                println!(
                    "Content accuracy: {:.3} ({}/{})",
                    accuracy.content_accuracy(),
                    accuracy.content_matches,
                    accuracy.total
                );
            }
        }
    }
}
