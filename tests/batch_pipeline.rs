use page_features::config::{self, TargetSelection};
use page_features::{BatchRunner, ClassifierCommand, DatasetWriter, Mode, PageError, StaticPage, SubprocessClassifier,
                    dataset};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

// header, a, article, h1, p, p
const ALPHA: &str = r#"<html><body>
<header><a href="/">Home</a></header>
<article><h1>Alpha headline</h1><p>First paragraph of alpha.</p><p>Second.</p></article>
</body></html>"#;

// The real headline is the second h2; the h1 is the site name
const BETA: &str = r#"<html><body>
<div><h2>Menu</h2></div>
<div><h2>Beta headline</h2><section><p>Beta body text</p></section></div>
<h1>Site name</h1>
</body></html>"#;

// Picks the last H1 as title and the first P as content
const TAG_CLASSIFIER: &str = r#"awk -F, 'NR > 1 && $2 == "H1" { t = $1 } NR > 1 && $2 == "P" && c == "" { c = $1 } END { print "titles: [" t "]"; print "contents: [" c "]" }'"#;

struct Fixture {
    dir: PathBuf,
    sites: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("page-features-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("alpha.html"), ALPHA).unwrap();
        std::fs::write(dir.join("beta.html"), BETA).unwrap();

        let sites = serde_json::json!([
            {"name": "alpha", "page": dir.join("alpha.html"), "titleSelector": "article:h1", "contentSelector": "p"},
            {"name": "gone", "page": dir.join("gone.html"), "titleSelector": "h1", "contentSelector": "p"},
            {"name": "beta", "page": dir.join("beta.html"), "titleSelector": "div:1:h2", "contentSelector": "section:p"},
        ]);
        let sites_path = dir.join("sites.json");
        std::fs::write(&sites_path, sites.to_string()).unwrap();

        Self { dir, sites: sites_path }
    }

    fn output(&self) -> PathBuf {
        self.dir.join("out.csv")
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

fn shell_classifier(script: &str) -> SubprocessClassifier {
    SubprocessClassifier::new(ClassifierCommand::new("sh").arg("-c").arg(script).timeout(Duration::from_secs(10)))
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path).unwrap().lines().map(String::from).collect()
}

#[tokio::test]
async fn test_collect_then_append() {
    let fixture = Fixture::new("collect");
    let sites = config::load_sites(&fixture.sites).unwrap();
    assert!(sites[0].page.starts_with("file://"));

    let dataset = DatasetWriter::open(&fixture.output(), false).unwrap();
    let mut runner = BatchRunner::<_, SubprocessClassifier, File>::new(StaticPage::new()).with_dataset(dataset);
    let report = runner.run(Mode::Collect, &sites).await.unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failures[0].name, "gone");
    assert_eq!(report.rows_written, 6 + 7);
    drop(runner);

    let rows = lines(&fixture.output());
    assert_eq!(rows.len(), 1 + 13);
    assert_eq!(rows[0], dataset::header());
    assert!(rows.iter().all(|row| row.split(',').count() == dataset::column_count()));

    let alpha_title: Vec<&String> = rows.iter().filter(|row| row.starts_with("alpha,") && row.ends_with(",true,false")).collect();
    assert_eq!(alpha_title.len(), 1);
    assert!(alpha_title[0].contains(",H1,"));

    let beta_title: Vec<&String> = rows.iter().filter(|row| row.starts_with("beta,") && row.ends_with(",true,false")).collect();
    assert_eq!(beta_title.len(), 1);
    assert!(beta_title[0].contains(",H2,"));

    // second run appends one site without repeating the header
    let selected = config::select_targets(&sites, &TargetSelection::named_list("beta"));
    let dataset = DatasetWriter::open(&fixture.output(), true).unwrap();
    let mut runner = BatchRunner::<_, SubprocessClassifier, File>::new(StaticPage::new()).with_dataset(dataset);
    let report = runner.run(Mode::Collect, &selected).await.unwrap();
    assert_eq!(report.rows_written, 7);
    drop(runner);

    let rows = lines(&fixture.output());
    assert_eq!(rows.len(), 1 + 13 + 7);
    assert_eq!(rows.iter().filter(|row| **row == dataset::header()).count(), 1);
    assert!(rows.last().unwrap().starts_with("beta,"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_scoring_with_subprocess_classifier() {
    let fixture = Fixture::new("test-mode");
    let sites = config::load_sites(&fixture.sites).unwrap();

    let mut runner =
        BatchRunner::<_, _, File>::new(StaticPage::new()).with_classifier(shell_classifier(TAG_CLASSIFIER));
    let report = runner.run(Mode::Test, &sites).await.unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.failures[0].error, PageError::NavigationFailed(_)));

    let accuracy = report.accuracy.unwrap();
    assert_eq!(accuracy.total, 2);
    assert_eq!(accuracy.title_matches, 1);
    assert_eq!(accuracy.content_matches, 2);
    assert_eq!(accuracy.title_accuracy(), 0.5);
    assert_eq!(accuracy.content_accuracy(), 1.0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_bulk_predict_survives_classifier_crash() {
    let fixture = Fixture::new("predict");
    let sites = config::load_sites(&fixture.sites).unwrap();
    let targets = config::select_targets(&sites, &TargetSelection::named_list("beta,alpha"));
    assert_eq!(targets.len(), 2);

    // crashes on pages that contain a section
    let classifier = shell_classifier("grep -q SECTION && exit 2; echo 'title:[3] content:[4]'");
    let mut runner = BatchRunner::<_, _, File>::new(StaticPage::new()).with_classifier(classifier);
    let report = runner.run(Mode::Predict, &targets).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "beta");
    assert!(matches!(report.failures[0].error, PageError::SubprocessFailure(_)));
    assert_eq!(report.elements, 6);
}
