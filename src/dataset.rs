//! Labeled dataset output
//!
//! Rows are plain comma-joined values. Nothing is quoted: commas are stripped
//! from free-text fields (site name, URL, tag name, text alignment), which is
//! lossy but keeps the column count fixed for every row.

use crate::dom::{ElementFeatures, FEATURE_NAMES, FeatureValue};
use crate::error::{PageError, Result};
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Header row: `site,url,<features>,title,content`
pub fn header() -> String {
    let mut line = String::from("site,url");
    for name in FEATURE_NAMES {
        line.push(',');
        line.push_str(name);
    }
    line.push_str(",title,content");
    line
}

/// Number of columns in every dataset row
pub fn column_count() -> usize {
    2 + FEATURE_NAMES.len() + 2
}

/// Append `,<value>` for every feature column
pub fn push_feature_values(line: &mut String, features: &ElementFeatures) -> Result<()> {
    for value in features.values() {
        line.push(',');
        match value {
            FeatureValue::Text(text) => line.push_str(&clean_field(text, features.id)?),
            FeatureValue::Count(count) => {
                let _ = write!(line, "{}", count);
            }
            FeatureValue::Number(number) => {
                let _ = write!(line, "{}", number);
            }
        }
    }
    Ok(())
}

fn clean_field(text: &str, id: u32) -> Result<String> {
    if text.contains(['\n', '\r']) {
        return Err(PageError::SerializationFailure { id, reason: format!("line break in field {:?}", text) });
    }
    Ok(text.replace(',', ""))
}

/// Format one dataset row (without the trailing newline)
pub fn format_row(site: &str, url: &str, features: &ElementFeatures) -> Result<String> {
    let mut line = clean_field(site, features.id)?;
    line.push(',');
    line.push_str(&clean_field(url, features.id)?);
    push_feature_values(&mut line, features)?;
    let _ = write!(line, ",{},{}", features.is_title, features.is_content);
    Ok(line)
}

/// Writer appending feature rows to a dataset
pub struct DatasetWriter<W: Write> {
    writer: W,
    rows_written: usize,
    rows_skipped: usize,
}

impl DatasetWriter<File> {
    /// Open a dataset file
    ///
    /// With `append` the file is extended (a header is still written if the
    /// file is new or empty); otherwise it is truncated and starts with a header.
    pub fn open(path: &Path, append: bool) -> Result<Self> {
        if append {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let is_empty = file.metadata()?.len() == 0;
            Self::new(file, is_empty)
        } else {
            Self::new(File::create(path)?, true)
        }
    }
}

impl<W: Write> DatasetWriter<W> {
    /// Wrap a writer, optionally emitting the header row first
    pub fn new(mut writer: W, write_header: bool) -> Result<Self> {
        if write_header {
            writer.write_all(format!("{}\n", header()).as_bytes())?;
        }
        Ok(Self { writer, rows_written: 0, rows_skipped: 0 })
    }

    /// Write one row per element; returns how many rows were written
    ///
    /// A row that cannot be formatted or written is logged and skipped.
    pub fn write_rows(&mut self, site: &str, url: &str, elements: &[ElementFeatures]) -> usize {
        let mut written = 0;

        for features in elements {
            let result = format_row(site, url, features).and_then(|mut row| {
                row.push('\n');
                self.writer.write_all(row.as_bytes())?;
                Ok(())
            });

            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    log::warn!("Skipping row for {} element {:?}: {}", site, features, e);
                    self.rows_skipped += 1;
                }
            }
        }

        self.rows_written += written;
        written
    }

    /// Flush buffered output
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Rows written since the writer was created
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Rows skipped because of formatting or write errors
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// Get the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{PageMetrics, RawElement};

    fn element(id: u32, tag: &str) -> ElementFeatures {
        let raw = RawElement {
            tag_name: tag.to_string(),
            left: 8.0,
            top: 16.5,
            width: 100.0,
            height: 20.0,
            children: 1,
            descendants: 3,
            link_count: 0,
            paragraph_count: 1,
            image_count: 0,
            parent_count: 2,
            text: "hello world".to_string(),
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
            label: None,
        };
        ElementFeatures::from_raw(id, &raw, &PageMetrics { scroll_width: 800.0, scroll_height: 0.0 })
    }

    #[test]
    fn test_header_columns() {
        let header = header();
        let columns: Vec<&str> = header.split(',').collect();

        assert_eq!(columns.len(), column_count());
        assert_eq!(&columns[..3], &["site", "url", "tagName"]);
        assert_eq!(&columns[columns.len() - 2..], &["title", "content"]);
    }

    #[test]
    fn test_format_row() {
        let row = format_row("news", "https://example.com/a,b", &element(0, "DIV")).unwrap();
        let columns: Vec<&str> = row.split(',').collect();

        assert_eq!(columns.len(), column_count());
        assert_eq!(columns[0], "news");
        assert_eq!(columns[1], "https://example.com/ab");
        assert_eq!(columns[2], "DIV");
        assert_eq!(columns[3], "8");
        assert_eq!(columns[4], "16.5");
        assert_eq!(columns[8], "2");
        assert_eq!(columns[21], "start");
        assert_eq!(columns[31], "0.01");
        assert_eq!(columns[32], "0");
        assert_eq!(&columns[33..], &["false", "false"]);
    }

    #[test]
    fn test_nan_values_are_written() {
        let mut features = element(0, "DIV");
        features.font_size = f64::NAN;
        let row = format_row("s", "u", &features).unwrap();
        assert_eq!(row.split(',').nth(10), Some("NaN"));
    }

    #[test]
    fn test_line_break_fails_row() {
        let mut features = element(4, "DIV");
        features.text_align = "left\nright".to_string();
        let err = format_row("s", "u", &features).unwrap_err();
        assert!(matches!(err, PageError::SerializationFailure { id: 4, .. }));
    }

    #[test]
    fn test_write_rows_skips_bad_rows() {
        let mut bad = element(1, "SPAN");
        bad.tag_name = "SP\rAN".to_string();
        let elements = vec![element(0, "DIV"), bad, element(2, "P")];

        let mut writer = DatasetWriter::new(Vec::new(), true).unwrap();
        assert_eq!(writer.write_rows("site", "http://x", &elements), 2);
        assert_eq!(writer.rows_written(), 2);
        assert_eq!(writer.rows_skipped(), 1);

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], header());
        assert!(lines[1].starts_with("site,http://x,DIV,"));
        assert!(lines[2].starts_with("site,http://x,P,"));
    }

    #[test]
    fn test_labels_in_last_columns() {
        let mut features = element(0, "H1");
        features.is_title = true;
        let row = format_row("s", "u", &features).unwrap();
        assert!(row.ends_with(",true,false"));
    }

    #[test]
    fn test_open_truncate_and_append() {
        let path = std::env::temp_dir().join(format!("page-features-dataset-{}.csv", std::process::id()));

        {
            let mut writer = DatasetWriter::open(&path, false).unwrap();
            writer.write_rows("a", "u", &[element(0, "DIV")]);
        }
        {
            let mut writer = DatasetWriter::open(&path, true).unwrap();
            writer.write_rows("b", "u", &[element(0, "DIV")]);
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], header());
        assert!(lines[1].starts_with("a,"));
        assert!(lines[2].starts_with("b,"));

        {
            DatasetWriter::open(&path, false).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);

        std::fs::remove_file(&path).ok();
    }
}
