//! Outline annotation for full-page screenshots

use crate::dom::Label;
use crate::error::{PageError, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const TITLE_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
const CONTENT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BORDER_WIDTH: i32 = 3;

/// Page-coordinate box of a labeled element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outline {
    pub label: Label,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Labeled boxes plus the document size they were measured against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSet {
    pub scroll_width: f64,
    pub scroll_height: f64,
    pub outlines: Vec<Outline>,
}

fn color_for(label: Label) -> Rgba<u8> {
    match label {
        Label::Title => TITLE_COLOR,
        Label::Content => CONTENT_COLOR,
    }
}

/// Draw a border around every outline (blue for titles, red for content)
pub fn annotate(image: &mut RgbaImage, outlines: &[Outline]) {
    for outline in outlines {
        if !(outline.left.is_finite() && outline.top.is_finite()) {
            continue;
        }

        let x = outline.left.round() as i32;
        let y = outline.top.round() as i32;
        let width = outline.width.round() as i32;
        let height = outline.height.round() as i32;

        // Inset each ring by one pixel so the border grows inwards
        for ring in 0..BORDER_WIDTH {
            let ring_width = width - 2 * ring;
            let ring_height = height - 2 * ring;
            if ring_width <= 0 || ring_height <= 0 {
                break;
            }
            let rect = Rect::at(x + ring, y + ring).of_size(ring_width as u32, ring_height as u32);
            draw_hollow_rect_mut(image, rect, color_for(outline.label));
        }
    }
}

/// Decode a PNG capture, outline the labeled elements and write it to `path`
pub fn save_annotated(png: &[u8], outlines: &[Outline], path: &Path) -> Result<()> {
    let mut image = image::load_from_memory(png)?.to_rgba8();
    annotate(&mut image, outlines);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    image
        .save(path)
        .map_err(|e| PageError::ScreenshotFailed(format!("Failed to write {}: {}", path.display(), e)))
}

/// Screenshot file for a batch target: `<dir>/<name>.png`
///
/// Characters that are unsafe in file names are replaced with `_`.
pub fn screenshot_path(dir: &Path, target: &str) -> PathBuf {
    let name: String = target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    let name = if name.trim_matches('.').is_empty() { "page".to_string() } else { name };
    dir.join(format!("{}.png", name))
}
