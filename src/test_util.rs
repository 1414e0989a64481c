use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::font::TextMeasure;
use crate::lstmbox::Orientation;
use crate::ocr::Recognizer;
use crate::page::{PageSession, Rect, RegionId};
use crate::paths;

/// One em per character, one line of `point_size` per line.
pub(crate) struct TestMeasure;

impl TextMeasure for TestMeasure {
    fn text_dimensions(&self, text: &str, point_size: f32) -> (f32, f32) {
        let widest = text.split('\n').map(|line| line.chars().count()).max().unwrap_or(0);
        let lines = text.split('\n').count();
        (widest as f32 * point_size, lines as f32 * point_size)
    }
}

/// Vertical 1000px-high page with one 10x20 box per text, 20px apart.
pub(crate) fn session_with_boxes(texts: &[&str]) -> (PageSession, Vec<RegionId>) {
    let mut session = PageSession::new(1000, 1000, Orientation::Vertical);
    let ids = texts
        .iter()
        .enumerate()
        .map(|(index, text)| {
            session.add_box(Rect::new(index as f64 * 20.0, 0.0, 10.0, 20.0), text)
        })
        .collect();
    (session, ids)
}

/// Writes canned box output instead of running tesseract.
pub(crate) struct FakeRecognizer {
    pub(crate) box_text: String,
    pub(crate) scan_text: Option<String>,
    pub(crate) scanned: RefCell<Vec<PathBuf>>,
}

impl FakeRecognizer {
    pub(crate) fn new(box_text: &str) -> Self {
        Self {
            box_text: box_text.to_string(),
            scan_text: None,
            scanned: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_scan_text(mut self, text: &str) -> Self {
        self.scan_text = Some(text.to_string());
        self
    }
}

impl Recognizer for FakeRecognizer {
    fn recognize(&self, _image: &Path, out_base: &Path) -> Result<PathBuf> {
        let path = paths::with_suffix(out_base, ".box");
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &self.box_text)?;
        }
        Ok(path)
    }

    fn recognize_to_text(&self, image: &Path) -> Result<String> {
        self.scanned.borrow_mut().push(image.to_path_buf());
        if !image.exists() {
            return Err(anyhow!("scan image missing: {}", image.display()));
        }
        self.scan_text
            .clone()
            .ok_or_else(|| anyhow!("no scan text configured"))
    }
}

/// Fails every recognition, like a missing tesseract install.
pub(crate) struct FailingRecognizer;

impl Recognizer for FailingRecognizer {
    fn recognize(&self, _image: &Path, _out_base: &Path) -> Result<PathBuf> {
        Err(anyhow!("tesseract: command not found"))
    }

    fn recognize_to_text(&self, _image: &Path) -> Result<String> {
        Err(anyhow!("tesseract: command not found"))
    }
}

/// Writes a white PNG of the given size.
pub(crate) fn write_blank_png(path: &Path, width: u32, height: u32) {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    image.save(path).expect("save png");
}
