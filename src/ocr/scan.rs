use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Recognizer;
use crate::page::Rect;
use crate::paths;
use crate::settings::Settings;

/// OCRs a rectangle of the page through a temporary crop.
pub struct SelectionScanner<'a> {
    recognizer: &'a dyn Recognizer,
    collation: String,
    remove_image: bool,
}

impl<'a> SelectionScanner<'a> {
    pub fn new(recognizer: &'a dyn Recognizer, collation: &str, remove_image: bool) -> Self {
        Self {
            recognizer,
            collation: collation.to_string(),
            remove_image,
        }
    }

    pub fn from_settings(recognizer: &'a dyn Recognizer, settings: &Settings) -> Self {
        Self::new(
            recognizer,
            &settings.collation_string,
            settings.remove_scan_image,
        )
    }

    /// Crops `rect` grown by `offset` on every side, runs recognition and
    /// returns the cleaned single-line text.
    pub fn scan(
        &self,
        image_path: &Path,
        image: &DynamicImage,
        rect: Rect,
        offset: u32,
    ) -> Result<String> {
        let (x, y, w, h) = crop_bounds(rect, offset, image.width(), image.height())
            .ok_or_else(|| anyhow!("selection lies outside the image"))?;
        let scan_path = self.scan_path(image_path)?;
        image
            .crop_imm(x, y, w, h)
            .save(&scan_path)
            .with_context(|| format!("failed to write scan image: {}", scan_path.display()))?;
        debug!("scanning {}x{} at ({}, {})", w, h, x, y);

        let recognized = self.recognizer.recognize_to_text(&scan_path);
        if self.remove_image {
            if let Err(err) = fs::remove_file(&scan_path) {
                warn!("failed to remove {}: {}", scan_path.display(), err);
            }
        }
        Ok(clean_scan_text(&recognized?, &self.collation))
    }

    fn scan_path(&self, image_path: &Path) -> Result<PathBuf> {
        let dir = paths::scan_dir(image_path);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create scan directory: {}", dir.display()))?;
        let extension = image_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_else(|| "png".to_string());
        Ok(dir.join(format!("{}.{}", uuid::Uuid::new_v4(), extension)))
    }
}

/// Pixel crop `(x, y, w, h)` clamped to the image; `None` when empty.
pub fn crop_bounds(rect: Rect, offset: u32, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let offset = offset as f64;
    let clamp = |value: f64, max: u32| value.max(0.0).min(max as f64);
    let left = clamp((rect.x - offset).floor(), width);
    let top = clamp((rect.y - offset).floor(), height);
    let right = clamp((rect.right() + offset).ceil(), width);
    let bottom = clamp((rect.bottom() + offset).ceil(), height);
    if right <= left || bottom <= top {
        return None;
    }
    Some((
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

/// Trims, joins lines with `collation` and drops ASCII spaces.
pub fn clean_scan_text(text: &str, collation: &str) -> String {
    text.trim().replace('\n', collation).replace(' ', "")
}
