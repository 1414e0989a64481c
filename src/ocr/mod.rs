mod scan;
mod tesseract;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use scan::{SelectionScanner, clean_scan_text, crop_bounds};
pub use tesseract::{Tesseract, list_languages, tesseract_available};

/// Character-level recognizer.
pub trait Recognizer {
    /// Writes per-character boxes to `<out_base>.box` and returns that
    /// path. An existing box file is reused without recognizing again.
    fn recognize(&self, image: &Path, out_base: &Path) -> Result<PathBuf>;

    /// Plain recognized text of the whole image.
    fn recognize_to_text(&self, image: &Path) -> Result<String>;
}
