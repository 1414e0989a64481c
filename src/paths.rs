use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "RETCOM_RUST_DIR";
const BOX_SUFFIX: &str = ".py.box";
const ELLIPSE_SUFFIX: &str = ".py.ell";
const OCR_SUFFIX: &str = ".ocr";
const SCAN_DIR: &str = ".retcom_tmp";
pub(crate) const EXTRACTED_PREFIX: &str = "rctemp_";

pub(crate) fn settings_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".retcom-rust"))
        }
    })
}

/// `<image dir>/<box_path>`, where saved layouts and OCR output live.
pub fn layout_dir(image: &Path, box_path: &str) -> PathBuf {
    let head = image.parent().unwrap_or_else(|| Path::new(""));
    normalize_path(head.join(box_path))
}

/// `<layout dir>/<image file>`, the stem every per-page file is named from.
pub fn layout_base(image: &Path, box_path: &str) -> PathBuf {
    let file_name = image
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());
    layout_dir(image, box_path).join(file_name)
}

pub fn box_file_path(image: &Path, box_path: &str) -> PathBuf {
    with_suffix(&layout_base(image, box_path), BOX_SUFFIX)
}

pub fn ellipse_file_path(image: &Path, box_path: &str) -> PathBuf {
    with_suffix(&layout_base(image, box_path), ELLIPSE_SUFFIX)
}

/// Output base for raw recognizer boxes; the recognizer appends `.box`.
pub fn ocr_base(image: &Path, box_path: &str) -> PathBuf {
    with_suffix(&layout_base(image, box_path), OCR_SUFFIX)
}

pub fn scan_dir(image: &Path) -> PathBuf {
    image
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(SCAN_DIR)
}

/// Pages extracted from an archive are temporary copies named `rctemp_*`.
pub fn is_extracted_page(image: &Path) -> bool {
    image
        .file_name()
        .map(|name| name.to_string_lossy().starts_with(EXTRACTED_PREFIX))
        .unwrap_or(false)
}

pub(crate) fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut value = base.as_os_str().to_os_string();
    value.push(suffix);
    PathBuf::from(value)
}

pub(crate) fn expand_tilde(value: &str) -> String {
    if value == "~" || value.starts_with("~/") {
        if let Ok(home) = std::env::var("HOME") {
            let home = home.trim();
            if home.is_empty() {
                return value.to_string();
            }
            if value == "~" {
                return home.to_string();
            }
            return format!("{}{}", home, &value[1..]);
        }
    }
    value.to_string()
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(normalize_path(PathBuf::from(expand_tilde(trimmed))))
        }
    })
}

fn normalize_path(path: PathBuf) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        normalized.push(component.as_os_str());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_files_sit_under_the_box_directory() {
        let image = Path::new("/pages/ch01/p003.png");
        assert_eq!(
            box_file_path(image, "box"),
            PathBuf::from("/pages/ch01/box/p003.png.py.box")
        );
        assert_eq!(
            ellipse_file_path(image, "box"),
            PathBuf::from("/pages/ch01/box/p003.png.py.ell")
        );
        assert_eq!(
            with_suffix(&ocr_base(image, "box"), ".box"),
            PathBuf::from("/pages/ch01/box/p003.png.ocr.box")
        );
        assert_eq!(
            layout_base(image, "../layouts"),
            PathBuf::from("/pages/ch01/../layouts/p003.png")
        );
    }

    #[test]
    fn extracted_pages_are_recognized_by_prefix() {
        assert!(is_extracted_page(Path::new("/tmp/rctemp_001.jpg")));
        assert!(!is_extracted_page(Path::new("/tmp/rctemp/001.jpg")));
    }

    #[test]
    fn scan_dir_is_hidden_next_to_image() {
        assert_eq!(
            scan_dir(Path::new("/pages/p1.png")),
            PathBuf::from("/pages/.retcom_tmp")
        );
    }
}
