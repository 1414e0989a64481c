use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::ZipArchive;

use crate::paths::EXTRACTED_PREFIX;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

pub fn is_archive(path: &Path) -> bool {
    matches!(
        extension_lower(path).as_deref(),
        Some("zip") | Some("cbz")
    )
}

/// Image entries of a zip archive, sorted by name, without `__MACOSX` metadata.
pub fn list_pages(archive: &Path) -> Result<Vec<String>> {
    let mut zip = open(archive)?;
    let mut pages = Vec::new();
    for index in 0..zip.len() {
        let entry = zip
            .by_index(index)
            .with_context(|| format!("failed to read entry {} of {}", index, archive.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.starts_with("__MACOSX") || !is_image_name(&name) {
            continue;
        }
        pages.push(name);
    }
    pages.sort();
    Ok(pages)
}

/// Copies `entry` next to the archive as `rctemp_<file name>` and returns
/// the new path. An existing copy is overwritten.
pub fn extract_page(archive: &Path, entry: &str) -> Result<PathBuf> {
    let mut zip = open(archive)?;
    let mut file = zip
        .by_name(entry)
        .map_err(|err| anyhow!("no entry '{}' in {}: {}", entry, archive.display(), err))?;
    let file_name = Path::new(entry)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("entry '{}' has no file name", entry))?;
    let dir = archive.parent().unwrap_or_else(|| Path::new(""));
    let target = dir.join(format!("{}{}", EXTRACTED_PREFIX, file_name));

    let mut out = File::create(&target)
        .with_context(|| format!("failed to create {}", target.display()))?;
    io::copy(&mut file, &mut out)
        .with_context(|| format!("failed to extract '{}'", entry))?;
    info!("extracted {} to {}", entry, target.display());
    Ok(target)
}

/// Deletes an extracted page; other paths are left alone.
pub fn remove_extracted(path: &Path) -> Result<bool> {
    if !crate::paths::is_extracted_page(path) || !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    Ok(true)
}

fn open(archive: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(archive)
        .with_context(|| format!("failed to open archive: {}", archive.display()))?;
    ZipArchive::new(file).with_context(|| format!("not a zip archive: {}", archive.display()))
}

fn is_image_name(name: &str) -> bool {
    extension_lower(Path::new(name))
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
