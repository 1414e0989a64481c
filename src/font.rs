use anyhow::{Context, Result, anyhow};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::{Face, GlyphId, name_id};
use usvg::fontdb;

use crate::paths;
use crate::settings::Settings;

/// Text extents used to fit a region around its text.
pub trait TextMeasure {
    /// Width of the widest line and `point_size` per line.
    fn text_dimensions(&self, text: &str, point_size: f32) -> (f32, f32);

    fn text_aspect_ratio(&self, text: &str, point_size: f32) -> f32 {
        let (width, height) = self.text_dimensions(text, point_size);
        if height <= 0.0 { 0.0 } else { width / height }
    }
}

/// Every character is `char_aspect_ratio` ems wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharAspectModel {
    pub char_aspect_ratio: f32,
}

impl CharAspectModel {
    pub fn new(char_aspect_ratio: f32) -> Self {
        Self { char_aspect_ratio }
    }
}

impl TextMeasure for CharAspectModel {
    fn text_dimensions(&self, text: &str, point_size: f32) -> (f32, f32) {
        let mut widest = 0usize;
        let mut lines = 0usize;
        for line in text.split('\n') {
            widest = widest.max(line.chars().count());
            lines += 1;
        }
        (
            widest as f32 * self.char_aspect_ratio * point_size,
            lines as f32 * point_size,
        )
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    notdef_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn line_advance_units(&self, face: &Face<'_>, line: &str) -> u32 {
        let mut advance = 0u32;
        for ch in line.chars() {
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.notdef_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance
    }
}

impl TextMeasure for FontMetrics {
    fn text_dimensions(&self, text: &str, point_size: f32) -> (f32, f32) {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return CharAspectModel::new(1.0).text_dimensions(text, point_size);
        };
        let scale = point_size / self.units_per_em.max(1) as f32;
        let mut widest = 0u32;
        let mut lines = 0usize;
        for line in text.split('\n') {
            widest = widest.max(self.line_advance_units(&face, line));
            lines += 1;
        }
        (widest as f32 * scale, lines as f32 * point_size)
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub fn load_font_metrics_from_family(family: &str) -> Result<FontMetrics> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let families = if family.eq_ignore_ascii_case("sans-serif") {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    load_font_metrics_from_data(&data, Some(family))
}

/// All `*.ttf` / `*.otf` files below `dir`, sorted.
pub fn font_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let matcher = font_glob_set()?;
    let mut found = Vec::new();
    collect_font_files(dir, dir, &matcher, &mut found)?;
    found.sort();
    Ok(found)
}

pub fn find_font_file(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let direct = dir.join(name);
    if direct.is_file() {
        return Ok(Some(direct));
    }
    Ok(font_files(dir)?.into_iter().find(|path| {
        path.file_name()
            .map(|file| file.to_string_lossy() == name)
            .unwrap_or(false)
    }))
}

/// Font metrics for the configured font, falling back to the constant
/// character-aspect model when no font can be loaded.
pub fn measure_for(settings: &Settings) -> Arc<dyn TextMeasure + Send + Sync> {
    match resolve_configured_font(settings) {
        Ok(metrics) => {
            debug!("using font metrics: {:?}", metrics.family());
            Arc::new(metrics)
        }
        Err(err) => {
            warn!(
                "font metrics unavailable ({}); using character aspect ratio {}",
                err, settings.char_aspect_ratio
            );
            Arc::new(CharAspectModel::new(settings.char_aspect_ratio as f32))
        }
    }
}

fn resolve_configured_font(settings: &Settings) -> Result<FontMetrics> {
    let dir = PathBuf::from(paths::expand_tilde(&settings.font_path));
    if let Some(path) = find_font_file(&dir, &settings.font)? {
        return load_font_metrics(&path);
    }
    let family = Path::new(&settings.font)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| settings.font.clone());
    load_font_metrics_from_family(&family)
}

fn font_glob_set() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in ["**/*.ttf", "**/*.otf"] {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|err| anyhow!("invalid font pattern '{}': {}", pattern, err))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| anyhow!("failed to build font patterns: {}", err))
}

fn collect_font_files(
    root: &Path,
    dir: &Path,
    matcher: &GlobSet,
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to list font directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_font_files(root, &path, matcher, found)?;
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(&path);
        let rel = rel.to_string_lossy().replace('\\', "/");
        if matcher.is_match(&rel) {
            found.push(path);
        }
    }
    Ok(())
}

fn load_font_metrics_from_data(data: &[u8], preferred_family: Option<&str>) -> Result<FontMetrics> {
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let notdef_advance = face
                .glyph_hor_advance(GlyphId(0))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: Arc::new(data.to_vec()),
                units_per_em,
                notdef_advance,
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn char_model_aspect_scales_with_length() {
        let model = CharAspectModel::new(0.95);
        let ratio = model.text_aspect_ratio("あいう", 12.0);
        assert!((ratio - 2.85).abs() < 1e-4);
    }

    #[test]
    fn char_model_uses_widest_line_and_line_count() {
        let model = CharAspectModel::new(1.0);
        assert_eq!(model.text_dimensions("ab\nabcd\n", 10.0), (40.0, 30.0));
        assert_eq!(model.text_dimensions("", 10.0), (0.0, 10.0));
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        assert!(load_font_metrics_from_data(b"not a font", None).is_err());
    }

    #[test]
    fn font_files_are_found_recursively() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("jp").join("serif");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("Antique.TTF"), b"x").expect("write");
        fs::write(dir.path().join("Mono.otf"), b"x").expect("write");
        fs::write(dir.path().join("readme.txt"), b"x").expect("write");

        let files = font_files(dir.path()).expect("list");
        assert_eq!(files.len(), 2);
        let found = find_font_file(dir.path(), "Antique.TTF").expect("find");
        assert_eq!(found, Some(nested.join("Antique.TTF")));
        assert_eq!(find_font_file(dir.path(), "Missing.ttf").expect("find"), None);
    }
}
