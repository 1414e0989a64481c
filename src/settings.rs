use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::page::OverlayKind;
use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub ocr_language: String,
    pub vertical: bool,
    pub prescan: bool,
    pub full_width: bool,
    pub tessdata_dir: Option<String>,
    pub page_segmentation_mode: u32,
    pub scan_offset: u32,
    pub remove_scan_image: bool,
    pub translation_language: String,
    pub translation_endpoints: Vec<String>,
    pub box_path: String,
    pub font_path: String,
    pub font: String,
    pub point_size: f32,
    pub char_aspect_ratio: f64,
    pub length_bias: f64,
    pub suspicious_aspect_ratio: f64,
    pub change_check_threshold: usize,
    pub collation_string: String,
    pub ellipse_font_family: String,
    pub ellipse_font_size: u32,
    pub nudge: f64,
    pub fine_nudge: f64,
    pub scale: f64,
    pub fine_scale: f64,
    pub debug: bool,
    pub remove_archive_image: bool,
    pub bounding_box_opacity: f32,
    pub group_box_opacity: f32,
    pub bounding_box_pattern: BrushPattern,
    pub group_box_pattern: BrushPattern,
    pub group_box_stroke_width: u32,
    pub colors: OverlayColors,
    pub inpaint_offset: u32,
    pub inpaint_radius: u32,
    pub inpaint_method: InpaintMethod,
    pub cleaning_offset: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr_language: "jpn_vert".to_string(),
            vertical: true,
            prescan: true,
            full_width: true,
            tessdata_dir: None,
            page_segmentation_mode: 12,
            scan_offset: 5,
            remove_scan_image: true,
            translation_language: "en".to_string(),
            translation_endpoints: vec!["translate.google.com".to_string()],
            box_path: "box".to_string(),
            font_path: "fonts".to_string(),
            font: "GenEiAntiquePv5-M.ttf".to_string(),
            point_size: 12.0,
            char_aspect_ratio: 0.95,
            length_bias: 1.0,
            suspicious_aspect_ratio: 2.0,
            change_check_threshold: 7_000,
            collation_string: String::new(),
            ellipse_font_family: "Wild Words".to_string(),
            ellipse_font_size: 25,
            nudge: 5.0,
            fine_nudge: 1.0,
            scale: 0.1,
            fine_scale: 0.05,
            debug: false,
            remove_archive_image: true,
            bounding_box_opacity: 0.5,
            group_box_opacity: 0.35,
            bounding_box_pattern: BrushPattern::Solid,
            group_box_pattern: BrushPattern::BDiag,
            group_box_stroke_width: 5,
            colors: OverlayColors::default(),
            inpaint_offset: 2,
            inpaint_radius: 7,
            inpaint_method: InpaintMethod::Telea,
            cleaning_offset: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn from_u32(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
        }
    }

    /// Accepts `#RRGGBB`, `0xRRGGBB` or bare hex digits.
    pub fn parse(value: &str) -> Result<Self> {
        let digits = value.trim().replace("0x", "").replace('#', "");
        if digits.is_empty() || digits.len() > 6 {
            return Err(anyhow!("invalid color '{}'", value));
        }
        let parsed = u32::from_str_radix(&digits, 16)
            .map_err(|_| anyhow!("invalid color '{}'", value))?;
        Ok(Self::from_u32(parsed))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayColors {
    pub bounding_box: Rgb,
    pub group_box: Rgb,
    pub filler_box: Rgb,
    pub text_box: Rgb,
    pub flagged_box: Rgb,
    pub selected_box: Rgb,
}

impl Default for OverlayColors {
    fn default() -> Self {
        Self {
            bounding_box: Rgb::from_u32(0xFF0000),
            group_box: Rgb::from_u32(0xC0C0C0),
            filler_box: Rgb::from_u32(0x008000),
            text_box: Rgb::from_u32(0xF0E442),
            flagged_box: Rgb::from_u32(0xFF00FF),
            selected_box: Rgb::from_u32(0x0000FF),
        }
    }
}

/// Fill pattern for overlay brushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushPattern {
    Solid,
    Dense1,
    Dense2,
    Dense3,
    Dense4,
    Dense5,
    Dense6,
    Dense7,
    Horizontal,
    Vertical,
    Cross,
    BDiag,
    FDiag,
    DiagCross,
    None,
}

const BRUSH_PATTERNS: &[(&str, BrushPattern)] = &[
    ("Solid", BrushPattern::Solid),
    ("Dense1", BrushPattern::Dense1),
    ("Dense2", BrushPattern::Dense2),
    ("Dense3", BrushPattern::Dense3),
    ("Dense4", BrushPattern::Dense4),
    ("Dense5", BrushPattern::Dense5),
    ("Dense6", BrushPattern::Dense6),
    ("Dense7", BrushPattern::Dense7),
    ("Hor", BrushPattern::Horizontal),
    ("Ver", BrushPattern::Vertical),
    ("Cross", BrushPattern::Cross),
    ("BDiag", BrushPattern::BDiag),
    ("FDiag", BrushPattern::FDiag),
    ("DiagCross", BrushPattern::DiagCross),
    ("No", BrushPattern::None),
];

impl BrushPattern {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        BRUSH_PATTERNS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
            .map(|(_, pattern)| *pattern)
            .ok_or_else(|| {
                let known = BRUSH_PATTERNS
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>();
                anyhow!(
                    "unknown brush pattern '{}' (expected one of: {})",
                    value,
                    known.join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InpaintMethod {
    Telea,
    NavierStokes,
}

impl InpaintMethod {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "telea" => Ok(InpaintMethod::Telea),
            "ns" => Ok(InpaintMethod::NavierStokes),
            _ => Err(anyhow!(
                "unknown inpaint method '{}' (expected telea or ns)",
                value
            )),
        }
    }
}

/// Resolved brush for one overlay kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub color: Rgb,
    pub opacity: f32,
    pub pattern: BrushPattern,
}

impl Settings {
    pub fn overlay_style(&self, kind: OverlayKind) -> OverlayStyle {
        let color = match kind {
            OverlayKind::Selected => self.colors.selected_box,
            OverlayKind::Filler => self.colors.filler_box,
            OverlayKind::Label => self.colors.text_box,
            OverlayKind::Flagged => self.colors.flagged_box,
            OverlayKind::Text => self.colors.bounding_box,
        };
        OverlayStyle {
            color,
            opacity: self.bounding_box_opacity,
            pattern: self.bounding_box_pattern,
        }
    }

    pub fn group_style(&self) -> OverlayStyle {
        OverlayStyle {
            color: self.colors.group_box,
            opacity: self.group_box_opacity,
            pattern: self.group_box_pattern,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSection>,
    translation: Option<TranslationSection>,
    layout: Option<LayoutSection>,
    editor: Option<EditorSection>,
    overlay: Option<OverlaySection>,
    inpaint: Option<InpaintSection>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSection {
    language: Option<String>,
    vertical: Option<bool>,
    prescan: Option<bool>,
    full_width: Option<bool>,
    tessdata_dir: Option<String>,
    page_segmentation_mode: Option<u32>,
    scan_offset: Option<u32>,
    remove_scan_image: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSection {
    language: Option<String>,
    endpoints: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSection {
    box_path: Option<String>,
    font_path: Option<String>,
    font: Option<String>,
    point_size: Option<f32>,
    char_aspect_ratio: Option<f64>,
    length_bias: Option<f64>,
    suspicious_aspect_ratio: Option<f64>,
    change_check_threshold: Option<usize>,
    collation_string: Option<String>,
    ellipse_font_family: Option<String>,
    ellipse_font_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct EditorSection {
    nudge: Option<f64>,
    fine_nudge: Option<f64>,
    scale: Option<f64>,
    fine_scale: Option<f64>,
    debug: Option<bool>,
    remove_archive_image: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySection {
    bounding_box_opacity: Option<f32>,
    group_box_opacity: Option<f32>,
    bounding_box_pattern: Option<String>,
    group_box_pattern: Option<String>,
    group_box_stroke_width: Option<u32>,
    colors: Option<ColorSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ColorSection {
    bounding_box: Option<String>,
    group_box: Option<String>,
    filler_box: Option<String>,
    text_box: Option<String>,
    flagged_box: Option<String>,
    selected_box: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InpaintSection {
    offset: Option<u32>,
    radius: Option<u32>,
    method: Option<String>,
    cleaning_offset: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = paths::settings_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    load_settings_from(&ordered_paths)
}

/// Layers every existing file in `paths` over the defaults; missing files are skipped.
pub fn load_settings_from(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }
    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed)
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(ocr) = incoming.ocr {
            merge_string(&mut self.ocr_language, ocr.language);
            merge_value(&mut self.vertical, ocr.vertical);
            merge_value(&mut self.prescan, ocr.prescan);
            merge_value(&mut self.full_width, ocr.full_width);
            if let Some(dir) = ocr.tessdata_dir {
                if !dir.trim().is_empty() {
                    self.tessdata_dir = Some(dir);
                }
            }
            merge_value(&mut self.page_segmentation_mode, ocr.page_segmentation_mode);
            merge_value(&mut self.scan_offset, ocr.scan_offset);
            merge_value(&mut self.remove_scan_image, ocr.remove_scan_image);
        }
        if let Some(translation) = incoming.translation {
            merge_string(&mut self.translation_language, translation.language);
            if let Some(endpoints) = translation.endpoints {
                let endpoints = endpoints
                    .into_iter()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
                    .collect::<Vec<_>>();
                if !endpoints.is_empty() {
                    self.translation_endpoints = endpoints;
                }
            }
        }
        if let Some(layout) = incoming.layout {
            merge_string(&mut self.box_path, layout.box_path);
            merge_string(&mut self.font_path, layout.font_path);
            merge_string(&mut self.font, layout.font);
            merge_positive_f32(&mut self.point_size, layout.point_size);
            merge_positive(&mut self.char_aspect_ratio, layout.char_aspect_ratio);
            merge_positive(&mut self.length_bias, layout.length_bias);
            merge_positive(
                &mut self.suspicious_aspect_ratio,
                layout.suspicious_aspect_ratio,
            );
            if let Some(threshold) = layout.change_check_threshold {
                if threshold > 0 {
                    self.change_check_threshold = threshold;
                }
            }
            if let Some(collation) = layout.collation_string {
                self.collation_string = collation;
            }
            merge_string(&mut self.ellipse_font_family, layout.ellipse_font_family);
            if let Some(size) = layout.ellipse_font_size {
                if size > 0 {
                    self.ellipse_font_size = size;
                }
            }
        }
        if let Some(editor) = incoming.editor {
            merge_positive(&mut self.nudge, editor.nudge);
            merge_positive(&mut self.fine_nudge, editor.fine_nudge);
            merge_positive(&mut self.scale, editor.scale);
            merge_positive(&mut self.fine_scale, editor.fine_scale);
            merge_value(&mut self.debug, editor.debug);
            merge_value(&mut self.remove_archive_image, editor.remove_archive_image);
        }
        if let Some(overlay) = incoming.overlay {
            merge_positive_f32(&mut self.bounding_box_opacity, overlay.bounding_box_opacity);
            merge_positive_f32(&mut self.group_box_opacity, overlay.group_box_opacity);
            if let Some(pattern) = non_blank(overlay.bounding_box_pattern) {
                self.bounding_box_pattern = BrushPattern::parse(&pattern)?;
            }
            if let Some(pattern) = non_blank(overlay.group_box_pattern) {
                self.group_box_pattern = BrushPattern::parse(&pattern)?;
            }
            merge_value(&mut self.group_box_stroke_width, overlay.group_box_stroke_width);
            if let Some(colors) = overlay.colors {
                merge_color(&mut self.colors.bounding_box, colors.bounding_box)?;
                merge_color(&mut self.colors.group_box, colors.group_box)?;
                merge_color(&mut self.colors.filler_box, colors.filler_box)?;
                merge_color(&mut self.colors.text_box, colors.text_box)?;
                merge_color(&mut self.colors.flagged_box, colors.flagged_box)?;
                merge_color(&mut self.colors.selected_box, colors.selected_box)?;
            }
        }
        if let Some(inpaint) = incoming.inpaint {
            merge_value(&mut self.inpaint_offset, inpaint.offset);
            merge_value(&mut self.inpaint_radius, inpaint.radius);
            if let Some(method) = non_blank(inpaint.method) {
                self.inpaint_method = InpaintMethod::parse(&method)?;
            }
            merge_value(&mut self.cleaning_offset, inpaint.cleaning_offset);
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn merge_string(target: &mut String, value: Option<String>) {
    if let Some(value) = non_blank(value) {
        *target = value;
    }
}

fn merge_value<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn merge_positive(target: &mut f64, value: Option<f64>) {
    if let Some(value) = value {
        if value > 0.0 {
            *target = value;
        }
    }
}

fn merge_positive_f32(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value {
        if value > 0.0 {
            *target = value;
        }
    }
}

fn merge_color(target: &mut Rgb, value: Option<String>) -> Result<()> {
    if let Some(value) = non_blank(value) {
        *target = Rgb::parse(&value)?;
    }
    Ok(())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::settings_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedded_defaults_match_struct_defaults() {
        let mut settings = Settings::default();
        settings.merge_str(DEFAULT_SETTINGS_TOML).expect("defaults");
        let defaults = Settings::default();
        assert_eq!(settings.ocr_language, defaults.ocr_language);
        assert_eq!(settings.box_path, defaults.box_path);
        assert_eq!(settings.change_check_threshold, 7_000);
        assert_eq!(settings.group_box_pattern, BrushPattern::BDiag);
        assert_eq!(settings.colors, defaults.colors);
        assert_eq!(settings.inpaint_method, InpaintMethod::Telea);
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("settings.toml");
        let local = dir.path().join("settings.local.toml");
        fs::write(
            &base,
            "[ocr]\nlanguage = \"jpn\"\nvertical = false\n[layout]\ncollation_string = \" \"\n",
        )
        .expect("write base");
        fs::write(&local, "[ocr]\nlanguage = \"eng\"\n").expect("write local");

        let settings = load_settings_from(&[base, local, dir.path().join("missing.toml")])
            .expect("load settings");
        assert_eq!(settings.ocr_language, "eng");
        assert!(!settings.vertical);
        assert_eq!(settings.collation_string, " ");
        assert!(settings.full_width);
    }

    #[test]
    fn blank_and_non_positive_values_are_ignored() {
        let mut settings = Settings::default();
        settings
            .merge_str("[layout]\nbox_path = \"  \"\nlength_bias = 0.0\nchange_check_threshold = 0\n")
            .expect("merge");
        assert_eq!(settings.box_path, "box");
        assert_eq!(settings.length_bias, 1.0);
        assert_eq!(settings.change_check_threshold, 7_000);
    }

    #[test]
    fn unknown_brush_pattern_is_a_configuration_error() {
        let mut settings = Settings::default();
        let err = settings
            .merge_str("[overlay]\nbounding_box_pattern = \"Sparkle\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("unknown brush pattern"));
    }

    #[test]
    fn unknown_inpaint_method_is_a_configuration_error() {
        let mut settings = Settings::default();
        assert!(settings.merge_str("[inpaint]\nmethod = \"blur\"\n").is_err());
        settings.merge_str("[inpaint]\nmethod = \"NS\"\n").expect("ns");
        assert_eq!(settings.inpaint_method, InpaintMethod::NavierStokes);
    }

    #[test]
    fn colors_accept_hash_and_0x_prefixes() {
        assert_eq!(Rgb::parse("#00FF00").unwrap(), Rgb::from_u32(0x00FF00));
        assert_eq!(Rgb::parse("0x123456").unwrap().to_hex(), "#123456");
        assert!(Rgb::parse("#GGGGGG").is_err());
        assert!(Rgb::parse("").is_err());
    }

    #[test]
    fn overlay_style_picks_color_by_kind() {
        let settings = Settings::default();
        let flagged = settings.overlay_style(OverlayKind::Flagged);
        assert_eq!(flagged.color, Rgb::from_u32(0xFF00FF));
        assert_eq!(flagged.opacity, 0.5);
        assert_eq!(settings.group_style().pattern, BrushPattern::BDiag);
    }
}
