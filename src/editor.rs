use anyhow::{Context, Result};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::archive;
use crate::font::{self, TextMeasure};
use crate::format::{self, ChangeCheck};
use crate::lstmbox::{FILLER, Orientation};
use crate::ocr::{Recognizer, SelectionScanner};
use crate::page::{EllipseLabel, Fit, GroupId, PageSession, Rect, RegionId, TextFit};
use crate::paths;
use crate::settings::Settings;
use crate::translate::{Translation, WebTranslator};

/// Where the regions of a freshly opened page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Saved,
    Prescan,
    /// The recognizer failed; the page opens without regions.
    PrescanFailed,
    Empty,
}

/// Answer to the unsaved-changes prompt when a page is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Save,
    Discard,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    fn unit(self) -> (f64, f64) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }
}

/// One open page: the image, its region session and the settings used to
/// fit, scan and save it.
pub struct PageEditor {
    image_path: PathBuf,
    image: DynamicImage,
    settings: Settings,
    measure: Arc<dyn TextMeasure + Send + Sync>,
    session: PageSession,
}

impl PageEditor {
    pub fn open(image_path: &Path, settings: Settings) -> Result<Self> {
        let measure = font::measure_for(&settings);
        Self::with_measure(image_path, settings, measure)
    }

    pub fn with_measure(
        image_path: &Path,
        settings: Settings,
        measure: Arc<dyn TextMeasure + Send + Sync>,
    ) -> Result<Self> {
        let image = image::open(image_path)
            .with_context(|| format!("failed to open image: {}", image_path.display()))?;
        let session = PageSession::new(
            image.width(),
            image.height(),
            Orientation::from_vertical(settings.vertical),
        );
        info!(
            "opened {} ({}x{})",
            image_path.display(),
            image.width(),
            image.height()
        );
        Ok(Self {
            image_path: image_path.to_path_buf(),
            image,
            settings,
            measure,
            session,
        })
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &PageSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PageSession {
        &mut self.session
    }

    pub fn box_file(&self) -> PathBuf {
        paths::box_file_path(&self.image_path, &self.settings.box_path)
    }

    pub fn ellipse_file(&self) -> PathBuf {
        paths::ellipse_file_path(&self.image_path, &self.settings.box_path)
    }

    /// Raw recognizer output for this page, distinct from the saved layout.
    pub fn ocr_file(&self) -> PathBuf {
        paths::with_suffix(
            &paths::ocr_base(&self.image_path, &self.settings.box_path),
            ".box",
        )
    }

    /// Loads the saved layout when there is one, otherwise prescans the page
    /// if configured to.
    pub fn load(&mut self, recognizer: &dyn Recognizer) -> Result<LoadSource> {
        let box_file = self.box_file();
        if box_file.exists() {
            self.load_saved_box(&box_file)?;
            let ellipse_file = self.ellipse_file();
            if ellipse_file.exists() {
                self.load_ellipse_file(&ellipse_file)?;
            }
            return Ok(LoadSource::Saved);
        }
        if !self.settings.prescan {
            return Ok(LoadSource::Empty);
        }
        match self.prescan(recognizer) {
            Ok(_) => Ok(LoadSource::Prescan),
            Err(err) => {
                warn!("prescan of {} failed: {:#}", self.image_path.display(), err);
                Ok(LoadSource::PrescanFailed)
            }
        }
    }

    /// Runs the recognizer over the whole page and imports its boxes fitted
    /// to their text. Earlier recognizer output for the page is reused.
    pub fn prescan(&mut self, recognizer: &dyn Recognizer) -> Result<Vec<RegionId>> {
        let base = paths::ocr_base(&self.image_path, &self.settings.box_path);
        let box_file = recognizer.recognize(&self.image_path, &base)?;
        self.load_recognized_box(&box_file)
    }

    /// Deletes cached recognizer output so the next prescan recognizes again.
    pub fn discard_ocr_output(&self) -> Result<bool> {
        let ocr_file = self.ocr_file();
        if !ocr_file.exists() {
            return Ok(false);
        }
        fs::remove_file(&ocr_file)
            .with_context(|| format!("failed to remove {}", ocr_file.display()))?;
        debug!("removed {}", ocr_file.display());
        Ok(true)
    }

    /// Imports a layout written by this editor, geometry verbatim.
    pub fn load_saved_box(&mut self, path: &Path) -> Result<Vec<RegionId>> {
        let input = read_layout(path)?;
        let ids = format::import_box(
            &mut self.session,
            &input,
            Fit::Exact,
            self.settings.suspicious_aspect_ratio,
        );
        info!("loaded {} boxes from {}", ids.len(), path.display());
        Ok(ids)
    }

    /// Imports raw recognizer output, refitting each box to its text.
    pub fn load_recognized_box(&mut self, path: &Path) -> Result<Vec<RegionId>> {
        let input = read_layout(path)?;
        let fit = TextFit::from_settings(&self.settings, self.measure.as_ref());
        let ids = format::import_box(
            &mut self.session,
            &input,
            Fit::Text(fit),
            self.settings.suspicious_aspect_ratio,
        );
        info!("imported {} recognized boxes from {}", ids.len(), path.display());
        Ok(ids)
    }

    pub fn load_ellipse_file(&mut self, path: &Path) -> Result<Vec<RegionId>> {
        let input = read_layout(path)?;
        let ids = format::import_ellipse(&mut self.session, &input);
        info!("loaded {} labels from {}", ids.len(), path.display());
        Ok(ids)
    }

    pub fn export_box(&self) -> String {
        format::export_box(&self.session)
    }

    pub fn export_ellipse(&self) -> String {
        format::export_ellipse(&self.session)
    }

    /// Writes the box layout, and the ellipse layout when there are labels
    /// or a previous label file to overwrite.
    pub fn save(&self) -> Result<()> {
        self.save_box_to(&self.box_file())?;
        let ellipse_file = self.ellipse_file();
        if self.session.ellipses().next().is_some() || ellipse_file.exists() {
            self.save_ellipse_to(&ellipse_file)?;
        }
        Ok(())
    }

    pub fn save_box_to(&self, path: &Path) -> Result<()> {
        write_layout(path, &self.export_box())
    }

    pub fn save_ellipse_to(&self, path: &Path) -> Result<()> {
        write_layout(path, &self.export_ellipse())
    }

    /// Compares the current layout with the saved box file.
    pub fn check_changes(&self) -> ChangeCheck {
        let saved = fs::read_to_string(self.box_file()).ok();
        format::check_change(
            &self.export_box(),
            saved.as_deref(),
            self.settings.change_check_threshold,
        )
    }

    /// Applies the close decision. Returns `false` when the page stays open.
    /// Pages extracted from an archive are deleted once closed.
    pub fn close(&self, decision: CloseDecision) -> Result<bool> {
        match decision {
            CloseDecision::Cancel => return Ok(false),
            CloseDecision::Save => self.save()?,
            CloseDecision::Discard => debug!("discarding changes to {}", self.image_path.display()),
        }
        if self.settings.remove_archive_image && archive::remove_extracted(&self.image_path)? {
            info!("removed extracted page {}", self.image_path.display());
        }
        Ok(true)
    }

    pub fn text_fit(&self) -> TextFit<'_> {
        TextFit::from_settings(&self.settings, self.measure.as_ref())
    }

    /// OCRs `rect` and adds a box for it holding the recognized text.
    pub fn scan_selection(&mut self, recognizer: &dyn Recognizer, rect: Rect) -> Result<RegionId> {
        let text = self.scan_rect(recognizer, rect)?;
        let id = self.session.add_box(rect, FILLER);
        let fit = TextFit::from_settings(&self.settings, self.measure.as_ref());
        self.session.set_text(id, &text, &fit);
        Ok(id)
    }

    /// Re-OCRs existing boxes in place. Ellipses and unknown ids are skipped.
    pub fn rescan(&mut self, recognizer: &dyn Recognizer, ids: &[RegionId]) -> Result<usize> {
        let mut rescanned = 0;
        for id in ids {
            let Some(region) = self.session.region(*id).filter(|region| region.is_box()) else {
                continue;
            };
            let text = self.scan_rect(recognizer, region.rect())?;
            let fit = TextFit::from_settings(&self.settings, self.measure.as_ref());
            self.session.set_text(*id, &text, &fit);
            rescanned += 1;
        }
        Ok(rescanned)
    }

    fn scan_rect(&self, recognizer: &dyn Recognizer, rect: Rect) -> Result<String> {
        SelectionScanner::from_settings(recognizer, &self.settings).scan(
            &self.image_path,
            &self.image,
            rect,
            self.settings.scan_offset,
        )
    }

    /// New ellipse label in the configured label font.
    pub fn add_label(&mut self, rect: Rect, text: &str) -> RegionId {
        self.session.add_ellipse(
            rect,
            EllipseLabel {
                display_text: text.to_string(),
                font_size: self.settings.ellipse_font_size,
                font_family: self.settings.ellipse_font_family.clone(),
            },
        )
    }

    pub fn set_text(&mut self, id: RegionId, text: &str) -> bool {
        let fit = TextFit::from_settings(&self.settings, self.measure.as_ref());
        self.session.set_text(id, text, &fit)
    }

    pub fn restore(&mut self, ids: &[RegionId]) -> usize {
        let fit = TextFit::from_settings(&self.settings, self.measure.as_ref());
        self.session.restore(ids, &fit)
    }

    pub fn nudge(&mut self, ids: &[RegionId], direction: Direction, fine: bool) -> usize {
        let amount = if fine {
            self.settings.fine_nudge
        } else {
            self.settings.nudge
        };
        let (dx, dy) = direction.unit();
        self.session.displace(ids, dx * amount, dy * amount)
    }

    pub fn scale(&mut self, ids: &[RegionId], grow: bool, fine: bool) -> usize {
        let step = if fine {
            self.settings.fine_scale
        } else {
            self.settings.scale
        };
        let factor = if grow { 1.0 + step } else { 1.0 - step };
        self.session.scale(ids, factor)
    }

    pub fn collate(&self, group: GroupId) -> Option<String> {
        self.session.collate(group, &self.settings.collation_string)
    }

    pub fn collate_all(&self) -> String {
        self.session.collate_all(&self.settings.collation_string)
    }

    /// Translates every group's collated text into the configured language.
    /// Groups whose translation fails are reported as `None`.
    pub async fn translate_groups(
        &self,
        translator: &WebTranslator,
        target: Option<&str>,
    ) -> Vec<(GroupId, Option<Translation>)> {
        let target = target.unwrap_or(&self.settings.translation_language);
        let mut results = Vec::new();
        for group in self.session.groups() {
            let Some(text) = self.collate(group.id()) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            let translation = translator.translate(&text, "auto", target).await;
            if translation.is_none() {
                warn!("no translation for {}", group.id());
            }
            results.push((group.id(), translation));
        }
        results
    }
}

fn read_layout(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read layout: {}", path.display()))
}

fn write_layout(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, content)
        .with_context(|| format!("failed to write layout: {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ChangeDetail;
    use crate::page::OverlayKind;
    use crate::test_util::{FailingRecognizer, FakeRecognizer, TestMeasure, write_blank_png};
    use tempfile::{TempDir, tempdir};

    const RECOGNIZED: &str = "あ 10 900 30 990 0\nい 10 900 30 990 0\nう 50 800 70 990 1\nえ 80 800 100 990 1";

    fn open_page(dir: &TempDir, name: &str) -> PageEditor {
        let page = dir.path().join(name);
        write_blank_png(&page, 200, 1000);
        PageEditor::with_measure(&page, Settings::default(), Arc::new(TestMeasure)).expect("open")
    }

    #[test]
    fn prescan_fits_boxes_without_writing_the_layout_file() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p1.png");
        let recognizer = FakeRecognizer::new(RECOGNIZED);

        assert_eq!(editor.load(&recognizer).expect("load"), LoadSource::Prescan);
        assert!(editor.ocr_file().exists());
        assert!(!editor.box_file().exists());

        let session = editor.session();
        let boxes = session.boxes().collect::<Vec<_>>();
        assert_eq!(boxes.len(), 3);
        assert_eq!(boxes[0].text(), "あい");
        // 2 chars at 1 em each: height = 2 * width
        assert_eq!(boxes[0].rect(), Rect::new(10.0, 10.0, 20.0, 40.0));
        assert_eq!(session.groups().count(), 1);
        assert_eq!(editor.collate_all(), "うえ");
    }

    #[test]
    fn discarded_prescan_reopens_fitted_again() {
        let dir = tempdir().expect("tempdir");
        let recognizer = FakeRecognizer::new("あ 10 900 30 990 0\nい 10 900 30 990 0\nA 50 900 70 990 0");
        let mut editor = open_page(&dir, "p9.png");
        assert_eq!(editor.load(&recognizer).expect("load"), LoadSource::Prescan);
        let first = editor.export_box();
        assert!(editor.close(CloseDecision::Discard).expect("discard"));

        let mut reopened = open_page(&dir, "p9.png");
        assert_eq!(reopened.load(&recognizer).expect("load"), LoadSource::Prescan);
        assert_eq!(reopened.export_box(), first);
        assert_eq!(
            reopened.session().boxes().count(),
            editor.session().boxes().count()
        );
        assert!(!reopened.box_file().exists());
    }

    #[test]
    fn saved_layout_is_not_replaced_by_recognizer_output() {
        let dir = tempdir().expect("tempdir");
        let recognizer = FakeRecognizer::new("う 10 900 30 990 0");
        let mut editor = open_page(&dir, "p10.png");
        editor.load(&recognizer).expect("load");
        let id = editor.session().page_list()[0];
        editor.session_mut().displace(&[id], 5.0, 0.0);
        editor.save().expect("save");
        let saved = editor.export_box();

        let mut reopened = open_page(&dir, "p10.png");
        assert_eq!(reopened.load(&recognizer).expect("load"), LoadSource::Saved);
        assert_eq!(reopened.export_box(), saved);
    }

    #[test]
    fn discarded_ocr_output_is_recognized_again() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p11.png");
        editor.prescan(&FakeRecognizer::new("え 10 900 30 990 0")).expect("prescan");
        assert!(editor.discard_ocr_output().expect("discard"));
        assert!(!editor.discard_ocr_output().expect("nothing left"));

        let mut fresh = open_page(&dir, "p11.png");
        fresh
            .prescan(&FakeRecognizer::new("お 40 900 60 990 0"))
            .expect("prescan");
        assert_eq!(fresh.session().boxes().next().map(|r| r.text()), Some("お"));
    }

    #[test]
    fn failed_prescan_still_opens_the_page() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p12.png");
        assert_eq!(
            editor.load(&FailingRecognizer).expect("load"),
            LoadSource::PrescanFailed
        );
        assert!(editor.session().is_empty());
        assert!(editor.prescan(&FailingRecognizer).is_err());
    }

    #[test]
    fn labels_use_the_configured_font() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p13.png");
        let id = editor.add_label(Rect::new(5.0, 5.0, 60.0, 30.0), "BOOM");
        let label = editor
            .session()
            .region(id)
            .and_then(|region| region.label())
            .expect("label");
        assert_eq!(label.display_text, "BOOM");
        assert_eq!(label.font_size, 25);
        assert_eq!(label.font_family, "Wild Words");
        assert!(editor.export_ellipse().starts_with("BOOM"));
    }

    #[test]
    fn saved_layout_is_loaded_verbatim_with_labels() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p2.png");
        let first = editor.session_mut().add_box(Rect::new(10.0, 10.0, 20.0, 50.0), "かき");
        let second = editor.session_mut().add_box(Rect::new(40.0, 10.0, 20.0, 30.0), "く");
        editor.session_mut().group_regions(&[first, second]);
        editor.session_mut().add_ellipse(
            Rect::new(5.0, 600.0, 80.0, 40.0),
            EllipseLabel {
                display_text: "BANG".to_string(),
                font_size: 25,
                font_family: "Wild Words".to_string(),
            },
        );
        editor.save().expect("save");
        let saved_box = editor.export_box();

        let mut reopened = open_page(&dir, "p2.png");
        let recognizer = FakeRecognizer::new("");
        assert_eq!(reopened.load(&recognizer).expect("load"), LoadSource::Saved);
        assert_eq!(reopened.export_box(), saved_box);
        assert_eq!(reopened.session().ellipses().count(), 1);
        assert!(!reopened.check_changes().has_changed);
    }

    #[test]
    fn disabled_prescan_leaves_the_page_empty() {
        let dir = tempdir().expect("tempdir");
        let page = dir.path().join("p3.png");
        write_blank_png(&page, 50, 50);
        let mut settings = Settings::default();
        settings.prescan = false;
        let mut editor =
            PageEditor::with_measure(&page, settings, Arc::new(TestMeasure)).expect("open");
        assert_eq!(
            editor.load(&FakeRecognizer::new(RECOGNIZED)).expect("load"),
            LoadSource::Empty
        );
        assert!(editor.session().is_empty());
    }

    #[test]
    fn change_check_tracks_edits_since_save() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p4.png");
        let id = editor.session_mut().add_box(Rect::new(0.0, 0.0, 10.0, 10.0), "A");
        assert_eq!(editor.check_changes().detail, ChangeDetail::NewFile);

        editor.save().expect("save");
        assert!(!editor.check_changes().has_changed);

        editor.set_text(id, "B");
        let check = editor.check_changes();
        assert!(check.has_changed);
        assert!(matches!(check.detail, ChangeDetail::Diff(_)));
    }

    #[test]
    fn close_respects_the_decision() {
        let dir = tempdir().expect("tempdir");
        let editor = open_page(&dir, "rctemp_p5.png");
        assert!(!editor.close(CloseDecision::Cancel).expect("cancel"));
        assert!(editor.image_path().exists());

        assert!(editor.close(CloseDecision::Save).expect("save"));
        assert!(editor.box_file().exists());
        assert!(!editor.image_path().exists());
    }

    #[test]
    fn discard_keeps_regular_pages() {
        let dir = tempdir().expect("tempdir");
        let editor = open_page(&dir, "p6.png");
        assert!(editor.close(CloseDecision::Discard).expect("discard"));
        assert!(editor.image_path().exists());
        assert!(!editor.box_file().exists());
    }

    #[test]
    fn scanned_selection_becomes_a_fitted_box() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p7.png");
        let recognizer = FakeRecognizer::new("").with_scan_text("さ し\n");
        let id = editor
            .scan_selection(&recognizer, Rect::new(20.0, 20.0, 30.0, 10.0))
            .expect("scan");
        let region = editor.session().region(id).expect("region");
        assert_eq!(region.text(), "さし");
        assert_eq!(region.rect(), Rect::new(20.0, 20.0, 30.0, 60.0));
        assert_eq!(region.overlay_kind(false), OverlayKind::Text);

        let rescanned = editor.rescan(&recognizer, &[id]).expect("rescan");
        assert_eq!(rescanned, 1);
        assert_eq!(recognizer.scanned.borrow().len(), 2);
    }

    #[test]
    fn nudge_and_scale_use_configured_steps() {
        let dir = tempdir().expect("tempdir");
        let mut editor = open_page(&dir, "p8.png");
        let id = editor.session_mut().add_box(Rect::new(50.0, 50.0, 10.0, 20.0), "A");

        editor.nudge(&[id], Direction::Right, false);
        editor.nudge(&[id], Direction::Up, true);
        editor.scale(&[id], true, false);
        let rect = editor.session().region(id).expect("region").rect();
        assert_eq!((rect.x, rect.y), (55.0, 49.0));
        assert!((rect.w - 11.0).abs() < 1e-9);
        assert!((rect.h - 22.0).abs() < 1e-9);
    }
}
