use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

pub mod archive;
pub mod editor;
pub mod font;
pub mod format;
pub mod logging;
pub mod lstmbox;
pub mod ocr;
pub mod page;
pub mod paths;
pub mod settings;
pub mod translate;
pub mod width;

#[cfg(test)]
mod test_util;

pub use editor::{CloseDecision, Direction, LoadSource, PageEditor};
pub use ocr::{Recognizer, Tesseract};
pub use page::{PageSession, Rect};
pub use settings::Settings;
pub use translate::{Translation, WebTranslator};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Region tree of the page.
    Tree,
    /// Recognize the whole page again and save the fitted layout.
    Prescan,
    Collate,
    Translate { lang: Option<String> },
    Check,
    ExportBox { out: Option<PathBuf> },
    ExportEllipse { out: Option<PathBuf> },
    Scan { rect: Rect, save: bool },
    Info,
    Pages,
    Extract { entry: String },
    Languages,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub path: Option<PathBuf>,
    pub settings_path: Option<String>,
    pub verbose: bool,
    pub command: Command,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    logging::init(config.verbose || settings.debug)?;

    if config.command == Command::Languages {
        let languages = ocr::list_languages(settings.tessdata_dir.as_deref())?;
        return Ok(languages.join("\n"));
    }

    let path = config
        .path
        .ok_or_else(|| anyhow!("a page image or archive path is required"))?;
    match config.command {
        Command::Pages => Ok(archive::list_pages(&path)?.join("\n")),
        Command::Extract { entry } => {
            let page = archive::extract_page(&path, &entry)?;
            Ok(page.display().to_string())
        }
        command => run_page(&path, settings, command).await,
    }
}

async fn run_page(path: &Path, settings: Settings, command: Command) -> Result<String> {
    if archive::is_archive(path) {
        return Err(anyhow!(
            "{} is an archive; extract a page first",
            path.display()
        ));
    }
    let tesseract = Tesseract::from_settings(&settings);
    let translator = WebTranslator::from_settings(&settings);
    let mut editor = PageEditor::open(path, settings)?;

    if command == Command::Prescan {
        editor.discard_ocr_output()?;
        editor.prescan(&tesseract)?;
        editor.save()?;
        return Ok(editor.session().render_tree());
    }
    editor.load(&tesseract)?;

    match command {
        Command::Tree => Ok(editor.session().render_tree()),
        Command::Collate => Ok(editor.collate_all()),
        Command::Translate { lang } => {
            let results = editor.translate_groups(&translator, lang.as_deref()).await;
            Ok(format_translations(&editor, &results))
        }
        Command::Check => {
            let check = editor.check_changes();
            if check.has_changed {
                Ok(check.message().trim_end().to_string())
            } else {
                Ok("No changes.".to_string())
            }
        }
        Command::ExportBox { out } => match out {
            Some(out) => {
                editor.save_box_to(&out)?;
                Ok(out.display().to_string())
            }
            None => Ok(editor.export_box()),
        },
        Command::ExportEllipse { out } => match out {
            Some(out) => {
                editor.save_ellipse_to(&out)?;
                Ok(out.display().to_string())
            }
            None => Ok(editor.export_ellipse()),
        },
        Command::Scan { rect, save } => {
            let id = editor.scan_selection(&tesseract, rect)?;
            let text = editor
                .session()
                .region(id)
                .map(|region| region.text().to_string())
                .unwrap_or_default();
            if save {
                editor.save()?;
            }
            Ok(text)
        }
        Command::Info => Ok(format_info(editor.session())),
        Command::Prescan | Command::Pages | Command::Extract { .. } | Command::Languages => {
            Err(anyhow!("command not available for a page"))
        }
    }
}

fn format_translations(
    editor: &PageEditor,
    results: &[(page::GroupId, Option<Translation>)],
) -> String {
    results
        .iter()
        .map(|(group, translation)| {
            let source = editor.collate(*group).unwrap_or_default();
            let translated = match translation {
                Some(translation) => translation.text.clone(),
                None => "(translation failed)".to_string(),
            };
            format!("[[{}]]\n{}\n{}", group, source, translated)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_info(session: &PageSession) -> String {
    let (w, h) = session.average_box_size();
    let flagged = session.boxes().filter(|region| region.is_flagged()).count();
    [
        format!("image: {}x{}", session.image_width(), session.image_height()),
        format!("boxes: {}", session.page_list().len()),
        format!("flagged: {}", flagged),
        format!("groups: {}", session.groups().count()),
        format!("labels: {}", session.ellipses().count()),
        format!("average box: {:.1}x{:.1}", w, h),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::EllipseLabel;
    use crate::test_util::session_with_boxes;

    #[test]
    fn info_summarizes_the_session() {
        let (mut session, ids) = session_with_boxes(&["A", "B", "C"]);
        session.group_regions(&ids[..2]);
        session.set_flag(&ids[2..], true);
        session.add_ellipse(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            EllipseLabel {
                display_text: "HA".to_string(),
                font_size: 20,
                font_family: "Wild Words".to_string(),
            },
        );
        insta::assert_snapshot!(format_info(&session), @r"
        image: 1000x1000
        boxes: 3
        flagged: 1
        groups: 1
        labels: 1
        average box: 10.0x20.0
        ");
    }
}
