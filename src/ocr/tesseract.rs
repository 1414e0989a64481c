use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use super::Recognizer;
use crate::paths;
use crate::settings::Settings;

const BOX_SUFFIX: &str = ".box";

/// Runs the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct Tesseract {
    pub language: String,
    pub tessdata_dir: Option<String>,
    pub page_segmentation_mode: u32,
}

impl Tesseract {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            language: settings.ocr_language.clone(),
            tessdata_dir: settings
                .tessdata_dir
                .as_deref()
                .map(paths::expand_tilde),
            page_segmentation_mode: settings.page_segmentation_mode,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new("tesseract");
        command.arg("-l").arg(&self.language);
        command
    }

    fn push_tessdata(&self, command: &mut Command) {
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
    }
}

impl Recognizer for Tesseract {
    fn recognize(&self, image: &Path, out_base: &Path) -> Result<PathBuf> {
        let box_path = paths::with_suffix(out_base, BOX_SUFFIX);
        if box_path.exists() {
            debug!("reusing {}", box_path.display());
            return Ok(box_path);
        }
        if let Some(parent) = box_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut command = self.command();
        command
            .arg(image)
            .arg(out_base)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string());
        self.push_tessdata(&mut command);
        command.arg("lstmbox");

        info!("running tesseract on {}", image.display());
        let output = command
            .output()
            .with_context(|| "failed to run tesseract (is it installed?)")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        if !box_path.exists() {
            return Err(anyhow!("tesseract wrote no box file: {}", box_path.display()));
        }
        Ok(box_path)
    }

    fn recognize_to_text(&self, image: &Path) -> Result<String> {
        let mut command = self.command();
        command.arg(image).arg("stdout");
        self.push_tessdata(&mut command);

        let output = command
            .output()
            .with_context(|| "failed to run tesseract (is it installed?)")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

pub fn tesseract_available() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn list_languages(tessdata_dir: Option<&str>) -> Result<Vec<String>> {
    let mut command = Command::new("tesseract");
    command.arg("--list-langs");
    if let Some(dir) = tessdata_dir {
        command.arg("--tessdata-dir").arg(dir);
    }
    let output = command
        .output()
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Drops the header line of `--list-langs` output.
fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
