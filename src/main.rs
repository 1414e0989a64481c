use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use retcom_rust::{Command, Config, Rect};

#[derive(Parser, Debug)]
#[command(
    name = "retcom-rust",
    version,
    about = "Prepare OCR text regions of comic pages for translation"
)]
struct Cli {
    /// Page image, or a zip/cbz archive for `pages` and `extract`
    path: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print the region tree (groups, boxes, labels)
    Tree,
    /// Recognize the page and save the fitted layout
    Prescan,
    /// Print the collated text of every group
    Collate,
    /// Translate every group's collated text
    Translate {
        /// Target language (default: settings [translation] language)
        #[arg(short = 'l', long = "lang")]
        lang: Option<String>,
    },
    /// Compare the current layout with the saved box file
    Check,
    /// Print or write the box layout
    ExportBox {
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Print or write the ellipse layout
    ExportEllipse {
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// OCR a rectangle of the page into a new box
    Scan {
        /// x,y,w,h in image pixels (origin top-left)
        #[arg(long = "rect", value_parser = parse_rect)]
        rect: Rect,
        /// Save the layout afterwards
        #[arg(long = "save")]
        save: bool,
    },
    /// Show page statistics
    Info,
    /// List the pages of an archive
    Pages,
    /// Extract one archive page next to the archive
    Extract { entry: String },
    /// List installed OCR languages
    Languages,
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Tree => Command::Tree,
            CliCommand::Prescan => Command::Prescan,
            CliCommand::Collate => Command::Collate,
            CliCommand::Translate { lang } => Command::Translate { lang },
            CliCommand::Check => Command::Check,
            CliCommand::ExportBox { out } => Command::ExportBox { out },
            CliCommand::ExportEllipse { out } => Command::ExportEllipse { out },
            CliCommand::Scan { rect, save } => Command::Scan { rect, save },
            CliCommand::Info => Command::Info,
            CliCommand::Pages => Command::Pages,
            CliCommand::Extract { entry } => Command::Extract { entry },
            CliCommand::Languages => Command::Languages,
        }
    }
}

fn parse_rect(value: &str) -> Result<Rect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("invalid rectangle '{}': {}", value, err))?;
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected x,y,w,h but got '{}'", value));
    };
    if *w <= 0.0 || *h <= 0.0 {
        return Err(format!("rectangle '{}' is empty", value));
    }
    Ok(Rect::new(*x, *y, *w, *h))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = retcom_rust::run(Config {
        path: cli.path,
        settings_path: cli.read_settings,
        verbose: cli.verbose,
        command: cli.command.into(),
    })
    .await?;

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
