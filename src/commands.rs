use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::parser::{self, MetadataRecord};
use crate::scanner;

mod edit;
mod inspect;
mod scan;

pub use edit::{EditArgs, ReconstructArgs};
pub use inspect::{CommonArgs, ParseArgs, TagsArgs};
pub use scan::ScanArgs;

/// Path argument meaning "read infotext from stdin".
const STDIN_PATH: &str = "-";

#[derive(Debug, Parser)]
#[command(
    name = "forge-infotext",
    version,
    about = "Parse Stable Diffusion infotext and edit prompt tags"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print parsed generation parameters as JSON.
    Parse(ParseArgs),
    /// List the core tags of a prompt.
    Tags(TagsArgs),
    /// List tags shared by every input.
    Common(CommonArgs),
    /// Remove/add tags and print the edited records with rebuilt infotext.
    Edit(EditArgs),
    /// Rebuild infotext with replacement prompts.
    Reconstruct(ReconstructArgs),
    /// Parse every PNG under a directory and export JSON or CSV.
    Scan(ScanArgs),
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Parse(args) => inspect::parse(args),
        Command::Tags(args) => inspect::tags(args),
        Command::Common(args) => inspect::common(args),
        Command::Edit(args) => edit::edit(args),
        Command::Reconstruct(args) => edit::reconstruct(args),
        Command::Scan(args) => scan::scan(args),
    }
}

/// Reads raw infotext from a PNG, a plain text file, or stdin (`-`).
fn read_raw(path: &Path) -> Result<Option<String>> {
    if path.as_os_str() == STDIN_PATH {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(Some(text));
    }

    if scanner::is_png_path(path) {
        scanner::read_parameters(path)
    } else {
        Ok(Some(std::fs::read_to_string(path)?))
    }
}

/// Loads and parses one input, failing when it has no A1111/Forge metadata.
fn load_record(path: &Path) -> Result<MetadataRecord> {
    let raw = read_raw(path)?;
    parser::extract_metadata(raw.as_deref()).ok_or_else(|| Error::NoMetadata(path.to_path_buf()))
}

/// Loads every input, logging and skipping those without metadata.
fn load_records(paths: &[PathBuf]) -> Result<Vec<(PathBuf, MetadataRecord)>> {
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match load_record(path) {
            Ok(record) => records.push((path.clone(), record)),
            Err(Error::NoMetadata(path)) => {
                log::warn!("No generation metadata in {}, skipping", path.display());
            }
            Err(err) => return Err(err),
        }
    }
    Ok(records)
}

/// Writes `content` to `output`, or stdout when no output path is given.
fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            log::info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(output: Option<&Path>, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_output(output, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_edit_flags() {
        let cli = Cli::try_parse_from([
            "forge-infotext",
            "edit",
            "a.png",
            "b.txt",
            "--remove-positive",
            "solo, smile",
            "--add-negative",
            "blurry",
        ])
        .expect("valid arguments");

        let Command::Edit(args) = cli.command else {
            panic!("expected edit command");
        };
        assert_eq!(args.paths, vec![PathBuf::from("a.png"), PathBuf::from("b.txt")]);
        let plan = args.plan().expect("plan");
        assert_eq!(plan.remove_positive, "solo, smile");
        assert_eq!(plan.add_negative, "blurry");
    }

    #[test]
    fn test_cli_requires_paths() {
        assert!(Cli::try_parse_from(["forge-infotext", "parse"]).is_err());
        assert!(Cli::try_parse_from(["forge-infotext", "common"]).is_err());
    }

    #[test]
    fn test_load_record_from_text_file() {
        let path = std::env::temp_dir().join(format!(
            "forge_infotext_cmd_{}.txt",
            std::process::id()
        ));
        std::fs::write(&path, "a cat\nSteps: 20, Seed: 1, Sampler: Euler").unwrap();
        let record = load_record(&path).expect("record");
        assert_eq!(record.positive_prompt(), "a cat");

        std::fs::write(&path, "just a caption").unwrap();
        assert!(matches!(load_record(&path), Err(Error::NoMetadata(_))));
        assert!(load_records(std::slice::from_ref(&path)).unwrap().is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_png_extension_is_read_as_png() {
        let path = std::env::temp_dir().join(format!("forge_infotext_cmd_{}.PNG", std::process::id()));
        std::fs::write(&path, "a cat\nSteps: 20, Seed: 1, Sampler: Euler").unwrap();
        assert!(matches!(read_raw(&path), Err(Error::NotPng(_))));
        std::fs::remove_file(&path).ok();
    }
}
