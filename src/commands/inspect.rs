use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{load_record, load_records, write_json};
use crate::error::Result;
use crate::parser::MetadataRecord;
use crate::prompt;

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// PNG files, infotext text files, or `-` for stdin.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Write JSON here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TagsArgs {
    pub path: PathBuf,
    /// Use the negative prompt instead of the positive one.
    #[arg(long)]
    pub negative: bool,
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ParsedFile<'a> {
    path: String,
    #[serde(flatten)]
    record: &'a MetadataRecord,
}

#[derive(Debug, PartialEq, Serialize)]
struct CommonTags {
    positive: Vec<String>,
    negative: Vec<String>,
}

pub fn parse(args: ParseArgs) -> Result<()> {
    let records = load_records(&args.paths)?;
    let parsed: Vec<ParsedFile<'_>> = records
        .iter()
        .map(|(path, record)| ParsedFile {
            path: path.display().to_string(),
            record,
        })
        .collect();
    log::info!("Parsed {} of {} inputs", parsed.len(), args.paths.len());
    write_json(args.output.as_deref(), &parsed)
}

pub fn tags(args: TagsArgs) -> Result<()> {
    let record = load_record(&args.path)?;
    let text = if args.negative {
        record.negative_prompt()
    } else {
        record.positive_prompt()
    };
    write_json(None, &prompt::core_tags(text))
}

fn common_tags(records: &[MetadataRecord]) -> CommonTags {
    let positives: Vec<&str> = records.iter().map(MetadataRecord::positive_prompt).collect();
    let negatives: Vec<&str> = records.iter().map(MetadataRecord::negative_prompt).collect();
    CommonTags {
        positive: prompt::find_common_tags(&positives),
        negative: prompt::find_common_tags(&negatives),
    }
}

pub fn common(args: CommonArgs) -> Result<()> {
    let records: Vec<MetadataRecord> = load_records(&args.paths)?
        .into_iter()
        .map(|(_, record)| record)
        .collect();
    write_json(None, &common_tags(&records))
}
