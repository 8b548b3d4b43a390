use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{load_record, load_records, write_json, write_output};
use crate::edits::{load_edit_plan, EditPlan, EditedRecord};
use crate::error::Result;
use crate::parser;

#[derive(Debug, Args)]
pub struct EditArgs {
    /// PNG files, infotext text files, or `-` for stdin.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Comma separated tags to remove from the positive prompt.
    #[arg(long, default_value = "")]
    pub remove_positive: String,
    /// Tags appended to the positive prompt.
    #[arg(long, default_value = "")]
    pub add_positive: String,
    /// Comma separated tags to remove from the negative prompt.
    #[arg(long, default_value = "")]
    pub remove_negative: String,
    /// Tags appended to the negative prompt.
    #[arg(long, default_value = "")]
    pub add_negative: String,
    /// YAML or JSON edit plan; flags take precedence over its fields.
    #[arg(long)]
    pub plan: Option<PathBuf>,
    /// Write JSON here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl EditArgs {
    /// The edit plan from flags, completed by the plan file if one was given.
    pub fn plan(&self) -> Result<EditPlan> {
        let from_flags = EditPlan {
            remove_positive: self.remove_positive.clone(),
            add_positive: self.add_positive.clone(),
            remove_negative: self.remove_negative.clone(),
            add_negative: self.add_negative.clone(),
        };
        match &self.plan {
            Some(path) => Ok(from_flags.merged_with(&load_edit_plan(path)?)),
            None => Ok(from_flags),
        }
    }
}

#[derive(Debug, Args)]
pub struct ReconstructArgs {
    /// Source of the original infotext (PNG, text file, or `-`).
    pub path: PathBuf,
    /// Replacement positive prompt.
    #[arg(long)]
    pub positive: String,
    /// Replacement negative prompt; omitted from the output when empty.
    #[arg(long, default_value = "")]
    pub negative: String,
}

#[derive(Serialize)]
struct EditedFile {
    path: String,
    #[serde(flatten)]
    edited: EditedRecord,
}

pub fn edit(args: EditArgs) -> Result<()> {
    let plan = args.plan()?;
    if plan.is_empty() {
        log::warn!("Edit plan is empty; prompts are passed through unchanged");
    }

    let edited: Vec<EditedFile> = load_records(&args.paths)?
        .into_iter()
        .map(|(path, record)| EditedFile {
            path: path.display().to_string(),
            edited: plan.apply(&record),
        })
        .collect();
    log::info!("Edited {} of {} inputs", edited.len(), args.paths.len());
    write_json(args.output.as_deref(), &edited)
}

pub fn reconstruct(args: ReconstructArgs) -> Result<()> {
    let record = load_record(&args.path)?;
    let original = record.raw().unwrap_or_default();
    let infotext = parser::reconstruct_infotext(original, &args.positive, &args.negative);
    write_output(None, &infotext)
}
