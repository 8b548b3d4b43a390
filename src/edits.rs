//! Edit plans: the remove/add tag lists applied to a batch of records.
//!
//! A plan can come from CLI flags or from a YAML/JSON file so the same edit
//! can be replayed over many images.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::parser::MetadataRecord;
use crate::prompt;

/// Tag edits for the positive and negative prompt.
///
/// `remove_*` fields are comma separated tag lists matched by core tag;
/// `add_*` fields are appended verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPlan {
    #[serde(default)]
    pub remove_positive: String,
    #[serde(default)]
    pub add_positive: String,
    #[serde(default)]
    pub remove_negative: String,
    #[serde(default)]
    pub add_negative: String,
}

/// A record after an edit plan was applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditedRecord {
    pub positive_prompt: String,
    pub negative_prompt: String,
    /// Rebuilt infotext; only available when the source record kept `_raw`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infotext: Option<String>,
    pub record: MetadataRecord,
}

impl EditPlan {
    /// True when no field holds anything but whitespace.
    pub fn is_empty(&self) -> bool {
        [
            &self.remove_positive,
            &self.add_positive,
            &self.remove_negative,
            &self.add_negative,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }

    /// Fills blank fields of `self` from `other`.
    pub fn merged_with(mut self, other: &EditPlan) -> EditPlan {
        for (field, fallback) in [
            (&mut self.remove_positive, &other.remove_positive),
            (&mut self.add_positive, &other.add_positive),
            (&mut self.remove_negative, &other.remove_negative),
            (&mut self.add_negative, &other.add_negative),
        ] {
            if field.trim().is_empty() {
                field.clone_from(fallback);
            }
        }
        self
    }

    pub fn apply_positive(&self, prompt: &str) -> String {
        prompt::apply_edits(prompt, &self.remove_positive, &self.add_positive)
    }

    pub fn apply_negative(&self, prompt: &str) -> String {
        prompt::apply_edits(prompt, &self.remove_negative, &self.add_negative)
    }

    /// Edits both prompts of `record`, leaving its settings untouched.
    pub fn apply(&self, record: &MetadataRecord) -> EditedRecord {
        let positive_prompt = self.apply_positive(record.positive_prompt());
        let negative_prompt = self.apply_negative(record.negative_prompt());
        let record = record.with_prompts(&positive_prompt, &negative_prompt);
        EditedRecord {
            infotext: record.to_infotext(),
            positive_prompt,
            negative_prompt,
            record,
        }
    }
}

/// Loads an edit plan from `.yaml`, `.yml` or `.json`.
pub fn load_edit_plan(path: &Path) -> Result<EditPlan> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let content = std::fs::read_to_string(path)?;

    match ext.as_str() {
        "json" => Ok(serde_json::from_str(&content)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
        other => Err(Error::UnsupportedFormat(format!(
            "edit plan extension '{}' (use .yaml, .yml or .json)",
            other
        ))),
    }
}
