use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod settings;

use settings::RawPair;

/// Substring that marks A1111/Forge infotext, as opposed to ComfyUI graphs,
/// NovelAI comments and other metadata dialects.
pub const SETTINGS_MARKER: &str = "Steps:";
const NEGATIVE_PROMPT_MARKER: &str = "Negative prompt:";

/// Field names owned by the record itself. A settings pair using one of them
/// is dropped.
const RESERVED_KEYS: &[&str] = &["positive_prompt", "negative_prompt", "_raw"];

const INT_FIELDS: &[&str] = &["Steps", "Seed", "Clip skip", "Hires steps", "Size-1", "Size-2"];
const FLOAT_FIELDS: &[&str] = &["CFG scale", "Denoising strength", "Hires upscale"];
const DEFAULT_FIELDS: &[(&str, &str)] = &[("Clip skip", "1"), ("Schedule type", "Automatic")];

/// A single settings value after type coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Generation parameters recovered from an infotext blob.
///
/// Serializes to a flat object: `positive_prompt`, `negative_prompt`, every
/// settings field in line order, then `_raw` when the original blob is kept.
/// A record is never edited in place; use [`MetadataRecord::with_prompts`] to
/// derive one with different prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    positive_prompt: String,
    negative_prompt: String,
    #[serde(flatten)]
    fields: IndexMap<String, FieldValue>,
    #[serde(rename = "_raw", default, skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

impl MetadataRecord {
    pub fn positive_prompt(&self) -> &str {
        &self.positive_prompt
    }

    pub fn negative_prompt(&self) -> &str {
        &self.negative_prompt
    }

    /// The untouched blob, present for records built by [`extract_metadata`].
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// `Size-1` x `Size-2`, when both coerced to integers.
    pub fn dimensions(&self) -> Option<(i64, i64)> {
        let width = self.get("Size-1")?.as_i64()?;
        let height = self.get("Size-2")?.as_i64()?;
        Some((width, height))
    }

    /// A copy of this record with both prompts replaced.
    pub fn with_prompts(&self, positive: &str, negative: &str) -> Self {
        Self {
            positive_prompt: positive.to_string(),
            negative_prompt: negative.to_string(),
            ..self.clone()
        }
    }

    /// Rebuilds the infotext from the original blob's settings line and this
    /// record's prompts. `None` without a raw blob.
    pub fn to_infotext(&self) -> Option<String> {
        let raw = self.raw.as_deref()?;
        Some(reconstruct_infotext(
            raw,
            &self.positive_prompt,
            &self.negative_prompt,
        ))
    }
}

/// Whether `text` looks like A1111/Forge generation parameters.
pub fn has_settings_marker(text: &str) -> bool {
    text.contains(SETTINGS_MARKER)
}

/// Parses raw infotext and keeps the original blob under `_raw`.
///
/// Returns `None` when the metadata is missing or is not in the A1111/Forge
/// dialect (no `Steps:` anywhere).
pub fn extract_metadata(raw: Option<&str>) -> Option<MetadataRecord> {
    let raw = raw?;
    if !has_settings_marker(raw) {
        return None;
    }

    let mut record = parse_generation_parameters(raw);
    record.raw = Some(raw.to_string());
    Some(record)
}

/// Splits a trimmed blob into prompt lines and the settings line. The last
/// line only counts as settings when it carries enough pairs; otherwise it
/// stays with the prompt and the settings line is empty.
fn split_settings_line(blob: &str) -> (Vec<&str>, &str) {
    let mut lines: Vec<&str> = blob.trim().split('\n').collect();
    let last = lines.pop().unwrap_or_default();

    if settings::is_settings_line(last) {
        (lines, last)
    } else {
        lines.push(last);
        (lines, "")
    }
}

/// Parses an A1111/Forge infotext blob.
///
/// Format:
///
/// ```text
/// {prompt, possibly several lines}
/// Negative prompt: {negative, possibly several lines}
/// Steps: 20, Sampler: Euler a, CFG scale: 7, Size: 512x768, Seed: 123
/// ```
///
/// - `WxH` values become `<key>-1` and `<key>-2`
/// - `Clip skip` defaults to `1` and `Schedule type` to `Automatic`
/// - numeric fields are coerced, falling back to text when they do not parse
pub fn parse_generation_parameters(blob: &str) -> MetadataRecord {
    let (prompt_lines, settings_line) = split_settings_line(blob);

    let mut positive = String::new();
    let mut negative = String::new();
    let mut in_negative = false;
    for line in prompt_lines {
        let mut line = line.trim();
        if let Some(rest) = line.strip_prefix(NEGATIVE_PROMPT_MARKER) {
            in_negative = true;
            line = rest.trim();
        }
        let bucket = if in_negative { &mut negative } else { &mut positive };
        append_line(bucket, line);
    }

    let mut fields = IndexMap::new();
    for pair in settings::scan_pairs(settings_line) {
        match settle_pair(&pair) {
            Ok(entries) => fields.extend(entries),
            Err(reason) => log::debug!("Skipping settings pair {:?}: {}", pair.key, reason),
        }
    }

    for (key, default) in DEFAULT_FIELDS {
        fields
            .entry(key.to_string())
            .or_insert_with(|| FieldValue::Text(default.to_string()));
    }
    coerce_fields(&mut fields);

    MetadataRecord {
        positive_prompt: positive,
        negative_prompt: negative,
        fields,
        raw: None,
    }
}

/// Newline-joins `line` onto `bucket`; an empty bucket never gains a leading newline.
fn append_line(bucket: &mut String, line: &str) {
    if !bucket.is_empty() {
        bucket.push('\n');
    }
    bucket.push_str(line);
}

#[derive(Debug)]
enum MalformedPair {
    ReservedKey,
}

impl fmt::Display for MalformedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedKey => f.write_str("key is reserved for record fields"),
        }
    }
}

/// Turns one scanned pair into the record entries it produces.
fn settle_pair(pair: &RawPair<'_>) -> Result<Vec<(String, FieldValue)>, MalformedPair> {
    if RESERVED_KEYS.contains(&pair.key) {
        return Err(MalformedPair::ReservedKey);
    }

    let value = settings::unquote(pair.value);
    if let Some((width, height)) = settings::split_dimensions(&value) {
        return Ok(vec![
            (format!("{}-1", pair.key), FieldValue::Text(width.to_string())),
            (format!("{}-2", pair.key), FieldValue::Text(height.to_string())),
        ]);
    }

    Ok(vec![(pair.key.to_string(), FieldValue::Text(value))])
}

fn coerce_fields(fields: &mut IndexMap<String, FieldValue>) {
    for key in INT_FIELDS {
        if let Some(value) = fields.get_mut(*key) {
            if let Some(parsed) = value.as_str().and_then(|text| text.trim().parse::<i64>().ok()) {
                *value = FieldValue::Int(parsed);
            }
        }
    }

    for key in FLOAT_FIELDS {
        if let Some(value) = fields.get_mut(*key) {
            if let Some(parsed) = value.as_str().and_then(|text| text.trim().parse::<f64>().ok()) {
                *value = FieldValue::Float(parsed);
            }
        }
    }
}

/// Rebuilds infotext with new prompts and the original settings line.
///
/// The settings line is copied verbatim, so prompt edits can never alter
/// generation settings. The negative line is omitted when `new_negative` is
/// empty, the settings line when the original had none.
pub fn reconstruct_infotext(original_raw: &str, new_positive: &str, new_negative: &str) -> String {
    let (_, settings_line) = split_settings_line(original_raw);

    let mut parts = vec![new_positive.to_string()];
    if !new_negative.is_empty() {
        parts.push(format!("{} {}", NEGATIVE_PROMPT_MARKER, new_negative));
    }
    if !settings_line.is_empty() {
        parts.push(settings_line.to_string());
    }
    parts.join("\n")
}
