//! Prompt tokenizing and tag editing.
//!
//! Prompts use the A1111/Forge emphasis syntax: comma or newline separated
//! tags, `(tag:1.2)` / `[tag]` weighting, and `<lora:name:0.8>` resource
//! references. Everything here is pure string processing.

pub mod editor;
pub mod normalizer;
pub mod tokenizer;

pub use editor::{add_tags, apply_edits, core_tags, find_common_tags, remove_tags};
pub use normalizer::extract_core;
pub use tokenizer::{tokenize, tokens_to_prompt};
