//! Batch parsing of every PNG under a directory.
//!
//! Files are parsed on a dedicated rayon pool; the parser itself is pure, so
//! workers share nothing but the path list.

use clap::{Args, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::{write_json, write_output};
use crate::error::{Error, Result};
use crate::parser::{FieldValue, MetadataRecord};
use crate::scanner;

const THREADS_ENV: &str = "FORGE_INFOTEXT_THREADS";
const MAX_SCAN_THREADS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to search recursively for PNG files.
    pub dir: PathBuf,
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,
    /// Write the export here instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ScannedRecord {
    path: String,
    #[serde(flatten)]
    record: MetadataRecord,
}

fn scan_threads() -> usize {
    if let Ok(raw) = std::env::var(THREADS_ENV) {
        if let Ok(parsed) = raw.trim().parse::<usize>() {
            return parsed.clamp(1, MAX_SCAN_THREADS);
        }
        log::warn!("Ignoring invalid {}={:?}", THREADS_ENV, raw);
    }

    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
        .clamp(1, MAX_SCAN_THREADS)
}

fn scan_pool() -> Option<&'static rayon::ThreadPool> {
    static POOL: OnceLock<Option<rayon::ThreadPool>> = OnceLock::new();

    POOL.get_or_init(|| {
        let threads = scan_threads();
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("infotext-scan-{}", idx))
            .build()
        {
            Ok(pool) => {
                log::info!("Configured scan pool with {} workers", threads);
                Some(pool)
            }
            Err(err) => {
                log::warn!("Failed to build scan pool, using global pool: {}", err);
                None
            }
        }
    })
    .as_ref()
}

fn parse_file(path: &Path) -> Option<ScannedRecord> {
    match scanner::extract_metadata_from_file(path) {
        Ok(Some(record)) => Some(ScannedRecord {
            path: path.display().to_string(),
            record,
        }),
        Ok(None) => {
            log::debug!("No generation metadata in {}", path.display());
            None
        }
        Err(err) => {
            log::warn!("PNG metadata read failed for {}: {}", path.display(), err);
            None
        }
    }
}

/// Parses every file, keeping input order.
fn parse_files(paths: &[PathBuf]) -> Vec<ScannedRecord> {
    let run = || {
        paths
            .par_iter()
            .filter_map(|path| parse_file(path))
            .collect::<Vec<_>>()
    };
    match scan_pool() {
        Some(pool) => pool.install(run),
        None => run(),
    }
}

fn field_text(record: &MetadataRecord, key: &str) -> String {
    record
        .get(key)
        .map(FieldValue::to_string)
        .unwrap_or_default()
}

fn build_csv_export(records: &[ScannedRecord]) -> Result<String> {
    const SETTINGS_COLUMNS: &[&str] = &[
        "Steps",
        "Sampler",
        "Schedule type",
        "CFG scale",
        "Seed",
        "Size-1",
        "Size-2",
        "Model hash",
        "Model",
        "Clip skip",
        "Denoising strength",
    ];

    let mut wtr = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["path", "positive_prompt", "negative_prompt"];
    header.extend_from_slice(SETTINGS_COLUMNS);
    wtr.write_record(&header)?;

    for scanned in records {
        let record = &scanned.record;
        let mut row = vec![
            scanned.path.clone(),
            record.positive_prompt().to_string(),
            record.negative_prompt().to_string(),
        ];
        row.extend(SETTINGS_COLUMNS.iter().map(|key| field_text(record, key)));
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::UnsupportedFormat(format!("CSV output is not UTF-8: {}", e)))
}

pub fn scan(args: ScanArgs) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", args.dir.display()),
        )));
    }

    let paths = scanner::scan_directory(&args.dir);
    log::info!("Found {} PNG files under {}", paths.len(), args.dir.display());

    let records = parse_files(&paths);
    log::info!(
        "Parsed generation metadata from {} of {} files",
        records.len(),
        paths.len()
    );

    match args.format {
        ExportFormat::Json => write_json(args.output.as_deref(), &records),
        ExportFormat::Csv => write_output(args.output.as_deref(), &build_csv_export(&records)?),
    }
}
