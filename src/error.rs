use std::path::PathBuf;

/// Failures of the file-facing layer (PNG reading, edit plans, exports).
///
/// The parsing and editing core never returns these; it signals an
/// unrecognised blob with `None` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid PNG file: {}", .0.display())]
    NotPng(PathBuf),

    #[error("no generation metadata found in {}", .0.display())]
    NoMetadata(PathBuf),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
