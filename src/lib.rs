pub mod edits;
pub mod error;
pub mod parser;
pub mod prompt;
pub mod scanner;

mod commands;

use clap::Parser;
use std::process::ExitCode;

use commands::Cli;

pub use error::{Error, Result};
pub use parser::{
    extract_metadata, parse_generation_parameters, reconstruct_infotext, FieldValue,
    MetadataRecord,
};

/// Entry point of the `forge-infotext` binary.
pub fn run() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match commands::dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
