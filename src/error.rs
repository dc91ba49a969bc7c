use std::path::PathBuf;

use thiserror::Error;

/// Conditions that abort the whole run. Everything record-level is a warning.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed KML in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: quick_xml::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no *.{extension} files found in {dir}")]
    NoInputs { dir: PathBuf, extension: String },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
