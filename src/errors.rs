use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for loading, aggregation, and artifact persistence failures.
///
/// Row-level problems (malformed lines, quality rejections) are never surfaced
/// here; they are counted and logged by the loader and filter.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("load: input '{}' is unavailable: {source}", path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("load: failed reading '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("load: cannot derive a date token from '{file_name}': {reason}")]
    DateToken { file_name: String, reason: String },
    #[error("write: failed writing artifact '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("spill: failed on spill file '{}': {details}", path.display())]
    Spill { path: PathBuf, details: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
