//! Artifact persistence and date-token derivation.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::constants::output::DATE_TOKEN_SEPARATOR;
use crate::errors::ChartError;
use crate::format::Artifact;
use crate::types::DateToken;

/// Derive the run's date token from the input file name.
///
/// The directory is dropped, the name is cut at its first `.`, and the text after
/// the last `-` is returned (`sample_data-20230101.log` → `20230101`). Names without
/// a `-`, or with nothing after it, are rejected.
pub fn extract_date(path: impl AsRef<Path>) -> Result<DateToken, ChartError> {
    let path = path.as_ref();
    let Some(file_name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return Err(ChartError::DateToken {
            file_name: path.display().to_string(),
            reason: "path has no file name".to_string(),
        });
    };
    let stem = file_name.split('.').next().unwrap_or_default();
    let Some((_, token)) = stem.rsplit_once(DATE_TOKEN_SEPARATOR) else {
        return Err(ChartError::DateToken {
            file_name: file_name.to_string(),
            reason: format!("no '{DATE_TOKEN_SEPARATOR}' before the extension"),
        });
    };
    if token.is_empty() {
        return Err(ChartError::DateToken {
            file_name: file_name.to_string(),
            reason: format!("nothing follows the last '{DATE_TOKEN_SEPARATOR}'"),
        });
    }
    Ok(token.to_string())
}

/// Writes artifacts into one output directory, overwriting same-named files.
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    /// Prepare `output_dir`, creating it when missing.
    pub fn create(output_dir: impl Into<PathBuf>) -> Result<Self, ChartError> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|source| ChartError::Write {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self { output_dir })
    }

    /// Directory artifacts are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `artifact`, returning its full path.
    ///
    /// File names must be a single plain path component.
    pub fn write(&self, artifact: &Artifact) -> Result<PathBuf, ChartError> {
        let path = self.output_dir.join(&artifact.file_name);
        if !is_plain_file_name(&artifact.file_name) {
            return Err(ChartError::Write {
                path,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "artifact name is not a plain file name",
                ),
            });
        }
        fs::write(&path, &artifact.contents).map_err(|source| ChartError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(
            "[top_songs:write] wrote {} ({} bytes)",
            path.display(),
            artifact.contents.len()
        );
        Ok(path)
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
