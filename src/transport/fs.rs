use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder};
use tracing::warn;

use crate::constants::loader::{FIELD_COUNT, FIELD_DELIMITER, NULL_TOKENS, SKIP_MALFORMED_MSG};
use crate::data::StreamRecord;
use crate::errors::ChartError;
use crate::metrics::IngestStats;

/// Lazy reader over a pipe-delimited stream log.
///
/// Yields one [`StreamRecord`] per well-formed line without materializing the file.
/// Lines with the wrong number of fields or invalid UTF-8 are skipped with a warning;
/// an I/O failure ends the scan with [`ChartError::Read`].
pub struct RecordReader<R: Read> {
    reader: csv::Reader<R>,
    buffer: ByteRecord,
    path: PathBuf,
    stats: IngestStats,
    failed: bool,
}

impl RecordReader<File> {
    /// Open `path` for a lazy scan.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChartError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ChartError::InputUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file, path))
    }
}

impl<R: Read> RecordReader<R> {
    /// Scan an arbitrary byte source; `path` is only used in diagnostics.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);
        Self {
            reader,
            buffer: ByteRecord::new(),
            path: path.into(),
            stats: IngestStats::default(),
            failed: false,
        }
    }

    /// Counters for the lines consumed so far.
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    fn parse_current(&self) -> Result<StreamRecord, String> {
        if self.buffer.len() != FIELD_COUNT {
            return Err(format!(
                "expected {FIELD_COUNT} fields, found {}",
                self.buffer.len()
            ));
        }
        let mut fields = Vec::with_capacity(FIELD_COUNT);
        for (idx, raw) in self.buffer.iter().enumerate() {
            let text = std::str::from_utf8(raw)
                .map_err(|err| format!("field {} is not valid UTF-8: {err}", idx + 1))?;
            fields.push(normalize_field(text));
        }
        let country = fields.pop().flatten();
        let user_id = fields.pop().flatten();
        let song_id = fields.pop().flatten();
        Ok(StreamRecord {
            song_id,
            user_id,
            country,
        })
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<StreamRecord, ChartError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.reader.read_byte_record(&mut self.buffer) {
                Ok(false) => return None,
                Ok(true) => {
                    self.stats.lines_read += 1;
                    match self.parse_current() {
                        Ok(record) => return Some(Ok(record)),
                        Err(reason) => {
                            self.stats.malformed += 1;
                            let line = self
                                .buffer
                                .position()
                                .map(|pos| pos.line())
                                .unwrap_or(self.stats.lines_read);
                            warn!(
                                "[top_songs:load] {} {}:{}: {}",
                                SKIP_MALFORMED_MSG,
                                self.path.display(),
                                line,
                                reason
                            );
                        }
                    }
                }
                Err(err) if err.is_io_error() => {
                    self.failed = true;
                    return Some(Err(ChartError::Read {
                        path: self.path.clone(),
                        source: err,
                    }));
                }
                Err(err) => {
                    self.stats.lines_read += 1;
                    self.stats.malformed += 1;
                    warn!(
                        "[top_songs:load] {} {}: {}",
                        SKIP_MALFORMED_MSG,
                        self.path.display(),
                        err
                    );
                }
            }
        }
    }
}

/// Map recognized null tokens to `None`; every other value is kept verbatim.
pub fn normalize_field(raw: &str) -> Option<String> {
    if NULL_TOKENS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Read the whole stream log into memory.
pub fn load_records(
    path: impl AsRef<Path>,
) -> Result<(Vec<StreamRecord>, IngestStats), ChartError> {
    let mut reader = RecordReader::open(path)?;
    let records = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
    Ok((records, reader.stats()))
}
