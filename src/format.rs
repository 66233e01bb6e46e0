//! Pure rendering of ranked entries into artifact contents.

use std::io;

use serde::Serialize;

use crate::constants::output::{
    COUNTRY_ARTIFACT_EXT, ENTRY_TERMINATOR, PARTITION_SEPARATOR, RANK_SEPARATOR,
    USERS_ARTIFACT_EXT, USERS_ARTIFACT_PREFIX,
};
use crate::data::TopKEntry;
use crate::errors::ChartError;
use crate::types::{SongId, StreamCount, UserId};

/// Header of the combined user artifact.
pub const USER_CSV_HEADER: [&str; 3] = ["user_id", "song_id", "stream_count"];

/// A file to be written: bare file name plus full contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Bare file name, joined onto the output directory.
    pub file_name: String,
    /// Exact bytes to write.
    pub contents: Vec<u8>,
}

/// One row of the combined user artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserStreamRow {
    /// User the row belongs to.
    pub user_id: UserId,
    /// One of the user's top songs.
    pub song_id: SongId,
    /// Times the user streamed it.
    pub stream_count: StreamCount,
}

/// Split aggregator output into its per-partition runs.
///
/// Expects entries grouped by partition key, as every aggregator returns them.
pub fn partitions(entries: &[TopKEntry]) -> impl Iterator<Item = &[TopKEntry]> {
    entries.chunk_by(|left, right| left.partition_key == right.partition_key)
}

/// Render `"{key}|{song}:{rank},{song}:{rank},"` with entries in rank order.
pub fn country_line(partition_key: &str, entries: &[TopKEntry]) -> String {
    let mut ranked: Vec<&TopKEntry> = entries.iter().collect();
    ranked.sort_by_key(|entry| entry.rank);
    let mut line = String::with_capacity(partition_key.len() + 1 + ranked.len() * 12);
    line.push_str(partition_key);
    line.push(PARTITION_SEPARATOR);
    for entry in ranked {
        line.push_str(&entry.song_id);
        line.push(RANK_SEPARATOR);
        line.push_str(&entry.rank.to_string());
        line.push(ENTRY_TERMINATOR);
    }
    line
}

/// File name of a country artifact.
pub fn country_artifact_name(partition_key: &str, k: usize, date: &str) -> String {
    format!("{partition_key}_top{k}_{date}.{COUNTRY_ARTIFACT_EXT}")
}

/// File name of the combined user artifact.
pub fn users_artifact_name(k: usize, date: &str) -> String {
    format!("{USERS_ARTIFACT_PREFIX}_top{k}_{date}.{USERS_ARTIFACT_EXT}")
}

/// One artifact per country partition; no trailing newline.
pub fn country_artifacts(entries: &[TopKEntry], k: usize, date: &str) -> Vec<Artifact> {
    partitions(entries)
        .map(|group| {
            let partition_key = &group[0].partition_key;
            Artifact {
                file_name: country_artifact_name(partition_key, k, date),
                contents: country_line(partition_key, group).into_bytes(),
            }
        })
        .collect()
}

/// Flatten user entries into rows: users ascending, each user's songs by descending count.
pub fn user_rows(entries: &[TopKEntry]) -> Vec<UserStreamRow> {
    let mut ranked: Vec<&TopKEntry> = entries.iter().collect();
    ranked.sort_by(|left, right| {
        left.partition_key
            .cmp(&right.partition_key)
            .then(left.rank.cmp(&right.rank))
    });
    ranked
        .into_iter()
        .map(|entry| UserStreamRow {
            user_id: entry.partition_key.clone(),
            song_id: entry.song_id.clone(),
            stream_count: entry.count,
        })
        .collect()
}

/// Render rows as CSV with a header line and no index column.
pub fn render_user_csv(rows: &[UserStreamRow]) -> Result<Vec<u8>, ChartError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(USER_CSV_HEADER).map_err(io::Error::from)?;
    for row in rows {
        writer.serialize(row).map_err(io::Error::from)?;
    }
    writer
        .into_inner()
        .map_err(|err| ChartError::Io(err.into_error()))
}

/// The combined user artifact.
pub fn users_artifact(entries: &[TopKEntry], k: usize, date: &str) -> Result<Artifact, ChartError> {
    Ok(Artifact {
        file_name: users_artifact_name(k, date),
        contents: render_user_csv(&user_rows(entries))?,
    })
}
