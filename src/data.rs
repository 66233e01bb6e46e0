use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::types::{CountryCode, PartitionKey, SongId, StreamCount, UserId};

/// One parsed stream line.
///
/// Null tokens (`NaN`, `null`, `NA`, empty, ...) are already normalized to `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRecord {
    /// Song identifier.
    pub song_id: Option<SongId>,
    /// User identifier.
    pub user_id: Option<UserId>,
    /// Country code, unchecked.
    pub country: Option<CountryCode>,
}

impl StreamRecord {
    /// Build a record from already-normalized fields.
    pub fn new(
        song_id: Option<impl Into<SongId>>,
        user_id: Option<impl Into<UserId>>,
        country: Option<impl Into<CountryCode>>,
    ) -> Self {
        Self {
            song_id: song_id.map(Into::into),
            user_id: user_id.map(Into::into),
            country: country.map(Into::into),
        }
    }
}

/// A record that passed the quality filter: no null field and a two-character country.
///
/// Only produced by [`crate::quality::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValidRecord {
    song_id: SongId,
    user_id: UserId,
    country: CountryCode,
}

impl ValidRecord {
    pub(crate) fn new(song_id: SongId, user_id: UserId, country: CountryCode) -> Self {
        Self {
            song_id,
            user_id,
            country,
        }
    }

    pub(crate) fn into_parts(self) -> (SongId, UserId, CountryCode) {
        (self.song_id, self.user_id, self.country)
    }

    /// Song identifier.
    pub fn song_id(&self) -> &str {
        &self.song_id
    }

    /// User identifier.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Two-character country code.
    pub fn country(&self) -> &str {
        &self.country
    }
}

/// Grouping column a chart is computed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartitionColumn {
    /// One chart per country code.
    Country,
    /// One chart per user id.
    User,
}

impl PartitionColumn {
    /// Column name as used in logs and the user artifact header.
    pub fn name(self) -> &'static str {
        match self {
            PartitionColumn::Country => "country",
            PartitionColumn::User => "user_id",
        }
    }

    /// Partition key of `record` under this column.
    pub fn key_of(self, record: &ValidRecord) -> &str {
        match self {
            PartitionColumn::Country => record.country(),
            PartitionColumn::User => record.user_id(),
        }
    }

    /// Consume `record` into its `(partition key, song id)` group.
    pub fn group_of(self, record: ValidRecord) -> (PartitionKey, SongId) {
        let (song_id, user_id, country) = record.into_parts();
        match self {
            PartitionColumn::Country => (country, song_id),
            PartitionColumn::User => (user_id, song_id),
        }
    }
}

impl fmt::Display for PartitionColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream count of one `(partition, song)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    /// Country code or user id.
    pub partition_key: PartitionKey,
    /// Counted song.
    pub song_id: SongId,
    /// Streams seen so far.
    pub count: StreamCount,
}

/// One ranked song of a partition chart.
///
/// `rank` is dense and 1-based within `partition_key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopKEntry {
    /// Country code or user id, depending on the grouping column.
    pub partition_key: PartitionKey,
    /// Ranked song.
    pub song_id: SongId,
    /// Streams of `song_id` within the partition.
    pub count: StreamCount,
    /// Position within the partition, starting at 1.
    pub rank: usize,
}
