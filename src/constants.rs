/// Constants used by the delimited record loader.
pub mod loader {
    /// Field delimiter of the stream log.
    pub const FIELD_DELIMITER: u8 = b'|';
    /// Number of fields every stream line must carry (`song_id`, `user_id`, `country`).
    pub const FIELD_COUNT: usize = 3;
    /// Raw field values normalized to a null value instead of being kept as text.
    pub const NULL_TOKENS: [&str; 6] = ["NaN", "null", "nan", "Nan", "NA", ""];
    /// Log message used when a malformed line is skipped.
    pub const SKIP_MALFORMED_MSG: &str = "skipping malformed stream line";
}

/// Constants used by the quality filter.
pub mod quality {
    /// Required length (in characters) of a country code.
    pub const COUNTRY_CODE_LEN: usize = 2;
    /// Characters a country code may not contain; it becomes part of a file name.
    pub const FORBIDDEN_COUNTRY_CHARS: [char; 3] = ['/', '\\', '\0'];
}

/// Constants used by the top-K aggregators.
pub mod aggregate {
    /// Number of ranked songs kept per partition.
    pub const DEFAULT_TOP_K: usize = 50;
    /// Rows ingested per chunk by the streaming strategy.
    pub const DEFAULT_CHUNK_SIZE: usize = 100;
    /// Distinct `(partition, song)` groups held in memory before the streaming
    /// strategy spills its count table to disk.
    pub const DEFAULT_SPILL_THRESHOLD: usize = 1_000_000;
    /// Number of hash buckets spill files are partitioned into.
    pub const DEFAULT_SPILL_BUCKETS: usize = 16;
    /// Seed mixed into partition-key hashing when choosing a spill bucket.
    pub const SPILL_BUCKET_SEED: u64 = 0x70F5_0A95;
    /// Most files one oversized spill file is re-partitioned into per pass.
    pub const MAX_SPLIT_FANOUT: usize = 64;
    /// Deepest re-partitioning level before a spill file is merged regardless of size.
    pub const MAX_SPLIT_DEPTH: usize = 16;
    /// Prefix of the temporary spill directory.
    pub const SPILL_DIR_PREFIX: &str = "top_songs-spill";
    /// Worker threads used by the low-memory configuration.
    pub const LOW_MEMORY_WORKER_THREADS: usize = 1;
}

/// Constants used by artifact naming and rendering.
pub mod output {
    /// Separator between the partition key and its ranked entries in a country line.
    pub const PARTITION_SEPARATOR: char = '|';
    /// Separator between a song id and its rank in a country line.
    pub const RANK_SEPARATOR: char = ':';
    /// Terminator written after every ranked entry in a country line.
    pub const ENTRY_TERMINATOR: char = ',';
    /// File extension of per-country artifacts.
    pub const COUNTRY_ARTIFACT_EXT: &str = "txt";
    /// Name prefix of the combined per-user artifact.
    pub const USERS_ARTIFACT_PREFIX: &str = "users";
    /// File extension of the combined per-user artifact.
    pub const USERS_ARTIFACT_EXT: &str = "csv";
    /// Separator preceding the date token in an input file name.
    pub const DATE_TOKEN_SEPARATOR: char = '-';
}
