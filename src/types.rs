/// Song identifier as it appears in the stream log.
/// Example: `song_4821`
pub type SongId = String;
/// User identifier as it appears in the stream log.
/// Example: `user_17`
pub type UserId = String;
/// Two-character country code.
/// Examples: `US`, `FR`
pub type CountryCode = String;
/// Value of the grouping column a chart is computed for (a country code or a user id).
/// Examples: `US`, `user_17`
pub type PartitionKey = String;
/// Run-identifying token extracted from the input file name.
/// Example: `20230101`
pub type DateToken = String;
/// Number of stream events counted for one `(partition, song)` pair.
pub type StreamCount = u64;
