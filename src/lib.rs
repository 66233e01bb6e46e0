#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Count-then-top-K aggregation strategies.
pub mod aggregate;
/// Command-line runner shared by the binary.
pub mod cli;
/// Run configuration types.
pub mod config;
/// Centralized constants used across loading, aggregation, and output.
pub mod constants;
/// Record, count, and ranked-entry types.
pub mod data;
/// Rendering of ranked entries into artifact contents.
pub mod format;
mod hash;
/// Row-level ingest counters.
pub mod metrics;
/// Artifact writer and date-token extraction.
pub mod output;
/// End-to-end chart computation.
pub mod pipeline;
/// Record validity rules.
pub mod quality;
/// Input transports used by the loader (filesystem today).
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use aggregate::{EagerAggregator, StreamingAggregator, TopKAggregator, aggregator_for};
pub use config::{ExecutionConfig, Strategy};
pub use data::{GroupCount, PartitionColumn, StreamRecord, TopKEntry, ValidRecord};
pub use errors::ChartError;
pub use format::{Artifact, UserStreamRow};
pub use metrics::IngestStats;
pub use output::{ArtifactWriter, extract_date};
pub use pipeline::{Charts, RunSummary, compute_charts, run};
pub use transport::fs::{RecordReader, load_records};
pub use types::{CountryCode, DateToken, PartitionKey, SongId, StreamCount, UserId};
