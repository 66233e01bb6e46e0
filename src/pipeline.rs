//! Loader → filter → aggregator → formatter → writer.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::aggregate::{TopKAggregator, aggregator_for};
use crate::config::{ExecutionConfig, Strategy};
use crate::data::{PartitionColumn, TopKEntry};
use crate::errors::ChartError;
use crate::format::{self, Artifact};
use crate::metrics::IngestStats;
use crate::output::{ArtifactWriter, extract_date};
use crate::quality::{self, QualityFilter};
use crate::transport::fs::{RecordReader, load_records};
use crate::types::DateToken;

/// Grouping columns computed by every run, in output order.
pub const CHART_COLUMNS: [PartitionColumn; 2] = [PartitionColumn::Country, PartitionColumn::User];

/// Ranked entries of both groupings for one input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Charts {
    /// Per-country entries, grouped by ascending country.
    pub country: Vec<TopKEntry>,
    /// Per-user entries, grouped by ascending user id.
    pub users: Vec<TopKEntry>,
    /// Row counters of the input scan.
    pub ingest: IngestStats,
}

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Strategy the run executed with.
    pub strategy: Strategy,
    /// Date token embedded in artifact names.
    pub date: DateToken,
    /// Row counters of the input scan.
    pub ingest: IngestStats,
    /// Number of country artifacts written.
    pub country_artifacts: usize,
    /// Data rows in the user artifact.
    pub user_rows: usize,
    /// Every artifact written, in write order.
    pub artifacts: Vec<PathBuf>,
}

/// Compute both charts for `input` with the strategy selected by `config`.
///
/// The eager strategy loads the file once and aggregates the in-memory rows for
/// each grouping; the streaming strategy rescans the file per grouping.
pub fn compute_charts(input: &Path, config: &ExecutionConfig) -> Result<Charts, ChartError> {
    let aggregator = aggregator_for(config)?;
    match config.strategy {
        Strategy::Eager => eager_charts(input, aggregator.as_ref(), config.top_k),
        Strategy::Streaming => streaming_charts(input, aggregator.as_ref(), config.top_k),
    }
}

fn eager_charts(
    input: &Path,
    aggregator: &dyn TopKAggregator,
    k: usize,
) -> Result<Charts, ChartError> {
    let (records, mut ingest) = load_records(input)?;
    let (valid, rejected) = quality::filter_records(records);
    ingest.rejected = rejected;
    ingest.accepted = valid.len() as u64;
    info!("[top_songs:load] {}: {}", input.display(), ingest);

    let mut charts = Charts {
        ingest,
        ..Charts::default()
    };
    for column in CHART_COLUMNS {
        let mut stream = valid.iter().cloned().map(Ok::<_, ChartError>);
        let entries = aggregator.aggregate(&mut stream, column, k)?;
        charts.set(column, entries);
    }
    Ok(charts)
}

fn streaming_charts(
    input: &Path,
    aggregator: &dyn TopKAggregator,
    k: usize,
) -> Result<Charts, ChartError> {
    let mut charts = Charts::default();
    for (pass, column) in CHART_COLUMNS.into_iter().enumerate() {
        let mut records = QualityFilter::new(RecordReader::open(input)?);
        let entries = aggregator.aggregate(&mut records, column, k)?;
        if pass == 0 {
            charts.ingest = IngestStats {
                rejected: records.rejected(),
                accepted: records.accepted(),
                ..records.get_ref().stats()
            };
            info!("[top_songs:load] {}: {}", input.display(), charts.ingest);
        }
        charts.set(column, entries);
    }
    Ok(charts)
}

impl Charts {
    fn set(&mut self, column: PartitionColumn, entries: Vec<TopKEntry>) {
        match column {
            PartitionColumn::Country => self.country = entries,
            PartitionColumn::User => self.users = entries,
        }
    }

    /// Render every artifact of this run; country artifacts first.
    pub fn artifacts(&self, k: usize, date: &str) -> Result<Vec<Artifact>, ChartError> {
        let mut artifacts = format::country_artifacts(&self.country, k, date);
        artifacts.push(format::users_artifact(&self.users, k, date)?);
        Ok(artifacts)
    }
}

/// Run the whole pipeline for `input`, writing artifacts into `output_dir`.
///
/// Nothing is written unless the date token can be derived and the input is fully
/// aggregated. The first failed write aborts the run; artifacts written before it
/// are left in place.
pub fn run(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExecutionConfig,
) -> Result<RunSummary, ChartError> {
    let input = input.as_ref();
    config.validate()?;
    let date = extract_date(input)?;
    info!(
        "[top_songs:run] {} run over {} (date={}, k={})",
        config.strategy.name(),
        input.display(),
        date,
        config.top_k
    );

    let charts = compute_charts(input, config)?;
    let artifacts = charts.artifacts(config.top_k, &date)?;

    let writer = ArtifactWriter::create(output_dir.as_ref())?;
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        written.push(writer.write(artifact)?);
    }
    info!(
        "[top_songs:write] wrote {} artifacts to {}",
        written.len(),
        writer.output_dir().display()
    );

    Ok(RunSummary {
        strategy: config.strategy,
        date,
        ingest: charts.ingest,
        country_artifacts: artifacts.len() - 1,
        user_rows: charts.users.len(),
        artifacts: written,
    })
}
