use std::path::PathBuf;

use crate::constants::aggregate::{
    DEFAULT_CHUNK_SIZE, DEFAULT_SPILL_BUCKETS, DEFAULT_SPILL_THRESHOLD, DEFAULT_TOP_K,
    LOW_MEMORY_WORKER_THREADS,
};
use crate::errors::ChartError;

/// Execution strategy used to compute the charts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Load every valid record into memory, then count and fully sort each partition.
    #[default]
    Eager,
    /// Ingest the input in chunks and keep only bounded per-partition state.
    Streaming,
}

impl Strategy {
    /// Stable lowercase name used in logs and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Eager => "eager",
            Strategy::Streaming => "streaming",
        }
    }
}

/// Top-level run configuration.
///
/// Passed explicitly into the pipeline and the aggregator factory; nothing here is
/// read from or written to the process environment.
#[derive(Clone, Debug)]
pub struct ExecutionConfig {
    /// Strategy used to aggregate records.
    pub strategy: Strategy,
    /// Number of ranked songs kept per partition.
    pub top_k: usize,
    /// Rows ingested per chunk by the streaming strategy.
    pub chunk_size: usize,
    /// Cap on the worker pool used for per-partition ranking (`None` = rayon default).
    pub worker_threads: Option<usize>,
    /// Distinct groups held in memory before the streaming strategy spills to disk.
    pub spill_threshold: usize,
    /// Number of hash buckets spill files are partitioned into.
    pub spill_buckets: usize,
    /// Directory that receives spill files (`None` = system temp directory).
    pub spill_dir: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Eager,
            top_k: DEFAULT_TOP_K,
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_threads: None,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            spill_buckets: DEFAULT_SPILL_BUCKETS,
            spill_dir: None,
        }
    }
}

impl ExecutionConfig {
    /// Config for the eager, in-memory strategy.
    pub fn eager() -> Self {
        Self::default()
    }

    /// Config for the streaming strategy running on a single worker.
    pub fn low_memory() -> Self {
        Self {
            strategy: Strategy::Streaming,
            worker_threads: Some(LOW_MEMORY_WORKER_THREADS),
            ..Self::default()
        }
    }

    /// Override the execution strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Override the number of ranked songs kept per partition.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Override the streaming chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Cap the ranking worker pool.
    pub fn with_worker_threads(mut self, worker_threads: Option<usize>) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Override the spill threshold of the streaming strategy.
    pub fn with_spill_threshold(mut self, spill_threshold: usize) -> Self {
        self.spill_threshold = spill_threshold;
        self
    }

    /// Override the number of spill buckets.
    pub fn with_spill_buckets(mut self, spill_buckets: usize) -> Self {
        self.spill_buckets = spill_buckets;
        self
    }

    /// Place spill files under `dir` instead of the system temp directory.
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    /// Reject settings no strategy can run with.
    pub fn validate(&self) -> Result<(), ChartError> {
        if self.top_k == 0 {
            return Err(ChartError::Configuration(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ChartError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(ChartError::Configuration(
                "worker_threads must be greater than zero when set".to_string(),
            ));
        }
        if self.spill_threshold == 0 {
            return Err(ChartError::Configuration(
                "spill_threshold must be greater than zero".to_string(),
            ));
        }
        if self.spill_buckets == 0 {
            return Err(ChartError::Configuration(
                "spill_buckets must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_eager() {
        let config = ExecutionConfig::default();
        assert_eq!(config.strategy, Strategy::Eager);
        assert_eq!(config.top_k, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn low_memory_runs_streaming_on_one_worker() {
        let config = ExecutionConfig::low_memory();
        assert_eq!(config.strategy, Strategy::Streaming);
        assert_eq!(config.worker_threads, Some(1));
        assert_eq!(config.chunk_size, 100);
    }

    #[test]
    fn validate_rejects_zero_settings() {
        let cases = [
            ExecutionConfig::default().with_top_k(0),
            ExecutionConfig::default().with_chunk_size(0),
            ExecutionConfig::default().with_worker_threads(Some(0)),
            ExecutionConfig::default().with_spill_threshold(0),
            ExecutionConfig::default().with_spill_buckets(0),
        ];
        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(ChartError::Configuration(_))
            ));
        }
    }
}
