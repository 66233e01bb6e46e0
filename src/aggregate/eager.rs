use rayon::ThreadPool;
use tracing::info;

use super::{CountTable, RecordStream, TopKAggregator, rank_partitions, worker_pool};
use crate::config::Strategy;
use crate::data::{PartitionColumn, TopKEntry};
use crate::errors::ChartError;

/// In-memory aggregation: one full count table, then a full sort per partition.
pub struct EagerAggregator {
    pool: Option<ThreadPool>,
}

impl EagerAggregator {
    /// Aggregator ranking partitions on the global rayon pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Aggregator ranking partitions on a pool capped at `threads` workers.
    pub fn with_worker_threads(threads: Option<usize>) -> Result<Self, ChartError> {
        Ok(Self {
            pool: worker_pool(threads)?,
        })
    }
}

impl Default for EagerAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TopKAggregator for EagerAggregator {
    fn strategy(&self) -> Strategy {
        Strategy::Eager
    }

    fn aggregate(
        &self,
        records: &mut RecordStream<'_>,
        partition: PartitionColumn,
        k: usize,
    ) -> Result<Vec<TopKEntry>, ChartError> {
        let mut table = CountTable::default();
        for record in records {
            table.add_record(record?, partition);
        }
        info!(
            "[top_songs:aggregate] eager {}: groups={} partitions={}",
            partition,
            table.groups(),
            table.partitions()
        );
        let partitions = table.into_candidates().collect();
        Ok(rank_partitions(partitions, k, self.pool.as_ref()))
    }
}
