use std::path::PathBuf;

use rayon::ThreadPool;
use tracing::info;

use super::spill::SpillWriter;
use super::{Candidate, CountTable, RecordStream, TopKAggregator, rank_partitions, worker_pool};
use crate::config::{ExecutionConfig, Strategy};
use crate::constants::aggregate::{
    DEFAULT_CHUNK_SIZE, DEFAULT_SPILL_BUCKETS, DEFAULT_SPILL_THRESHOLD,
};
use crate::data::{PartitionColumn, TopKEntry, ValidRecord};
use crate::errors::ChartError;
use crate::types::PartitionKey;

/// Bounded-memory aggregation.
///
/// Records are pulled `chunk_size` at a time and folded into a count table of
/// distinct `(partition, song)` groups. Whenever that table reaches
/// `spill_threshold` groups it is moved to hash-bucketed spill files. On merge no
/// spill file is read back while it holds more than `spill_threshold` rows, and
/// selection keeps at most `k` candidates per partition in a min-heap.
pub struct StreamingAggregator {
    chunk_size: usize,
    spill_threshold: usize,
    spill_buckets: usize,
    spill_dir: Option<PathBuf>,
    pool: Option<ThreadPool>,
}

impl StreamingAggregator {
    /// Aggregator with default chunking and spill settings on the global rayon pool.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            spill_buckets: DEFAULT_SPILL_BUCKETS,
            spill_dir: None,
            pool: None,
        }
    }

    /// Aggregator built from the streaming settings of `config`.
    pub fn from_config(config: &ExecutionConfig) -> Result<Self, ChartError> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            spill_threshold: config.spill_threshold,
            spill_buckets: config.spill_buckets,
            spill_dir: config.spill_dir.clone(),
            pool: worker_pool(config.worker_threads)?,
        })
    }

    fn ingest_chunk(
        &self,
        table: &mut CountTable,
        chunk: &mut Vec<ValidRecord>,
        partition: PartitionColumn,
        spill: &mut Option<SpillWriter>,
    ) -> Result<(), ChartError> {
        for record in chunk.drain(..) {
            table.add_record(record, partition);
        }
        if table.groups() < self.spill_threshold {
            return Ok(());
        }
        if spill.is_none() {
            *spill = Some(SpillWriter::create(
                self.spill_dir.as_deref(),
                self.spill_buckets,
            )?);
        }
        if let Some(writer) = spill.as_mut() {
            writer.spill(table)?;
        }
        Ok(())
    }
}

impl Default for StreamingAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TopKAggregator for StreamingAggregator {
    fn strategy(&self) -> Strategy {
        Strategy::Streaming
    }

    fn aggregate(
        &self,
        records: &mut RecordStream<'_>,
        partition: PartitionColumn,
        k: usize,
    ) -> Result<Vec<TopKEntry>, ChartError> {
        let mut table = CountTable::default();
        let mut spill: Option<SpillWriter> = None;
        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut chunks = 0usize;

        for record in records {
            chunk.push(record?);
            if chunk.len() == self.chunk_size {
                self.ingest_chunk(&mut table, &mut chunk, partition, &mut spill)?;
                chunks += 1;
            }
        }
        if !chunk.is_empty() {
            self.ingest_chunk(&mut table, &mut chunk, partition, &mut spill)?;
            chunks += 1;
        }

        let partitions: Vec<(PartitionKey, Vec<Candidate>)> = match spill {
            None => {
                info!(
                    "[top_songs:aggregate] streaming {}: chunks={} groups={} partitions={} spills=0",
                    partition,
                    chunks,
                    table.groups(),
                    table.partitions()
                );
                table.into_bounded_candidates(k).collect()
            }
            Some(mut writer) => {
                if !table.is_empty() {
                    writer.spill(&mut table)?;
                }
                let spills = writer.spills();
                let (partitions, merge) = writer
                    .finish()?
                    .into_top_k(k, self.spill_threshold)?;
                info!(
                    "[top_songs:aggregate] streaming {}: chunks={} partitions={} spills={} splits={} peak_groups={}",
                    partition,
                    chunks,
                    partitions.len(),
                    spills,
                    merge.splits,
                    merge.peak_groups
                );
                partitions
            }
        };
        Ok(rank_partitions(partitions, k, self.pool.as_ref()))
    }
}
