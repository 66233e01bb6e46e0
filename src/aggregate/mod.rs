//! Top-K per partition aggregation.
//!
//! Both strategies run the same two stages: count stream events per
//! `(partition, song)` group, then keep the K best groups of every partition.
//! They differ only in how much state they hold while doing so:
//! - [`EagerAggregator`] keeps the full count table and fully sorts each partition.
//! - [`StreamingAggregator`] ingests fixed-size chunks, spills the count table to
//!   disk past a threshold, and selects with a size-K heap per partition.
//!
//! Ranking always goes through [`Candidate`]'s ordering (higher count first, then
//! ascending song id), so both strategies emit identical entries.

use std::cmp::{Ordering, Reverse};
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::{ExecutionConfig, Strategy};
use crate::data::{GroupCount, PartitionColumn, TopKEntry, ValidRecord};
use crate::errors::ChartError;
use crate::types::{PartitionKey, SongId, StreamCount};

mod eager;
mod spill;
mod streaming;

pub use eager::EagerAggregator;
pub use streaming::StreamingAggregator;

/// Fallible stream of quality-checked records consumed by an aggregator.
pub type RecordStream<'a> = dyn Iterator<Item = Result<ValidRecord, ChartError>> + 'a;

/// Count-then-top-K aggregation over valid records.
pub trait TopKAggregator {
    /// Strategy implemented by this aggregator.
    fn strategy(&self) -> Strategy;

    /// Rank the `k` most-streamed songs of every partition of `partition`.
    ///
    /// Entries are returned grouped by ascending partition key, each group in rank
    /// order. Partitions with fewer than `k` songs yield fewer entries; an empty
    /// stream yields an empty result.
    fn aggregate(
        &self,
        records: &mut RecordStream<'_>,
        partition: PartitionColumn,
        k: usize,
    ) -> Result<Vec<TopKEntry>, ChartError>;
}

/// Build the aggregator selected by `config`.
pub fn aggregator_for(config: &ExecutionConfig) -> Result<Box<dyn TopKAggregator>, ChartError> {
    config.validate()?;
    let aggregator: Box<dyn TopKAggregator> = match config.strategy {
        Strategy::Eager => Box::new(EagerAggregator::with_worker_threads(
            config.worker_threads,
        )?),
        Strategy::Streaming => Box::new(StreamingAggregator::from_config(config)?),
    };
    Ok(aggregator)
}

/// One song competing for a place in a partition chart.
///
/// `Ord` puts the better-ranked candidate last: a higher count wins, and on equal
/// counts the lexicographically smaller song id wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Competing song.
    pub song_id: SongId,
    /// Its stream count within the partition.
    pub count: StreamCount,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| other.song_id.cmp(&self.song_id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rank order: best candidate first.
pub fn rank_order(left: &Candidate, right: &Candidate) -> Ordering {
    right.cmp(left)
}

/// Size-bounded min-heap keeping the `k` best candidates seen so far.
pub(crate) struct BoundedTopK {
    k: usize,
    heap: BinaryHeap<Reverse<Candidate>>,
}

impl BoundedTopK {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k),
        }
    }

    pub(crate) fn push(&mut self, candidate: Candidate) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
            return;
        }
        let beats_worst = self
            .heap
            .peek()
            .is_some_and(|Reverse(worst)| candidate > *worst);
        if beats_worst {
            self.heap.pop();
            self.heap.push(Reverse(candidate));
        }
    }

    pub(crate) fn into_candidates(self) -> Vec<Candidate> {
        self.heap.into_iter().map(|Reverse(candidate)| candidate).collect()
    }
}

/// Stream counts per partition, then per song.
#[derive(Debug, Default)]
pub(crate) struct CountTable {
    partitions: HashMap<PartitionKey, HashMap<SongId, StreamCount>>,
    groups: usize,
}

impl CountTable {
    pub(crate) fn add(&mut self, partition_key: PartitionKey, song_id: SongId, count: StreamCount) {
        let songs = self.partitions.entry(partition_key).or_default();
        match songs.entry(song_id) {
            Entry::Occupied(mut slot) => *slot.get_mut() += count,
            Entry::Vacant(slot) => {
                slot.insert(count);
                self.groups += 1;
            }
        }
    }

    pub(crate) fn add_record(&mut self, record: ValidRecord, partition: PartitionColumn) {
        let (partition_key, song_id) = partition.group_of(record);
        self.add(partition_key, song_id, 1);
    }

    /// Distinct `(partition, song)` groups held.
    pub(crate) fn groups(&self) -> usize {
        self.groups
    }

    pub(crate) fn partitions(&self) -> usize {
        self.partitions.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups == 0
    }

    /// Empty the table, yielding every group.
    pub(crate) fn drain_groups(&mut self) -> impl Iterator<Item = GroupCount> + '_ {
        self.groups = 0;
        self.partitions.drain().flat_map(|(partition_key, songs)| {
            songs.into_iter().map(move |(song_id, count)| GroupCount {
                partition_key: partition_key.clone(),
                song_id,
                count,
            })
        })
    }

    /// Every partition with all of its candidates.
    pub(crate) fn into_candidates(self) -> impl Iterator<Item = (PartitionKey, Vec<Candidate>)> {
        self.partitions.into_iter().map(|(partition_key, songs)| {
            let candidates = songs
                .into_iter()
                .map(|(song_id, count)| Candidate { song_id, count })
                .collect();
            (partition_key, candidates)
        })
    }

    /// Every partition with only its `k` best candidates.
    pub(crate) fn into_bounded_candidates(
        self,
        k: usize,
    ) -> impl Iterator<Item = (PartitionKey, Vec<Candidate>)> {
        self.partitions.into_iter().map(move |(partition_key, songs)| {
            let mut top = BoundedTopK::new(k);
            for (song_id, count) in songs {
                top.push(Candidate { song_id, count });
            }
            (partition_key, top.into_candidates())
        })
    }
}

/// Build a rayon pool capped at `threads`, or `None` to use the global pool.
pub(crate) fn worker_pool(threads: Option<usize>) -> Result<Option<ThreadPool>, ChartError> {
    let Some(threads) = threads else {
        return Ok(None);
    };
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|idx| format!("top-songs-rank-{idx}"))
        .build()
        .map(Some)
        .map_err(|err| ChartError::Configuration(format!("failed to build worker pool: {err}")))
}

/// Sort, truncate, and rank every partition.
///
/// Output is ordered by ascending partition key, then rank.
pub(crate) fn rank_partitions(
    mut partitions: Vec<(PartitionKey, Vec<Candidate>)>,
    k: usize,
    pool: Option<&ThreadPool>,
) -> Vec<TopKEntry> {
    partitions.sort_unstable_by(|left, right| left.0.cmp(&right.0));
    let rank_all = move || {
        partitions
            .into_par_iter()
            .map(|(partition_key, candidates)| rank_partition(partition_key, candidates, k))
            .collect::<Vec<_>>()
    };
    let ranked = match pool {
        Some(pool) => pool.install(rank_all),
        None => rank_all(),
    };
    ranked.into_iter().flatten().collect()
}

fn rank_partition(
    partition_key: PartitionKey,
    mut candidates: Vec<Candidate>,
    k: usize,
) -> Vec<TopKEntry> {
    candidates.sort_unstable_by(rank_order);
    candidates.truncate(k);
    candidates
        .into_iter()
        .enumerate()
        .map(|(idx, candidate)| TopKEntry {
            partition_key: partition_key.clone(),
            song_id: candidate.song_id,
            count: candidate.count,
            rank: idx + 1,
        })
        .collect()
}
