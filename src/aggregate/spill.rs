//! Hash-bucketed spill files for the streaming count table.
//!
//! Spills route every group by partition key, so a bucket holds whole partitions.
//! On merge, a file with more rows than the group budget is re-partitioned with a
//! fresh seed before it is read back. When one partition alone outgrows the budget,
//! its file is split by `(partition, song)` instead and the partition's candidates
//! are collected in a size-K heap that outlives the individual pieces.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, Writer, WriterBuilder};
use tempfile::TempDir;
use tracing::debug;

use super::{BoundedTopK, Candidate, CountTable};
use crate::constants::aggregate::{
    MAX_SPLIT_DEPTH, MAX_SPLIT_FANOUT, SPILL_BUCKET_SEED, SPILL_DIR_PREFIX,
};
use crate::constants::loader::FIELD_DELIMITER;
use crate::data::GroupCount;
use crate::errors::ChartError;
use crate::hash::{stable_bucket, stable_pair_bucket};
use crate::types::PartitionKey;

fn spill_error(path: &Path, err: impl std::fmt::Display) -> ChartError {
    ChartError::Spill {
        path: path.to_path_buf(),
        details: err.to_string(),
    }
}

/// Key a spill file is routed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SplitKey {
    /// Whole partitions stay in one file.
    Partition,
    /// Only single `(partition, song)` groups stay in one file.
    Group,
}

impl SplitKey {
    fn bucket(self, depth: usize, group: &GroupCount, buckets: usize) -> usize {
        let seed = SPILL_BUCKET_SEED.wrapping_add(depth as u64);
        match self {
            SplitKey::Partition => stable_bucket(seed, &group.partition_key, buckets),
            SplitKey::Group => {
                stable_pair_bucket(seed, &group.partition_key, &group.song_id, buckets)
            }
        }
    }
}

/// A closed spill file and the number of rows written to it.
struct SpillFile {
    path: PathBuf,
    rows: u64,
}

/// One open writer per bucket.
struct BucketFiles {
    files: Vec<SpillFile>,
    writers: Vec<Writer<File>>,
}

impl BucketFiles {
    fn create(dir: &Path, prefix: &str, buckets: usize) -> Result<Self, ChartError> {
        let mut files = Vec::with_capacity(buckets);
        let mut writers = Vec::with_capacity(buckets);
        for bucket in 0..buckets {
            let path = dir.join(format!("{prefix}-{bucket:04}.spill"));
            let writer = WriterBuilder::new()
                .has_headers(false)
                .delimiter(FIELD_DELIMITER)
                .from_path(&path)
                .map_err(|err| spill_error(&path, err))?;
            files.push(SpillFile { path, rows: 0 });
            writers.push(writer);
        }
        Ok(Self { files, writers })
    }

    fn len(&self) -> usize {
        self.writers.len()
    }

    fn write(&mut self, bucket: usize, group: &GroupCount) -> Result<(), ChartError> {
        let file = &mut self.files[bucket];
        self.writers[bucket]
            .serialize(group)
            .map_err(|err| spill_error(&file.path, err))?;
        file.rows += 1;
        Ok(())
    }

    fn finish(self) -> Result<Vec<SpillFile>, ChartError> {
        for (writer, file) in self.writers.into_iter().zip(&self.files) {
            writer
                .into_inner()
                .map_err(|err| spill_error(&file.path, err.error()))?;
        }
        Ok(self.files)
    }
}

fn open_reader(path: &Path) -> Result<Reader<File>, ChartError> {
    ReaderBuilder::new()
        .has_headers(false)
        .delimiter(FIELD_DELIMITER)
        .from_path(path)
        .map_err(|err| spill_error(path, err))
}

fn discard(files: &[SpillFile]) -> Result<(), ChartError> {
    for file in files {
        fs::remove_file(&file.path).map_err(|err| spill_error(&file.path, err))?;
    }
    Ok(())
}

/// Open spill files, one writer per bucket.
pub(crate) struct SpillWriter {
    dir: TempDir,
    buckets: BucketFiles,
    spills: usize,
    spilled_groups: u64,
}

impl SpillWriter {
    pub(crate) fn create(parent: Option<&Path>, buckets: usize) -> Result<Self, ChartError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SPILL_DIR_PREFIX);
        let dir = match parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .map_err(|err| spill_error(parent, err))?,
            None => builder
                .tempdir()
                .map_err(|err| spill_error(&std::env::temp_dir(), err))?,
        };
        let buckets = BucketFiles::create(dir.path(), "bucket", buckets)?;
        debug!(
            "[top_songs:spill] created {} spill buckets in {}",
            buckets.len(),
            dir.path().display()
        );
        Ok(Self {
            dir,
            buckets,
            spills: 0,
            spilled_groups: 0,
        })
    }

    /// Move every group of `table` to its bucket file, leaving `table` empty.
    pub(crate) fn spill(&mut self, table: &mut CountTable) -> Result<(), ChartError> {
        let buckets = self.buckets.len();
        let mut written = 0u64;
        for group in table.drain_groups() {
            let bucket = SplitKey::Partition.bucket(0, &group, buckets);
            self.buckets.write(bucket, &group)?;
            written += 1;
        }
        self.spills += 1;
        self.spilled_groups += written;
        debug!(
            "[top_songs:spill] spill #{} wrote {} groups",
            self.spills, written
        );
        Ok(())
    }

    /// Number of spills performed so far.
    pub(crate) fn spills(&self) -> usize {
        self.spills
    }

    /// Flush all writers and hand the bucket files over for merging.
    pub(crate) fn finish(self) -> Result<SpilledBuckets, ChartError> {
        let files = self.buckets.finish()?;
        debug!(
            "[top_songs:spill] finished after {} spills ({} groups)",
            self.spills, self.spilled_groups
        );
        Ok(SpilledBuckets {
            dir: self.dir,
            files,
        })
    }
}

/// Counters of one spill merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct MergeStats {
    /// Spill files read back into a count table.
    pub(crate) files_merged: usize,
    /// Re-partitioning passes over oversized files.
    pub(crate) splits: usize,
    /// Largest count table held at once.
    pub(crate) peak_groups: usize,
}

/// Closed spill files; removed from disk when dropped.
pub(crate) struct SpilledBuckets {
    dir: TempDir,
    files: Vec<SpillFile>,
}

impl SpilledBuckets {
    /// Select the `k` best candidates of every spilled partition.
    ///
    /// Files are read back once they hold at most `max_groups` rows, so no count
    /// table built here exceeds `max_groups` groups. Only a file still oversized
    /// after `MAX_SPLIT_DEPTH` passes, which takes rows of a single repeated group,
    /// is merged as is.
    pub(crate) fn into_top_k(
        self,
        k: usize,
        max_groups: usize,
    ) -> Result<(Vec<(PartitionKey, Vec<Candidate>)>, MergeStats), ChartError> {
        let Self { dir, files } = self;
        let budget = max_groups.max(1) as u64;
        let mut stats = MergeStats::default();
        let mut selected = Vec::new();
        let mut pending: Vec<(SpillFile, usize)> =
            files.into_iter().map(|file| (file, 0)).collect();

        while let Some((file, depth)) = pending.pop() {
            if file.rows <= budget || depth >= MAX_SPLIT_DEPTH {
                selected.extend(merge_file(&file, &mut stats)?.into_bounded_candidates(k));
            } else {
                let pieces = split_file(
                    dir.path(),
                    &file,
                    SplitKey::Partition,
                    depth + 1,
                    budget,
                    &mut stats,
                )?;
                if pieces.len() > 1 {
                    pending.extend(pieces.into_iter().map(|piece| (piece, depth + 1)));
                } else {
                    // A single partition holds every row.
                    discard(&pieces)?;
                    selected.extend(select_by_group(
                        dir.path(),
                        &file,
                        k,
                        depth + 1,
                        budget,
                        &mut stats,
                    )?);
                }
            }
            discard(std::slice::from_ref(&file))?;
        }
        debug!(
            "[top_songs:spill] merged {} files after {} splits (peak {} groups)",
            stats.files_merged, stats.splits, stats.peak_groups
        );
        Ok((selected, stats))
    }
}

fn merge_file(file: &SpillFile, stats: &mut MergeStats) -> Result<CountTable, ChartError> {
    let mut reader = open_reader(&file.path)?;
    let mut table = CountTable::default();
    for row in reader.deserialize::<GroupCount>() {
        let group = row.map_err(|err| spill_error(&file.path, err))?;
        table.add(group.partition_key, group.song_id, group.count);
    }
    stats.files_merged += 1;
    stats.peak_groups = stats.peak_groups.max(table.groups());
    Ok(table)
}

/// Re-partition `file` into at most `MAX_SPLIT_FANOUT` non-empty pieces.
fn split_file(
    dir: &Path,
    file: &SpillFile,
    key: SplitKey,
    depth: usize,
    budget: u64,
    stats: &mut MergeStats,
) -> Result<Vec<SpillFile>, ChartError> {
    let parts = file.rows.div_ceil(budget).clamp(2, MAX_SPLIT_FANOUT as u64) as usize;
    stats.splits += 1;
    let mut pieces = BucketFiles::create(dir, &format!("split-{:06}", stats.splits), parts)?;
    let mut reader = open_reader(&file.path)?;
    for row in reader.deserialize::<GroupCount>() {
        let group = row.map_err(|err| spill_error(&file.path, err))?;
        pieces.write(key.bucket(depth, &group, parts), &group)?;
    }
    let (kept, empty): (Vec<_>, Vec<_>) = pieces
        .finish()?
        .into_iter()
        .partition(|piece| piece.rows > 0);
    discard(&empty)?;
    Ok(kept)
}

/// Top-K selection for a file whose partitions cannot be separated further.
///
/// Pieces keep every `(partition, song)` group whole, so each merged piece yields
/// final counts that feed one heap per partition.
fn select_by_group(
    dir: &Path,
    file: &SpillFile,
    k: usize,
    depth: usize,
    budget: u64,
    stats: &mut MergeStats,
) -> Result<Vec<(PartitionKey, Vec<Candidate>)>, ChartError> {
    let mut heaps: HashMap<PartitionKey, BoundedTopK> = HashMap::new();
    let mut pending: Vec<(SpillFile, usize)> =
        split_file(dir, file, SplitKey::Group, depth, budget, stats)?
            .into_iter()
            .map(|piece| (piece, depth))
            .collect();

    while let Some((piece, depth)) = pending.pop() {
        if piece.rows <= budget || depth >= MAX_SPLIT_DEPTH {
            for (partition_key, candidates) in merge_file(&piece, stats)?.into_candidates() {
                let heap = heaps
                    .entry(partition_key)
                    .or_insert_with(|| BoundedTopK::new(k));
                for candidate in candidates {
                    heap.push(candidate);
                }
            }
        } else {
            let pieces = split_file(dir, &piece, SplitKey::Group, depth + 1, budget, stats)?;
            pending.extend(pieces.into_iter().map(|next| (next, depth + 1)));
        }
        discard(std::slice::from_ref(&piece))?;
    }
    Ok(heaps
        .into_iter()
        .map(|(partition_key, heap)| (partition_key, heap.into_candidates()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::rank_order;
    use tempfile::tempdir;

    fn ranked(
        mut partitions: Vec<(PartitionKey, Vec<Candidate>)>,
    ) -> Vec<(PartitionKey, Vec<Candidate>)> {
        partitions.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, candidates) in &mut partitions {
            candidates.sort_by(rank_order);
        }
        partitions
    }

    fn candidate(song_id: &str, count: u64) -> Candidate {
        Candidate {
            song_id: song_id.to_string(),
            count,
        }
    }

    #[test]
    fn spilled_groups_merge_back_across_spills() {
        let parent = tempdir().unwrap();
        let mut writer = SpillWriter::create(Some(parent.path()), 4).unwrap();

        let mut table = CountTable::default();
        table.add("US".into(), "S1".into(), 2);
        table.add("FR".into(), "S|2".into(), 1);
        writer.spill(&mut table).unwrap();
        assert!(table.is_empty());

        table.add("US".into(), "S1".into(), 3);
        table.add("US".into(), "S0".into(), 5);
        writer.spill(&mut table).unwrap();
        assert_eq!(writer.spills(), 2);

        let (selected, stats) = writer.finish().unwrap().into_top_k(1, 100).unwrap();
        assert_eq!(stats.splits, 0);
        assert_eq!(
            ranked(selected),
            vec![
                ("FR".to_string(), vec![candidate("S|2", 1)]),
                ("US".to_string(), vec![candidate("S0", 5)]),
            ]
        );
    }

    #[test]
    fn merge_of_many_partitions_stays_within_group_budget() {
        let parent = tempdir().unwrap();
        let mut writer = SpillWriter::create(Some(parent.path()), 4).unwrap();
        let mut table = CountTable::default();
        for user in 0..400 {
            for song in 0..3 {
                table.add(format!("U{user:03}"), format!("S{song}"), 1);
            }
        }
        writer.spill(&mut table).unwrap();
        for user in 0..400 {
            table.add(format!("U{user:03}"), "S0".to_string(), 1);
        }
        writer.spill(&mut table).unwrap();

        let (selected, stats) = writer.finish().unwrap().into_top_k(2, 8).unwrap();
        assert!(stats.splits > 0);
        assert!(stats.peak_groups <= 8, "peak was {}", stats.peak_groups);

        let selected = ranked(selected);
        assert_eq!(selected.len(), 400);
        for (user, candidates) in &selected {
            assert_eq!(
                candidates,
                &vec![candidate("S0", 2), candidate("S1", 1)],
                "{user}"
            );
        }
    }

    #[test]
    fn heavy_single_partition_is_split_by_song() {
        let parent = tempdir().unwrap();
        let mut writer = SpillWriter::create(Some(parent.path()), 2).unwrap();
        let mut table = CountTable::default();
        let mut expected = Vec::new();
        for idx in 0..300u64 {
            let song = format!("S{idx:03}");
            table.add("US".into(), song.clone(), idx % 7 + 1);
            expected.push(candidate(&song, idx % 7 + 1));
        }
        writer.spill(&mut table).unwrap();
        expected.sort_by(rank_order);
        expected.truncate(5);

        let (selected, stats) = writer.finish().unwrap().into_top_k(5, 16).unwrap();
        assert!(stats.peak_groups <= 16, "peak was {}", stats.peak_groups);
        assert_eq!(ranked(selected), vec![("US".to_string(), expected)]);
    }

    #[test]
    fn spill_directory_is_removed_once_merged() {
        let parent = tempdir().unwrap();
        let mut writer = SpillWriter::create(Some(parent.path()), 2).unwrap();
        let mut table = CountTable::default();
        table.add("US".into(), "S1".into(), 1);
        writer.spill(&mut table).unwrap();
        let buckets = writer.finish().unwrap();
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 1);
        buckets.into_top_k(50, 10).unwrap();
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
