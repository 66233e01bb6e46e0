use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use top_songs::{Charts, ExecutionConfig, TopKEntry, compute_charts};

const COUNTRIES: [&str; 8] = ["US", "FR", "UK", "DE", "USA", "", "NA", "J"];

fn random_log(rng: &mut StdRng, lines: usize) -> String {
    let mut body = String::new();
    for _ in 0..lines {
        let song = format!("S{}", rng.random_range(0..40));
        let user = format!("U{}", rng.random_range(0..15));
        let country = COUNTRIES[rng.random_range(0..COUNTRIES.len())];
        match rng.random_range(0..20) {
            0 => body.push_str(&format!("{song}|{user}\n")),
            1 => body.push_str(&format!("{song}|{user}|{country}|x\n")),
            2 => body.push_str(&format!("null|{user}|{country}\n")),
            _ => body.push_str(&format!("{song}|{user}|{country}\n")),
        }
    }
    body
}

fn configs(k: usize) -> Vec<ExecutionConfig> {
    vec![
        ExecutionConfig::eager().with_top_k(k),
        ExecutionConfig::eager().with_top_k(k).with_worker_threads(Some(3)),
        ExecutionConfig::low_memory().with_top_k(k),
        ExecutionConfig::low_memory()
            .with_top_k(k)
            .with_chunk_size(7)
            .with_spill_threshold(5)
            .with_spill_buckets(4),
    ]
}

/// Valid `(country, user, song)` rows of a generated log.
fn valid_rows(body: &str) -> Vec<(String, String, String)> {
    body.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('|').collect();
            if fields.len() != 3 || fields[0] == "null" || fields[2].chars().count() != 2 {
                return None;
            }
            if fields[2] == "NA" {
                return None;
            }
            Some((fields[2].into(), fields[1].into(), fields[0].into()))
        })
        .collect()
}

fn check_bounds_and_ranks(entries: &[TopKEntry], k: usize) {
    for partition in entries.chunk_by(|a, b| a.partition_key == b.partition_key) {
        assert!(!partition.is_empty() && partition.len() <= k);
        let ranks: Vec<usize> = partition.iter().map(|entry| entry.rank).collect();
        assert_eq!(ranks, (1..=partition.len()).collect::<Vec<_>>());
        let songs: HashSet<&str> = partition.iter().map(|e| e.song_id.as_str()).collect();
        assert_eq!(songs.len(), partition.len());
        assert!(partition.iter().all(|entry| entry.count > 0));
    }
    let keys: Vec<&str> = entries.iter().map(|e| e.partition_key.as_str()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted, "partitions must be grouped in ascending key order");
}

fn check_against_rows(charts: &Charts, rows: &[(String, String, String)]) {
    let countries: BTreeSet<&str> = rows.iter().map(|(c, _, _)| c.as_str()).collect();
    let users: BTreeSet<&str> = rows.iter().map(|(_, u, _)| u.as_str()).collect();
    for entry in &charts.country {
        assert!(countries.contains(entry.partition_key.as_str()));
        assert_eq!(entry.partition_key.chars().count(), 2);
        let seen = rows
            .iter()
            .filter(|(c, _, s)| *c == entry.partition_key && *s == entry.song_id)
            .count() as u64;
        assert_eq!(seen, entry.count);
    }
    for entry in &charts.users {
        assert!(users.contains(entry.partition_key.as_str()));
        let seen = rows
            .iter()
            .filter(|(_, u, s)| *u == entry.partition_key && *s == entry.song_id)
            .count() as u64;
        assert_eq!(seen, entry.count);
    }
    let charted: BTreeSet<&str> = charts
        .country
        .iter()
        .map(|e| e.partition_key.as_str())
        .collect();
    assert_eq!(charted, countries, "every valid country gets a chart");
}

fn check_complete_when_enough_songs(charts: &Charts, rows: &[(String, String, String)], k: usize) {
    let mut distinct: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (country, _, song) in rows {
        distinct.entry(country).or_default().insert(song);
    }
    for (country, songs) in distinct {
        let charted = charts
            .country
            .iter()
            .filter(|e| e.partition_key == country)
            .count();
        assert_eq!(charted, songs.len().min(k));
    }
}

fn write_log(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("streams-20230101.log");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn charts_hold_structural_invariants_for_every_strategy() {
    let mut rng = StdRng::seed_from_u64(7);
    let temp = tempdir().unwrap();
    for round in 0..6 {
        let body = random_log(&mut rng, 150 + round * 40);
        let input = write_log(temp.path(), &body);
        let rows = valid_rows(&body);
        for k in [1, 3, 10] {
            for config in configs(k) {
                let charts = compute_charts(&input, &config).unwrap();
                check_bounds_and_ranks(&charts.country, k);
                check_bounds_and_ranks(&charts.users, k);
                check_against_rows(&charts, &rows);
                check_complete_when_enough_songs(&charts, &rows, k);
                assert_eq!(charts.ingest.accepted, rows.len() as u64);
            }
        }
    }
}

#[test]
fn counts_never_increase_down_a_partition() {
    let mut rng = StdRng::seed_from_u64(11);
    let temp = tempdir().unwrap();
    let input = write_log(temp.path(), &random_log(&mut rng, 400));
    for config in configs(8) {
        let charts = compute_charts(&input, &config).unwrap();
        for entries in [&charts.country, &charts.users] {
            for pair in entries.windows(2) {
                if pair[0].partition_key != pair[1].partition_key {
                    continue;
                }
                assert!(pair[0].count >= pair[1].count);
                if pair[0].count == pair[1].count {
                    assert!(pair[0].song_id < pair[1].song_id);
                }
            }
        }
    }
}
