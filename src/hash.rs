use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub fn stable_hash_with(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

pub fn stable_hash_str(seed: u64, value: &str) -> u64 {
    stable_hash_with(|hasher| {
        seed.hash(hasher);
        value.hash(hasher);
    })
}

/// Bucket in `0..buckets` for `key`; identical across runs and processes.
pub fn stable_bucket(seed: u64, key: &str, buckets: usize) -> usize {
    (stable_hash_str(seed, key) % buckets.max(1) as u64) as usize
}

/// Bucket in `0..buckets` for the pair `(first, second)`.
pub fn stable_pair_bucket(seed: u64, first: &str, second: &str, buckets: usize) -> usize {
    let hash = stable_hash_with(|hasher| {
        seed.hash(hasher);
        first.hash(hasher);
        second.hash(hasher);
    });
    (hash % buckets.max(1) as u64) as usize
}
