//! Deterministic routing of partition keys to shards.
//!
//! `Validator::validate_part_query` needs to turn a partition key into the one [`ShardId`] that
//! owns it before consulting the [`data_types::ShardMap`] for that shard's health. This crate
//! supplies that mapping via jump consistent hashing (Lamping & Veach), hashed with
//! [`siphasher`] the way IOx's write-path sharder hashes batch keys before picking a
//! shard.
#![warn(missing_debug_implementations, clippy::explicit_iter_loop, clippy::use_self)]

use data_types::ShardId;
use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

/// Maps a partition key to the single shard that owns it.
pub trait Sharder: std::fmt::Debug + Send + Sync {
    /// The shard owning `partition_key`.
    fn shard_for(&self, partition_key: &str) -> ShardId;

    /// The total number of shards this sharder distributes across.
    fn num_shards(&self) -> u32;
}

/// A [`Sharder`] that routes via jump consistent hashing over a fixed shard count.
///
/// Jump hashing is used (rather than a plain `hash % n`) because it minimizes the fraction of
/// keys that move when `num_shards` grows, the property that makes it suitable for a store that
/// reshards as it scales out.
#[derive(Debug, Clone, Copy)]
pub struct JumpHashSharder {
    num_shards: u32,
}

impl JumpHashSharder {
    /// Creates a sharder distributing keys across `num_shards` shards, numbered `0..num_shards`.
    ///
    /// # Panics
    /// Panics if `num_shards` is zero.
    pub fn new(num_shards: u32) -> Self {
        assert!(num_shards > 0, "num_shards must be at least 1");
        Self { num_shards }
    }
}

impl Sharder for JumpHashSharder {
    fn shard_for(&self, partition_key: &str) -> ShardId {
        let mut hasher = SipHasher13::new();
        partition_key.hash(&mut hasher);
        let digest = hasher.finish();
        ShardId(jump_hash(digest, self.num_shards))
    }

    fn num_shards(&self) -> u32 {
        self.num_shards
    }
}

/// The Jump Consistent Hash algorithm: maps a 64-bit key uniformly onto `0..num_buckets`.
///
/// See Lamping & Veach, "A Fast, Minimal Memory, Consistent Hash Algorithm" (2014).
fn jump_hash(mut key: u64, num_buckets: u32) -> u32 {
    let mut b: i64 = -1;
    let mut j: i64 = 0;

    while j < num_buckets as i64 {
        b = j;
        key = key.wrapping_mul(2_862_933_555_777_941_757).wrapping_add(1);
        j = ((b + 1) as f64 * ((1i64 << 31) as f64 / (((key >> 33) + 1) as f64))) as i64;
    }

    b as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn routing_is_deterministic() {
        let sharder = JumpHashSharder::new(16);
        let a = sharder.shard_for("host=web-01,region=us-east");
        let b = sharder.shard_for("host=web-01,region=us-east");
        assert_eq!(a, b);
    }

    #[test]
    fn stays_within_range() {
        let sharder = JumpHashSharder::new(8);
        for i in 0..1000 {
            let shard = sharder.shard_for(&format!("partition-{i}"));
            assert!(shard.0 < 8, "shard {shard:?} out of range");
        }
    }

    #[test]
    fn single_shard_always_owns_everything() {
        let sharder = JumpHashSharder::new(1);
        for i in 0..100 {
            assert_eq!(sharder.shard_for(&format!("p{i}")), ShardId(0));
        }
    }

    #[test]
    fn distributes_across_all_shards() {
        let sharder = JumpHashSharder::new(4);
        let mut seen = HashSet::new();
        for i in 0..2000 {
            seen.insert(sharder.shard_for(&format!("partition-key-{i}")).0);
        }
        assert_eq!(seen.len(), 4, "expected all 4 shards to be used: {seen:?}");
    }

    #[test]
    #[should_panic(expected = "num_shards must be at least 1")]
    fn rejects_zero_shards() {
        JumpHashSharder::new(0);
    }
}
