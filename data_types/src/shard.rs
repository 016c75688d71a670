//! The `ShardMap`: the authoritative dataset→(shard→owner,status) snapshot.
use std::{collections::BTreeMap, fmt};

/// Identifies one shard of a dataset's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub u32);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

/// The network address of the node currently (or formerly) owning a shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress(pub String);

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The health state of one shard, as tracked by cluster membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStatus {
    Unassigned,
    Assigned,
    Active,
    Recovering,
    Error,
    Stopped,
}

impl ShardStatus {
    /// Only `Active` shards are eligible for queries.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// `Recovering` is the one status the Engine treats as a transient, retriable condition.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Recovering)
    }
}

/// An update to one shard's ownership/health, as delivered by cluster membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardEvent {
    Assigned { shard: ShardId, node: NodeAddress },
    Activated { shard: ShardId },
    Recovering { shard: ShardId },
    Errored { shard: ShardId, reason: String },
    Stopped { shard: ShardId },
    Unassigned { shard: ShardId },
}

impl ShardEvent {
    pub fn shard(&self) -> ShardId {
        match self {
            Self::Assigned { shard, .. }
            | Self::Activated { shard }
            | Self::Recovering { shard }
            | Self::Errored { shard, .. }
            | Self::Stopped { shard }
            | Self::Unassigned { shard } => *shard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ShardInfo {
    node: NodeAddress,
    status: ShardStatus,
}

/// Per-dataset shard→(owner, status) map, versioned by a monotonically increasing revision.
///
/// Mutated only by the owning `QueryRouter`'s single thread; readers (the Engine) take an
/// immutable snapshot at dispatch time via `Clone`, and a `CurrentShardSnapshot` that arrives
/// with a revision no newer than the current one is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMap {
    revision: u64,
    shards: BTreeMap<ShardId, ShardInfo>,
}

impl Default for ShardMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardMap {
    /// An empty map at revision 0 (the `Initializing` router state has no shard map; this is
    /// used before the first `CurrentShardSnapshot` arrives).
    pub fn new() -> Self {
        Self {
            revision: 0,
            shards: BTreeMap::new(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Applies a single incremental event. Events are only ever applied by the router's serial
    /// thread, so each application advances the revision by exactly one.
    pub fn apply_event(&mut self, event: ShardEvent) {
        let shard = event.shard();
        match event {
            ShardEvent::Assigned { node, .. } => {
                self.shards.insert(
                    shard,
                    ShardInfo {
                        node,
                        status: ShardStatus::Assigned,
                    },
                );
            }
            ShardEvent::Activated { .. } => self.set_status(shard, ShardStatus::Active),
            ShardEvent::Recovering { .. } => self.set_status(shard, ShardStatus::Recovering),
            ShardEvent::Errored { .. } => self.set_status(shard, ShardStatus::Error),
            ShardEvent::Stopped { .. } => self.set_status(shard, ShardStatus::Stopped),
            ShardEvent::Unassigned { .. } => {
                self.shards.remove(&shard);
            }
        }
        self.revision += 1;
    }

    fn set_status(&mut self, shard: ShardId, status: ShardStatus) {
        if let Some(info) = self.shards.get_mut(&shard) {
            info.status = status;
        }
    }

    /// Replaces the whole map with `other` if and only if `other` is strictly newer; stale
    /// updates are discarded. Returns whether the replacement happened.
    pub fn replace_if_newer(&mut self, other: ShardMap) -> bool {
        if other.revision > self.revision {
            *self = other;
            true
        } else {
            false
        }
    }

    /// True if `shard` is owned and currently `Active`.
    pub fn is_active(&self, shard: ShardId) -> bool {
        self.shards
            .get(&shard)
            .map(|info| info.status.is_active())
            .unwrap_or(false)
    }

    /// The status of `shard`, or `None` if this map has never heard of it.
    pub fn status(&self, shard: ShardId) -> Option<ShardStatus> {
        self.shards.get(&shard).map(|info| info.status)
    }

    /// The current owning node of `shard`, regardless of status.
    pub fn owner(&self, shard: ShardId) -> Option<&NodeAddress> {
        self.shards.get(&shard).map(|info| &info.node)
    }

    /// All shards currently `Active`, in ascending shard-id order.
    pub fn active_shards(&self) -> Vec<ShardId> {
        self.shards
            .iter()
            .filter(|(_, info)| info.status.is_active())
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> NodeAddress {
        NodeAddress(s.to_string())
    }

    #[test]
    fn activation_lifecycle() {
        let mut map = ShardMap::new();
        let s0 = ShardId(0);
        map.apply_event(ShardEvent::Assigned {
            shard: s0,
            node: node("10.0.0.1:8080"),
        });
        assert_eq!(map.status(s0), Some(ShardStatus::Assigned));
        assert!(!map.is_active(s0));

        map.apply_event(ShardEvent::Activated { shard: s0 });
        assert!(map.is_active(s0));
        assert_eq!(map.active_shards(), vec![s0]);

        map.apply_event(ShardEvent::Stopped { shard: s0 });
        assert!(!map.is_active(s0));
        assert!(map.active_shards().is_empty());
    }

    #[test]
    fn revision_monotonically_increases() {
        let mut map = ShardMap::new();
        assert_eq!(map.revision(), 0);
        map.apply_event(ShardEvent::Assigned {
            shard: ShardId(0),
            node: node("a"),
        });
        assert_eq!(map.revision(), 1);
        map.apply_event(ShardEvent::Activated { shard: ShardId(0) });
        assert_eq!(map.revision(), 2);
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let mut map = ShardMap::new();
        map.apply_event(ShardEvent::Assigned {
            shard: ShardId(0),
            node: node("a"),
        });
        map.apply_event(ShardEvent::Activated { shard: ShardId(0) });
        assert_eq!(map.revision(), 2);

        let stale = ShardMap::new();
        assert!(!map.clone().replace_if_newer(stale));

        let mut newer = ShardMap::new();
        newer.apply_event(ShardEvent::Assigned {
            shard: ShardId(1),
            node: node("b"),
        });
        newer.apply_event(ShardEvent::Activated { shard: ShardId(1) });
        newer.apply_event(ShardEvent::Activated { shard: ShardId(1) });
        assert_eq!(newer.revision(), 3);

        let mut current = map.clone();
        assert!(current.replace_if_newer(newer.clone()));
        assert_eq!(current, newer);
    }

    #[test]
    fn at_most_one_active_owner() {
        let mut map = ShardMap::new();
        let s0 = ShardId(0);
        map.apply_event(ShardEvent::Assigned {
            shard: s0,
            node: node("a"),
        });
        map.apply_event(ShardEvent::Activated { shard: s0 });
        // re-assigning replaces the owner outright; only one owner can ever be recorded.
        map.apply_event(ShardEvent::Assigned {
            shard: s0,
            node: node("b"),
        });
        assert_eq!(map.owner(s0), Some(&node("b")));
        assert!(!map.is_active(s0));
    }
}
