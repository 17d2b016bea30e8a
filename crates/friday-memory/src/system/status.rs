//! Reports returned by the memory system facade

use serde::{Deserialize, Serialize};

use crate::capability::TierState;
use crate::long_term::Collection;

/// Snapshot of every tier's availability and size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatus {
    pub short_term: ShortTermStatus,
    pub mid_term: MidTermStatus,
    pub long_term: LongTermStatus,
}

/// Fast tier status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermStatus {
    /// `degraded` when running on the fallback map alone
    pub state: TierState,

    /// External cache reachable at startup
    pub available: bool,

    /// The in-process map is always there
    pub fallback_available: bool,

    /// Keys in the external cache database
    pub cache_keys: u64,

    /// Entries in the fallback map
    pub fallback_keys: usize,
}

impl ShortTermStatus {
    /// Whether reads and writes work at all, through either path
    pub fn is_usable(&self) -> bool {
        self.available || self.fallback_available
    }
}

/// Mid tier status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidTermStatus {
    pub state: TierState,
    pub available: bool,
    pub interactions: u64,
    pub sessions: u64,
    pub preferences: u64,
}

/// Long tier status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermStatus {
    pub state: TierState,
    pub available: bool,
    pub knowledge: CollectionStatus,
    pub interactions: CollectionStatus,
    pub persona: CollectionStatus,
}

impl LongTermStatus {
    /// Status of one collection
    pub fn collection(&self, collection: Collection) -> &CollectionStatus {
        match collection {
            Collection::Knowledge => &self.knowledge,
            Collection::Interactions => &self.interactions,
            Collection::Persona => &self.persona,
        }
    }
}

/// Availability and size of one long tier collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub available: bool,
    pub count: u64,
}

/// Rows removed by a cleanup pass, per tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Always 0: the external cache expires keys itself
    pub short_term: u64,

    /// Interactions older than the retention period
    pub mid_term: u64,

    /// Always 0: the long tier has no retention policy
    pub long_term: u64,
}

impl CleanupReport {
    /// `(short_term, mid_term, long_term)`
    pub fn as_tuple(&self) -> (u64, u64, u64) {
        (self.short_term, self.mid_term, self.long_term)
    }

    pub fn total(&self) -> u64 {
        self.short_term + self.mid_term + self.long_term
    }
}

/// Live reachability of each tier's backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub short_term: bool,
    pub mid_term: bool,
    pub long_term: bool,
}

impl ConnectivityReport {
    pub fn all_reachable(&self) -> bool {
        self.short_term && self.mid_term && self.long_term
    }
}
