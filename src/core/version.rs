// ============================================================================
// Versions and version clocks
// ============================================================================
//
// A Version is a point in the total write order. Clocks issue versions with
// `restatement == 0`; restatements are reserved for write-back records that
// re-express an already existing version as a complete entity and must sort
// after it but before anything a clock issues later.
//
// ============================================================================

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    tick: u64,
    restatement: u32,
}

impl Version {
    pub const MIN: Version = Version {
        tick: 0,
        restatement: 0,
    };

    pub const MAX: Version = Version {
        tick: u64::MAX,
        restatement: u32::MAX,
    };

    pub fn from_tick(tick: u64) -> Self {
        Self {
            tick,
            restatement: 0,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn restatement(&self) -> u32 {
        self.restatement
    }

    pub fn is_restatement(&self) -> bool {
        self.restatement > 0
    }

    /// The version a write-back of this version is recorded at.
    pub(crate) fn restated(&self) -> Version {
        Self {
            tick: self.tick,
            restatement: self.restatement.saturating_add(1),
        }
    }

    /// Greatest version strictly below this one.
    pub fn predecessor(&self) -> Option<Version> {
        if self.restatement > 0 {
            Some(Self {
                tick: self.tick,
                restatement: self.restatement - 1,
            })
        } else if self.tick > 0 {
            Some(Self {
                tick: self.tick - 1,
                restatement: u32::MAX,
            })
        } else {
            None
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.restatement == 0 {
            write!(f, "v{}", self.tick)
        } else {
            write!(f, "v{}.{}", self.tick, self.restatement)
        }
    }
}

/// Source of strictly increasing versions. This is the only process-wide
/// synchronization point of the engine.
pub trait VersionClock: Send + Sync {
    fn now(&self) -> Version;
}

/// Hybrid clock: wall-clock microseconds, bumped past the last issued tick
/// whenever the wall clock stalls or steps backwards.
#[derive(Debug, Default)]
pub struct SystemVersionClock {
    last_tick: AtomicU64,
}

impl SystemVersionClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionClock for SystemVersionClock {
    fn now(&self) -> Version {
        let wall = Utc::now().timestamp_micros().max(0) as u64;
        let previous = self
            .last_tick
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        Version::from_tick(wall.max(previous.saturating_add(1)))
    }
}

/// Deterministic counter clock starting at tick 1.
#[derive(Debug)]
pub struct LogicalVersionClock {
    next_tick: AtomicU64,
}

impl LogicalVersionClock {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(tick: u64) -> Self {
        Self {
            next_tick: AtomicU64::new(tick),
        }
    }

    /// The version the next call to `now` will return.
    pub fn peek(&self) -> Version {
        Version::from_tick(self.next_tick.load(Ordering::SeqCst))
    }
}

impl Default for LogicalVersionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionClock for LogicalVersionClock {
    fn now(&self) -> Version {
        Version::from_tick(self.next_tick.fetch_add(1, Ordering::SeqCst))
    }
}
