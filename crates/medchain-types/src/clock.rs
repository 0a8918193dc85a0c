use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::temporal::{wall_clock_ms, LedgerTime};

/// Where the physical component of a [`LedgerTime`] comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TimeSource {
    /// System wall clock.
    Wall,
    /// Deterministic clock: the first tick reads `start_ms`, each later tick
    /// advances by `step_ms`. Used by tests and the sample dataset.
    Manual { start_ms: u64, step_ms: u64 },
}

impl Default for TimeSource {
    fn default() -> Self {
        Self::Wall
    }
}

struct ClockState {
    physical_ms: u64,
    logical: u32,
    manual_next_ms: u64,
}

/// Monotonic ledger clock.
///
/// Hybrid logical clock rules, single node:
///
/// - `physical = max(source, state.physical)`;
/// - if physical advanced, `logical = 0`, otherwise `logical += 1`.
///
/// Every value returned by [`tick`](Self::tick) is strictly greater than the
/// previous one, even when the wall clock stalls or steps backwards.
pub struct LedgerClock {
    source: TimeSource,
    state: Mutex<ClockState>,
}

impl LedgerClock {
    pub fn new(source: TimeSource) -> Self {
        let manual_next_ms = match source {
            TimeSource::Manual { start_ms, .. } => start_ms,
            TimeSource::Wall => 0,
        };
        Self {
            source,
            state: Mutex::new(ClockState {
                physical_ms: 0,
                logical: 0,
                manual_next_ms,
            }),
        }
    }

    /// Clock backed by the system wall clock.
    pub fn wall() -> Self {
        Self::new(TimeSource::Wall)
    }

    /// Deterministic clock starting at `start_ms` and advancing `step_ms` per tick.
    pub fn manual(start_ms: u64, step_ms: u64) -> Self {
        Self::new(TimeSource::Manual { start_ms, step_ms })
    }

    /// Produce the next timestamp.
    pub fn tick(&self) -> LedgerTime {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let source_ms = match self.source {
            TimeSource::Wall => wall_clock_ms(),
            TimeSource::Manual { step_ms, .. } => {
                let now = state.manual_next_ms;
                state.manual_next_ms = now.saturating_add(step_ms);
                now
            }
        };

        let physical = source_ms.max(state.physical_ms);
        let logical = if physical > state.physical_ms {
            0
        } else {
            state.logical.saturating_add(1)
        };

        state.physical_ms = physical;
        state.logical = logical;
        LedgerTime::new(physical, logical)
    }

    /// Move the clock past an externally observed timestamp so that the next
    /// tick is strictly after it. Used when a ledger is restored from records.
    pub fn observe(&self, seen: LedgerTime) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = LedgerTime::new(state.physical_ms, state.logical);
        if seen > current {
            state.physical_ms = seen.physical_ms;
            state.logical = seen.logical;
        }
    }

    /// The most recent timestamp handed out or observed.
    pub fn last(&self) -> LedgerTime {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        LedgerTime::new(state.physical_ms, state.logical)
    }

    pub fn source(&self) -> &TimeSource {
        &self.source
    }
}

impl Default for LedgerClock {
    fn default() -> Self {
        Self::wall()
    }
}

impl std::fmt::Debug for LedgerClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClock")
            .field("source", &self.source)
            .field("last", &self.last())
            .finish()
    }
}
