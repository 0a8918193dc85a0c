use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Ledger timestamp.
///
/// A wall-clock millisecond component plus a logical counter that orders
/// events sharing the same millisecond. Ordering is `physical_ms` then
/// `logical` (total order), so two timestamps handed out by one
/// [`LedgerClock`](crate::LedgerClock) are never equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LedgerTime {
    /// Milliseconds since the UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events within the same millisecond.
    pub logical: u32,
}

impl LedgerTime {
    pub const fn new(physical_ms: u64, logical: u32) -> Self {
        Self {
            physical_ms,
            logical,
        }
    }

    /// Time at the given wall-clock millisecond with a zero logical counter.
    pub const fn from_millis(physical_ms: u64) -> Self {
        Self::new(physical_ms, 0)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_millis(wall_clock_ms())
    }

    /// The genesis time.
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Fixed-width little-endian encoding used when fingerprinting.
    pub fn to_le_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[..8].copy_from_slice(&self.physical_ms.to_le_bytes());
        out[8..].copy_from_slice(&self.logical.to_le_bytes());
        out
    }
}

impl PartialOrd for LedgerTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LedgerTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
    }
}

impl fmt::Debug for LedgerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerTime({}ms.{})", self.physical_ms, self.logical)
    }
}

impl fmt::Display for LedgerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.physical_ms, self.logical)
    }
}

pub(crate) fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_physical_first() {
        let a = LedgerTime::new(100, 5);
        let b = LedgerTime::new(200, 0);
        assert!(a < b);
        assert!(b.is_after(&a));
    }

    #[test]
    fn ordering_logical_second() {
        let a = LedgerTime::new(100, 1);
        let b = LedgerTime::new(100, 2);
        assert!(a.is_before(&b));
    }

    #[test]
    fn zero_is_smallest() {
        assert!(LedgerTime::zero() < LedgerTime::from_millis(1));
    }

    #[test]
    fn now_is_after_2020() {
        assert!(LedgerTime::now().physical_ms > 1_577_836_800_000);
    }

    #[test]
    fn le_bytes_differ_for_logical_tick() {
        assert_ne!(
            LedgerTime::new(5, 0).to_le_bytes(),
            LedgerTime::new(5, 1).to_le_bytes()
        );
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", LedgerTime::new(1000, 5)), "1000.5");
    }
}
