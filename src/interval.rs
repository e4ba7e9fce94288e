//! Sorted sets of closed IPv4 address intervals.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::ConfigError;

/// A closed, inclusive range of IPv4 addresses.
///
/// `Ipv4Addr` orders lexicographically by octet, so `low <= high` compares
/// the first octet most significantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressInterval {
    low: Ipv4Addr,
    high: Ipv4Addr,
}

impl AddressInterval {
    /// Create an interval, rejecting `low > high`.
    pub fn new(low: Ipv4Addr, high: Ipv4Addr) -> Result<Self, ConfigError> {
        if low > high {
            return Err(ConfigError::InvertedAddressRange { low, high });
        }
        Ok(Self { low, high })
    }

    /// Interval holding exactly one address.
    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            low: addr,
            high: addr,
        }
    }

    pub fn low(&self) -> Ipv4Addr {
        self.low
    }

    pub fn high(&self) -> Ipv4Addr {
        self.high
    }

    /// Check if `addr` lies within `[low, high]`.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.low <= addr && addr <= self.high
    }

    /// Check if the two intervals share at least one address.
    pub fn overlaps(&self, other: &AddressInterval) -> bool {
        self.low <= other.high && other.low <= self.high
    }
}

impl fmt::Display for AddressInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

/// IntervalSet holds disjoint address intervals sorted by low bound.
///
/// Sets are filled while an index is built and only read afterwards.
/// Because the intervals never overlap, at most one of them can contain a
/// given address, which is what lets [`contains`](Self::contains) discard
/// half of the remaining candidates on every step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<AddressInterval>,
}

impl IntervalSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// Number of intervals in the set.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Check if the set holds no intervals.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Iterate intervals in ascending order of low bound.
    pub fn iter(&self) -> impl Iterator<Item = &AddressInterval> {
        self.intervals.iter()
    }

    /// Insert an interval, keeping the set sorted by low bound.
    ///
    /// The interval must not overlap any interval already present. This is
    /// not checked; use [`try_insert`](Self::try_insert) when the input is
    /// not known to be disjoint.
    pub fn insert(&mut self, interval: AddressInterval) {
        let pos = self
            .intervals
            .partition_point(|existing| existing.low <= interval.low);
        self.intervals.insert(pos, interval);
    }

    /// Insert an interval unless it overlaps one already present.
    ///
    /// On conflict the set is left unchanged and the existing interval is
    /// returned.
    pub fn try_insert(&mut self, interval: AddressInterval) -> Result<(), AddressInterval> {
        let pos = self
            .intervals
            .partition_point(|existing| existing.low <= interval.low);

        // Everything before `pos` starts at or below `interval.low`, so only
        // the immediate neighbours can overlap.
        if pos > 0 {
            let prev = self.intervals[pos - 1];
            if prev.overlaps(&interval) {
                return Err(prev);
            }
        }
        if let Some(next) = self.intervals.get(pos) {
            if next.overlaps(&interval) {
                return Err(*next);
            }
        }

        self.intervals.insert(pos, interval);
        Ok(())
    }

    /// Check if `addr` lies within any interval of the set.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mut left = 0;
        let mut right = self.intervals.len();

        while left < right {
            let mid = left + (right - left) / 2;
            let current = &self.intervals[mid];
            if current.low > addr {
                right = mid;
            } else if current.high < addr {
                left = mid + 1;
            } else {
                return true;
            }
        }

        false
    }

    /// Release spare capacity once the set is final.
    pub(crate) fn shrink_to_fit(&mut self) {
        self.intervals.shrink_to_fit();
    }
}
