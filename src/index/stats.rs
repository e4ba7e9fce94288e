//! Summary statistics for a built index.

use serde::{Deserialize, Serialize};

/// Occupancy of one (direction, protocol) port table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub direction: String,
    pub protocol: String,
    /// Ports with at least one allowed interval
    pub occupied_ports: usize,
    /// Total intervals across all ports of this table
    pub intervals: usize,
}

/// Statistics describing a built [`RuleIndex`](super::RuleIndex).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub name: String,
    /// Rules the index was built from
    pub rules: usize,
    /// Port entries produced by expanding port ranges
    pub port_entries: usize,
    /// Largest number of intervals on any single port
    pub max_intervals_per_port: usize,
    pub tables: Vec<TableStats>,
}

impl IndexStats {
    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
