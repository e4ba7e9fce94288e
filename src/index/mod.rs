//! The compiled rule index.

mod config;
mod stats;

pub use config::IndexConfig;
pub use stats::{IndexStats, TableStats};

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::error::{ConfigError, Error, QueryError, Result};
use crate::interval::IntervalSet;
use crate::rule::{parse_address, RuleRecord, RuleRow};
use crate::{Direction, Protocol};

/// Number of distinct port values; every port table has one slot per port.
pub const PORT_COUNT: usize = u16::MAX as usize + 1;

const TABLE_COUNT: usize = Direction::ALL.len() * Protocol::ALL.len();

/// Allowed address intervals for one (direction, protocol), indexed by port.
struct PortTable {
    ports: Box<[IntervalSet]>,
}

impl PortTable {
    fn new() -> Self {
        Self {
            ports: (0..PORT_COUNT).map(|_| IntervalSet::new()).collect(),
        }
    }

    fn get(&self, port: u16) -> &IntervalSet {
        &self.ports[usize::from(port)]
    }

    fn get_mut(&mut self, port: u16) -> &mut IntervalSet {
        &mut self.ports[usize::from(port)]
    }
}

/// RuleIndex answers allow/deny queries against a fixed rule set.
///
/// Each (direction, protocol) pair owns a table of 65536 interval sets, one
/// per port, so a query is a direct array lookup followed by a binary search
/// over the few intervals allowed on that port. The cost is paid at build
/// time: a rule covering K ports is inserted K times.
///
/// A built index is immutable and can be shared freely between threads.
///
/// # Examples
/// ```
/// use portwall::{RuleIndex, RuleRow};
///
/// let index = RuleIndex::from_rows(vec![
///     RuleRow::new("inbound", "tcp", "80", "192.168.1.0-192.168.1.255"),
///     RuleRow::new("outbound", "udp", "1000-2000", "52.12.48.92"),
/// ])
/// .unwrap();
///
/// assert!(index.is_allowed("inbound", "tcp", 80, "192.168.1.2").unwrap());
/// assert!(!index.is_allowed("inbound", "tcp", 81, "192.168.1.2").unwrap());
/// assert!(index.is_allowed("outbound", "udp", 1500, "52.12.48.92").unwrap());
/// assert!(index.is_allowed("inbound", "icmp", 80, "192.168.1.2").is_err());
/// ```
pub struct RuleIndex {
    tables: [PortTable; TABLE_COUNT],
    config: IndexConfig,
    rule_count: usize,
    port_entries: usize,
}

impl RuleIndex {
    fn empty(config: IndexConfig) -> Self {
        Self {
            tables: std::array::from_fn(|_| PortTable::new()),
            config,
            rule_count: 0,
            port_entries: 0,
        }
    }

    /// Build an index from validated records with the default configuration.
    pub fn build<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = RuleRecord>,
    {
        Self::build_with_config(records, IndexConfig::default())
    }

    /// Build an index from validated records.
    ///
    /// Either every record is compiled or an error is returned; a partially
    /// built index is never handed out.
    pub fn build_with_config<I>(records: I, config: IndexConfig) -> Result<Self>
    where
        I: IntoIterator<Item = RuleRecord>,
    {
        Self::compile(records.into_iter().map(|r| Ok((0, r))), config)
    }

    /// Validate raw rows and build an index with the default configuration.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = RuleRow>,
    {
        Self::from_rows_with_config(rows, IndexConfig::default())
    }

    /// Validate raw rows and build an index.
    ///
    /// Errors caused by a row carry that row's line number.
    pub fn from_rows_with_config<I>(rows: I, config: IndexConfig) -> Result<Self>
    where
        I: IntoIterator<Item = RuleRow>,
    {
        Self::compile(
            rows.into_iter()
                .map(|row| RuleRecord::from_row(&row).map(|record| (row.line, record))),
            config,
        )
    }

    /// Compile `(line, record)` pairs, where line 0 means "no source line".
    fn compile<I>(records: I, config: IndexConfig) -> Result<Self>
    where
        I: Iterator<Item = Result<(usize, RuleRecord)>>,
    {
        let started = Instant::now();
        let mut index = Self::empty(config);

        if !index.config.reject_overlaps {
            log::warn!(
                "[{}] overlap checking disabled; overlapping rules give undefined results",
                index.config.name
            );
        }

        for item in records {
            let (line, record) = item?;
            index
                .add_record(&record)
                .map_err(|e| if line > 0 { e.at_line(line) } else { e })?;
            log::debug!(
                "[{}] accepted rule {} {} {}-{} {}",
                index.config.name,
                record.direction,
                record.protocol,
                record.ports.start(),
                record.ports.end(),
                record.addresses
            );
        }
        index.finish();

        log::info!(
            "[{}] built rule index: {} rules, {} port entries in {:?}",
            index.config.name,
            index.rule_count,
            index.port_entries,
            started.elapsed()
        );

        Ok(index)
    }

    /// Expand a record across its port range.
    fn add_record(&mut self, record: &RuleRecord) -> Result<()> {
        let (low, high) = (*record.ports.start(), *record.ports.end());
        if low > high {
            return Err(ConfigError::InvertedPortRange { low, high }.into());
        }

        let reject_overlaps = self.config.reject_overlaps;
        let table = &mut self.tables[table_index(record.direction, record.protocol)];

        for port in record.ports.clone() {
            let set = table.get_mut(port);
            if reject_overlaps {
                set.try_insert(record.addresses).map_err(|existing| {
                    Error::from(ConfigError::Overlap {
                        port,
                        interval: record.addresses,
                        existing,
                    })
                })?;
            } else {
                set.insert(record.addresses);
            }
        }

        self.rule_count += 1;
        self.port_entries += record.port_count();
        Ok(())
    }

    fn finish(&mut self) {
        for table in self.tables.iter_mut() {
            for set in table.ports.iter_mut() {
                set.shrink_to_fit();
            }
        }
    }

    /// Check a packet against the index.
    ///
    /// Dispatches to the interval set for `(direction, protocol, port)` and
    /// tests it for `address`.
    pub fn allows(
        &self,
        direction: Direction,
        protocol: Protocol,
        port: u16,
        address: Ipv4Addr,
    ) -> bool {
        self.intervals(direction, protocol, port).contains(address)
    }

    /// Check a packet given in its textual form.
    ///
    /// Returns [`Error::InvalidQuery`] for a direction or protocol outside
    /// the supported set or a port outside 0-65535, and [`Error::Parse`] for
    /// a malformed address. An error never means "allowed".
    pub fn is_allowed(
        &self,
        direction: &str,
        protocol: &str,
        port: i64,
        address: &str,
    ) -> Result<bool> {
        let direction = Direction::parse(direction)
            .ok_or_else(|| QueryError::UnknownDirection(direction.trim().to_string()))?;
        let protocol = Protocol::parse(protocol)
            .ok_or_else(|| QueryError::UnknownProtocol(protocol.trim().to_string()))?;
        let port = u16::try_from(port).map_err(|_| QueryError::PortOutOfRange(port))?;
        let address = parse_address(address)?;

        Ok(self.allows(direction, protocol, port, address))
    }

    /// The interval set consulted for `(direction, protocol, port)`.
    pub fn intervals(&self, direction: Direction, protocol: Protocol, port: u16) -> &IntervalSet {
        self.tables[table_index(direction, protocol)].get(port)
    }

    /// Number of rules the index was built from.
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// The configuration the index was built with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Gather occupancy statistics.
    pub fn stats(&self) -> IndexStats {
        let mut tables = Vec::with_capacity(TABLE_COUNT);
        let mut max_intervals_per_port = 0;

        for direction in Direction::ALL {
            for protocol in Protocol::ALL {
                let table = &self.tables[table_index(direction, protocol)];
                let mut occupied_ports = 0;
                let mut intervals = 0;
                for set in table.ports.iter().filter(|s| !s.is_empty()) {
                    occupied_ports += 1;
                    intervals += set.len();
                    max_intervals_per_port = max_intervals_per_port.max(set.len());
                }
                tables.push(TableStats {
                    direction: direction.to_string(),
                    protocol: protocol.to_string(),
                    occupied_ports,
                    intervals,
                });
            }
        }

        IndexStats {
            name: self.config.name.clone(),
            rules: self.rule_count,
            port_entries: self.port_entries,
            max_intervals_per_port,
            tables,
        }
    }
}

impl std::fmt::Debug for RuleIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleIndex")
            .field("name", &self.config.name)
            .field("rules", &self.rule_count)
            .field("port_entries", &self.port_entries)
            .finish()
    }
}

fn table_index(direction: Direction, protocol: Protocol) -> usize {
    direction.index() * Protocol::ALL.len() + protocol.index()
}
