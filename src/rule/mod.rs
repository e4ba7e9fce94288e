//! Rule rows and their normalized records.
//!
//! A [`RuleRow`] is the raw four-string form of one line of the rule
//! source. [`RuleRecord::from_row`] validates it and expands single values
//! into degenerate ranges, producing what the index build consumes.

mod address;
mod port;

pub use address::{parse_address, parse_address_range};
pub use port::{parse_port, parse_port_range};

use std::ops::RangeInclusive;

use crate::error::{ConfigError, Error, Result};
use crate::interval::AddressInterval;
use crate::{Direction, Protocol};

/// Separator between the low and high bound of a port or address range.
pub const RANGE_SEPARATOR: char = '-';

/// One unvalidated row of the rule source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleRow {
    pub direction: String,
    pub protocol: String,
    /// `n` or `low-high`
    pub port: String,
    /// `a.b.c.d` or `a.b.c.d-e.f.g.h`
    pub address: String,
    /// 1-based line in the source, 0 when the row did not come from a file
    pub line: usize,
}

impl RuleRow {
    /// Create a row that did not come from a file.
    pub fn new(
        direction: impl Into<String>,
        protocol: impl Into<String>,
        port: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            direction: direction.into(),
            protocol: protocol.into(),
            port: port.into(),
            address: address.into(),
            line: 0,
        }
    }

    /// Set the source line number.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

/// A validated rule: every port in `ports` allows every address in `addresses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    pub direction: Direction,
    pub protocol: Protocol,
    pub ports: RangeInclusive<u16>,
    pub addresses: AddressInterval,
}

impl RuleRecord {
    pub fn new(
        direction: Direction,
        protocol: Protocol,
        ports: RangeInclusive<u16>,
        addresses: AddressInterval,
    ) -> Self {
        Self {
            direction,
            protocol,
            ports,
            addresses,
        }
    }

    /// Validate and normalize a raw row.
    ///
    /// Errors are tagged with the row's line number when it has one.
    pub fn from_row(row: &RuleRow) -> Result<Self> {
        Self::parse_row(row).map_err(|e| if row.line > 0 { e.at_line(row.line) } else { e })
    }

    fn parse_row(row: &RuleRow) -> Result<Self> {
        let direction = Direction::parse(&row.direction)
            .ok_or_else(|| ConfigError::UnknownDirection(row.direction.trim().to_string()))?;
        let protocol = Protocol::parse(&row.protocol)
            .ok_or_else(|| ConfigError::UnknownProtocol(row.protocol.trim().to_string()))?;
        let ports = parse_port_range(&row.port)?;
        let addresses = parse_address_range(&row.address)?;

        Ok(Self::new(direction, protocol, ports, addresses))
    }

    /// Number of per-port entries this rule expands into.
    pub fn port_count(&self) -> usize {
        // An inverted range expands to nothing
        (usize::from(*self.ports.end()) + 1).saturating_sub(usize::from(*self.ports.start()))
    }
}

impl TryFrom<&RuleRow> for RuleRecord {
    type Error = Error;

    fn try_from(row: &RuleRow) -> Result<Self> {
        Self::from_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_record_from_single_values() {
        let row = RuleRow::new("inbound", "tcp", "80", "192.168.1.2");
        let record = RuleRecord::from_row(&row).unwrap();

        assert_eq!(record.direction, Direction::Inbound);
        assert_eq!(record.protocol, Protocol::Tcp);
        assert_eq!(record.ports, 80..=80);
        assert_eq!(
            record.addresses,
            AddressInterval::single(Ipv4Addr::new(192, 168, 1, 2))
        );
        assert_eq!(record.port_count(), 1);
    }

    #[test]
    fn test_record_from_ranges() {
        let row = RuleRow::new("outbound", "udp", "1000-2000", "10.0.0.0-10.0.0.255");
        let record = RuleRecord::try_from(&row).unwrap();

        assert_eq!(record.ports, 1000..=2000);
        assert_eq!(record.port_count(), 1001);
        assert_eq!(record.addresses.low(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(record.addresses.high(), Ipv4Addr::new(10, 0, 0, 255));
    }

    #[test]
    fn test_port_count_of_inverted_range() {
        let record = RuleRecord::new(
            Direction::Inbound,
            Protocol::Tcp,
            5..=3,
            AddressInterval::single(Ipv4Addr::new(1, 1, 1, 1)),
        );
        assert_eq!(record.port_count(), 0);

        let full = RuleRecord::new(
            Direction::Inbound,
            Protocol::Tcp,
            0..=u16::MAX,
            AddressInterval::single(Ipv4Addr::new(1, 1, 1, 1)),
        );
        assert_eq!(full.port_count(), 65536);
    }

    #[test]
    fn test_record_unknown_tokens() {
        let err = RuleRecord::from_row(&RuleRow::new("sideways", "tcp", "80", "1.1.1.1"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnknownDirection(ref d)) if d == "sideways"
        ));

        let err = RuleRecord::from_row(&RuleRow::new("inbound", "icmp", "80", "1.1.1.1"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnknownProtocol(ref p)) if p == "icmp"
        ));
    }

    #[test]
    fn test_record_error_carries_line() {
        let row = RuleRow::new("inbound", "tcp", "eighty", "1.1.1.1").with_line(4);
        match RuleRecord::from_row(&row).unwrap_err() {
            Error::Row { line, source } => {
                assert_eq!(line, 4);
                assert!(source.is_parse());
            }
            other => panic!("expected Row, got {:?}", other),
        }
    }
}
