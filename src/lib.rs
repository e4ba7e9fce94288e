//! Portwall - a static firewall rule index.
//!
//! This crate answers "is this packet allowed?" for a fixed set of allow
//! rules keyed by traffic direction, transport protocol, destination port
//! and IPv4 address.
//!
//! # Features
//!
//! - **Port dispatch**: one table of 65536 interval sets per
//!   (direction, protocol), indexed directly by port
//! - **Interval search**: allowed addresses are kept as sorted, disjoint
//!   closed ranges and searched in O(log n)
//! - **Atomic builds**: a rule set with any invalid or overlapping rule is
//!   rejected as a whole
//! - **Hot reload**: [`Firewall`] swaps rule sets without blocking readers
//! - **CSV loading**: rule files with `direction,protocol,port,address`
//!   columns
//!
//! # Quick Start
//!
//! ```
//! use portwall::{load_rules, RuleRow};
//!
//! let index = load_rules(vec![
//!     RuleRow::new("inbound", "tcp", "80", "192.168.1.0-192.168.1.255"),
//!     RuleRow::new("outbound", "udp", "1000-2000", "52.12.48.92"),
//! ])?;
//!
//! assert!(index.is_allowed("inbound", "tcp", 80, "192.168.1.2")?);
//! assert!(!index.is_allowed("inbound", "tcp", 81, "192.168.1.2")?);
//! assert!(index.is_allowed("outbound", "udp", 1000, "52.12.48.92")?);
//! # Ok::<(), portwall::Error>(())
//! ```
//!
//! # Rule Format
//!
//! | Field | Example | Description |
//! |-------|---------|-------------|
//! | direction | `inbound` | `inbound` or `outbound` |
//! | protocol | `tcp` | `tcp` or `udp` |
//! | port | `80`, `1000-2000` | Single port or inclusive range |
//! | address | `10.0.0.1`, `10.0.0.0-10.0.0.255` | Single IPv4 address or inclusive range |
//!
//! # Errors
//!
//! Building fails with [`Error::Config`] or [`Error::Parse`] for bad rule
//! data; queries fail with [`Error::InvalidQuery`] or [`Error::Parse`].
//! There is no fail-open path: an error is never an implicit "allow".

mod direction;
mod error;
mod firewall;
mod protocol;

pub mod index;
pub mod interval;
pub mod loader;
pub mod rule;

// Re-export core types
pub use direction::Direction;
pub use error::{ConfigError, Error, ParseError, QueryError, Result};
pub use protocol::Protocol;

// Re-export index types
pub use index::{IndexConfig, IndexStats, RuleIndex, TableStats, PORT_COUNT};
pub use interval::{AddressInterval, IntervalSet};
pub use rule::{RuleRecord, RuleRow};

// Re-export loading entry points
pub use loader::{load_rules, load_rules_from_path, load_rules_from_reader, read_rows};

// Re-export hot reload handle
pub use firewall::Firewall;
