//! Port and port range parsing.

use std::ops::RangeInclusive;

use super::RANGE_SEPARATOR;
use crate::error::{ConfigError, ParseError, Result};

/// Parse a single port token.
///
/// Non-numeric input is a parse error; numbers above 65535 are rejected as
/// configuration errors.
pub fn parse_port(s: &str) -> Result<u16> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidPort(s.to_string()).into());
    }
    // Digits only: a u32 overflow is still just "too large"
    let value = s.parse::<u32>().unwrap_or(u32::MAX);
    u16::try_from(value).map_err(|_| ConfigError::PortOutOfRange(value).into())
}

/// Parse a port token: either `n` or `low-high`.
///
/// A single port becomes the degenerate range `n..=n`.
pub fn parse_port_range(s: &str) -> Result<RangeInclusive<u16>> {
    let s = s.trim();
    match s.split_once(RANGE_SEPARATOR) {
        None => {
            let port = parse_port(s)?;
            Ok(port..=port)
        }
        Some((low, high)) => {
            if high.contains(RANGE_SEPARATOR) {
                return Err(ParseError::InvalidRange(s.to_string()).into());
            }
            let low = parse_port(low)?;
            let high = parse_port(high)?;
            if low > high {
                return Err(ConfigError::InvertedPortRange { low, high }.into());
            }
            Ok(low..=high)
        }
    }
}
