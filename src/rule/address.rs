//! Dotted-decimal IPv4 address and address range parsing.

use std::net::Ipv4Addr;

use super::RANGE_SEPARATOR;
use crate::error::{Error, ParseError, Result};
use crate::interval::AddressInterval;

/// Parse a dotted-decimal IPv4 address.
///
/// Exactly four components are required, each a non-empty run of ASCII
/// digits no larger than 255. Surrounding whitespace is ignored.
///
/// # Examples
/// ```
/// use portwall::rule::parse_address;
/// use std::net::Ipv4Addr;
///
/// assert_eq!(parse_address("192.168.1.2").unwrap(), Ipv4Addr::new(192, 168, 1, 2));
/// assert!(parse_address("1.234.444.0").is_err());
/// ```
pub fn parse_address(s: &str) -> std::result::Result<Ipv4Addr, ParseError> {
    let s = s.trim();
    let mut octets = [0u8; 4];
    let mut count = 0;

    for part in s.split('.') {
        if count == 4 {
            return Err(ParseError::OctetCount(s.to_string()));
        }
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidOctet(s.to_string()));
        }
        // All digits, so the only possible failure is overflow
        octets[count] = part
            .parse::<u8>()
            .map_err(|_| ParseError::OctetOutOfRange(s.to_string()))?;
        count += 1;
    }

    if count != 4 {
        return Err(ParseError::OctetCount(s.to_string()));
    }

    Ok(Ipv4Addr::from(octets))
}

/// Parse an address token: either `a.b.c.d` or `a.b.c.d-e.f.g.h`.
///
/// A single address becomes the degenerate interval `[a, a]`.
pub fn parse_address_range(s: &str) -> Result<AddressInterval> {
    let s = s.trim();
    match s.split_once(RANGE_SEPARATOR) {
        None => Ok(AddressInterval::single(parse_address(s)?)),
        Some((low, high)) => {
            if high.contains(RANGE_SEPARATOR) {
                return Err(ParseError::InvalidRange(s.to_string()).into());
            }
            let low = parse_address(low)?;
            let high = parse_address(high)?;
            AddressInterval::new(low, high).map_err(Error::from)
        }
    }
}
