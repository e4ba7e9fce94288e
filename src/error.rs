//! Error types for portwall.

use thiserror::Error;

use crate::interval::AddressInterval;

/// Error type for portwall operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed address or port token
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Rule data that parses but cannot be accepted
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Query outside the closed direction/protocol/port domain
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised while processing a specific input row
    #[error("line {line}: {source}")]
    Row {
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the source line number of the row that produced this error.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Error::Row { .. } => self,
            other => Error::Row {
                line,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with any row context removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::Row { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns `true` for malformed address or port tokens.
    pub fn is_parse(&self) -> bool {
        matches!(self.root(), Error::Parse(_))
    }

    /// Returns `true` for rejected rule data.
    pub fn is_config(&self) -> bool {
        matches!(self.root(), Error::Config(_))
    }

    /// Returns `true` for queries outside the supported domain.
    pub fn is_invalid_query(&self) -> bool {
        matches!(self.root(), Error::InvalidQuery(_))
    }
}

/// Result type alias for portwall operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for address and port token parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Address does not have exactly four dot-separated components
    #[error("invalid IPv4 address (expected 4 octets): {0}")]
    OctetCount(String),

    /// Address component is empty or not a decimal number
    #[error("invalid IPv4 octet in {0}")]
    InvalidOctet(String),

    /// Address component is numeric but larger than 255
    #[error("IPv4 octet out of range (0-255) in {0}")]
    OctetOutOfRange(String),

    /// Port token is empty or not a decimal number
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// Range token has more than one separator or an empty side
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Row has fewer fields than the header requires
    #[error("expected at least {expected} fields, got {actual}")]
    MissingField { expected: usize, actual: usize },
}

/// Error type for rule data that cannot be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Direction is not `inbound` or `outbound`
    #[error("unknown direction: {0}")]
    UnknownDirection(String),

    /// Protocol is not `tcp` or `udp`
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Port value above 65535
    #[error("port out of range (0-65535): {0}")]
    PortOutOfRange(u32),

    /// Port range with low bound above high bound
    #[error("invalid port range: {low} > {high}")]
    InvertedPortRange { low: u16, high: u16 },

    /// Address range with low bound above high bound
    #[error("invalid address range: {low} > {high}")]
    InvertedAddressRange {
        low: std::net::Ipv4Addr,
        high: std::net::Ipv4Addr,
    },

    /// Rule interval overlaps one already present on the same port
    #[error("{interval} overlaps {existing} on port {port}")]
    Overlap {
        port: u16,
        interval: AddressInterval,
        existing: AddressInterval,
    },

    /// Rule source header lacks a required column
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
}

/// Error type for allow/deny queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Direction is not `inbound` or `outbound`
    #[error("unknown direction: {0}")]
    UnknownDirection(String),

    /// Protocol is not `tcp` or `udp`
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Port outside 0-65535
    #[error("port out of range (0-65535): {0}")]
    PortOutOfRange(i64),
}
