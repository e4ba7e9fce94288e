//! CSV rule source reader.
//!
//! The rule source is a comma-separated table whose first line names the
//! columns:
//!
//! ```text
//! direction,protocol,port,ip_address
//! inbound,tcp,80,192.168.1.2
//! outbound,tcp,10000-20000,192.168.10.11
//! inbound,udp,53,192.168.1.1-192.168.2.5
//! ```
//!
//! Columns may appear in any order and extra columns are ignored. The
//! address column may be called `address` or `ip_address`. Blank lines and
//! lines starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{ConfigError, Error, ParseError, Result};
use crate::index::{IndexConfig, RuleIndex};
use crate::rule::RuleRow;

const FIELD_SEPARATOR: char = ',';

/// UTF-8 byte order mark written by some spreadsheet exports.
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Column positions resolved from the header line.
#[derive(Debug, Clone, Copy)]
struct Columns {
    direction: usize,
    protocol: usize,
    port: usize,
    address: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<String> = split_fields(header)
            .map(|name| name.to_lowercase())
            .collect();
        let find = |candidates: &[&str], column: &'static str| {
            names
                .iter()
                .position(|name| candidates.contains(&name.as_str()))
                .ok_or(Error::Config(ConfigError::MissingColumn(column)))
        };

        Ok(Self {
            direction: find(&["direction"], "direction")?,
            protocol: find(&["protocol"], "protocol")?,
            port: find(&["port"], "port")?,
            address: find(&["address", "ip_address"], "address")?,
        })
    }

    fn required(&self) -> usize {
        self.direction
            .max(self.protocol)
            .max(self.port)
            .max(self.address)
            + 1
    }
}

/// Split a line into trimmed fields, stripping one level of double quotes.
fn split_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(FIELD_SEPARATOR).map(|field| {
        let field = field.trim();
        field
            .strip_prefix('"')
            .and_then(|f| f.strip_suffix('"'))
            .unwrap_or(field)
            .trim()
    })
}

fn is_skipped(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

/// Read raw rule rows from a CSV source.
///
/// Rows are not validated beyond having enough fields; that happens when
/// the index is built.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RuleRow>> {
    let buf_reader = BufReader::new(reader);
    let mut columns: Option<Columns> = None;
    let mut rows = Vec::new();

    for (idx, line) in buf_reader.lines().enumerate() {
        let mut line = line?;
        let line_num = idx + 1;
        if line_num == 1 && line.starts_with(BYTE_ORDER_MARK) {
            line.drain(..BYTE_ORDER_MARK.len_utf8());
        }

        if is_skipped(&line) {
            continue;
        }

        let cols = match columns {
            Some(cols) => cols,
            None => {
                columns = Some(Columns::from_header(&line).map_err(|e| e.at_line(line_num))?);
                continue;
            }
        };

        let fields: Vec<&str> = split_fields(&line).collect();
        if fields.len() < cols.required() {
            return Err(Error::from(ParseError::MissingField {
                expected: cols.required(),
                actual: fields.len(),
            })
            .at_line(line_num));
        }

        rows.push(
            RuleRow::new(
                fields[cols.direction],
                fields[cols.protocol],
                fields[cols.port],
                fields[cols.address],
            )
            .with_line(line_num),
        );
    }

    if columns.is_none() {
        log::warn!("rule source is empty (no header line)");
    }

    Ok(rows)
}

/// Build an index from raw rows with the default configuration.
pub fn load_rules<I>(rows: I) -> Result<RuleIndex>
where
    I: IntoIterator<Item = RuleRow>,
{
    RuleIndex::from_rows(rows)
}

/// Read a CSV source and build an index from it.
pub fn load_rules_from_reader<R: Read>(reader: R, config: IndexConfig) -> Result<RuleIndex> {
    let rows = read_rows(reader)?;
    RuleIndex::from_rows_with_config(rows, config)
}

/// Read a CSV file and build an index from it.
pub fn load_rules_from_path(path: impl AsRef<Path>, config: IndexConfig) -> Result<RuleIndex> {
    let path = path.as_ref();
    log::info!("Loading rules from {:?}", path);
    let file = File::open(path)?;
    load_rules_from_reader(file, config)
}
