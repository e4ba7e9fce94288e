//! Shared firewall handle with atomic rule reloads.

use arc_swap::ArcSwap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::index::{IndexConfig, IndexStats, RuleIndex};
use crate::loader::load_rules_from_path;
use crate::rule::RuleRow;
use crate::{Direction, Protocol, Result};

/// Firewall serves queries from the active [`RuleIndex`] and swaps in new
/// rule sets without blocking readers.
///
/// A reload builds a complete new index before publishing it. Queries that
/// started before the swap finish against the old index; queries that
/// start after it see the new one. If the build fails the old index stays
/// active.
///
/// # Examples
///
/// ```
/// use portwall::{Firewall, RuleIndex, RuleRow};
///
/// let index = RuleIndex::from_rows(vec![RuleRow::new("inbound", "tcp", "22", "10.0.0.5")]).unwrap();
/// let firewall = Firewall::new(index);
/// assert!(firewall.is_allowed("inbound", "tcp", 22, "10.0.0.5").unwrap());
///
/// firewall
///     .reload_from_rows(vec![RuleRow::new("inbound", "tcp", "443", "10.0.0.5")])
///     .unwrap();
/// assert!(!firewall.is_allowed("inbound", "tcp", 22, "10.0.0.5").unwrap());
/// assert_eq!(firewall.generation(), 1);
/// ```
pub struct Firewall {
    /// The active index, wrapped in ArcSwap for atomic replacement.
    active: ArcSwap<RuleIndex>,
    /// Configuration used for reloads.
    config: IndexConfig,
    /// Incremented on every successful reload.
    generation: AtomicU64,
}

impl Firewall {
    /// Wrap an already built index.
    pub fn new(index: RuleIndex) -> Self {
        let config = index.config().clone();
        Self {
            active: ArcSwap::from_pointee(index),
            config,
            generation: AtomicU64::new(0),
        }
    }

    /// Load a CSV rule file with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, IndexConfig::default())
    }

    /// Load a CSV rule file.
    pub fn open_with_config(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let index = load_rules_from_path(path, config)?;
        Ok(Self::new(index))
    }

    /// Check a packet against the active index.
    pub fn allows(
        &self,
        direction: Direction,
        protocol: Protocol,
        port: u16,
        address: Ipv4Addr,
    ) -> bool {
        self.active.load().allows(direction, protocol, port, address)
    }

    /// Check a packet given in textual form against the active index.
    ///
    /// See [`RuleIndex::is_allowed`].
    pub fn is_allowed(
        &self,
        direction: &str,
        protocol: &str,
        port: i64,
        address: &str,
    ) -> Result<bool> {
        self.active
            .load()
            .is_allowed(direction, protocol, port, address)
    }

    /// The active index.
    ///
    /// The returned snapshot stays valid, and unchanged, across reloads.
    pub fn snapshot(&self) -> Arc<RuleIndex> {
        self.active.load_full()
    }

    /// Statistics for the active index.
    pub fn stats(&self) -> IndexStats {
        self.active.load().stats()
    }

    /// Publish an already built index.
    ///
    /// The generation is bumped before the new index is stored, so a reader
    /// that observes the new index never sees the previous generation.
    pub fn replace(&self, index: RuleIndex) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.active.store(Arc::new(index));
        log::info!(
            "[{}] rule index replaced (generation {})",
            self.config.name,
            generation
        );
    }

    /// Rebuild from a CSV rule file and publish the result.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match load_rules_from_path(path, self.config.clone()) {
            Ok(index) => {
                log::debug!("[{}] rebuilt rules from {:?}", self.config.name, path);
                self.replace(index);
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "[{}] reload from {:?} failed, keeping previous rules: {}",
                    self.config.name,
                    path,
                    e
                );
                Err(e)
            }
        }
    }

    /// Rebuild from raw rows and publish the result.
    pub fn reload_from_rows<I>(&self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = RuleRow>,
    {
        match RuleIndex::from_rows_with_config(rows, self.config.clone()) {
            Ok(index) => {
                self.replace(index);
                Ok(())
            }
            Err(e) => {
                log::error!(
                    "[{}] reload failed, keeping previous rules: {}",
                    self.config.name,
                    e
                );
                Err(e)
            }
        }
    }

    /// Number of successful reloads since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;

    fn web_rules() -> Vec<RuleRow> {
        vec![
            RuleRow::new("inbound", "tcp", "80", "192.168.1.0-192.168.1.255"),
            RuleRow::new("inbound", "tcp", "443", "192.168.1.0-192.168.1.255"),
        ]
    }

    #[test]
    fn test_firewall_basic() {
        let firewall = Firewall::new(RuleIndex::from_rows(web_rules()).unwrap());

        assert!(firewall.is_allowed("inbound", "tcp", 80, "192.168.1.2").unwrap());
        assert!(firewall.allows(
            Direction::Inbound,
            Protocol::Tcp,
            443,
            Ipv4Addr::new(192, 168, 1, 200)
        ));
        assert!(!firewall.is_allowed("inbound", "tcp", 8080, "192.168.1.2").unwrap());
        assert_eq!(firewall.generation(), 0);
    }

    #[test]
    fn test_reload_swaps_rules() {
        let firewall = Firewall::new(RuleIndex::from_rows(web_rules()).unwrap());
        let before = firewall.snapshot();

        firewall
            .reload_from_rows(vec![RuleRow::new("inbound", "tcp", "8080", "192.168.1.2")])
            .unwrap();

        assert_eq!(firewall.generation(), 1);
        assert!(!firewall.is_allowed("inbound", "tcp", 80, "192.168.1.2").unwrap());
        assert!(firewall.is_allowed("inbound", "tcp", 8080, "192.168.1.2").unwrap());

        // The old snapshot is untouched
        assert!(before.is_allowed("inbound", "tcp", 80, "192.168.1.2").unwrap());
        assert!(!before.is_allowed("inbound", "tcp", 8080, "192.168.1.2").unwrap());
    }

    #[test]
    fn test_failed_reload_keeps_previous_rules() {
        let firewall = Firewall::new(RuleIndex::from_rows(web_rules()).unwrap());

        let result = firewall.reload_from_rows(vec![
            RuleRow::new("inbound", "tcp", "22", "10.0.0.1"),
            RuleRow::new("inbound", "gre", "22", "10.0.0.1"),
        ]);

        assert!(result.is_err());
        assert_eq!(firewall.generation(), 0);
        assert!(firewall.is_allowed("inbound", "tcp", 80, "192.168.1.2").unwrap());
        assert!(!firewall.is_allowed("inbound", "tcp", 22, "10.0.0.1").unwrap());
    }

    #[test]
    fn test_open_and_reload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.csv");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "direction,protocol,port,address").unwrap();
        writeln!(file, "outbound,udp,53,8.8.8.8").unwrap();
        drop(file);

        let firewall = Firewall::open(&path).unwrap();
        assert!(firewall.is_allowed("outbound", "udp", 53, "8.8.8.8").unwrap());

        std::fs::write(
            &path,
            "direction,protocol,port,address\noutbound,udp,53,1.1.1.1\n",
        )
        .unwrap();
        firewall.reload(&path).unwrap();

        assert!(!firewall.is_allowed("outbound", "udp", 53, "8.8.8.8").unwrap());
        assert!(firewall.is_allowed("outbound", "udp", 53, "1.1.1.1").unwrap());
        assert_eq!(firewall.stats().rules, 1);
    }

    #[test]
    fn test_generation_counts_replacements() {
        let firewall = Firewall::new(RuleIndex::from_rows(web_rules()).unwrap());

        for expected in 1..=3 {
            firewall.replace(RuleIndex::from_rows(web_rules()).unwrap());
            assert_eq!(firewall.generation(), expected);
        }

        assert!(firewall
            .reload_from_rows(vec![RuleRow::new("inbound", "tcp", "eighty", "10.0.0.1")])
            .is_err());
        assert_eq!(firewall.generation(), 3);
    }

    #[test]
    fn test_reload_missing_file() {
        let firewall = Firewall::new(RuleIndex::from_rows(web_rules()).unwrap());
        let err = firewall.reload("/nonexistent/portwall/rules.csv").unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
        assert_eq!(firewall.generation(), 0);
    }

    #[test]
    fn test_concurrent_readers_during_reload() {
        let firewall = Arc::new(Firewall::new(RuleIndex::from_rows(web_rules()).unwrap()));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let firewall = Arc::clone(&firewall);
                thread::spawn(move || {
                    for _ in 0..200 {
                        // Each snapshot is either the old or the new rule set, never a mix
                        let snapshot = firewall.snapshot();
                        let port_80 = snapshot.is_allowed("inbound", "tcp", 80, "192.168.1.2").unwrap();
                        let port_443 = snapshot.is_allowed("inbound", "tcp", 443, "192.168.1.2").unwrap();
                        assert_eq!(port_80, port_443);
                    }
                })
            })
            .collect();

        for _ in 0..5 {
            firewall
                .reload_from_rows(vec![RuleRow::new("outbound", "tcp", "25", "10.0.0.1")])
                .unwrap();
            firewall.reload_from_rows(web_rules()).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(firewall.generation(), 10);
    }
}
