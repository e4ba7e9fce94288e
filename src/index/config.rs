//! RuleIndex configuration types.

/// Configuration applied while building a [`RuleIndex`](super::RuleIndex).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Label used in log lines and statistics
    pub name: String,
    /// Fail the build when two rules place overlapping address intervals
    /// on the same (direction, protocol, port).
    ///
    /// When disabled, overlapping input is inserted as-is and lookups on the
    /// affected ports may miss addresses covered by the overlapped rules.
    pub reject_overlaps: bool,
}

impl IndexConfig {
    /// Create a configuration with the given name and default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set whether overlapping intervals fail the build.
    pub fn with_reject_overlaps(mut self, reject: bool) -> Self {
        self.reject_overlaps = reject;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            reject_overlaps: true,
        }
    }
}
