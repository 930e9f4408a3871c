//! Processed-row tracker
//!
//! Remembers which row identities were classified during this process
//! lifetime. Sheets are re-read from scratch every cycle, and a classified
//! row may still look unprocessed on the next read if the previous commit
//! has not landed yet; the tracker stops the engine from paying for a second
//! model call in that window.
//!
//! Nothing is persisted. After a restart the department column alone decides
//! what still needs work. Identities are released again when the commit that
//! should have persisted their outputs fails.

use std::collections::HashSet;

/// Set of row identities already classified
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    ids: HashSet<String>,
}

impl ProcessedSet {
    /// Create empty tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an identity was already classified
    #[inline]
    #[must_use]
    pub fn has_processed(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an identity as classified
    ///
    /// Returns `false` if it was already recorded.
    #[inline]
    pub fn mark_processed(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Drop an identity so it becomes a candidate again
    ///
    /// Returns `false` if it was not recorded.
    #[inline]
    pub fn forget(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    /// Number of recorded identities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if nothing was recorded yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
