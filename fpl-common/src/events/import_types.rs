//! Import workflow type definitions
//!
//! Supporting types for curation import progress tracking.

use serde::{Deserialize, Serialize};

/// Progress through a bulk import
///
/// `current` counts curations already processed (successful or not), so a
/// sequence of progress values for one batch never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub current: usize,
    pub total: usize,
}

impl ImportProgress {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    /// Percentage complete (0-100)
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.current as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_done(&self) -> bool {
        self.current >= self.total
    }
}

/// Final tally of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub imported: usize,
    pub failed: usize,
    pub skipped: usize,
}
