//! Memoizing compiler for content and status patterns.

use dnswatch_core::RegexFlags;
use regex::bytes::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Compiled patterns keyed by pattern text and flags.
///
/// Compilation happens outside the lock; when two callers race on the same
/// key the first insert is kept and both receive it, so a key only ever
/// maps to one compiled object. Failures are returned and never cached.
#[derive(Debug, Default)]
pub struct RegexCache {
    entries: Mutex<HashMap<(String, RegexFlags), Arc<Regex>>>,
}

impl RegexCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compiled matcher for `pattern`, compiling it on a miss.
    pub fn get(&self, pattern: &str, flags: RegexFlags) -> Result<Arc<Regex>, regex::Error> {
        let key = (pattern.to_string(), flags);
        if let Some(found) = self.lock().get(&key) {
            return Ok(Arc::clone(found));
        }

        let compiled = Arc::new(
            RegexBuilder::new(pattern)
                .case_insensitive(flags.case_insensitive)
                .multi_line(flags.multi_line)
                .dot_matches_new_line(flags.dot_matches_new_line)
                .build()?,
        );
        debug!(pattern, flags = flags.bits(), "compiled pattern");

        Ok(Arc::clone(self.lock().entry(key).or_insert(compiled)))
    }

    /// Number of cached matchers
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been compiled yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, RegexFlags), Arc<Regex>>> {
        // Entries are only ever inserted whole; a poisoned map is still valid.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
