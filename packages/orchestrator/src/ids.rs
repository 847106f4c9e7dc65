//! Request, handoff, and workflow identifier generation.
//!
//! Identifiers embed a local-time component plus a per-process sequence:
//! `REQ-YYYYMMDDhhmmss-NNNNNN`, `HO-YYYYMMDDhhmmss-NNNN`. Counters reset
//! on process restart.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;

/// Monotonic formatted id sequence.
#[derive(Debug)]
pub struct IdSequence {
    prefix: &'static str,
    width: usize,
    counter: AtomicU64,
}

impl IdSequence {
    pub const fn new(prefix: &'static str, width: usize) -> Self {
        Self {
            prefix,
            width,
            counter: AtomicU64::new(0),
        }
    }

    /// Next id in the sequence.
    pub fn next(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!(
            "{}-{}-{:0width$}",
            self.prefix,
            Local::now().format("%Y%m%d%H%M%S"),
            seq,
            width = self.width
        )
    }

    /// Ids issued so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_matches_shape() {
        let ids = IdSequence::new("REQ", 6);
        let id = ids.next();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts[0], "REQ");
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2], "000001");
    }

    #[test]
    fn test_sequence_increments() {
        let ids = IdSequence::new("HO", 4);
        let first = ids.next();
        let second = ids.next();
        assert!(first.ends_with("0001"));
        assert!(second.ends_with("0002"));
        assert_eq!(ids.issued(), 2);
    }
}
