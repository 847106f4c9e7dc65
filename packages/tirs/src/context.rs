//! Cooperative cancellation context.
//!
//! Every request entering the runtime carries an [`OpContext`] with an
//! optional deadline and a shared cancel flag. Blocking points check it at
//! well-defined boundaries; a breach produces a failure result, never a
//! partial write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::TirsError;

/// Deadline + cancellation token passed through the request path.
#[derive(Debug, Clone)]
pub struct OpContext {
    /// Absolute deadline, if any.
    deadline: Option<Instant>,
    /// Shared cancel flag; child contexts observe the parent's flag.
    cancelled: Arc<AtomicBool>,
}

impl Default for OpContext {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl OpContext {
    /// Context with no deadline.
    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Derive a child context sharing this context's cancel flag.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Signal cancellation to every holder of this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Has the caller cancelled?
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Remaining time before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Check for cancellation or deadline breach.
    pub fn check(&self) -> Result<(), TirsError> {
        if self.is_cancelled() {
            return Err(TirsError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(TirsError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_expires() {
        let ctx = OpContext::unbounded();
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_deadline_breach() {
        let ctx = OpContext::with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(ctx.check(), Err(TirsError::DeadlineExceeded)));
    }

    #[test]
    fn test_cancel_propagates_to_children() {
        let parent = OpContext::unbounded();
        let child = parent.child();
        parent.cancel();
        assert!(matches!(child.check(), Err(TirsError::Cancelled)));
    }
}
