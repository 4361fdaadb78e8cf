//! Cooperative cancellation for script calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::result::ScriptError;

struct TokenState {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<CancellationToken>,
}

/// A cancellation flag observed by executing script code.
///
/// Clones share the flag. Execution polls the token before every statement
/// and every loop iteration, so a cancelled call stops at the next poll.
///
/// A token trips when [`cancel`](CancellationToken::cancel) is called, when
/// its deadline passes, or when a token it is linked to trips.
#[derive(Clone)]
pub struct CancellationToken(Arc<TokenState>);

impl CancellationToken {
    /// A token that only trips when cancelled explicitly.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// A token that trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout), None)
    }

    /// A token that trips after `timeout`, or as soon as `parent` trips.
    pub fn linked(parent: &CancellationToken, timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout), Some(parent.clone()))
    }

    fn build(deadline: Option<Instant>, parent: Option<CancellationToken>) -> Self {
        Self(Arc::new(TokenState {
            cancelled: AtomicBool::new(false),
            deadline,
            parent,
        }))
    }

    /// Trip the token and every token linked beneath it.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
    }

    /// Whether the token has tripped.
    pub fn is_cancelled(&self) -> bool {
        if self.0.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if self.0.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            self.0.cancelled.store(true, Ordering::Release);
            return true;
        }
        self.0.parent.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// `Err(ScriptError::Cancelled)` once the token has tripped.
    pub fn check(&self) -> Result<(), ScriptError> {
        if self.is_cancelled() {
            return Err(ScriptError::Cancelled);
        }
        Ok(())
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.0.cancelled.load(Ordering::Relaxed))
            .field("deadline", &self.0.deadline)
            .field("linked", &self.0.parent.is_some())
            .finish()
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CancellationToken {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_cancel() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.clone().cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(ScriptError::Cancelled));
    }

    #[test]
    fn test_deadline_trips() {
        let token = CancellationToken::with_timeout(Duration::from_millis(0));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_linked_follows_parent() {
        let parent = CancellationToken::new();
        let child = CancellationToken::linked(&parent, Duration::from_secs(60));
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let child = CancellationToken::linked(&parent, Duration::from_secs(60));
        child.cancel();
        assert!(!parent.is_cancelled());
    }
}
