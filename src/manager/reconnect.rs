//! Reconnect bookkeeping and the cancellable retry timer.

// ============================================================================
// Imports
// ============================================================================

use tokio::task::JoinHandle;
use tracing::trace;

// ============================================================================
// PendingReconnect
// ============================================================================

/// A scheduled retry.
///
/// The ticket is checked again when the timer fires, so a timer that lost
/// the race against [`ReconnectState::cancel_pending`] does nothing.
#[derive(Debug)]
pub(crate) struct PendingReconnect {
    /// Matches the ticket captured by the timer task.
    pub(crate) ticket: u64,
    /// Sleeping timer task.
    pub(crate) task: JoinHandle<()>,
}

// ============================================================================
// ReconnectState
// ============================================================================

/// Attempt counter, pending timer and manual-disconnect flag.
#[derive(Debug, Default)]
pub(crate) struct ReconnectState {
    /// Consecutive automatic attempts since the last success or explicit connect.
    pub(crate) attempt_count: u32,
    /// At most one outstanding timer.
    pub(crate) pending: Option<PendingReconnect>,
    /// Set by `disconnect`, cleared by `connect`.
    pub(crate) manually_disconnected: bool,
}

impl ReconnectState {
    /// Aborts the outstanding timer, if any.
    pub(crate) fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            trace!(ticket = pending.ticket, "Cancelling pending reconnect");
            pending.task.abort();
        }
    }

    /// Takes the pending timer if it carries `ticket`.
    pub(crate) fn take_if_current(&mut self, ticket: u64) -> Option<PendingReconnect> {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => self.pending.take(),
            _ => None,
        }
    }

    /// Returns `true` if a timer is outstanding.
    #[inline]
    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for ReconnectState {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

// ============================================================================
// Tests
// ============================================================================
