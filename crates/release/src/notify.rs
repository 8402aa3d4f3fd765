//! Consolidated forge notifications.
//!
//! Messages produced during a cycle are collected per target and posted as a
//! single comment per target when the cycle ends.

use crate::host::{CommentTarget, ProjectHost};
use std::collections::BTreeMap;
use tracing::warn;

/// Messages pending for the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notifications {
    pending: BTreeMap<CommentTarget, Vec<String>>,
}

impl Notifications {
    /// Creates an empty set of notifications.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `message` for `target`.
    pub fn push(&mut self, target: CommentTarget, message: impl Into<String>) {
        self.pending.entry(target).or_default().push(message.into());
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Messages queued for `target`.
    #[must_use]
    pub fn messages(&self, target: CommentTarget) -> &[String] {
        self.pending
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Targets with queued messages.
    pub fn targets(&self) -> impl Iterator<Item = CommentTarget> + '_ {
        self.pending.keys().copied()
    }

    /// Posts one comment per target and clears the queue.
    ///
    /// A failed post is logged and does not stop the remaining targets.
    /// Returns the number of comments posted.
    pub async fn flush(&mut self, host: &dyn ProjectHost) -> usize {
        let mut posted = 0;
        for (target, messages) in std::mem::take(&mut self.pending) {
            let body = messages.join("\n");
            match host.comment(target, &body).await {
                Ok(()) => posted += 1,
                Err(e) => warn!(%target, error = %e, "Failed to post comment"),
            }
        }
        posted
    }
}
