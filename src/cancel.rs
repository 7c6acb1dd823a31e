//! Cooperative cancellation handle shared by [`crate::scan`] and
//! [`crate::transition`] (§5, §4.9.5, §4.10.5).
//!
//! This is a thin, `Clone`-able wrapper over [`tokio_util::sync::CancellationToken`]:
//! a scan or transition polls it at well-defined preemption points rather
//! than relying on coroutine-style control flow (§9 "Coroutine-style
//! preemption").

use tokio_util::sync::CancellationToken;

/// A cheaply cloned, cooperatively-polled cancellation signal.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(CancellationToken);

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    /// Signals cancellation to every clone of this handle.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether [`Self::cancel`] has been called on this handle or a clone
    /// of it. This is the preemption check: scan and transition call it
    /// at every preemption point (§4.9.5, §4.10.5) and return promptly
    /// rather than awaiting the token.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once cancelled. Offered for callers that want to race a
    /// cancellation against other async work; scan and transition
    /// themselves only ever poll [`Self::is_cancelled`].
    pub async fn cancelled(&self) {
        self.0.cancelled().await;
    }
}
