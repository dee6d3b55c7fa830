//! Cooperative cancellation
//!
//! A `CancelContext` is handed to the monitor and threaded through every
//! collaborator call. Nothing is interrupted forcibly: each holder decides
//! where it checks the context. The monitor itself only checks it between
//! polling cycles.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Why a context was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Operator asked the process to stop (Ctrl-C or host shutdown)
    Interrupted,
    /// A deadline attached with `CancelContext::with_deadline` elapsed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Interrupted => write!(f, "interrupted"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Create a linked canceller/context pair.
pub fn cancel_pair() -> (Canceller, CancelContext) {
    let (tx, rx) = watch::channel(None);
    (Canceller { tx }, CancelContext { rx })
}

/// Sending half: fires every context subscribed to it.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<Option<CancelReason>>,
}

impl Canceller {
    /// Cancel with the given reason. The first reason wins; later calls are ignored.
    pub fn cancel(&self, reason: CancelReason) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    /// Another context observing this canceller
    pub fn context(&self) -> CancelContext {
        CancelContext {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live contexts observing this canceller
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Resolves once every context observing this canceller has been dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Receiving half, cheap to clone.
///
/// If every `Canceller` for a context is dropped before firing, the context
/// can never be cancelled and `cancelled()` pends forever.
#[derive(Debug, Clone)]
pub struct CancelContext {
    rx: watch::Receiver<Option<CancelReason>>,
}

impl CancelContext {
    /// A context that is never cancelled. Used for one-shot CLI commands.
    pub fn never() -> Self {
        let (_, ctx) = cancel_pair();
        ctx
    }

    /// Reason the context was cancelled, if it has been
    pub fn reason(&self) -> Option<CancelReason> {
        *self.rx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Wait until the context is cancelled and return the reason.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        let outcome = rx.wait_for(Option::is_some).await.ok().and_then(|reason| *reason);
        if let Some(reason) = outcome {
            return reason;
        }
        // Every canceller is gone without firing
        std::future::pending().await
    }

    /// Drive `fut` to completion unless the context fires first.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output, CancelReason> {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            output = fut => Ok(output),
        }
    }

    /// Derive a child context that fires when this one does, or with
    /// `DeadlineExceeded` once `timeout` elapses. Must be called inside a
    /// tokio runtime. The background timer ends early once every clone of
    /// the child has been dropped.
    pub fn with_deadline(&self, timeout: Duration) -> CancelContext {
        let (canceller, child) = cancel_pair();
        let parent = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                reason = parent.cancelled() => canceller.cancel(reason),
                _ = tokio::time::sleep(timeout) => {
                    canceller.cancel(CancelReason::DeadlineExceeded)
                }
                _ = canceller.closed() => {}
            }
        });
        child
    }
}
