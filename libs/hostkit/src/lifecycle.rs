//! Session lifecycle primitives.
//!
//! A server session moves through `NotStarted → Starting → Running →
//! Stopped`. The `Starting → Running` transition is driven by a one-shot
//! [`ReadySignal`]: the background accept loop fulfills it exactly once,
//! either with the bound address or with the startup failure, and the
//! caller waits on the receiving half under a timeout.

use tokio::sync::oneshot;

/// Where a server session is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Starting,
    Running,
    Stopped,
}

/// One-shot startup notification, resolved at most once.
///
/// The signal is consumed by [`notify`](Self::notify), so a second
/// fulfillment is unrepresentable: whichever outcome is sent first is the
/// one the waiter observes.
#[derive(Debug)]
pub struct ReadySignal<T> {
    tx: oneshot::Sender<T>,
}

impl<T> ReadySignal<T> {
    /// Create a signal together with the receiving half the caller waits on.
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self::from_sender(tx), rx)
    }

    /// Wrap an existing sender (useful when tests drive the choreography).
    pub fn from_sender(tx: oneshot::Sender<T>) -> Self {
        Self { tx }
    }

    /// Resolve the signal with `outcome`. Returns false when the waiter is
    /// already gone (e.g. it timed out and stopped listening).
    pub fn notify(self, outcome: T) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_delivers_the_outcome() {
        let (ready, rx) = ReadySignal::channel();
        assert!(ready.notify(42u16));
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dropped_signal_is_observable() {
        let (ready, rx) = ReadySignal::<()>::channel();
        drop(ready);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn notify_after_waiter_gone_reports_false() {
        let (ready, rx) = ReadySignal::channel();
        drop(rx);
        assert!(!ready.notify(1u8));
    }
}
