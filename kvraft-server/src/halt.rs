//! One-way halt signal for fail-stop shutdown.

use std::sync::Arc;
use tokio::sync::watch;

/// Latched signal raised when the node hits a fatal local defect.
///
/// Once triggered it stays triggered; every waiter, present or future,
/// observes it.
#[derive(Debug, Clone)]
pub struct Halt {
    tx: Arc<watch::Sender<bool>>,
}

impl Halt {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has been raised.
    pub fn is_halted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal is raised.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once halted.
        let _ = rx.wait_for(|halted| *halted).await;
    }
}

impl Default for Halt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_trigger() {
        let halt = Halt::new();
        assert!(!halt.is_halted());

        let waiter = {
            let halt = halt.clone();
            tokio::spawn(async move { halt.wait().await })
        };

        halt.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter should not panic");
        assert!(halt.is_halted());
    }

    #[tokio::test]
    async fn test_late_waiter_sees_trigger() {
        let halt = Halt::new();
        halt.trigger();

        tokio::time::timeout(Duration::from_secs(1), halt.wait())
            .await
            .expect("already halted");
    }
}
