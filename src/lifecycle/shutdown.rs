//! Shutdown coordination for the runtime.

use std::future::Future;

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Every listener task subscribes; one trigger stops them all. Subscribing
/// after the trigger still observes it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// A future resolving once shutdown has been triggered.
    pub fn notified(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            // An error means the coordinator is gone, which also ends serving.
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn late_subscribers_see_the_trigger() {
        let shutdown = Shutdown::new();
        let early = shutdown.notified();
        shutdown.trigger();
        let late = shutdown.notified();

        tokio::time::timeout(Duration::from_secs(1), async {
            early.await;
            late.await;
        })
        .await
        .unwrap();
        assert!(shutdown.is_triggered());
    }
}
