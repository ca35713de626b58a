//! Cooperative cancellation shared by the loop and the per-block handler.

use tokio::sync::watch;
use tracing::info;

/// Requests a stop. Dropping it without calling [`ShutdownTrigger::trigger`]
/// leaves the keeper running.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        if !*self.tx.borrow() {
            info!("shutdown requested");
        }
        let _ = self.tx.send(true);
    }
}

/// Observes whether a stop was requested.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested.
    pub async fn requested(&mut self) {
        let observed = self.rx.wait_for(|stop| *stop).await.is_ok();
        if !observed {
            // trigger dropped: nobody can ask us to stop anymore
            std::future::pending::<()>().await;
        }
    }
}
