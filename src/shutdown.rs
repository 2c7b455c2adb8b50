//! Server-wide shutdown signal

use tokio::sync::watch;

/// One-shot, level-triggered shutdown flag
///
/// Fired by an administrative `Shutdown` request or by the embedding
/// program. Once set it stays set.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Returns true for the first call only.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver for use in `select!` loops
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve once the signal has fired
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this cannot fail while borrowed
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `rx` observes the signal, or never if the sender is gone
pub(crate) async fn fired(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|fired| *fired).await.is_err() {
        std::future::pending::<()>().await;
    }
}
