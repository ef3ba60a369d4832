// Driver control signals: graceful shutdown and connectivity transitions

use tokio::sync::watch;

/// Shutdown signal for graceful driver termination
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        let _ = self.rx.changed().await;
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to the driver
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

/// Connectivity signal; bridged into the queue's offline admission control
#[derive(Clone)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<bool>, // true = online
}

impl ConnectivityWatch {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Next connectivity transition, or None once the sender is gone
    pub async fn next_transition(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow())
    }
}

/// Connectivity sender, driven by whatever connectivity detection the
/// embedding application has
pub struct ConnectivitySender {
    tx: watch::Sender<bool>,
}

impl ConnectivitySender {
    pub fn set_online(&self) {
        let _ = self.tx.send(true);
    }

    pub fn set_offline(&self) {
        let _ = self.tx.send(false);
    }
}

/// Create a connectivity channel
pub fn connectivity_channel(initially_online: bool) -> (ConnectivitySender, ConnectivityWatch) {
    let (tx, rx) = watch::channel(initially_online);
    (ConnectivitySender { tx }, ConnectivityWatch { rx })
}
