use tokio::sync::watch;

/// Controller sending the signal to every [`ShutdownReceiver`] that the
/// registry is going away and its sessions must stop.
///
/// Once sent the signal cannot be recalled.
pub(crate) struct ShutdownController(watch::Sender<bool>);

/// Receiving end of the shutdown signal, one per session engine plus the
/// reaper.
#[derive(Clone)]
pub(crate) struct ShutdownReceiver(watch::Receiver<bool>);

impl ShutdownController {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self(sender)
    }

    pub(crate) fn subscribe(&self) -> ShutdownReceiver {
        ShutdownReceiver(self.0.subscribe())
    }

    pub(crate) fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

impl ShutdownReceiver {
    /// Resolves to `true` once the shutdown is signalled, or once the
    /// controller is dropped.
    pub(crate) async fn is_shutting_down(&mut self) -> bool {
        self.0.wait_for(|b| *b).await.map(|r| *r).unwrap_or(true)
    }
}
