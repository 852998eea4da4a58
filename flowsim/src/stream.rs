use crate::SessionId;
use flowsim_core::TickSnapshot;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// The snapshots of one session, in tick order.
///
/// A subscriber that falls behind by more than the snapshot buffer skips
/// ahead to the oldest snapshot still retained. The stream ends when the
/// session stops.
#[derive(Debug)]
pub struct SnapshotStream {
    session: SessionId,
    receiver: broadcast::Receiver<Arc<TickSnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(
        session: SessionId,
        receiver: broadcast::Receiver<Arc<TickSnapshot>>,
    ) -> Self {
        Self { session, receiver }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Wait for the next snapshot. `None` once the session has stopped.
    pub async fn next(&mut self) -> Option<Arc<TickSnapshot>> {
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(session = %self.session, skipped, "slow subscriber skipped snapshots");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tick: u64) -> Arc<TickSnapshot> {
        Arc::new(TickSnapshot {
            tick,
            timestamp: 0,
            total_rps: 0.0,
            served_rps: 0.0,
            dropped_rps: 0.0,
            spike_active: false,
            bottleneck_ids: Vec::new(),
            nodes: Vec::new(),
        })
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_at_oldest_retained() {
        let (sender, receiver) = broadcast::channel(2);
        let mut stream = SnapshotStream::new(SessionId::new("s"), receiver);

        for tick in 1..=5 {
            sender.send(snapshot(tick)).unwrap();
        }
        drop(sender);

        assert_eq!(stream.next().await.unwrap().tick, 4);
        assert_eq!(stream.next().await.unwrap().tick, 5);
        assert!(stream.next().await.is_none());
    }
}
