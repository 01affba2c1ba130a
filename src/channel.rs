//! Fan-out of cycle results to live observers.
//!
//! Every observer has its own cursor: all of them see every cycle in
//! order while they keep up, and a slow observer only ever loses its own
//! oldest unread results. The backlog per observer is bounded by the
//! channel capacity; overruns are counted, not silent.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;

pub struct Distributor<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T> Clone for Distributor<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Distributor<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> Observer<T> {
        Observer {
            rx: self.tx.subscribe(),
            dropped: 0,
        }
    }

    /// Publishes one result to all current observers. A result published
    /// with no observer attached is simply gone; there is no replay.
    pub fn publish(&self, item: T) {
        let _ = self.tx.send(Arc::new(item));
    }
}

pub struct Observer<T> {
    rx: broadcast::Receiver<Arc<T>>,
    dropped: u64,
}

impl<T: Send + Sync + 'static> Observer<T> {
    /// Blocking pull of the next result relative to this observer's own
    /// cursor. `None` once the producer is gone and the backlog drained.
    pub async fn latest(&mut self) -> Option<Arc<T>> {
        loop {
            match self.rx.recv().await {
                Ok(item) => return Some(item),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped += n;
                    warn!("observer lagging, dropped {} cycle results", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Results this observer has lost to lag so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_observers_see_each_cycle_in_order() {
        let distributor = Distributor::new(8);
        let mut first = distributor.subscribe();
        let mut second = distributor.subscribe();

        distributor.publish(1u32);
        distributor.publish(2u32);

        assert_eq!(*first.latest().await.unwrap(), 1);
        assert_eq!(*second.latest().await.unwrap(), 1);
        assert_eq!(*first.latest().await.unwrap(), 2);
        assert_eq!(*second.latest().await.unwrap(), 2);
        assert_eq!(first.dropped(), 0);
        assert_eq!(second.dropped(), 0);
    }

    #[tokio::test]
    async fn late_observer_only_sees_later_cycles() {
        let distributor = Distributor::new(8);
        let mut early = distributor.subscribe();
        distributor.publish(10u32);

        let mut late = distributor.subscribe();
        distributor.publish(11u32);

        assert_eq!(*early.latest().await.unwrap(), 10);
        assert_eq!(*early.latest().await.unwrap(), 11);
        // no retroactive delivery of cycle 10
        assert_eq!(*late.latest().await.unwrap(), 11);
    }

    #[tokio::test]
    async fn slow_observer_loses_only_its_own_oldest_results() {
        let distributor = Distributor::new(1);
        let mut slow = distributor.subscribe();

        distributor.publish(1u32);
        distributor.publish(2u32);
        distributor.publish(3u32);

        // the backlog kept only the newest unread result
        assert_eq!(*slow.latest().await.unwrap(), 3);
        assert_eq!(slow.dropped(), 2);

        // a fresh observer is unaffected by the slow one
        let mut fast = distributor.subscribe();
        distributor.publish(4u32);
        assert_eq!(*fast.latest().await.unwrap(), 4);
        assert_eq!(fast.dropped(), 0);
    }

    #[tokio::test]
    async fn closed_channel_drains_then_ends() {
        let distributor = Distributor::new(4);
        let mut observer = distributor.subscribe();
        distributor.publish(7u32);
        drop(distributor);

        assert_eq!(*observer.latest().await.unwrap(), 7);
        assert!(observer.latest().await.is_none());
    }
}
