//! Per-job event fan-out.
//!
//! Each job gets a broadcast channel; fan-out happens at publish time.
//! Subscribers each get a bounded buffer; one that falls behind is
//! dropped (it receives a single error event and its stream ends) rather
//! than back-pressuring the orchestrator.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::types::DiscoveryEvent;

/// Job-keyed broadcast hub. Thread-safe, cloneable.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<DiscoveryEvent>>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Create the channel for a job. Called once at job start, before
    /// any events are published.
    pub async fn open(&self, job_id: Uuid) {
        let mut channels = self.channels.write().await;
        channels
            .entry(job_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Publish an event to a job's subscribers. No-op if the channel is
    /// gone or nobody is listening.
    pub async fn publish(&self, job_id: Uuid, event: DiscoveryEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&job_id) {
            // Send errors just mean no active receivers.
            let _ = tx.send(event);
        }
    }

    /// Subscribe to a job's live events. None if the channel is gone.
    pub async fn subscribe(&self, job_id: Uuid) -> Option<broadcast::Receiver<DiscoveryEvent>> {
        let channels = self.channels.read().await;
        channels.get(&job_id).map(|tx| tx.subscribe())
    }

    /// How many receivers are attached to a job's channel.
    pub async fn subscriber_count(&self, job_id: Uuid) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(&job_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a job's channel; open streams end after draining.
    pub async fn close(&self, job_id: Uuid) {
        let mut channels = self.channels.write().await;
        channels.remove(&job_id);
    }
}

/// A subscriber's view of one job's events.
///
/// Yields any synthesized catch-up events first, then live events until
/// the terminal `complete`, the channel closing, or the subscriber
/// lagging past its buffer.
pub struct EventStream {
    pending: VecDeque<DiscoveryEvent>,
    live: Option<broadcast::Receiver<DiscoveryEvent>>,
}

impl EventStream {
    pub(crate) fn new(
        pending: Vec<DiscoveryEvent>,
        live: Option<broadcast::Receiver<DiscoveryEvent>>,
    ) -> Self {
        Self {
            pending: pending.into(),
            live,
        }
    }

    /// Next event, or None once the stream is finished.
    pub async fn next(&mut self) -> Option<DiscoveryEvent> {
        if let Some(event) = self.pending.pop_front() {
            if event.is_terminal() {
                self.live = None;
            }
            return Some(event);
        }

        let rx = self.live.as_mut()?;
        match rx.recv().await {
            Ok(event) => {
                if event.is_terminal() {
                    self.live = None;
                }
                Some(event)
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.live = None;
                None
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Too slow: one error event, then the stream ends.
                self.live = None;
                Some(DiscoveryEvent::ErrorEvent {
                    message: format!("subscriber too slow, dropped after missing {} events", skipped),
                })
            }
        }
    }

    /// Drain the stream into a vector (test helper; returns once the
    /// stream finishes).
    pub async fn collect(mut self) -> Vec<DiscoveryEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(n: u32) -> DiscoveryEvent {
        DiscoveryEvent::Progress {
            total: 10,
            succeeded: n,
            failed: 0,
        }
    }

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let bus = EventBus::new(16);
        let job_id = Uuid::new_v4();
        bus.open(job_id).await;

        let rx = bus.subscribe(job_id).await.unwrap();
        let mut stream = EventStream::new(vec![], Some(rx));

        bus.publish(job_id, progress(1)).await;
        let event = stream.next().await.unwrap();
        assert!(matches!(event, DiscoveryEvent::Progress { succeeded: 1, .. }));
    }

    #[tokio::test]
    async fn publish_without_channel_is_noop() {
        let bus = EventBus::new(16);
        bus.publish(Uuid::new_v4(), progress(1)).await;
    }

    #[tokio::test]
    async fn pending_events_come_first() {
        let bus = EventBus::new(16);
        let job_id = Uuid::new_v4();
        bus.open(job_id).await;
        let rx = bus.subscribe(job_id).await.unwrap();

        bus.publish(job_id, progress(2)).await;
        let mut stream = EventStream::new(
            vec![DiscoveryEvent::JobStarted {
                job_id,
                query: "Denver".to_string(),
                urls_found: 10,
            }],
            Some(rx),
        );

        assert!(matches!(
            stream.next().await.unwrap(),
            DiscoveryEvent::JobStarted { .. }
        ));
        assert!(matches!(
            stream.next().await.unwrap(),
            DiscoveryEvent::Progress { succeeded: 2, .. }
        ));
    }

    #[tokio::test]
    async fn stream_ends_after_terminal_event() {
        let bus = EventBus::new(16);
        let job_id = Uuid::new_v4();
        bus.open(job_id).await;
        let rx = bus.subscribe(job_id).await.unwrap();
        let mut stream = EventStream::new(vec![], Some(rx));

        bus.publish(
            job_id,
            DiscoveryEvent::Complete {
                found: 1,
                failed: 0,
                skipped: 0,
            },
        )
        .await;
        bus.publish(job_id, progress(9)).await;

        assert!(stream.next().await.unwrap().is_terminal());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn stream_ends_when_channel_closes() {
        let bus = EventBus::new(16);
        let job_id = Uuid::new_v4();
        bus.open(job_id).await;
        let rx = bus.subscribe(job_id).await.unwrap();
        let mut stream = EventStream::new(vec![], Some(rx));

        bus.close(job_id).await;
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn slow_subscriber_gets_error_then_closes() {
        let bus = EventBus::new(2);
        let job_id = Uuid::new_v4();
        bus.open(job_id).await;
        let rx = bus.subscribe(job_id).await.unwrap();
        let mut stream = EventStream::new(vec![], Some(rx));

        for i in 0..10 {
            bus.publish(job_id, progress(i)).await;
        }

        let event = stream.next().await.unwrap();
        assert!(matches!(event, DiscoveryEvent::ErrorEvent { .. }));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let bus = EventBus::new(16);
        let job_id = Uuid::new_v4();
        bus.open(job_id).await;

        let mut a = EventStream::new(vec![], bus.subscribe(job_id).await);
        let mut b = EventStream::new(vec![], bus.subscribe(job_id).await);

        bus.publish(job_id, progress(4)).await;

        assert!(matches!(
            a.next().await.unwrap(),
            DiscoveryEvent::Progress { succeeded: 4, .. }
        ));
        assert!(matches!(
            b.next().await.unwrap(),
            DiscoveryEvent::Progress { succeeded: 4, .. }
        ));
    }
}
