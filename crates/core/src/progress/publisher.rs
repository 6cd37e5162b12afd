//! Publish/subscribe registry keyed by job id.

use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::types::ProgressEvent;

/// Per-subscriber channel capacity. A slow subscriber that falls further
/// behind than this sees a lag error, not backpressure on the publisher.
const DEFAULT_CAPACITY: usize = 64;

/// Fan-out registry for progress events.
///
/// Each job id owns its own broadcast channel, created lazily on first
/// subscribe or publish and dropped once its terminal event has gone out
/// and the last receiver is gone.
pub struct ProgressPublisher {
    channels: RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>,
    capacity: usize,
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribes to future events for a job. No backlog is replayed.
    pub async fn subscribe(&self, job_id: &str) -> broadcast::Receiver<ProgressEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(job_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Broadcasts an event to the job's current subscribers.
    ///
    /// Send failures mean nobody is listening and are swallowed; the
    /// surrounding state transition must never be affected.
    pub async fn publish(&self, event: ProgressEvent) {
        let terminal = event.is_terminal();
        let job_id = event.job_id.clone();

        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(&job_id) {
                let _ = sender.send(event);
            } else {
                debug!(job_id = %job_id, "Progress event with no subscribers");
            }
        }

        // Terminal events end the stream; reclaim the channel so the map
        // does not grow with finished jobs.
        if terminal {
            let mut channels = self.channels.write().await;
            if let Some(sender) = channels.get(&job_id) {
                if sender.receiver_count() == 0 {
                    channels.remove(&job_id);
                }
            }
        }
    }

    /// Drops the channel for a job outright (used when a job is deleted).
    pub async fn forget(&self, job_id: &str) {
        self.channels.write().await.remove(job_id);
    }

    /// Number of live channels, for introspection and tests.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[tokio::test]
    async fn test_subscriber_receives_published_events() {
        let publisher = ProgressPublisher::default();

        let mut rx = publisher.subscribe("job-1").await;
        publisher.publish(ProgressEvent::processing("job-1", 10)).await;
        publisher.publish(ProgressEvent::processing("job-1", 30)).await;

        assert_eq!(rx.recv().await.unwrap().progress, 10);
        assert_eq!(rx.recv().await.unwrap().progress, 30);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_swallowed() {
        let publisher = ProgressPublisher::default();
        // Must not panic or error.
        publisher.publish(ProgressEvent::processing("ghost", 10)).await;
        assert_eq!(publisher.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_backlog_replay_for_late_subscribers() {
        let publisher = ProgressPublisher::default();

        let mut early = publisher.subscribe("job-1").await;
        publisher.publish(ProgressEvent::processing("job-1", 10)).await;

        let mut late = publisher.subscribe("job-1").await;
        publisher.publish(ProgressEvent::processing("job-1", 30)).await;

        assert_eq!(early.recv().await.unwrap().progress, 10);
        assert_eq!(early.recv().await.unwrap().progress, 30);
        // The late subscriber only sees the event published after it joined.
        assert_eq!(late.recv().await.unwrap().progress, 30);
    }

    #[tokio::test]
    async fn test_events_delivered_to_all_subscribers() {
        let publisher = ProgressPublisher::default();

        let mut a = publisher.subscribe("job-1").await;
        let mut b = publisher.subscribe("job-1").await;

        publisher.publish(ProgressEvent::completed("job-1")).await;

        assert_eq!(a.recv().await.unwrap().status, JobStatus::Completed);
        assert_eq!(b.recv().await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_channels_are_isolated_per_job() {
        let publisher = ProgressPublisher::default();

        let mut rx_a = publisher.subscribe("job-a").await;
        let _rx_b = publisher.subscribe("job-b").await;

        publisher.publish(ProgressEvent::processing("job-b", 70)).await;

        // job-a's receiver has nothing.
        assert!(matches!(
            rx_a.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_terminal_event_reclaims_channel_without_receivers() {
        let publisher = ProgressPublisher::default();

        {
            let _rx = publisher.subscribe("job-1").await;
        } // receiver dropped

        publisher.publish(ProgressEvent::completed("job-1")).await;
        assert_eq!(publisher.channel_count().await, 0);
    }
}
