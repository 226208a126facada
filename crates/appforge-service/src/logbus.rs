//! In-memory per-workspace log fanout.
//!
//! Each workspace has a topic backed by a bounded broadcast channel. The
//! publisher never blocks: a subscriber that cannot keep up loses its oldest
//! unread events and its subscription records how many were dropped. A small
//! replay ring is handed to new subscribers so late joiners see recent
//! context.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::broadcast;

const TOPIC_BUFFER: usize = 256;
const REPLAY_CAPACITY: usize = 100;

/// One line of captured child-process output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub app_id: i64,
    pub message: String,
    pub is_error: bool,
    pub timestamp: i64,
}

struct Topic {
    sender: broadcast::Sender<LogEvent>,
    replay: VecDeque<LogEvent>,
}

impl Topic {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(TOPIC_BUFFER);
        Self {
            sender,
            replay: VecDeque::with_capacity(REPLAY_CAPACITY),
        }
    }
}

/// Publish/subscribe fabric multiplexing log events to live subscribers.
pub struct LogBus {
    topics: Mutex<HashMap<i64, Topic>>,
}

impl LogBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Publish one event to the workspace's topic. Never blocks.
    pub fn publish(&self, app_id: i64, message: impl Into<String>, is_error: bool) {
        let event = LogEvent {
            app_id,
            message: message.into(),
            is_error,
            timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
        };

        let mut topics = self.topics.lock();
        let topic = topics.entry(app_id).or_insert_with(Topic::new);
        if topic.replay.len() == REPLAY_CAPACITY {
            topic.replay.pop_front();
        }
        topic.replay.push_back(event.clone());
        let _ = topic.sender.send(event);
    }

    /// Subscribe to a workspace's topic. The returned subscription starts
    /// with a replay of recent events, then yields live events in publish
    /// order.
    pub fn subscribe(&self, app_id: i64) -> LogSubscription {
        let mut topics = self.topics.lock();
        let topic = topics.entry(app_id).or_insert_with(Topic::new);
        LogSubscription {
            replay: topic.replay.iter().cloned().collect(),
            receiver: topic.sender.subscribe(),
            dropped: 0,
        }
    }

    pub fn subscriber_count(&self, app_id: i64) -> usize {
        self.topics
            .lock()
            .get(&app_id)
            .map(|t| t.sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a topic's buffered state once nobody is listening. Called by the
    /// edges when a subscriber leaves and by the supervisor after an exit.
    pub fn gc(&self, app_id: i64) {
        let mut topics = self.topics.lock();
        if let Some(topic) = topics.get(&app_id) {
            if topic.sender.receiver_count() == 0 {
                topics.remove(&app_id);
            }
        }
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to one workspace's log topic.
pub struct LogSubscription {
    /// Recent events captured before this subscription existed.
    pub replay: Vec<LogEvent>,
    receiver: broadcast::Receiver<LogEvent>,
    dropped: u64,
}

impl LogSubscription {
    /// Receive the next live event. Returns `None` when the topic is gone.
    /// Lag is absorbed by counting dropped events and continuing.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.dropped += n;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// How many events this subscriber has lost to backpressure.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = LogBus::new();
        let mut sub = bus.subscribe(3);

        for i in 0..10 {
            bus.publish(3, format!("line {i}"), false);
        }

        for i in 0..10 {
            let event = sub.recv().await.unwrap();
            assert_eq!(event.message, format!("line {i}"));
            assert_eq!(event.app_id, 3);
        }
        assert_eq!(sub.dropped(), 0);
    }

    #[tokio::test]
    async fn workspaces_are_isolated() {
        let bus = LogBus::new();
        let mut sub_a = bus.subscribe(1);
        let _sub_b = bus.subscribe(2);

        bus.publish(2, "other workspace", false);
        bus.publish(1, "mine", true);

        let event = sub_a.recv().await.unwrap();
        assert_eq!(event.message, "mine");
        assert!(event.is_error);
    }

    #[tokio::test]
    async fn replay_buffer_catches_up_late_subscribers() {
        let bus = LogBus::new();
        bus.publish(7, "early", false);
        bus.publish(7, "earlier still", false);

        let sub = bus.subscribe(7);
        let replayed: Vec<_> = sub.replay.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(replayed, ["early", "earlier still"]);
    }

    #[tokio::test]
    async fn replay_buffer_is_bounded() {
        let bus = LogBus::new();
        for i in 0..(REPLAY_CAPACITY + 25) {
            bus.publish(7, format!("line {i}"), false);
        }

        let sub = bus.subscribe(7);
        assert_eq!(sub.replay.len(), REPLAY_CAPACITY);
        assert_eq!(sub.replay[0].message, "line 25");
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest_and_counts() {
        let bus = LogBus::new();
        let mut sub = bus.subscribe(9);

        // Overrun the channel capacity without the subscriber draining.
        for i in 0..(TOPIC_BUFFER + 50) {
            bus.publish(9, format!("line {i}"), false);
        }

        let first = sub.recv().await.unwrap();
        assert_eq!(sub.dropped(), 50);
        assert_eq!(first.message, "line 50");
    }

    #[tokio::test]
    async fn gc_removes_topics_without_subscribers() {
        let bus = LogBus::new();
        bus.publish(4, "hello", false);
        assert_eq!(bus.subscriber_count(4), 0);

        bus.gc(4);
        let sub = bus.subscribe(4);
        assert!(sub.replay.is_empty());
    }

    #[tokio::test]
    async fn gc_keeps_topics_with_subscribers() {
        let bus = LogBus::new();
        let mut sub = bus.subscribe(5);
        bus.gc(5);
        bus.publish(5, "still here", false);
        assert_eq!(sub.recv().await.unwrap().message, "still here");
    }
}
