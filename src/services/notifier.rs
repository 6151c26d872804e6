// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Topic-addressed ride notifications.
//!
//! Each topic owns a bounded `broadcast` channel created on first subscribe.
//! Delivery is best-effort and at-most-once: a subscriber only sees events
//! published while it is subscribed, and a subscriber that falls more than
//! the channel capacity behind skips the oldest events.

use crate::models::{RideEvent, Role};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Channel address for ride events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every driver looking for work.
    AvailableDrivers,
    /// A user's personal room as a rider.
    Rider(i64),
    /// A driver's personal room.
    Driver(i64),
}

impl Topic {
    /// Personal topic for a party in the given role.
    pub fn for_party(user_id: i64, role: Role) -> Self {
        match role {
            Role::Driver => Topic::Driver(user_id),
            Role::Rider | Role::Admin => Topic::Rider(user_id),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::AvailableDrivers => f.write_str("drivers"),
            Topic::Rider(id) => write!(f, "user_{}", id),
            Topic::Driver(id) => write!(f, "driver_{}", id),
        }
    }
}

/// Publish/subscribe hub. Clones share the same topics.
#[derive(Clone)]
pub struct Notifier {
    channels: Arc<DashMap<Topic, broadcast::Sender<RideEvent>>>,
    capacity: usize,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a topic. Only events published after this call are received.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<RideEvent> {
        self.channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an event to a topic, returning how many subscribers it reached.
    ///
    /// Never fails: with no live subscribers the event is dropped and the
    /// idle channel is released.
    pub fn publish(&self, topic: &Topic, event: RideEvent) -> usize {
        let delivered = match self.channels.get(topic) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            self.channels
                .remove_if(topic, |_, sender| sender.receiver_count() == 0);
            tracing::debug!(topic = %topic, "No subscribers, event dropped");
        } else {
            tracing::debug!(topic = %topic, delivered, "Event published");
        }

        delivered
    }

    /// Number of topics with a live channel.
    pub fn topic_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RideStatus;

    fn status_event(ride_id: i64) -> RideEvent {
        RideEvent::RideStatusUpdated {
            ride_id,
            status: RideStatus::Arrived,
        }
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::AvailableDrivers.to_string(), "drivers");
        assert_eq!(Topic::Rider(3).to_string(), "user_3");
        assert_eq!(Topic::Driver(9).to_string(), "driver_9");
        assert_eq!(Topic::for_party(4, Role::Driver), Topic::Driver(4));
        assert_eq!(Topic::for_party(4, Role::Rider), Topic::Rider(4));
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let notifier = Notifier::new(8);
        let mut rx1 = notifier.subscribe(Topic::Rider(1));
        let mut rx2 = notifier.subscribe(Topic::Rider(1));

        assert_eq!(notifier.publish(&Topic::Rider(1), status_event(10)), 2);

        assert_eq!(rx1.recv().await.unwrap().ride_id(), 10);
        assert_eq!(rx2.recv().await.unwrap().ride_id(), 10);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let notifier = Notifier::new(8);
        let mut rider = notifier.subscribe(Topic::Rider(1));
        let mut driver = notifier.subscribe(Topic::Driver(1));

        notifier.publish(&Topic::Driver(1), status_event(5));

        assert_eq!(driver.recv().await.unwrap().ride_id(), 5);
        assert!(rider.try_recv().is_err());
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let notifier = Notifier::new(8);
        let _early = notifier.subscribe(Topic::Rider(2));
        notifier.publish(&Topic::Rider(2), status_event(1));

        let mut late = notifier.subscribe(Topic::Rider(2));
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_drops_and_prunes() {
        let notifier = Notifier::new(8);
        assert_eq!(notifier.publish(&Topic::AvailableDrivers, status_event(1)), 0);
        assert_eq!(notifier.topic_count(), 0);

        let rx = notifier.subscribe(Topic::Rider(7));
        assert_eq!(notifier.topic_count(), 1);
        drop(rx);

        // Subscriber went away: the next publish releases the channel.
        assert_eq!(notifier.publish(&Topic::Rider(7), status_event(2)), 0);
        assert_eq!(notifier.topic_count(), 0);
    }

    #[test]
    fn test_lagging_subscriber_skips_oldest() {
        let notifier = Notifier::new(2);
        let mut rx = notifier.subscribe(Topic::Rider(1));

        for ride_id in 1..=3 {
            notifier.publish(&Topic::Rider(1), status_event(ride_id));
        }

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
        assert_eq!(rx.try_recv().unwrap().ride_id(), 2);
        assert_eq!(rx.try_recv().unwrap().ride_id(), 3);
    }
}
