use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for committed events, one channel per activity.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to an activity's events. Creates the channel if needed.
    pub fn subscribe(&self, activity_id: Ulid) -> broadcast::Receiver<Event> {
        self.channels
            .entry(activity_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op if nobody is listening. Lagging receivers lose the oldest events.
    pub fn send(&self, activity_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&activity_id) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn subscriber_count(&self, activity_id: &Ulid) -> usize {
        self.channels
            .get(activity_id)
            .map_or(0, |s| s.receiver_count())
    }
}
