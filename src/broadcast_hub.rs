use itertools::Itertools;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::location_fix::VehicleId;

pub type SessionId = Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// every vehicle
    Tracking,
    Vehicle(VehicleId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Tracking => write!(f, "tracking"),
            Topic::Vehicle(vehicle_id) => write!(f, "bus_{vehicle_id}"),
        }
    }
}

/// Outgoing queue of one session. Bounded; when full the oldest pending
/// event is discarded so publishers never wait on a slow consumer.
pub struct Subscription<E> {
    session_id: SessionId,
    capacity: usize,
    queue: Mutex<VecDeque<Arc<E>>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
    overflowing: AtomicBool,
}

impl<E> Subscription<E> {
    fn new(session_id: SessionId, capacity: usize) -> Self {
        Self {
            session_id,
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            overflowing: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn push(&self, event: Arc<E>) {
        if self.is_closed() {
            return;
        }
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            // one warning per overflow episode, reset once the consumer drains
            if !self.overflowing.swap(true, Ordering::Relaxed) {
                warn!(
                    "[broadcast_hub] session {} is not keeping up, dropping oldest events (capacity={})",
                    self.session_id, self.capacity
                );
            }
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
    }

    /// Next pending event without waiting. `None` when empty or closed.
    pub fn try_recv(&self) -> Option<Arc<E>> {
        if self.is_closed() {
            return None;
        }
        let mut queue = self.queue.lock();
        let event = queue.pop_front();
        if queue.is_empty() {
            self.overflowing.store(false, Ordering::Relaxed);
        }
        event
    }

    /// Waits for the next event. Returns `None` once the session has been
    /// disconnected; anything still queued at that point is discarded.
    ///
    /// Meant for a single consumer per subscription.
    pub async fn recv(&self) -> Option<Arc<E>> {
        loop {
            if self.is_closed() {
                return None;
            }
            if let Some(event) = self.try_recv() {
                return Some(event);
            }
            // a push between `try_recv` and here leaves a permit behind
            self.notify.notified().await;
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.queue.lock().clear();
        self.notify.notify_one();
    }
}

struct SessionEntry<E> {
    subscription: Arc<Subscription<E>>,
    topics: HashSet<Topic>,
}

struct HubState<E> {
    topics: HashMap<Topic, HashSet<SessionId>>,
    sessions: HashMap<SessionId, SessionEntry<E>>,
}

/// Topic based fan-out of events to live sessions. Best effort: no
/// persistence, no replay for late joiners.
pub struct BroadcastHub<E> {
    state: Mutex<HubState<E>>,
    subscriber_buffer: usize,
}

impl<E> BroadcastHub<E> {
    pub fn new(subscriber_buffer: usize) -> Self {
        Self {
            state: Mutex::new(HubState {
                topics: HashMap::new(),
                sessions: HashMap::new(),
            }),
            subscriber_buffer,
        }
    }

    /// Registers a new session. It receives nothing until it joins a topic.
    pub fn connect(&self) -> Arc<Subscription<E>> {
        let session_id = Uuid::new_v4();
        let subscription = Arc::new(Subscription::new(session_id, self.subscriber_buffer));
        self.state.lock().sessions.insert(
            session_id,
            SessionEntry {
                subscription: subscription.clone(),
                topics: HashSet::new(),
            },
        );
        debug!("[broadcast_hub] session connected: {}", session_id);
        subscription
    }

    /// Returns `true` only when the session was not already in `topic`.
    /// Joining from an unknown or disconnected session does nothing.
    pub fn join(&self, session_id: SessionId, topic: Topic) -> bool {
        let mut state = self.state.lock();
        let HubState { topics, sessions } = &mut *state;
        let Some(entry) = sessions.get_mut(&session_id) else {
            warn!(
                "[broadcast_hub] join {} from unknown session {}",
                topic, session_id
            );
            return false;
        };
        if !entry.topics.insert(topic) {
            return false;
        }
        topics.entry(topic).or_default().insert(session_id);
        debug!("[broadcast_hub] session {} joined {}", session_id, topic);
        true
    }

    /// Returns `true` only when the session was in `topic`.
    pub fn leave(&self, session_id: SessionId, topic: Topic) -> bool {
        let mut state = self.state.lock();
        let HubState { topics, sessions } = &mut *state;
        let Some(entry) = sessions.get_mut(&session_id) else {
            return false;
        };
        if !entry.topics.remove(&topic) {
            return false;
        }
        remove_from_topic(topics, topic, &session_id);
        debug!("[broadcast_hub] session {} left {}", session_id, topic);
        true
    }

    /// Drops the session from every topic and discards whatever it still had
    /// queued. Terminal: the session id cannot join again.
    pub fn disconnect(&self, session_id: SessionId) {
        let entry = {
            let mut state = self.state.lock();
            let Some(entry) = state.sessions.remove(&session_id) else {
                return;
            };
            for topic in &entry.topics {
                remove_from_topic(&mut state.topics, *topic, &session_id);
            }
            entry
        };
        entry.subscription.close();
        info!(
            "[broadcast_hub] session disconnected: {} (was in {} topics, dropped {} events)",
            session_id,
            entry.topics.len(),
            entry.subscription.dropped()
        );
    }

    pub fn publish(&self, topic: Topic, event: E) -> usize {
        self.publish_all(&[topic], event)
    }

    /// Queues `event` once for every session joined to at least one of
    /// `topics`, even if it joined several of them. Never blocks on
    /// consumers. Returns the number of sessions reached.
    pub fn publish_all(&self, topics: &[Topic], event: E) -> usize {
        let targets = {
            let state = self.state.lock();
            topics
                .iter()
                .filter_map(|topic| state.topics.get(topic))
                .flatten()
                .unique()
                .filter_map(|session_id| state.sessions.get(session_id))
                .map(|entry| entry.subscription.clone())
                .collect::<Vec<_>>()
        };
        if targets.is_empty() {
            return 0;
        }
        let event = Arc::new(event);
        for subscription in &targets {
            subscription.push(event.clone());
        }
        targets.len()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.state
            .lock()
            .topics
            .get(&topic)
            .map_or(0, |sessions| sessions.len())
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

fn remove_from_topic(
    topics: &mut HashMap<Topic, HashSet<SessionId>>,
    topic: Topic,
    session_id: &SessionId,
) {
    if let Some(sessions) = topics.get_mut(&topic) {
        sessions.remove(session_id);
        if sessions.is_empty() {
            topics.remove(&topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names() {
        assert_eq!(Topic::Tracking.to_string(), "tracking");
        assert_eq!(Topic::Vehicle(42).to_string(), "bus_42");
    }

    #[test]
    fn empty_topics_are_pruned() {
        let hub = BroadcastHub::<u32>::new(4);
        let sub = hub.connect();
        hub.join(sub.session_id(), Topic::Vehicle(1));
        assert_eq!(hub.subscriber_count(Topic::Vehicle(1)), 1);
        hub.leave(sub.session_id(), Topic::Vehicle(1));
        assert_eq!(hub.subscriber_count(Topic::Vehicle(1)), 0);
        assert!(hub.state.lock().topics.is_empty());
    }
}
