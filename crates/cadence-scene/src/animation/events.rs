//! Timeline events for lifecycle callbacks.
//!
//! The time manager pushes events while it ticks; hosts poll them afterwards.
//!
//! # Usage
//!
//! ```ignore
//! manager.tick(now, &mut host)?;
//!
//! for event in manager.drain_events() {
//!     match event {
//!         TimelineEvent::Completed { timeline } => println!("{timeline:?} completed"),
//!         TimelineEvent::IndependentAnimationChanged { .. } => rebuild_mirrors(),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::TimelineId;

/// Event emitted by a timeline node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// The node finished its active period. Fired at most once per activation.
    Completed {
        /// The node that completed.
        timeline: TimelineId,
    },
    /// The node switched between dependent and independent animation.
    IndependentAnimationChanged {
        /// The node whose classification changed.
        timeline: TimelineId,
        /// The classification after the change.
        independent: bool,
    },
}

impl TimelineEvent {
    /// Get the timeline ID for this event.
    pub fn timeline_id(&self) -> TimelineId {
        match self {
            Self::Completed { timeline } | Self::IndependentAnimationChanged { timeline, .. } => {
                *timeline
            }
        }
    }

    /// Check if this is a completion event.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Handle returned when a Completed listener is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerToken(u64);

impl ListenerToken {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Queue of timeline events.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<TimelineEvent>,
}

impl EventQueue {
    /// Create a new empty event queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TimelineEvent) {
        self.events.push_back(event);
    }

    /// Drain all pending events.
    ///
    /// Returns an iterator over all events, clearing the queue.
    pub fn drain(&mut self) -> impl Iterator<Item = TimelineEvent> + '_ {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Peek at the next event without removing it.
    pub fn peek(&self) -> Option<&TimelineEvent> {
        self.events.front()
    }

    /// Pop the next event from the queue.
    pub fn pop(&mut self) -> Option<TimelineEvent> {
        self.events.pop_front()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Get events for a specific timeline (without removing them).
    pub fn events_for_timeline(&self, timeline: TimelineId) -> Vec<&TimelineEvent> {
        self.events
            .iter()
            .filter(|e| e.timeline_id() == timeline)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_queue_push_and_drain() {
        let mut queue = EventQueue::new();
        let a = TimelineId::new();
        let b = TimelineId::new();

        queue.push(TimelineEvent::Completed { timeline: a });
        queue.push(TimelineEvent::IndependentAnimationChanged {
            timeline: b,
            independent: true,
        });
        assert_eq!(queue.len(), 2);

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_completed());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_event_queue_peek_pop() {
        let mut queue = EventQueue::new();
        let id = TimelineId::new();
        queue.push(TimelineEvent::Completed { timeline: id });

        assert_eq!(queue.peek().map(|e| e.timeline_id()), Some(id));
        assert_eq!(queue.len(), 1);
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_events_for_timeline() {
        let mut queue = EventQueue::new();
        let a = TimelineId::new();
        let b = TimelineId::new();
        queue.push(TimelineEvent::Completed { timeline: a });
        queue.push(TimelineEvent::Completed { timeline: b });
        queue.push(TimelineEvent::IndependentAnimationChanged {
            timeline: a,
            independent: false,
        });

        assert_eq!(queue.events_for_timeline(a).len(), 2);
        assert_eq!(queue.events_for_timeline(b).len(), 1);
    }

    #[test]
    fn test_listener_tokens_unique() {
        assert_ne!(ListenerToken::new(), ListenerToken::new());
    }

    #[test]
    fn test_event_serialization() {
        let event = TimelineEvent::IndependentAnimationChanged {
            timeline: TimelineId(7),
            independent: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("independent_animation_changed"));
        let parsed: TimelineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
