//! Frame scheduling contract.
//!
//! The engine never runs its own clock. Whenever a node needs to be looked
//! at again it asks the host for a frame, either immediately (delay 0) or
//! after a number of milliseconds. Hosts coalesce the requests however they
//! like; a request is a lower bound, not a promise.

use serde::{Deserialize, Serialize};

/// Why a frame was requested. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFrameReason {
    /// A leaf or container needs to advance.
    AnimationTick,
    /// A storyboard control call changed the timing tree.
    StoryboardTick,
    /// A compositor mirror reported completion.
    CompositorCompleted,
}

/// Host-side frame scheduler.
pub trait FrameScheduler {
    fn request_additional_frame(&mut self, delay_ms: u64, reason: RequestFrameReason);
}

/// A single recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRequest {
    pub delay_ms: u64,
    pub reason: RequestFrameReason,
}

/// Scheduler that just remembers what was asked of it.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    requests: Vec<FrameRequest>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[FrameRequest] {
        &self.requests
    }

    /// Soonest requested delay, if any.
    pub fn next_delay_ms(&self) -> Option<u64> {
        self.requests.iter().map(|r| r.delay_ms).min()
    }

    pub fn has_request(&self, delay_ms: u64, reason: RequestFrameReason) -> bool {
        self.requests.contains(&FrameRequest { delay_ms, reason })
    }

    /// Take the requests recorded so far.
    pub fn take(&mut self) -> Vec<FrameRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

impl FrameScheduler for RecordingScheduler {
    fn request_additional_frame(&mut self, delay_ms: u64, reason: RequestFrameReason) {
        self.requests.push(FrameRequest { delay_ms, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_scheduler() {
        let mut scheduler = RecordingScheduler::new();
        assert_eq!(scheduler.next_delay_ms(), None);

        scheduler.request_additional_frame(250, RequestFrameReason::AnimationTick);
        scheduler.request_additional_frame(0, RequestFrameReason::StoryboardTick);

        assert_eq!(scheduler.next_delay_ms(), Some(0));
        assert!(scheduler.has_request(250, RequestFrameReason::AnimationTick));
        assert!(!scheduler.has_request(250, RequestFrameReason::StoryboardTick));

        assert_eq!(scheduler.take().len(), 2);
        assert!(scheduler.requests().is_empty());
    }
}
