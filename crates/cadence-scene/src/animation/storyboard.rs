//! Root storyboard control: begin, pause, resume, seek, stop and skip.
//!
//! A root storyboard keeps its own timeline offset from the global clock
//! (`time_delta`). Control calls only set flags; the offset is adjusted on
//! the next tick, when the parent time is known.

use tracing::{debug, trace, warn};

use super::clock::ClockParams;
use super::manager::{HostContext, TimeManager};
use super::scheduler::RequestFrameReason;
use super::timeline::StoryboardState;
use super::types::{ClockState, TimelineId};
use crate::error::{ErrorCode, Result, TimingError};

impl TimeManager {
    /// Apply pending control flags, then compute the subtree.
    pub(crate) fn compute_storyboard(
        &mut self,
        id: TimelineId,
        mut params: ClockParams,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let begin_time = self.node(id)?.timing.begin_time;
        let tolerance = self.policy.time_tolerance;
        let storyboard = self.storyboard_mut(id)?;
        if storyboard.is_stopped {
            return Ok(());
        }
        if storyboard.is_paused {
            params.is_paused = true;
        }

        if params.has_time {
            let was_seeking = storyboard.is_seeking;
            let parent_time = params.time;
            let pause_start = *storyboard.last_parent_time.get_or_insert(parent_time);

            if storyboard.is_beginning {
                storyboard.time_delta = -parent_time;
            }
            let mut effective = if storyboard.is_paused {
                pause_start
            } else {
                storyboard.last_parent_time = Some(parent_time);
                parent_time
            };
            if storyboard.is_resuming {
                storyboard.time_delta += pause_start - parent_time;
            }
            if storyboard.is_seeking {
                storyboard.time_delta = storyboard.pending_seek - effective;
            }
            effective += storyboard.time_delta;
            storyboard.is_beginning = false;
            storyboard.is_resuming = false;
            storyboard.is_seeking = false;

            // Rounding can leave a freshly begun root just short of its begin time.
            let gap = begin_time - effective;
            if gap > 0.0
                && gap < tolerance
                && (!was_seeking || storyboard.pending_seek >= begin_time)
            {
                effective = begin_time;
            }
            params.time = effective;
        }

        self.compute_state_impl(id, params, host)
    }

    pub(crate) fn storyboard_mut(&mut self, id: TimelineId) -> Result<&mut StoryboardState> {
        self.node_mut(id)?
            .storyboard_mut()
            .ok_or_else(|| {
                TimingError::InvalidArgument(format!("timeline {} is not a storyboard", id.0))
            })
    }

    pub fn storyboard_state(&self, id: TimelineId) -> Result<&StoryboardState> {
        self.node(id)?
            .storyboard()
            .ok_or_else(|| {
                TimingError::InvalidArgument(format!("timeline {} is not a storyboard", id.0))
            })
    }

    fn ensure_root_storyboard(&self, id: TimelineId) -> Result<()> {
        let node = self.node(id)?;
        if node.storyboard().is_none() {
            return Err(TimingError::InvalidArgument(format!(
                "timeline {} is not a storyboard",
                id.0
            )));
        }
        if node.parent.is_some() {
            return self.policy.errors.report(TimingError::invalid_operation(
                ErrorCode::SbMustBeRoot,
                format!("storyboard {} is nested and cannot be controlled", id.0),
            ));
        }
        Ok(())
    }

    fn register_root(&mut self, id: TimelineId) {
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
    }

    /// Start the storyboard from its beginning.
    pub fn begin(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.ensure_root_storyboard(id)?;
        self.register_root(id);

        let mut subtree = self.descendants(id)?;
        subtree.push(id);
        for node in &subtree {
            let node = self.node_mut(*node)?;
            node.state = ClockState::NotStarted;
            node.completed_fired = false;
            node.expired_while_waiting = false;
        }

        for leaf in self.descendant_leaves(id)? {
            if let Err(err) = self.on_begin(leaf, host) {
                warn!(storyboard = id.0, timeline = leaf.0, error = %err, "begin failed");
                if let Err(cleanup) = self.finalize_iteration(id, host) {
                    debug!(storyboard = id.0, error = %cleanup, "cleanup after failed begin");
                }
                self.node_mut(id)?.completed_fired = true;
                self.storyboard_mut(id)?.is_stopped = true;
                self.roots.retain(|r| *r != id);
                return Err(err);
            }
        }

        *self.storyboard_mut(id)? = StoryboardState {
            is_stopped: false,
            is_beginning: true,
            ..StoryboardState::default()
        };
        for node in subtree.into_iter().filter(|n| *n != id) {
            if let Some(nested) = self.node_mut(node)?.storyboard_mut() {
                *nested = StoryboardState {
                    is_stopped: false,
                    ..StoryboardState::default()
                };
            }
        }

        host.scheduler
            .request_additional_frame(0, RequestFrameReason::StoryboardTick);
        self.initialize_iteration(id, host)?;
        debug!(storyboard = id.0, "begin");
        Ok(())
    }

    /// Stop the storyboard and give every animated property back.
    pub fn stop(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.ensure_root_storyboard(id)?;
        let storyboard = self.storyboard_mut(id)?;
        storyboard.clear_flags();
        if storyboard.is_stopped {
            return Ok(());
        }
        storyboard.is_stopped = true;
        self.roots.retain(|r| *r != id);
        host.scheduler
            .request_additional_frame(0, RequestFrameReason::StoryboardTick);
        debug!(storyboard = id.0, "stop");
        self.finalize_iteration(id, host)
    }

    pub fn pause(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.ensure_root_storyboard(id)?;
        let storyboard = self.storyboard_mut(id)?;
        storyboard.is_paused = true;
        storyboard.is_resuming = false;
        host.scheduler
            .request_additional_frame(0, RequestFrameReason::StoryboardTick);
        debug!(storyboard = id.0, "pause");
        Ok(())
    }

    pub fn resume(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.ensure_root_storyboard(id)?;
        let storyboard = self.storyboard_mut(id)?;
        if !storyboard.is_paused {
            return Ok(());
        }
        storyboard.is_paused = false;
        storyboard.is_resuming = true;
        let stopped = storyboard.is_stopped;
        if !stopped {
            self.register_root(id);
        }
        host.scheduler
            .request_additional_frame(0, RequestFrameReason::StoryboardTick);
        debug!(storyboard = id.0, "resume");
        Ok(())
    }

    /// Move the storyboard to `offset` seconds on the next tick.
    pub fn seek(&mut self, id: TimelineId, offset: f64, host: &mut HostContext<'_>) -> Result<()> {
        self.ensure_root_storyboard(id)?;
        let storyboard = self.storyboard_mut(id)?;
        if storyboard.is_stopped {
            return Ok(());
        }
        storyboard.pending_seek = offset;
        storyboard.is_seeking = true;
        self.register_root(id);
        host.scheduler
            .request_additional_frame(0, RequestFrameReason::StoryboardTick);
        trace!(storyboard = id.0, offset, "seek");
        Ok(())
    }

    /// Seek and recompute immediately at the last parent time seen.
    pub fn seek_aligned_to_last_tick(
        &mut self,
        id: TimelineId,
        offset: f64,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        self.seek(id, offset, host)?;
        let storyboard = self.storyboard_state(id)?;
        if storyboard.is_stopped {
            return Ok(());
        }
        let time = storyboard
            .last_parent_time
            .or(self.last_tick_time)
            .unwrap_or(0.0);
        self.compute_state(id, ClockParams::root(time), host)?;
        // The recompute consumed the seek; keep the offset pinned for the next tick.
        self.seek(id, offset, host)
    }

    /// Jump straight to the fill period, now.
    pub fn skip_to_fill(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.complete_internal(id, false, true, host)
    }

    /// Jump to the fill period on the next tick; stop if the storyboard never ends.
    pub fn complete(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.complete_internal(id, true, false, host)
    }

    fn complete_internal(
        &mut self,
        id: TimelineId,
        stop_if_infinite: bool,
        synchronous: bool,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        self.ensure_root_storyboard(id)?;
        match self.expiration_time(id)? {
            Some(_) if synchronous => self.seek_aligned_to_last_tick(id, f64::INFINITY, host),
            Some(_) => self.seek(id, f64::INFINITY, host),
            None if stop_if_infinite => self.stop(id, host),
            None => Ok(()),
        }
    }
}
