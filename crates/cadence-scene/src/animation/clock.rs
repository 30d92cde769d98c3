//! Clock math shared by every timeline node.
//!
//! Everything here is a pure function of a node's timing attributes and the
//! time its parent hands down. The timeline tree (`timeline.rs`) stores the
//! results; the functions themselves never touch the tree.
//!
//! Times are in seconds. An effective duration or expiration of `None` means
//! "never ends".

use super::types::{ClockState, FillBehavior, RepeatBehavior, ResolvedDuration};

/// Parameters a node receives from its parent on each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockParams {
    /// False until the parent has started.
    pub has_time: bool,
    /// Parent time in the parent's frame, valid only when `has_time`.
    pub time: f64,
    pub is_reversed: bool,
    /// Product of the speed ratios of every ancestor.
    pub speed_ratio: f64,
    pub is_paused: bool,
    /// True while every ancestor is waiting for a compositor completion.
    pub ancestor_waiting: bool,
    /// True if this node or an ancestor failed compositor conversion.
    pub cannot_convert: bool,
}

impl ClockParams {
    /// Parameters for a root node ticked at `time`.
    pub fn root(time: f64) -> Self {
        Self {
            has_time: true,
            time,
            ..Self::default()
        }
    }

    /// Parameters for a parent that has not started.
    pub fn without_time() -> Self {
        Self::default()
    }
}

impl Default for ClockParams {
    fn default() -> Self {
        Self {
            has_time: false,
            time: 0.0,
            is_reversed: false,
            speed_ratio: 1.0,
            is_paused: false,
            ancestor_waiting: true,
            cannot_convert: false,
        }
    }
}

/// Timing attributes of a node with its natural duration already resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTiming {
    pub begin_time: f64,
    pub natural_duration: ResolvedDuration,
    pub repeat: RepeatBehavior,
    pub speed_ratio: f64,
    pub auto_reverse: bool,
    pub fill: FillBehavior,
}

impl Default for ClockTiming {
    fn default() -> Self {
        Self {
            begin_time: 0.0,
            natural_duration: ResolvedDuration::TimeSpan { seconds: 1.0 },
            repeat: RepeatBehavior::default(),
            speed_ratio: 1.0,
            auto_reverse: false,
            fill: FillBehavior::HoldEnd,
        }
    }
}

/// Length of the active period, accounting for speed, repeat and autoreverse.
pub fn effective_duration(
    natural: ResolvedDuration,
    repeat: RepeatBehavior,
    speed_ratio: f64,
    auto_reverse: bool,
) -> Option<f64> {
    let (count, limit) = match repeat {
        RepeatBehavior::Count { count } => (count, f64::MAX),
        RepeatBehavior::Duration { seconds } => (1.0, seconds),
        RepeatBehavior::Forever => (1.0, f64::MAX),
    };

    let zero_natural = matches!(natural, ResolvedDuration::TimeSpan { seconds } if seconds <= 0.0);
    if zero_natural || count <= 0.0 {
        return Some(0.0);
    }

    match (natural, repeat) {
        (_, RepeatBehavior::Forever) => None,
        (ResolvedDuration::Forever, RepeatBehavior::Count { .. }) => None,
        (ResolvedDuration::Forever, _) => Some(limit),
        (ResolvedDuration::TimeSpan { seconds }, _) => {
            let mut factor = match repeat {
                RepeatBehavior::Duration { .. } => limit / speed_ratio,
                _ => count / speed_ratio,
            };
            if auto_reverse {
                factor *= 2.0;
            }
            Some((factor * seconds).min(limit))
        }
    }
}

/// Parent time at which the node's active period ends.
pub fn expiration_time(timing: &ClockTiming) -> Option<f64> {
    effective_duration(
        timing.natural_duration,
        timing.repeat,
        timing.speed_ratio,
        timing.auto_reverse,
    )
    .map(|duration| timing.begin_time + duration)
}

/// Returns true once `parent_time` has reached `expiration`, within `tolerance`.
pub fn is_expired(expiration: Option<f64>, parent_time: f64, tolerance: f64) -> bool {
    expiration.is_some_and(|exp| exp <= parent_time + tolerance)
}

/// Compositor-completion bookkeeping consulted by the state decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionWait {
    /// The node was independent on the previous tick.
    pub had_independent: bool,
    /// The node's mirror has not reported completion yet.
    pub waiting: bool,
}

/// Outcome of [`decide_state`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateDecision {
    pub state: ClockState,
    /// Parent time to compute progress from; clamped to the expiration while filling.
    pub clamped_parent_time: f64,
    pub compute_progress: bool,
    /// The node expired but stays active until its mirror completes.
    pub expired_while_waiting: bool,
}

/// Decide whether a node has started, is running, or has finished.
pub fn decide_state(
    timing: &ClockTiming,
    parent: &ClockParams,
    expiration: Option<f64>,
    wait: CompletionWait,
    tolerance: f64,
) -> StateDecision {
    if !parent.has_time || parent.time < timing.begin_time {
        return StateDecision {
            state: ClockState::NotStarted,
            clamped_parent_time: parent.time,
            compute_progress: false,
            expired_while_waiting: false,
        };
    }

    let mut decision = StateDecision {
        state: ClockState::Active,
        clamped_parent_time: parent.time,
        compute_progress: true,
        expired_while_waiting: false,
    };

    if is_expired(expiration, parent.time, tolerance) {
        let instant = expiration == Some(0.0);
        if !wait.had_independent || !wait.waiting || !parent.ancestor_waiting || instant {
            match timing.fill {
                FillBehavior::HoldEnd => {
                    decision.state = ClockState::Filling;
                    if let Some(exp) = expiration {
                        decision.clamped_parent_time = exp;
                    }
                }
                FillBehavior::Stop => decision.state = ClockState::Stopped,
            }
        } else {
            decision.expired_while_waiting = true;
        }
    }

    decision
}

/// Local time and progress within the current iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProgress {
    /// Time reported to children, in this node's frame.
    pub current_time: f64,
    pub progress: f64,
    pub iteration: i64,
    /// True on the odd (backwards) iterations of an autoreversing node.
    pub locally_reversed: bool,
}

/// Compute local time and progress for a node at `parent_time`.
///
/// `duration` is the natural (per-iteration) duration. `snap` is the
/// progress distance from an iteration boundary that is treated as the
/// boundary once the node has expired.
pub fn local_progress(
    timing: &ClockTiming,
    duration: ResolvedDuration,
    parent_time: f64,
    expiration: Option<f64>,
    had_independent: bool,
    tolerance: f64,
    snap: f64,
) -> LocalProgress {
    let mut current_time = (parent_time - timing.begin_time) * timing.speed_ratio;

    let seconds = match duration {
        ResolvedDuration::TimeSpan { seconds } => seconds,
        ResolvedDuration::Forever => {
            return LocalProgress {
                current_time,
                progress: 0.0,
                iteration: 0,
                locally_reversed: false,
            };
        }
    };

    let expired = is_expired(expiration, parent_time, tolerance);
    if had_independent && expired {
        // Hold at the expiration until the mirror reports completion.
        if let Some(exp) = expiration {
            current_time = (exp - timing.begin_time) * timing.speed_ratio;
        }
    }

    if seconds <= 0.0 {
        return LocalProgress {
            current_time: 0.0,
            progress: 1.0,
            iteration: 0,
            locally_reversed: false,
        };
    }

    let iterations = current_time / seconds;
    let iteration = iterations.floor() as i64;
    let mut progress = iterations - iteration as f64;

    // Precision loss from (begin + duration) - begin can leave progress just
    // off the boundary; snap it so hold-end fills the right value.
    if ((iterations >= 1.0 && progress <= snap) || progress >= 1.0 - snap) && expired {
        progress = if timing.auto_reverse && iteration % 2 == 0 {
            0.0
        } else {
            1.0
        };
    }

    let mut locally_reversed = false;
    if timing.auto_reverse && iteration % 2 == 1 {
        progress = 1.0 - progress;
        locally_reversed = true;
    }

    LocalProgress {
        current_time: progress * seconds,
        progress,
        iteration,
        locally_reversed,
    }
}

/// Milliseconds until a not-yet-started node reaches its begin time.
///
/// `None` when no wake is needed: the parent has no time, or is running in
/// reverse (the parent ticks its children at each new iteration).
pub fn begin_tick_delay_ms(parent: &ClockParams, begin_time: f64, speed_ratio: f64) -> Option<u64> {
    if !parent.has_time || parent.is_reversed {
        return None;
    }
    Some(ms_ceil((begin_time - parent.time) * 1000.0 / speed_ratio))
}

/// Milliseconds until a stopped or filling node re-enters its active period
/// while the parent runs in reverse.
pub fn end_tick_delay_ms(
    parent: &ClockParams,
    expiration: Option<f64>,
    speed_ratio: f64,
) -> Option<u64> {
    if !parent.has_time || !parent.is_reversed {
        return None;
    }
    let exp = expiration?;
    Some(ms_ceil((parent.time - exp) * 1000.0 / speed_ratio))
}

pub(crate) fn ms_ceil(ms: f64) -> u64 {
    if ms <= 0.0 { 0 } else { ms.ceil() as u64 }
}
