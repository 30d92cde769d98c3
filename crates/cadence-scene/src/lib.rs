//! Cadence: a hierarchical animation timing engine.
//!
//! Timing trees are built and driven through [`animation::TimeManager`]. The
//! engine talks to its host through the [`scene::SceneGraph`],
//! [`animation::FrameScheduler`] and [`animation::Compositor`] traits.

pub mod animation;
pub mod error;
pub mod scene;

pub use animation::{HostContext, TimeManager, TimingPolicy};
pub use error::{ErrorCode, ErrorPolicy, Result, TimingError};
