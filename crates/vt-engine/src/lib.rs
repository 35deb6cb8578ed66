//! Realtime engine for voicetrack.
//!
//! Runs once per analysis frame: the [`PartialTracker`] turns an unordered
//! set of spectral peaks into trajectories with stable ids, and the
//! [`VoiceAllocator`] maps those trajectories onto a fixed pool of voice
//! slots. [`Engine`] drives the pair in the required order.
//!
//! Nothing on the per-frame path allocates, blocks, or fails.

#![cfg_attr(not(feature = "std"), no_std)]

mod allocator;
mod engine;
pub mod host;
mod matching;
mod replay;
mod tracker;

pub use allocator::VoiceAllocator;
pub use engine::Engine;
pub use matching::Matcher;
pub use replay::{Flow, Progress, ReplayReport};
pub use tracker::PartialTracker;

pub use vt_ir::{
    ConfigError, EngineConfig, Peak, PeakFrame, Trajectory, TrajectoryId, VoiceFrame,
    VoiceOutput, VoiceState,
};
