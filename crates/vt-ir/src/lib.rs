//! Core data types for voicetrack.
//!
//! This crate defines the values that flow through the engine each frame:
//! spectral peaks in, tracked trajectories in the middle, voice slots out.
//! It also holds the configuration surface shared by the tracker, the
//! allocator and the host-facing controller.
//!
//! Designed to be `no_std` compatible. Every per-frame container has a
//! fixed capacity so the realtime path never touches the heap.

#![cfg_attr(not(feature = "std"), no_std)]

mod config;
mod db;
mod peak;
mod trajectory;
mod voice;

pub use config::{
    AllocatorConfig, ConfigError, EngineConfig, MatchMethod, PriorityMode, ThresholdReference,
    TrackerConfig,
};
pub use db::{db_to_linear, linear_to_db, DB_FLOOR};
pub use peak::{Peak, PeakFrame, MAX_PEAKS};
pub use trajectory::{Trajectory, TrajectoryId, TrajectoryState, MAX_TRAJECTORIES};
pub use voice::{MagnitudeScale, SlotIndex, VoiceFrame, VoiceOutput, VoiceSlot, VoiceState, MAX_VOICES};
