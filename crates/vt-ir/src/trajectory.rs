//! Tracked sinusoidal trajectories (partials).

use crate::peak::Peak;

/// Persistent identity of a trajectory. Unique among live trajectories.
pub type TrajectoryId = u32;

/// Size of the tracker's trajectory table.
pub const MAX_TRAJECTORIES: usize = 512;

/// Trajectory lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrajectoryState {
    /// Matched this frame, or missing for no longer than the death tolerance.
    #[default]
    Active,
    /// Died this frame. Reported once with its final values, then pruned.
    Dead,
}

/// A tracked partial.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trajectory {
    pub id: TrajectoryId,
    /// Last matched frequency (Hz).
    pub frequency: f32,
    /// Last matched log-magnitude (dB).
    pub log_magnitude: f32,
    /// Frames in which a peak was matched, counting the birth frame.
    pub age: u32,
    /// Consecutive frames without a match.
    pub missed: u32,
    /// Scratch flag: matched during the current frame's pass.
    pub assigned: bool,
    pub state: TrajectoryState,
}

impl Trajectory {
    /// A new trajectory born from an unmatched peak.
    pub fn born(id: TrajectoryId, peak: Peak) -> Self {
        Self {
            id,
            frequency: peak.frequency,
            log_magnitude: peak.log_magnitude,
            age: 1,
            missed: 0,
            assigned: true,
            state: TrajectoryState::Active,
        }
    }

    /// Continue this trajectory with a matched peak.
    pub fn sustain(&mut self, peak: Peak) {
        self.frequency = peak.frequency;
        self.log_magnitude = peak.log_magnitude;
        self.age = self.age.saturating_add(1);
        self.missed = 0;
        self.assigned = true;
    }

    pub fn is_active(&self) -> bool {
        self.state == TrajectoryState::Active
    }

    pub fn is_dead(&self) -> bool {
        self.state == TrajectoryState::Dead
    }
}
