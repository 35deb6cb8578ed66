//! Voice slots: the fixed-size output side of the engine.

use arrayvec::ArrayVec;

use crate::db::db_to_linear;
use crate::trajectory::{Trajectory, TrajectoryId};

/// Upper bound on the configurable voice-pool size.
pub const MAX_VOICES: usize = 64;

/// Index of a voice slot; doubles as the host channel index.
pub type SlotIndex = usize;

/// Voice slot lifecycle state.
///
/// The discriminants are the state codes written to hosts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VoiceState {
    /// Available for allocation.
    #[default]
    Free = 0,
    /// Bound to a trajectory present this frame.
    Sustain = 1,
    /// Trajectory vanished this frame; slot returns to `Free` next frame.
    Release = 2,
    /// Reassigned to a new trajectory in the same frame its previous
    /// occupant vacated it.
    Stolen = 3,
}

impl VoiceState {
    pub const ALL: [VoiceState; 4] = [
        VoiceState::Free,
        VoiceState::Sustain,
        VoiceState::Release,
        VoiceState::Stolen,
    ];

    /// Numeric state code for hosts.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(VoiceState::Free),
            1 => Some(VoiceState::Sustain),
            2 => Some(VoiceState::Release),
            3 => Some(VoiceState::Stolen),
            _ => None,
        }
    }

    /// True while the slot carries a live trajectory.
    pub const fn is_bound(self) -> bool {
        matches!(self, VoiceState::Sustain | VoiceState::Stolen)
    }
}

/// One slot of the voice pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceSlot {
    pub index: SlotIndex,
    /// Trajectory this slot voices. `None` only when `Free`.
    pub bound: Option<TrajectoryId>,
    pub frequency: f32,
    pub log_magnitude: f32,
    pub state: VoiceState,
}

impl VoiceSlot {
    /// A free slot with zeroed values.
    pub const fn new(index: SlotIndex) -> Self {
        Self {
            index,
            bound: None,
            frequency: 0.0,
            log_magnitude: 0.0,
            state: VoiceState::Free,
        }
    }

    /// Bind a trajectory to this slot in the given state.
    pub fn bind(&mut self, trajectory: &Trajectory, state: VoiceState) {
        self.bound = Some(trajectory.id);
        self.frequency = trajectory.frequency;
        self.log_magnitude = trajectory.log_magnitude;
        self.state = state;
    }

    /// Refresh values from the bound trajectory and mark it sustaining.
    pub fn sustain(&mut self, trajectory: &Trajectory) {
        self.frequency = trajectory.frequency;
        self.log_magnitude = trajectory.log_magnitude;
        self.state = VoiceState::Sustain;
    }

    /// Begin the one-frame release. Values and binding are held.
    pub fn release(&mut self) {
        self.state = VoiceState::Release;
    }

    /// Return to the free pool. Last values are held.
    pub fn free(&mut self) {
        self.bound = None;
        self.state = VoiceState::Free;
    }

    pub fn output(&self) -> VoiceOutput {
        VoiceOutput {
            frequency: self.frequency,
            log_magnitude: self.log_magnitude,
            state: self.state,
        }
    }
}

/// What one slot emits for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoiceOutput {
    pub frequency: f32,
    pub log_magnitude: f32,
    pub state: VoiceState,
}

/// Magnitude scale for host output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MagnitudeScale {
    #[default]
    Decibels,
    Linear,
}

impl VoiceOutput {
    pub fn magnitude(&self, scale: MagnitudeScale) -> f32 {
        match scale {
            MagnitudeScale::Decibels => self.log_magnitude,
            MagnitudeScale::Linear => db_to_linear(self.log_magnitude),
        }
    }
}

/// One frame of allocator output: exactly one entry per configured slot,
/// in slot order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoiceFrame {
    outputs: ArrayVec<VoiceOutput, MAX_VOICES>,
}

impl VoiceFrame {
    pub fn new() -> Self {
        Self {
            outputs: ArrayVec::new(),
        }
    }

    /// Rebuild from the slot array.
    pub fn fill_from(&mut self, slots: &[VoiceSlot]) {
        self.outputs.clear();
        for slot in slots.iter().take(MAX_VOICES) {
            self.outputs.push(slot.output());
        }
    }

    pub fn clear(&mut self) {
        self.outputs.clear();
    }

    pub fn as_slice(&self) -> &[VoiceOutput] {
        &self.outputs
    }

    pub fn get(&self, slot: SlotIndex) -> Option<&VoiceOutput> {
        self.outputs.get(slot)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, VoiceOutput> {
        self.outputs.iter()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Number of slots in `state`.
    pub fn count(&self, state: VoiceState) -> usize {
        self.outputs.iter().filter(|o| o.state == state).count()
    }
}

impl<'a> IntoIterator for &'a VoiceFrame {
    type Item = &'a VoiceOutput;
    type IntoIter = core::slice::Iter<'a, VoiceOutput>;

    fn into_iter(self) -> Self::IntoIter {
        self.outputs.iter()
    }
}
