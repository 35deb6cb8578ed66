//! VoiceAllocator: maps identified trajectories onto a fixed voice pool.

use core::cmp::Ordering;

use arrayvec::ArrayVec;
use heapless::{Deque, Vec as FixedVec};
use vt_ir::{
    AllocatorConfig, ConfigError, PriorityMode, SlotIndex, Trajectory, TrajectoryId, VoiceFrame,
    VoiceSlot, VoiceState, MAX_TRAJECTORIES, MAX_VOICES,
};

/// Fixed-size voice pool with priority ordering and same-frame stealing.
///
/// A trajectory keeps the slot it was given for as long as it stays in the
/// incoming set; it is never moved to another slot index while alive.
#[derive(Clone, Debug)]
pub struct VoiceAllocator {
    config: AllocatorConfig,
    slots: ArrayVec<VoiceSlot, MAX_VOICES>,
    /// Free slot indices, oldest vacancy first.
    free: Deque<SlotIndex, MAX_VOICES>,
    /// Bound slot indices in allocation order.
    active: FixedVec<SlotIndex, MAX_VOICES>,
    /// Scratch: trajectories not yet claimed this frame.
    pending: ArrayVec<Trajectory, MAX_TRAJECTORIES>,
    output: VoiceFrame,
}

impl VoiceAllocator {
    pub fn new(config: AllocatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut allocator = Self {
            config,
            slots: ArrayVec::new(),
            free: Deque::new(),
            active: FixedVec::new(),
            pending: ArrayVec::new(),
            output: VoiceFrame::new(),
        };
        allocator.reset();
        Ok(allocator)
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn voice_count(&self) -> usize {
        self.config.voice_count
    }

    /// Apply a new configuration. A voice count change resets every slot to
    /// `Free`; a priority change applies from the next frame.
    pub fn configure(&mut self, config: AllocatorConfig) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            log::warn!("rejected allocator config: {}", e);
            return Err(e);
        }
        let resize = config.voice_count != self.config.voice_count;
        self.config = config;
        if resize {
            log::debug!("voice count now {}, resetting voice pool", config.voice_count);
            self.reset();
        }
        Ok(())
    }

    pub fn set_voice_count(&mut self, voice_count: usize) -> Result<(), ConfigError> {
        self.configure(AllocatorConfig {
            voice_count,
            ..self.config
        })
    }

    pub fn set_priority(&mut self, priority: PriorityMode) {
        self.config.priority = priority;
    }

    /// Return every slot to `Free` and drop all bindings.
    pub fn clear(&mut self) {
        self.reset();
    }

    /// Allocate voices for one frame's trajectories and return the frame's
    /// output: exactly `voice_count` entries in slot order.
    ///
    /// Dead trajectories count as absent. Trajectories that find no free
    /// slot are silently left unvoiced.
    pub fn allocate(&mut self, trajectories: &[Trajectory]) -> &VoiceFrame {
        for slot in &mut self.slots {
            if slot.state == VoiceState::Release {
                slot.free();
            }
        }

        self.pending.clear();
        for t in trajectories.iter().filter(|t| t.is_active()) {
            if self.pending.iter().any(|p| p.id == t.id) {
                continue;
            }
            if self.pending.try_push(*t).is_err() {
                break;
            }
        }

        let slots = &mut self.slots;
        let pending = &mut self.pending;
        let free = &mut self.free;
        self.active.retain(|&index| {
            let slot = &mut slots[index];
            match pending.iter().position(|t| Some(t.id) == slot.bound) {
                Some(found) => {
                    slot.sustain(&pending[found]);
                    pending.swap_remove(found);
                    true
                }
                None => {
                    slot.release();
                    // capacity equals the slot count, so this cannot overflow
                    let _ = free.push_back(index);
                    false
                }
            }
        });

        let priority = self.config.priority;
        self.pending.sort_unstable_by(|a, b| compare(priority, a, b));
        self.pending.truncate(self.slots.len());

        for t in &self.pending {
            let Some(index) = self.free.pop_front() else {
                break;
            };
            let slot = &mut self.slots[index];
            let state = if slot.state == VoiceState::Release {
                VoiceState::Stolen
            } else {
                VoiceState::Sustain
            };
            slot.bind(t, state);
            // one entry per slot, so this cannot overflow
            let pushed = self.active.push(index);
            debug_assert!(pushed.is_ok());
        }

        self.output.fill_from(&self.slots);
        &self.output
    }

    /// Output of the last allocated frame.
    pub fn output(&self) -> &VoiceFrame {
        &self.output
    }

    pub fn slots(&self) -> &[VoiceSlot] {
        &self.slots
    }

    /// Slot currently voicing `id`, if any.
    pub fn slot_of(&self, id: TrajectoryId) -> Option<SlotIndex> {
        self.active
            .iter()
            .copied()
            .find(|&index| self.slots[index].bound == Some(id))
    }

    fn reset(&mut self) {
        let count = self.config.voice_count.min(MAX_VOICES);
        self.slots.clear();
        self.free.clear();
        self.active.clear();
        self.pending.clear();
        for index in 0..count {
            self.slots.push(VoiceSlot::new(index));
            let _ = self.free.push_back(index);
        }
        self.output.fill_from(&self.slots);
    }
}

/// Priority order for unclaimed trajectories. Ids break ties so the order is
/// total and the unstable sort stays deterministic.
fn compare(priority: PriorityMode, a: &Trajectory, b: &Trajectory) -> Ordering {
    let primary = match priority {
        PriorityMode::LowestFrequencyFirst => a.frequency.total_cmp(&b.frequency),
        PriorityMode::LoudestFirst => b.log_magnitude.total_cmp(&a.log_magnitude),
    };
    primary.then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vt_ir::{Peak, TrajectoryState};

    fn pool(voices: usize, priority: PriorityMode) -> VoiceAllocator {
        VoiceAllocator::new(AllocatorConfig {
            voice_count: voices,
            priority,
        })
        .unwrap()
    }

    fn traj(id: TrajectoryId, freq: f32, db: f32) -> Trajectory {
        Trajectory::born(id, Peak::new(freq, db))
    }

    fn states(frame: &VoiceFrame) -> std::vec::Vec<VoiceState> {
        frame.iter().map(|o| o.state).collect()
    }

    fn assert_unique_bindings(alloc: &VoiceAllocator) {
        let bound: std::vec::Vec<_> = alloc
            .slots()
            .iter()
            .filter(|s| s.state != VoiceState::Free)
            .filter_map(|s| s.bound)
            .collect();
        for (i, a) in bound.iter().enumerate() {
            assert!(!bound[i + 1..].contains(a), "id {} bound twice", a);
        }
    }

    #[test]
    fn rejects_empty_pool() {
        assert!(VoiceAllocator::new(AllocatorConfig {
            voice_count: 0,
            priority: PriorityMode::LoudestFirst
        })
        .is_err());
    }

    #[test]
    fn fresh_pool_emits_free_slots() {
        let alloc = pool(4, PriorityMode::LowestFrequencyFirst);
        assert_eq!(alloc.output().len(), 4);
        assert_eq!(alloc.output().count(VoiceState::Free), 4);
    }

    #[test]
    fn second_trajectory_takes_a_free_slot() {
        let mut alloc = pool(2, PriorityMode::LowestFrequencyFirst);
        let out = alloc.allocate(&[traj(1, 440.0, -10.0)]).clone();
        assert_eq!(states(&out), [VoiceState::Sustain, VoiceState::Free]);
        assert_eq!(out.get(0).unwrap().frequency, 440.0);

        let out = alloc.allocate(&[traj(1, 440.0, -10.0), traj(2, 220.0, -12.0)]);
        assert_eq!(states(out), [VoiceState::Sustain, VoiceState::Sustain]);
        assert_eq!(out.get(0).unwrap().frequency, 440.0);
        assert_eq!(out.get(1).unwrap().frequency, 220.0);
        assert_eq!(alloc.slot_of(1), Some(0));
        assert_eq!(alloc.slot_of(2), Some(1));
    }

    #[test]
    fn bound_trajectory_never_changes_slot() {
        let mut alloc = pool(3, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(5, 800.0, -10.0)]);
        assert_eq!(alloc.slot_of(5), Some(0));
        // lower-frequency arrivals must not push id 5 around
        alloc.allocate(&[traj(5, 810.0, -10.0), traj(6, 100.0, -10.0), traj(7, 50.0, -10.0)]);
        assert_eq!(alloc.slot_of(5), Some(0));
        assert_eq!(alloc.slots()[0].frequency, 810.0);
        assert_eq!(alloc.slot_of(7), Some(1));
        assert_eq!(alloc.slot_of(6), Some(2));
    }

    #[test]
    fn vanished_trajectory_releases_then_frees() {
        let mut alloc = pool(2, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0)]);
        let out = alloc.allocate(&[]);
        assert_eq!(out.get(0).unwrap().state, VoiceState::Release);
        assert_eq!(out.get(0).unwrap().frequency, 440.0);
        let out = alloc.allocate(&[]);
        assert_eq!(out.get(0).unwrap().state, VoiceState::Free);
        // free slots hold their last values
        assert_eq!(out.get(0).unwrap().frequency, 440.0);
        assert_eq!(alloc.slots()[0].bound, None);
    }

    #[test]
    fn full_pool_does_not_evict_incumbent() {
        let mut alloc = pool(1, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0)]);
        // B is lower in frequency (higher priority) but A is still present
        let out = alloc.allocate(&[traj(1, 440.0, -10.0), traj(2, 220.0, -10.0)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(0).unwrap().state, VoiceState::Sustain);
        assert_eq!(alloc.slot_of(1), Some(0));
        assert_eq!(alloc.slot_of(2), None);
    }

    #[test]
    fn same_frame_reuse_is_stolen() {
        let mut alloc = pool(1, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0)]);
        let out = alloc.allocate(&[traj(2, 220.0, -10.0)]);
        assert_eq!(out.get(0).unwrap().state, VoiceState::Stolen);
        assert_eq!(out.get(0).unwrap().frequency, 220.0);
        assert_eq!(alloc.slot_of(2), Some(0));
        let out = alloc.allocate(&[traj(2, 221.0, -10.0)]);
        assert_eq!(out.get(0).unwrap().state, VoiceState::Sustain);
    }

    #[test]
    fn idle_free_slots_are_preferred_over_stealing() {
        let mut alloc = pool(2, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0)]);
        // slot 0 is vacated this frame, slot 1 has been idle: use slot 1
        let out = alloc.allocate(&[traj(2, 220.0, -10.0)]);
        assert_eq!(states(out), [VoiceState::Release, VoiceState::Sustain]);
    }

    #[test]
    fn loudest_first_priority() {
        let mut alloc = pool(2, PriorityMode::LoudestFirst);
        let out = alloc.allocate(&[
            traj(1, 100.0, -30.0),
            traj(2, 200.0, -5.0),
            traj(3, 300.0, -10.0),
        ]);
        assert_eq!(out.get(0).unwrap().frequency, 200.0);
        assert_eq!(out.get(1).unwrap().frequency, 300.0);
        assert_eq!(alloc.slot_of(1), None);
    }

    #[test]
    fn lowest_frequency_priority_with_id_tiebreak() {
        let mut alloc = pool(2, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(9, 300.0, -1.0), traj(4, 100.0, -1.0), traj(3, 100.0, -1.0)]);
        assert_eq!(alloc.slot_of(3), Some(0));
        assert_eq!(alloc.slot_of(4), Some(1));
        assert_eq!(alloc.slot_of(9), None);
    }

    #[test]
    fn dead_trajectories_are_treated_as_absent() {
        let mut alloc = pool(1, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0)]);
        let mut dead = traj(1, 440.0, -10.0);
        dead.state = TrajectoryState::Dead;
        let out = alloc.allocate(&[dead]);
        assert_eq!(out.get(0).unwrap().state, VoiceState::Release);
    }

    #[test]
    fn duplicate_ids_bind_once() {
        let mut alloc = pool(3, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0), traj(1, 440.0, -10.0)]);
        assert_eq!(alloc.output().count(VoiceState::Sustain), 1);
        assert_unique_bindings(&alloc);
    }

    #[test]
    fn resize_resets_every_slot() {
        let mut alloc = pool(2, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0), traj(2, 550.0, -10.0)]);
        alloc.set_voice_count(3).unwrap();
        assert_eq!(alloc.output().len(), 3);
        assert_eq!(alloc.output().count(VoiceState::Free), 3);
        assert_eq!(alloc.slot_of(1), None);
        let out = alloc.allocate(&[traj(1, 440.0, -10.0)]);
        assert_eq!(out.len(), 3);
        assert_eq!(out.get(0).unwrap().state, VoiceState::Sustain);

        assert!(alloc.set_voice_count(0).is_err());
        assert_eq!(alloc.voice_count(), 3);
    }

    #[test]
    fn same_count_keeps_bindings() {
        let mut alloc = pool(2, PriorityMode::LowestFrequencyFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0)]);
        alloc.set_voice_count(2).unwrap();
        alloc.set_priority(PriorityMode::LoudestFirst);
        assert_eq!(alloc.slot_of(1), Some(0));
    }

    #[test]
    fn clear_keeps_configuration() {
        let mut alloc = pool(2, PriorityMode::LoudestFirst);
        alloc.allocate(&[traj(1, 440.0, -10.0)]);
        alloc.clear();
        assert_eq!(alloc.output().count(VoiceState::Free), 2);
        assert_eq!(alloc.config().priority, PriorityMode::LoudestFirst);
        assert_eq!(alloc.slot_of(1), None);
    }

    #[test]
    fn churn_never_double_binds() {
        let mut alloc = pool(4, PriorityMode::LoudestFirst);
        for frame in 0u32..300 {
            let set: std::vec::Vec<_> = (0..6u32)
                .filter(|k| (frame + k * 7) % 5 != 0)
                .map(|k| traj(frame / 3 + k, 100.0 * (k + 1) as f32, -(((frame + k) % 40) as f32)))
                .collect();
            let out = alloc.allocate(&set);
            assert_eq!(out.len(), 4);
            assert_unique_bindings(&alloc);
            assert_eq!(alloc.active.len() + alloc.free.len(), 4);
        }
    }
}
