//! PartialTracker: peaks in, identified trajectories out.

use arrayvec::ArrayVec;
use vt_ir::{
    ConfigError, MatchMethod, Peak, PeakFrame, ThresholdReference, TrackerConfig, Trajectory,
    TrajectoryId, TrajectoryState, MAX_TRAJECTORIES,
};

use crate::matching::Matcher;

/// Assigns each frame's peaks to persistent trajectories.
///
/// Per frame: call [`process_frame`](Self::process_frame), read
/// [`active_trajectories`](Self::active_trajectories), then call
/// [`prune`](Self::prune). Skipping `prune` leaves dead entries in the table
/// and they are reported again next frame.
#[derive(Clone, Debug)]
pub struct PartialTracker {
    config: TrackerConfig,
    matcher: Matcher,
    /// Live trajectories, oldest first.
    table: ArrayVec<Trajectory, MAX_TRAJECTORIES>,
    /// Reportable subset of `table` as of the last processed frame.
    snapshot: ArrayVec<Trajectory, MAX_TRAJECTORIES>,
    next_id: TrajectoryId,
    births: u64,
}

impl PartialTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            matcher: Matcher::new(&config),
            config,
            table: ArrayVec::new(),
            snapshot: ArrayVec::new(),
            next_id: 0,
            births: 0,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Apply a new configuration. Changing the minimum track length drops
    /// all trajectories; other changes apply from the next frame. Ids keep
    /// counting up across the drop so a downstream allocator never sees a
    /// dropped id reused for a new trajectory.
    pub fn configure(&mut self, config: TrackerConfig) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            log::warn!("rejected tracker config: {}", e);
            return Err(e);
        }
        let reset = config.min_track_length != self.config.min_track_length;
        self.config = config;
        self.matcher = Matcher::new(&config);
        if reset {
            log::debug!("min track length now {}, dropping trajectories", config.min_track_length);
            self.drop_trajectories();
        }
        Ok(())
    }

    pub fn set_min_track_length(&mut self, frames: u32) -> Result<(), ConfigError> {
        self.configure(TrackerConfig {
            min_track_length: frames,
            ..self.config
        })
    }

    pub fn set_birth_thresholds(&mut self, low_db: f32, high_db: f32) -> Result<(), ConfigError> {
        self.configure(TrackerConfig {
            birth_low_db: low_db,
            birth_high_db: high_db,
            ..self.config
        })
    }

    pub fn set_threshold_reference(&mut self, reference: ThresholdReference) {
        self.config.threshold_reference = reference;
    }

    pub fn set_method(&mut self, method: MatchMethod) {
        self.config.method = method;
        self.matcher = Matcher::new(&self.config);
    }

    pub fn set_weights(&mut self, frequency: f32, magnitude: f32) -> Result<(), ConfigError> {
        self.configure(TrackerConfig {
            frequency_weight: frequency,
            magnitude_weight: magnitude,
            ..self.config
        })
    }

    pub fn set_acceptance(&mut self, acceptance: f32) -> Result<(), ConfigError> {
        self.configure(TrackerConfig {
            acceptance,
            ..self.config
        })
    }

    pub fn set_max_deviation(&mut self, frequency_hz: f32, magnitude_db: f32) -> Result<(), ConfigError> {
        self.configure(TrackerConfig {
            max_frequency_deviation: frequency_hz,
            max_magnitude_deviation: magnitude_db,
            ..self.config
        })
    }

    pub fn set_death_tolerance(&mut self, frames: u32) {
        self.config.death_tolerance = frames;
    }

    /// Match one frame of peaks against the live trajectories.
    pub fn process_frame(&mut self, frame: &PeakFrame) {
        for t in &mut self.table {
            t.assigned = false;
        }

        let (low, high) = self.thresholds(frame.max_log_magnitude());
        for peak in frame.peaks() {
            // below birth-low: neither continues nor starts anything
            if peak.log_magnitude < low {
                continue;
            }
            if let Some(index) = self.best_match(peak) {
                self.table[index].sustain(*peak);
            } else if peak.log_magnitude >= high {
                self.birth(*peak);
            }
        }

        let tolerance = self.config.death_tolerance;
        for t in &mut self.table {
            if t.is_active() && !t.assigned {
                t.missed = t.missed.saturating_add(1);
                if t.missed > tolerance {
                    t.state = TrajectoryState::Dead;
                }
            }
        }

        // dead before reaching the minimum length: noise, never reported
        let min_len = self.config.min_track_length;
        self.table.retain(|t| !(t.is_dead() && t.age < min_len));

        self.snapshot.clear();
        for t in self.table.iter().filter(|t| t.age >= min_len) {
            self.snapshot.push(*t);
        }
    }

    /// Trajectories visible to consumers for the last processed frame:
    /// every trajectory that has reached the minimum track length,
    /// including those that died this frame (state `Dead`).
    pub fn active_trajectories(&self) -> &[Trajectory] {
        &self.snapshot
    }

    /// Drop trajectories that died and have been reported. Idempotent.
    pub fn prune(&mut self) {
        self.table.retain(|t| !t.is_dead());
    }

    /// Forget every trajectory and restart ids at 0. Configuration is kept.
    pub fn clear(&mut self) {
        self.drop_trajectories();
        self.next_id = 0;
        self.births = 0;
    }

    /// Trajectories started since construction or the last `clear`.
    pub fn births(&self) -> u64 {
        self.births
    }

    /// Entries in the trajectory table, reported or not.
    pub fn live_count(&self) -> usize {
        self.table.len()
    }

    fn drop_trajectories(&mut self) {
        self.table.clear();
        self.snapshot.clear();
    }

    fn thresholds(&self, frame_max: f32) -> (f32, f32) {
        let offset = match self.config.threshold_reference {
            ThresholdReference::Absolute => 0.0,
            ThresholdReference::FrameMax => frame_max,
        };
        (offset + self.config.birth_low_db, offset + self.config.birth_high_db)
    }

    /// Cheapest unassigned active trajectory accepted for `peak`; ties go to
    /// the lowest id.
    fn best_match(&self, peak: &Peak) -> Option<usize> {
        let mut best: Option<(usize, f32, TrajectoryId)> = None;
        for (index, t) in self.table.iter().enumerate() {
            if t.assigned || !t.is_active() {
                continue;
            }
            let Some(cost) = self.matcher.cost(t, peak) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((_, best_cost, best_id)) => {
                    cost < best_cost || (cost == best_cost && t.id < best_id)
                }
            };
            if better {
                best = Some((index, cost, t.id));
            }
        }
        best.map(|(index, _, _)| index)
    }

    fn birth(&mut self, peak: Peak) {
        if self.table.is_full() {
            return;
        }
        let id = self.fresh_id();
        self.table.push(Trajectory::born(id, peak));
        self.births += 1;
    }

    /// Next id not held by a live trajectory. Terminates because the table
    /// holds fewer than `u32::MAX` entries.
    fn fresh_id(&mut self) -> TrajectoryId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.table.iter().any(|t| t.id == id) {
                return id;
            }
        }
    }
}
